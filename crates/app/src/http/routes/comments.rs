use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::is_truthy;
use crate::harvest::{self, HarvestError, HarvestRequest};
use crate::state::AppState;
use harvest_core::domain::harvest::{ErrorKind, HarvestResponse};
use harvest_infra::transport::HttpTransport;

#[derive(Debug, Default, Deserialize)]
pub struct CommentsParams {
    pub url: Option<String>,
    pub account_id: Option<String>,
    pub access_token: Option<String>,
    pub mock: Option<String>,
}

impl From<CommentsParams> for HarvestRequest {
    fn from(params: CommentsParams) -> Self {
        HarvestRequest {
            post_url: params.url,
            account_id: params.account_id,
            access_token: params.access_token,
            mock: params.mock.as_deref().is_some_and(is_truthy),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorKind,
    details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
}

pub async fn get_comments(
    State(state): State<AppState>,
    Query(params): Query<CommentsParams>,
) -> Result<Json<HarvestResponse>, HarvestError> {
    let transport = HttpTransport::new(state.http_client.clone());
    let response = harvest::run(transport, &state.config, params.into()).await?;
    Ok(Json(response))
}

fn status_for(err: &HarvestError) -> StatusCode {
    match err {
        HarvestError::MalformedInput(_) | HarvestError::MissingCredentials(_) => {
            StatusCode::BAD_REQUEST
        }
        HarvestError::NotFound(_) => StatusCode::NOT_FOUND,
        HarvestError::TokenExpired { .. } => StatusCode::UNAUTHORIZED,
        HarvestError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        HarvestError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for HarvestError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            warn!(error = %self, "harvest failed");
        }
        let body = Json(ErrorBody {
            error: self.kind(),
            details: self.to_string(),
            status: self.upstream_status(),
            body: self.upstream_body().map(str::to_string),
        });
        (status, body).into_response()
    }
}
