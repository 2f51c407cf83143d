use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use harvest_core::domain::harvest::ErrorKind;

/// Post URLs plus an access token comfortably fit; anything longer is abuse.
const MAX_QUERY_LEN: usize = 4096;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorKind,
    details: String,
}

pub async fn enforce_query_length(req: Request, next: Next) -> Response {
    if is_query_too_long(req.uri().query()) {
        let body = ErrorBody {
            error: ErrorKind::MalformedInput,
            details: format!("query string too long (max {MAX_QUERY_LEN} chars)"),
        };
        return (StatusCode::URI_TOO_LONG, axum::Json(body)).into_response();
    }
    next.run(req).await
}

fn is_query_too_long(query: Option<&str>) -> bool {
    query.is_some_and(|value| value.len() > MAX_QUERY_LEN)
}
