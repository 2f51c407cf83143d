use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sources: HealthSources,
}

#[derive(Debug, Serialize)]
pub struct HealthSources {
    /// Always available; credentials arrive per request.
    pub authenticated: SourceStatus,
    pub scraped: SourceStatus,
    pub mock: MockStatus,
}

#[derive(Debug, Serialize)]
pub struct SourceStatus {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct MockStatus {
    pub forced: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sources: HealthSources {
            authenticated: SourceStatus { enabled: true },
            scraped: SourceStatus {
                enabled: state.config.apify.is_configured(),
            },
            mock: MockStatus {
                forced: state.config.mock,
            },
        },
    })
}
