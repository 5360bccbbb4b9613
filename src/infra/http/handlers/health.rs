use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use listings_api_types::HealthResponse;
use tracing::warn;

use crate::infra::http::state::HttpState;

const UP: &str = "ok";
const DOWN: &str = "unavailable";

/// The store decides the status code; a broken cache only degrades the report.
pub async fn health(State(state): State<HttpState>) -> Response {
    let database = match state.store.ping().await {
        Ok(()) => UP,
        Err(err) => {
            warn!(target = "listings::http::health", error = %err, "Record store ping failed");
            DOWN
        }
    };
    let cache = match state.feed.cache_health().await {
        Ok(()) => UP,
        Err(err) => {
            warn!(target = "listings::http::health", error = %err, "Feed cache ping failed");
            DOWN
        }
    };

    let status = if database == UP {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            database: database.to_string(),
            cache: cache.to_string(),
        }),
    )
        .into_response()
}
