use crate::model::{HealthResponse, ReadyResponse};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

/// Liveness: the process is up and serving.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Readiness: the authoritative store answers. The cache breaker state is
/// reported but never fails the probe.
pub async fn ready_handler(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let cache_breaker = state.breaker().map(|breaker| breaker.state().to_string());

    if state.redirector().ready().await {
        (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready",
                cache_breaker,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "unhealthy",
                cache_breaker,
            }),
        )
    }
}
