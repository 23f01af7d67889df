use crate::model::VersionResponse;
use axum::Json;

/// Build information for the running gateway.
pub async fn version_handler() -> Json<VersionResponse> {
    Json(VersionResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}
