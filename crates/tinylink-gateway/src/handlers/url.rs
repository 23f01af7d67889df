use crate::error::Result;
use crate::model::{CreateUrlRequest, CreateUrlResponse};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tinylink_core::{ShortCode, ShortenParams, ShortenerError};
use tracing::info;

/// Parses a path segment, treating anything outside the alphabet as unknown.
fn parse_code(raw: String) -> std::result::Result<ShortCode, ShortenerError> {
    ShortCode::new(raw.as_str()).map_err(|_| ShortenerError::ShortCodeNotFound(raw))
}

pub async fn create_url_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateUrlRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUrlResponse>)> {
    let Json(request) = payload?;

    let mut params = ShortenParams::new(request.url);
    if let Some(alias) = request.alias {
        params = params.with_alias(alias);
    }

    let code = state.shortener().shorten(params).await?;
    info!(code = %code, "short url created");

    Ok((
        StatusCode::CREATED,
        Json(CreateUrlResponse {
            short_url: code.to_url(state.public_base_url()),
            short_code: code.to_string(),
        }),
    ))
}

pub async fn redirect_handler(
    Path(short_code): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    let code = parse_code(short_code)?;
    let target = state
        .redirector()
        .resolve(&code)
        .await?
        .ok_or_else(|| ShortenerError::ShortCodeNotFound(code.to_string()))?;

    Ok((StatusCode::FOUND, [(header::LOCATION, target)]).into_response())
}

pub async fn delete_url_handler(
    Path(short_code): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode> {
    let code = parse_code(short_code)?;
    if state.shortener().delete(&code).await? {
        info!(code = %code, "short url deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ShortenerError::ShortCodeNotFound(code.to_string()).into())
    }
}
