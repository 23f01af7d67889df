use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tinylink_core::ShortenerError;
use tracing::error;

use crate::model::ErrorResponse;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Shortener(#[from] ShortenerError),
    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedBody(rejection.body_text())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            AppError::Shortener(err) => match err {
                ShortenerError::InvalidUrl(_)
                | ShortenerError::UrlTooLong { .. }
                | ShortenerError::InvalidAlias(_) => StatusCode::BAD_REQUEST,
                ShortenerError::AliasAlreadyInUse(_) => StatusCode::CONFLICT,
                ShortenerError::ShortCodeNotFound(_) => StatusCode::NOT_FOUND,
                ShortenerError::MaxRetriesExceeded(_) | ShortenerError::ConfigurationMissing(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                ShortenerError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    /// The message shown to clients. Server-side failures are not detailed.
    fn user_message(&self) -> String {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => "internal server error".to_string(),
            StatusCode::SERVICE_UNAVAILABLE => "service temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "request failed");
        }
        let body = ErrorResponse {
            error: self.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ShortenerError) -> StatusCode {
        AppError::from(err).status()
    }

    #[test]
    fn maps_shortener_errors_to_status_codes() {
        assert_eq!(status_of(ShortenerError::InvalidUrl("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(ShortenerError::UrlTooLong { len: 2000, max: 1000 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ShortenerError::InvalidAlias("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ShortenerError::AliasAlreadyInUse("x".into())), StatusCode::CONFLICT);
        assert_eq!(status_of(ShortenerError::ShortCodeNotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ShortenerError::MaxRetriesExceeded(10)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ShortenerError::ConfigurationMissing("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ShortenerError::StoreUnavailable("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::MalformedBody("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn server_errors_hide_details() {
        let err = AppError::from(ShortenerError::StoreUnavailable("mysql at 10.0.0.3 refused".into()));
        assert_eq!(err.user_message(), "service temporarily unavailable");

        let err = AppError::from(ShortenerError::AliasAlreadyInUse("promo2024".into()));
        assert_eq!(err.user_message(), "alias already in use: promo2024");
    }
}
