use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Seconds a client should wait before retrying a retryable failure.
const RETRY_AFTER_SECS: &str = "2";

#[derive(Error, Debug)]
pub enum PlaygateError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not signed in: {0}")]
    Unauthenticated(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Content not ready for playback: {0}")]
    ManifestNotReady(String),

    #[error("Origin temporarily unavailable: {0}")]
    OriginUnavailable(String),

    #[error("Origin fetch failed: {0}")]
    OriginFetchError(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaygateError {
    pub fn status(&self) -> StatusCode {
        match self {
            PlaygateError::BadRequest(_) => StatusCode::BAD_REQUEST,
            PlaygateError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            PlaygateError::Forbidden(_) => StatusCode::FORBIDDEN,
            PlaygateError::AssetNotFound(_) => StatusCode::NOT_FOUND,
            PlaygateError::ManifestNotReady(_) => StatusCode::CONFLICT,
            PlaygateError::OriginUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PlaygateError::OriginFetchError(_) => StatusCode::BAD_GATEWAY,
            PlaygateError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            PlaygateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            PlaygateError::BadRequest(_) => "bad_request",
            PlaygateError::Unauthenticated(_) => "unauthenticated",
            PlaygateError::Forbidden(_) => "forbidden",
            PlaygateError::AssetNotFound(_) => "asset_not_found",
            PlaygateError::ManifestNotReady(_) => "not_ready",
            PlaygateError::OriginUnavailable(_) => "origin_unavailable",
            PlaygateError::OriginFetchError(_) => "origin_error",
            PlaygateError::RateLimited => "rate_limited",
            PlaygateError::Internal(_) => "internal_error",
        }
    }

    /// Whether the client may succeed by simply asking again later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlaygateError::OriginUnavailable(_) | PlaygateError::RateLimited
        )
    }
}

impl IntoResponse for PlaygateError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));

        if self.is_retryable() {
            (status, [(header::RETRY_AFTER, RETRY_AFTER_SECS)], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

pub type Result<T> = std::result::Result<T, PlaygateError>;
