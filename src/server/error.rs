use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::downloader::errors::DownloadError;
use crate::downloader::extractors::diagnose_error;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Every failure leaving the HTTP layer, rendered as `{"error": message}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Metadata probe failures are always reported as client errors, a
    /// missing variant as 404. Local causes are still logged as errors.
    pub fn from_probe(err: DownloadError) -> Self {
        if let DownloadError::FormatNotFound(_) = err {
            return Self::not_found(err.to_string());
        }

        let message = err.to_string();
        if err.is_local() {
            error!("Probe failed locally: {}", message);
        } else {
            warn!("Probe failed: {}", message);
        }

        match diagnose_error(&message) {
            Some(reason) => Self::bad_request(format!("{} ({})", message, reason.hint())),
            None => Self::bad_request(message),
        }
    }

    /// Relay failures before any byte was sent
    pub fn from_relay(err: DownloadError) -> Self {
        error!("Download failed: {}", err);
        Self::internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_errors_map_to_statuses() {
        let err = ApiError::from_probe(DownloadError::InvalidUrl("nope".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = ApiError::from_probe(DownloadError::ToolNotFound("yt-dlp".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Tool not found: yt-dlp");

        let err = ApiError::from_probe(DownloadError::Io("broken pipe".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = ApiError::from_probe(DownloadError::FormatNotFound("251".to_string()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn probe_errors_carry_a_hint_when_diagnosed() {
        let err = ApiError::from_probe(DownloadError::Unknown(
            "[youtube] X: Private video. Sign in".to_string(),
        ));
        assert!(err.message.contains("the media is private"));
    }

    #[test]
    fn relay_errors_are_server_errors() {
        let err = ApiError::from_relay(DownloadError::EmptyOutput);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Download produced no output");
    }
}
