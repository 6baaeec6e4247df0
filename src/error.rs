use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegmenterError {
    #[error("Failed to initialize classifier: {0}")]
    InitializationError(String),

    #[error("Failed to process image: {0}")]
    ProcessingError(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No classifier model configured")]
    ClassifierUnavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SegmenterError {
    /// Stable machine-readable code reported alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            SegmenterError::InitializationError(_) => "INIT_ERROR",
            SegmenterError::ProcessingError(_) => "PROCESSING_ERROR",
            SegmenterError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            SegmenterError::ImageTooLarge { .. } => "IMAGE_TOO_LARGE",
            SegmenterError::MissingFile => "MISSING_FILE",
            SegmenterError::InvalidRequest(_) => "INVALID_REQUEST",
            SegmenterError::ClassifierUnavailable => "CLASSIFIER_UNAVAILABLE",
            SegmenterError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SegmenterError::InitializationError(_)
            | SegmenterError::ProcessingError(_)
            | SegmenterError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SegmenterError::UnsupportedFormat(_)
            | SegmenterError::MissingFile
            | SegmenterError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            SegmenterError::ImageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            SegmenterError::ClassifierUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for SegmenterError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(SegmenterError::MissingFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            SegmenterError::ImageTooLarge { size: 2, max: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            SegmenterError::ClassifierUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            SegmenterError::ProcessingError("boom".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_image_too_large_message() {
        let err = SegmenterError::ImageTooLarge { size: 200, max: 100 };
        assert_eq!(err.to_string(), "Image too large: 200 bytes (max: 100 bytes)");
        assert_eq!(err.code(), "IMAGE_TOO_LARGE");
    }
}
