//! HTTP API Errors
//!
//! Every failure leaves a handler as an [`ApiError`] and is rendered as
//! `{"error": <code>, "message": <text>}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::file_storage::StorageError;

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Provide an API key in the X-API-Key header or the apikey query parameter")]
    MissingCredential,

    #[error("The provided API key is not valid")]
    InvalidCredential,

    #[error("No file was provided for upload")]
    NoFileProvided,

    #[error("The file exceeds the maximum allowed size of {limit} bytes")]
    FileTooLarge { limit: u64 },

    #[error("At most {max} file(s) can be uploaded per request")]
    TooManyFiles { max: usize },

    #[error("Unexpected file field {0:?}")]
    UnexpectedField(String),

    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    #[error("Provide the URL of the file to delete in the request body")]
    MissingUrl,

    #[error("The provided URL is not valid")]
    MalformedUrl,

    #[error("The URL must have the form <domain>/files/<filename>")]
    InvalidUrl,

    #[error("The filename is not valid")]
    InvalidFilename,

    #[error("The requested file does not exist")]
    NotFound(String),

    #[error("No route matches the request")]
    RouteNotFound,

    #[error("The route does not support this method")]
    MethodNotAllowed,

    #[error("An unexpected server error occurred")]
    Internal(String),
}

impl ApiError {
    /// Short machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingCredential => "missing_api_key",
            ApiError::InvalidCredential => "invalid_api_key",
            ApiError::NoFileProvided => "no_file_provided",
            ApiError::FileTooLarge { .. } => "file_too_large",
            ApiError::TooManyFiles { .. } => "too_many_files",
            ApiError::UnexpectedField(_) => "unexpected_field",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::MissingUrl => "missing_url",
            ApiError::MalformedUrl => "malformed_url",
            ApiError::InvalidUrl => "invalid_url",
            ApiError::InvalidFilename => "invalid_filename",
            ApiError::NotFound(_) => "file_not_found",
            ApiError::RouteNotFound => "not_found",
            ApiError::MethodNotAllowed => "method_not_allowed",
            ApiError::Internal(_) => "server_error",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingCredential => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredential => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(name) => ApiError::NotFound(name),
            StorageError::InvalidName(_) => ApiError::InvalidFilename,
            StorageError::FileTooLarge(limit) => ApiError::FileTooLarge { limit },
            StorageError::Interrupted(reason) => ApiError::InvalidRequest(reason),
            StorageError::IoError(_) | StorageError::Internal(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

/// Uniform error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed");
        }

        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
