//! Error handling

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::info;

use crate::pipeline::PipelineError;
use crate::storage::StorageError;

/// Errors returned by the HTTP handlers.
#[derive(Debug)]
pub enum MemeForgeError {
    /// When you didn't do the right thing
    BadRequest(String),
    /// When a requested resource is not found
    NotFound(String),
    /// When an internal server error occurs
    InternalServerError(String),
    /// The meme pipeline failed
    Pipeline(PipelineError),
}

impl std::fmt::Display for MemeForgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemeForgeError::BadRequest(message) => write!(f, "{message}"),
            MemeForgeError::NotFound(what) => write!(f, "Not found: {what}"),
            MemeForgeError::InternalServerError(message) => write!(f, "{message}"),
            MemeForgeError::Pipeline(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for MemeForgeError {}

impl From<PipelineError> for MemeForgeError {
    fn from(err: PipelineError) -> Self {
        MemeForgeError::Pipeline(err)
    }
}

impl From<StorageError> for MemeForgeError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidFilename(name) => MemeForgeError::NotFound(name),
            other => MemeForgeError::InternalServerError(other.to_string()),
        }
    }
}

impl From<std::io::Error> for MemeForgeError {
    fn from(err: std::io::Error) -> Self {
        MemeForgeError::InternalServerError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for MemeForgeError {
    fn from(err: tokio::task::JoinError) -> Self {
        MemeForgeError::InternalServerError(err.to_string())
    }
}

impl From<axum::http::Error> for MemeForgeError {
    fn from(err: axum::http::Error) -> Self {
        MemeForgeError::InternalServerError(err.to_string())
    }
}

impl IntoResponse for MemeForgeError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            MemeForgeError::BadRequest(message) => {
                info!("Bad request received: {message}");
                (StatusCode::BAD_REQUEST, message)
            }
            MemeForgeError::NotFound(what) => {
                tracing::error!("404 {what}");
                (StatusCode::NOT_FOUND, "Not Found".to_string())
            }
            MemeForgeError::InternalServerError(message) => {
                tracing::error!("Internal server error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            MemeForgeError::Pipeline(err) => {
                tracing::error!("Pipeline error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
