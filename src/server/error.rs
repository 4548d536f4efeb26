//! Mapping of request and pipeline failures to HTTP responses.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tokio::task::JoinError;

use crate::error::Error;
use crate::pipeline::PipelineFailure;

/// Everything an upload request can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No multipart `file` field with a filename.
    #[error("No file part")]
    MissingUploadField,

    /// Rejected before the pipeline ran.
    #[error(transparent)]
    Rejected(Error),

    /// Malformed multipart body.
    #[error(transparent)]
    Multipart(#[from] MultipartError),

    /// The pipeline failed mid-request.
    #[error(transparent)]
    Pipeline(#[from] PipelineFailure),

    /// The blocking worker panicked or was cancelled.
    #[error("pipeline worker failed: {0}")]
    Worker(#[from] JoinError),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Rejected(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::MissingUploadField => (StatusCode::BAD_REQUEST, json!({ "error": "No file part" })),
            Self::Rejected(Error::EmptyFilename) => {
                (StatusCode::BAD_REQUEST, json!({ "error": "No selected file" }))
            }
            Self::Rejected(err) if err.is_client_error() => {
                let message = match err {
                    Error::InvalidFilename { reason, .. } => format!("Invalid file name: {reason}"),
                    other => other.to_string(),
                };
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            Self::Rejected(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            ),
            Self::Multipart(err) => (err.status(), json!({ "error": err.body_text() })),
            Self::Pipeline(failure) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": failure.error.to_string(), "stage": failure.stage.step() }),
            ),
            Self::Worker(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Depth estimation worker failed" }),
            ),
        };

        if status.is_server_error() {
            tracing::error!("Upload failed: {self}");
        } else {
            tracing::debug!("Upload rejected: {self}");
        }

        (status, Json(body)).into_response()
    }
}
