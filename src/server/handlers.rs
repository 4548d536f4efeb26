//! Request handlers.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::pipeline::DepthArtifact;
use crate::storage::UploadName;

use super::{ApiError, AppState, SERVICE_NAME};

/// Name of the multipart field carrying the image.
const FILE_FIELD: &str = "file";

/// Body of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub original_image_url: String,
    pub depth_map_url: String,
}

impl From<DepthArtifact> for UploadResponse {
    fn from(artifact: DepthArtifact) -> Self {
        Self {
            original_image_url: artifact.original_url,
            depth_map_url: artifact.depth_map_url,
        }
    }
}

pub(super) async fn index() -> &'static str {
    SERVICE_NAME
}

/// Run the pipeline on the uploaded `file` field.
pub(super) async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    // A body that is not multipart has no file part either
    let Ok(mut multipart) = multipart else {
        return Err(ApiError::MissingUploadField);
    };

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        // A plain form value named `file` is not a file part
        let Some(filename) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let bytes = field.bytes().await?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload.ok_or(ApiError::MissingUploadField)?;
    let name = UploadName::parse(&filename)?;
    tracing::info!("Received {} ({} bytes)", name.filename(), bytes.len());

    let pipeline = state.pipeline.clone();
    let artifact = tokio::task::spawn_blocking(move || pipeline.process(&name, &bytes)).await??;

    Ok(Json(artifact.into()))
}
