//! Multipart upload intake
//!
//! Streams each file part of a multipart body into the storage backend under a
//! freshly generated name, enforcing the per-file size limit while the bytes
//! arrive. A request is all-or-nothing: when any part fails, the files it has
//! already stored are deleted again.

use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::http::StatusCode;
use futures_util::{stream, StreamExt};

use crate::file_storage::backend::guess_mime_type;
use crate::file_storage::{validate_filename, ByteStream, StorageError, StoredFile};

use super::errors::{ApiError, ApiResult};
use super::storage_routes::StorageState;

/// What a single upload request may contain.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    /// Multipart field name that carries files
    pub field: &'static str,
    pub max_files: usize,
    pub max_file_size: u64,
}

/// A file stored by this request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub mime_type: String,
    pub stored: StoredFile,
}

/// Receive every file part of `multipart`.
pub async fn receive_files(
    state: &StorageState,
    multipart: &mut Multipart,
    limits: UploadLimits,
) -> ApiResult<Vec<UploadedFile>> {
    let mut uploaded = Vec::new();

    if let Err(err) = receive_into(state, multipart, limits, &mut uploaded).await {
        for file in &uploaded {
            let name = &file.stored.storage_name;
            if let Err(e) = state.backend.delete(name).await {
                tracing::warn!(filename = %name, error = %e, "failed to roll back upload");
            }
        }
        return Err(err);
    }

    Ok(uploaded)
}

async fn receive_into(
    state: &StorageState,
    multipart: &mut Multipart,
    limits: UploadLimits,
    uploaded: &mut Vec<UploadedFile>,
) -> ApiResult<()> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limits.max_file_size))?
    {
        // Parts without a filename are plain form fields.
        let Some(original_name) = field.file_name().map(str::to_owned) else {
            continue;
        };

        let field_name = field.name().unwrap_or_default();
        if field_name != limits.field {
            return Err(ApiError::UnexpectedField(field_name.to_string()));
        }
        if uploaded.len() >= limits.max_files {
            return Err(ApiError::TooManyFiles { max: limits.max_files });
        }

        let storage_name = state.names.storage_name(&original_name);
        if validate_filename(&storage_name).is_err() {
            tracing::warn!(original = %original_name, "rejected unsafe upload name");
            return Err(ApiError::InvalidFilename);
        }

        let mime_type = field
            .content_type()
            .map(str::to_owned)
            .unwrap_or_else(|| guess_mime_type(&original_name));

        let stored = state
            .backend
            .write(&storage_name, limited_stream(field, limits.max_file_size))
            .await?;

        tracing::info!(
            filename = %stored.storage_name,
            original = %original_name,
            size = stored.size,
            "file uploaded"
        );

        uploaded.push(UploadedFile {
            original_name,
            mime_type,
            stored,
        });
    }

    Ok(())
}

/// Adapt a multipart field into a byte stream that fails once more than
/// `limit` bytes have been received.
fn limited_stream(field: Field<'_>, limit: u64) -> ByteStream<'_> {
    stream::try_unfold((field, 0u64), move |(mut field, received)| async move {
        let chunk = field
            .chunk()
            .await
            .map_err(|e| stream_error(e, limit))?;

        match chunk {
            Some(chunk) => {
                let received = received + chunk.len() as u64;
                if received > limit {
                    return Err(StorageError::FileTooLarge(limit));
                }
                Ok(Some((chunk, (field, received))))
            }
            None => Ok(None),
        }
    })
    .boxed()
}

fn is_body_limit(err: &MultipartError) -> bool {
    err.status() == StatusCode::PAYLOAD_TOO_LARGE
}

fn stream_error(err: MultipartError, limit: u64) -> StorageError {
    if is_body_limit(&err) {
        StorageError::FileTooLarge(limit)
    } else {
        StorageError::Interrupted(err.body_text())
    }
}

fn multipart_error(err: MultipartError, limit: u64) -> ApiError {
    if is_body_limit(&err) {
        ApiError::FileTooLarge { limit }
    } else {
        ApiError::InvalidRequest(err.body_text())
    }
}
