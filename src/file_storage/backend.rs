//! # Storage Backend Trait

use std::fmt;
use std::fs::Metadata;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use serde::Serialize;

use super::errors::StorageResult;

/// Fallible stream of file bytes, used for both uploads and downloads.
pub type ByteStream<'a> = BoxStream<'a, StorageResult<Bytes>>;

/// One file in the storage directory.
///
/// Everything except the name is derived from the backend at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub storage_name: String,
    pub size: u64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl StoredFile {
    /// Build from filesystem metadata. Platforms without a birth time report
    /// the modification time as creation time.
    pub fn from_metadata(storage_name: String, metadata: &Metadata) -> Self {
        let modified_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let created_at = metadata
            .created()
            .map(DateTime::<Utc>::from)
            .unwrap_or(modified_at);

        Self {
            mime_type: guess_mime_type(&storage_name),
            storage_name,
            size: metadata.len(),
            created_at,
            modified_at,
        }
    }
}

/// MIME type for a stored name, from its extension.
pub fn guess_mime_type(name: &str) -> String {
    mime_guess::from_path(name).first_or_octet_stream().to_string()
}

/// An open file ready to be streamed to a client.
pub struct FileBody {
    pub file: StoredFile,
    pub stream: ByteStream<'static>,
}

impl fmt::Debug for FileBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBody")
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

/// The only component allowed to touch stored bytes.
///
/// Every operation addresses exactly one entry of a flat namespace, and
/// implementations reject names that fail the path guard.
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Store `data` under `name`. The file becomes visible only once the
    /// stream has completed; a failed stream leaves nothing behind.
    async fn write(&self, name: &str, data: ByteStream<'_>) -> StorageResult<StoredFile>;

    /// Open `name` for streaming.
    async fn read(&self, name: &str) -> StorageResult<FileBody>;

    /// Check if `name` exists
    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// All stored files, in no particular order.
    async fn list(&self) -> StorageResult<Vec<StoredFile>>;

    /// Delete `name`
    async fn delete(&self, name: &str) -> StorageResult<()>;
}
