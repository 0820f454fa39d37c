//! # In-Memory Backend

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};

use super::backend::{guess_mime_type, ByteStream, FileBody, StorageBackend, StoredFile};
use super::errors::{StorageError, StorageResult};
use super::path_guard::validate_filename;

#[derive(Debug, Clone)]
struct MemoryEntry {
    data: Bytes,
    created_at: DateTime<Utc>,
}

impl MemoryEntry {
    fn describe(&self, name: &str) -> StoredFile {
        StoredFile {
            storage_name: name.to_string(),
            size: self.data.len() as u64,
            mime_type: guess_mime_type(name),
            created_at: self.created_at,
            modified_at: self.created_at,
        }
    }
}

/// Backend that keeps files in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    files: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files
    pub fn len(&self) -> usize {
        self.files.read().map(|files| files.len()).unwrap_or(0)
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Internal("Lock poisoned".into())
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn write(&self, name: &str, mut data: ByteStream<'_>) -> StorageResult<StoredFile> {
        validate_filename(name)?;

        // Collected before taking the lock so a failed stream stores nothing.
        let mut buffer = BytesMut::new();
        while let Some(chunk) = data.next().await {
            buffer.extend_from_slice(&chunk?);
        }

        let entry = MemoryEntry {
            data: buffer.freeze(),
            created_at: Utc::now(),
        };
        let stored = entry.describe(name);
        self.files
            .write()
            .map_err(poisoned)?
            .insert(name.to_string(), entry);

        Ok(stored)
    }

    async fn read(&self, name: &str) -> StorageResult<FileBody> {
        validate_filename(name)?;
        let entry = self
            .files
            .read()
            .map_err(poisoned)?
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        Ok(FileBody {
            file: entry.describe(name),
            stream: stream::once(async move { Ok(entry.data) }).boxed(),
        })
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        validate_filename(name)?;
        Ok(self.files.read().map_err(poisoned)?.contains_key(name))
    }

    async fn list(&self) -> StorageResult<Vec<StoredFile>> {
        let files = self.files.read().map_err(poisoned)?;
        Ok(files.iter().map(|(name, entry)| entry.describe(name)).collect())
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        validate_filename(name)?;
        self.files
            .write()
            .map_err(poisoned)?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    fn one_chunk(data: &'static [u8]) -> ByteStream<'static> {
        stream::once(async move { Ok(Bytes::from_static(data)) }).boxed()
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let backend = MemoryBackend::new();

        let stored = backend.write("notes.md", one_chunk(b"# hi")).await.unwrap();
        assert_eq!(stored.size, 4);
        assert_eq!(backend.len(), 1);

        let body = backend.read("notes.md").await.unwrap();
        let parts: Vec<Bytes> = body.stream.try_collect().await.unwrap();
        assert_eq!(parts.concat(), b"# hi");

        backend.delete("notes.md").await.unwrap();
        assert!(backend.is_empty());
        assert!(matches!(
            backend.delete("notes.md").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_stream_stores_nothing() {
        let backend = MemoryBackend::new();
        let failing: ByteStream<'static> = stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(StorageError::Interrupted("client went away".into())),
        ])
        .boxed();

        assert!(backend.write("x.bin", failing).await.is_err());
        assert!(!backend.exists("x.bin").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.write("../x", one_chunk(b"x")).await,
            Err(StorageError::InvalidName(_))
        ));
    }
}
