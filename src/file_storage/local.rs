//! # Local Filesystem Backend
//!
//! Files live directly under the root directory. Uploads are first streamed
//! into `<root>/.staging/` and renamed into place once complete, so the
//! root only ever holds whole files.
//!
//! Several processes may share one root. On open, only `.part` files that
//! have not been written to for [`STALE_PART_AGE`] are removed, so another
//! instance's in-flight uploads survive.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use super::backend::{ByteStream, FileBody, StorageBackend, StoredFile};
use super::errors::{StorageError, StorageResult};
use super::path_guard::validate_filename;

/// Directory under the root for in-flight uploads.
pub const STAGING_DIR: &str = ".staging";

/// Age after which an untouched staging file is considered abandoned.
pub const STALE_PART_AGE: Duration = Duration::from_secs(60 * 60);

const PART_EXTENSION: &str = "part";

/// Local filesystem storage backend
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a new local backend without touching the filesystem.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root and staging directories, discarding abandoned uploads
    /// left over from an interrupted run.
    pub async fn open(root: PathBuf) -> StorageResult<Self> {
        let backend = Self::new(root);

        fs::create_dir_all(backend.staging_dir())
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        backend.clear_stale_parts(STALE_PART_AGE).await?;

        Ok(backend)
    }

    /// Remove staging files older than `max_age`. Returns how many were removed.
    pub async fn clear_stale_parts(&self, max_age: Duration) -> StorageResult<usize> {
        let mut entries = fs::read_dir(self.staging_dir())
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        let mut removed = 0;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != PART_EXTENSION) {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            // A modification time in the future counts as fresh.
            let stale = metadata
                .modified()
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .is_some_and(|age| age >= max_age);
            if !metadata.is_file() || !stale {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove stale upload")
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, "cleared abandoned uploads");
        }
        Ok(removed)
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, name: &str) -> StorageResult<PathBuf> {
        Ok(self.root.join(validate_filename(name)?))
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    async fn stat(&self, name: &str, path: &Path) -> StorageResult<StoredFile> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| StorageError::from_io(name, e))?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        Ok(StoredFile::from_metadata(name.to_string(), &metadata))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn write(&self, name: &str, mut data: ByteStream<'_>) -> StorageResult<StoredFile> {
        let target = self.full_path(name)?;
        let staging_dir = self.staging_dir();
        fs::create_dir_all(&staging_dir)
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        let staging = staging_dir.join(format!("{}.{}", Uuid::new_v4(), PART_EXTENSION));

        let mut file = fs::File::create(&staging)
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?;

        let copied: StorageResult<()> = async {
            while let Some(chunk) = data.next().await {
                file.write_all(&chunk?)
                    .await
                    .map_err(|e| StorageError::IoError(e.to_string()))?;
            }
            file.flush()
                .await
                .map_err(|e| StorageError::IoError(e.to_string()))
        }
        .await;
        drop(file);

        if let Err(e) = copied {
            let _ = fs::remove_file(&staging).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(StorageError::IoError(e.to_string()));
        }

        self.stat(name, &target).await
    }

    async fn read(&self, name: &str) -> StorageResult<FileBody> {
        let path = self.full_path(name)?;
        let stored = self.stat(name, &path).await?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| StorageError::from_io(name, e))?;

        let stream = ReaderStream::new(file)
            .map_err(|e| StorageError::IoError(e.to_string()))
            .boxed();

        Ok(FileBody { file: stored, stream })
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        let path = self.full_path(name)?;
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::IoError(e.to_string())),
        }
    }

    async fn list(&self) -> StorageResult<Vec<StoredFile>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?;
        let mut results = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::IoError(e.to_string()))?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            // Entries can vanish between readdir and stat.
            if let Ok(stored) = self.stat(&name, &entry.path()).await {
                results.push(stored);
            }
        }

        Ok(results)
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        let path = self.full_path(name)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| StorageError::from_io(name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;
    use tempfile::TempDir;

    fn chunks(parts: &[&'static [u8]]) -> ByteStream<'static> {
        let items: Vec<StorageResult<Bytes>> =
            parts.iter().map(|p| Ok(Bytes::from_static(*p))).collect();
        stream::iter(items).boxed()
    }

    async fn collect(body: FileBody) -> Vec<u8> {
        let parts: Vec<Bytes> = body.stream.try_collect().await.unwrap();
        parts.concat()
    }

    async fn open_backend() -> (LocalBackend, TempDir) {
        let temp = TempDir::new().unwrap();
        let backend = LocalBackend::open(temp.path().to_path_buf()).await.unwrap();
        (backend, temp)
    }

    #[tokio::test]
    async fn test_write_read() {
        let (backend, _temp) = open_backend().await;

        let stored = backend.write("test.txt", chunks(&[b"hel", b"lo"])).await.unwrap();
        assert_eq!(stored.size, 5);
        assert_eq!(stored.mime_type, "text/plain");

        let body = backend.read("test.txt").await.unwrap();
        assert_eq!(body.file.size, 5);
        assert_eq!(collect(body).await, b"hello");
    }

    #[tokio::test]
    async fn test_delete() {
        let (backend, _temp) = open_backend().await;

        backend.write("delete-me.txt", chunks(&[b"bye"])).await.unwrap();
        assert!(backend.exists("delete-me.txt").await.unwrap());

        backend.delete("delete-me.txt").await.unwrap();
        assert!(!backend.exists("delete-me.txt").await.unwrap());

        let again = backend.delete("delete-me.txt").await;
        assert!(matches!(again, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_not_found() {
        let (backend, _temp) = open_backend().await;

        let result = backend.read("nonexistent.txt").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_stream_leaves_no_file() {
        let (backend, temp) = open_backend().await;

        let failing: ByteStream<'static> = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(StorageError::FileTooLarge(4)),
        ])
        .boxed();

        let result = backend.write("big.bin", failing).await;
        assert!(matches!(result, Err(StorageError::FileTooLarge(4))));
        assert!(!backend.exists("big.bin").await.unwrap());
        assert!(backend.list().await.unwrap().is_empty());

        let mut staged = std::fs::read_dir(temp.path().join(STAGING_DIR)).unwrap();
        assert!(staged.next().is_none());
    }

    #[tokio::test]
    async fn test_list_skips_directories() {
        let (backend, temp) = open_backend().await;

        backend.write("a.txt", chunks(&[b"a"])).await.unwrap();
        backend.write("b.png", chunks(&[b"bb"])).await.unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();

        let mut names: Vec<_> = backend
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.storage_name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.png"]);
    }

    #[tokio::test]
    async fn test_rejects_traversal_names() {
        let (backend, _temp) = open_backend().await;

        for name in ["../escape.txt", "a/b.txt", ""] {
            assert!(matches!(
                backend.write(name, chunks(&[b"x"])).await,
                Err(StorageError::InvalidName(_))
            ));
            assert!(matches!(backend.read(name).await, Err(StorageError::InvalidName(_))));
            assert!(matches!(backend.delete(name).await, Err(StorageError::InvalidName(_))));
        }
    }

    #[tokio::test]
    async fn test_staging_dir_is_not_a_file() {
        let (backend, _temp) = open_backend().await;

        assert!(!backend.exists(STAGING_DIR).await.unwrap());
        assert!(matches!(backend.read(STAGING_DIR).await, Err(StorageError::NotFound(_))));
    }

    fn write_aged(path: &Path, age: Duration) {
        std::fs::write(path, b"half").unwrap();
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(std::time::SystemTime::now() - age).unwrap();
    }

    #[tokio::test]
    async fn test_open_clears_abandoned_uploads_only() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join(STAGING_DIR);
        std::fs::create_dir_all(&staging).unwrap();

        let two_hours = Duration::from_secs(2 * 60 * 60);
        write_aged(&staging.join("abandoned.part"), two_hours);
        write_aged(&staging.join("notes.txt"), two_hours);
        std::fs::write(staging.join("in-flight.part"), b"half").unwrap();

        LocalBackend::open(temp.path().to_path_buf()).await.unwrap();

        assert!(staging.is_dir());
        assert!(!staging.join("abandoned.part").exists());
        assert!(staging.join("in-flight.part").exists());
        assert!(staging.join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_second_open_keeps_in_flight_uploads() {
        let (first, temp) = open_backend().await;
        let in_flight = temp.path().join(STAGING_DIR).join("upload.part");
        std::fs::write(&in_flight, b"streaming").unwrap();

        LocalBackend::open(first.root().to_path_buf()).await.unwrap();

        assert!(in_flight.exists());
    }
}
