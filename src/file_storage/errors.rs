//! # File Storage Errors

use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// File storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid filename: {0:?}")]
    InvalidName(String),

    /// The incoming stream exceeded the per-file limit (bytes).
    #[error("File too large (max: {0} bytes)")]
    FileTooLarge(u64),

    /// The incoming stream failed before it was fully written.
    #[error("Upload interrupted: {0}")]
    Interrupted(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            StorageError::NotFound(_) => 404,
            StorageError::InvalidName(_) => 400,
            StorageError::FileTooLarge(_) => 400,
            StorageError::Interrupted(_) => 400,
            StorageError::IoError(_) => 500,
            StorageError::Internal(_) => 500,
        }
    }

    /// Map an I/O error on `name`, turning `NotFound` into [`StorageError::NotFound`].
    pub(crate) fn from_io(name: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(name.to_string())
        } else {
            StorageError::IoError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(StorageError::NotFound("a.txt".into()).status_code(), 404);
        assert_eq!(StorageError::FileTooLarge(10).status_code(), 400);
        assert_eq!(StorageError::IoError("disk".into()).status_code(), 500);
    }

    #[test]
    fn test_from_io_maps_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            StorageError::from_io("a.txt", err),
            StorageError::NotFound(name) if name == "a.txt"
        ));

        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(StorageError::from_io("a.txt", err), StorageError::IoError(_)));
    }
}
