//! # Path Guard
//!
//! Every name that reaches the filesystem is a single segment inside the
//! storage directory. A name is rejected when it is empty, contains a
//! parent-directory reference (`..`) anywhere, or contains a path separator.
//!
//! The character set is otherwise unrestricted.

use super::errors::{StorageError, StorageResult};

/// Validate a storage name, returning it unchanged when it is safe.
pub fn validate_filename(name: &str) -> StorageResult<&str> {
    if name.is_empty() || name.contains("..") || name.contains(is_separator) {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Returns true if the name passes [`validate_filename`].
pub fn is_safe_filename(name: &str) -> bool {
    validate_filename(name).is_ok()
}

pub(crate) fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_names() {
        assert!(is_safe_filename("report_1700000000000.pdf"));
        assert!(is_safe_filename("_1700000000000"));
        assert!(is_safe_filename(".hidden"));
        assert!(is_safe_filename("with space.txt"));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(validate_filename(""), Err(StorageError::InvalidName(_))));
    }

    #[test]
    fn test_rejects_parent_references() {
        for name in ["..", "../etc/passwd", "a..b", "file..", "..hidden"] {
            assert!(!is_safe_filename(name), "{name} should be rejected");
        }
    }

    #[test]
    fn test_rejects_separators() {
        for name in ["a/b", "/etc/passwd", "dir\\file", "trailing/"] {
            assert!(!is_safe_filename(name), "{name} should be rejected");
        }
    }
}
