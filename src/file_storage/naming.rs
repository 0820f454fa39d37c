//! # Storage Name Generation
//!
//! Storage names have the shape `<base>_<discriminator><ext>`, where `base` and
//! `ext` come from the client's original name and the discriminator is a
//! millisecond timestamp that never repeats within one generator.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use super::path_guard::is_separator;

/// Issues collision-free storage names.
#[derive(Debug, Default)]
pub struct NameGenerator {
    last: AtomicU64,
}

impl NameGenerator {
    /// Create a new generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Next discriminator: the current epoch milliseconds, bumped past the
    /// previously issued value if the clock has not moved.
    pub fn next_discriminator(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let prev = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_else(|prev| prev);
        now.max(prev + 1)
    }

    /// Derive a storage name from an untrusted original name.
    ///
    /// The result is not guaranteed to be a safe path segment; callers must
    /// still run it through the path guard.
    pub fn storage_name(&self, original: &str) -> String {
        let (base, ext) = split_name(original);
        format!("{}_{}{}", base, self.next_discriminator(), ext)
    }
}

/// Split a client filename into `(base, ext)`.
///
/// Any directory prefix is dropped. `ext` includes its leading dot and is empty
/// when the final segment has no dot past its first character.
pub fn split_name(original: &str) -> (&str, &str) {
    let trimmed = original.trim_end_matches(is_separator);
    let segment = match trimmed.rfind(is_separator) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    };

    match segment.rfind('.') {
        Some(idx) if idx > 0 && !segment.chars().all(|c| c == '.') => {
            (&segment[..idx], &segment[idx..])
        }
        _ => (segment, ""),
    }
}
