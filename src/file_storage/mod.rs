//! # Filegate File Storage Module
//!
//! A flat namespace of immutable files keyed by storage name. Names are
//! generated at upload time, validated by the path guard, and resolved by a
//! [`StorageBackend`].

pub mod errors;
pub mod backend;
pub mod local;
pub mod memory;
pub mod naming;
pub mod path_guard;

pub use errors::{StorageError, StorageResult};
pub use backend::{ByteStream, FileBody, StorageBackend, StoredFile};
pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use naming::NameGenerator;
pub use path_guard::validate_filename;
