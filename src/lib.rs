//! filegate - A minimal HTTP file-storage gateway
//!
//! Clients upload files over HTTP and get back a retrievable URL; files can
//! later be listed, fetched or deleted. A static shared secret gates every
//! mutating and listing operation.

pub mod cli;
pub mod file_storage;
pub mod http_server;
