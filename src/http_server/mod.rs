//! # Filegate HTTP Server Module
//!
//! Axum front end over the file storage module.
//!
//! # Endpoints
//!
//! - `POST /upload`, `POST /upload/multiple` - Store files (API key)
//! - `GET /files/:filename` - Download a file
//! - `GET /files` - List stored files (API key)
//! - `DELETE /files/:filename`, `DELETE /delete` - Remove a file (API key)
//! - `GET /` - Service descriptor

pub mod api_key;
pub mod config;
pub mod errors;
pub mod server;
pub mod storage_routes;
pub mod upload;

pub use api_key::{ApiKeyGate, RequireApiKey};
pub use config::GatewayConfig;
pub use errors::{ApiError, ApiResult};
pub use server::HttpServer;
pub use storage_routes::StorageState;
