//! Gateway Configuration
//!
//! Built once at startup and shared read-only by every handler.

use std::path::PathBuf;

/// Placeholder secret used when `API_KEY` is not set. Must be overridden in production.
pub const DEFAULT_API_KEY: &str = "my-api-key-secret";

/// Default listening port
pub const DEFAULT_PORT: u16 = 3000;

/// Default per-file upload limit (100 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Default number of files accepted by one batch upload
pub const DEFAULT_MAX_FILES: usize = 10;

/// Allowance for multipart boundaries and part headers on top of file bytes.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to (default: "0.0.0.0")
    pub host: String,

    /// Port to bind to (default: 3000)
    pub port: u16,

    /// Public base URL used to build file URLs, without trailing slash
    pub domain: String,

    /// Shared secret for mutating and listing operations
    pub api_key: String,

    /// Flat directory holding stored files
    pub uploads_dir: PathBuf,

    /// Per-file size limit in bytes
    pub max_file_size: u64,

    /// Maximum files per batch upload
    pub max_files: usize,

    /// CORS allowed origins; empty allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            domain: default_domain(DEFAULT_PORT),
            api_key: DEFAULT_API_KEY.to_string(),
            uploads_dir: PathBuf::from("./uploads"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
            cors_origins: Vec::new(),
        }
    }
}

/// `http://localhost:<port>`
pub fn default_domain(port: u16) -> String {
    format!("http://localhost:{}", port)
}

impl GatewayConfig {
    /// Create a new config with specified port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            domain: default_domain(port),
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Normalised public base URL
    pub fn base_url(&self) -> &str {
        self.domain.trim_end_matches('/')
    }

    /// Largest request body the server accepts: a full batch of maximum-size files.
    pub fn request_body_limit(&self) -> usize {
        let limit = self
            .max_file_size
            .saturating_mul(self.max_files as u64)
            .saturating_add(MULTIPART_OVERHEAD);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }

    /// True when the placeholder secret is still in use
    pub fn uses_default_api_key(&self) -> bool {
        self.api_key == DEFAULT_API_KEY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.domain, "http://localhost:3000");
        assert_eq!(config.max_file_size, 104_857_600);
        assert_eq!(config.max_files, 10);
        assert!(config.uses_default_api_key());
    }

    #[test]
    fn test_socket_addr() {
        let config = GatewayConfig::with_port(8080);
        assert_eq!(config.socket_addr(), "0.0.0.0:8080");
        assert_eq!(config.domain, "http://localhost:8080");
    }

    #[test]
    fn test_base_url_trims_slash() {
        let config = GatewayConfig {
            domain: "https://files.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.base_url(), "https://files.example.com");
    }

    #[test]
    fn test_request_body_limit_covers_a_full_batch() {
        let config = GatewayConfig {
            max_file_size: 1000,
            max_files: 3,
            ..Default::default()
        };
        assert_eq!(config.request_body_limit(), 3000 + 1024 * 1024);
    }
}
