//! CLI argument definitions using clap
//!
//! Every flag can also be supplied through the environment variable of the
//! same name (`PORT`, `API_KEY`, ...), including from a `.env` file.

use clap::Parser;
use std::path::PathBuf;

use crate::http_server::config::{
    default_domain, GatewayConfig, DEFAULT_API_KEY, DEFAULT_MAX_FILES, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_PORT,
};

use super::errors::{CliError, CliResult};

/// Filegate - a minimal HTTP file-storage gateway
#[derive(Parser, Debug)]
#[command(name = "filegate")]
#[command(version, about, long_about = None)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Host to bind to
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Public base URL for file links (default: http://localhost:<PORT>)
    #[arg(long, env = "DOMAIN")]
    pub domain: Option<String>,

    /// Shared secret required for uploads, listing and deletion
    #[arg(long, env = "API_KEY", default_value = DEFAULT_API_KEY, hide_env_values = true, hide_default_value = true)]
    pub api_key: String,

    /// Directory holding stored files
    #[arg(long, env = "UPLOADS_DIR", default_value = "./uploads")]
    pub uploads_dir: PathBuf,

    /// Per-file size limit in bytes
    #[arg(long, env = "MAX_FILE_SIZE", default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: u64,

    /// Maximum number of files per batch upload
    #[arg(long, env = "MAX_FILES", default_value_t = DEFAULT_MAX_FILES)]
    pub max_files: usize,

    /// Comma-separated CORS origins; empty allows any origin
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Validate arguments into the gateway configuration
    pub fn into_config(self) -> CliResult<GatewayConfig> {
        if self.api_key.is_empty() {
            return Err(CliError::config_error("API_KEY must not be empty"));
        }
        if self.max_file_size == 0 {
            return Err(CliError::config_error("MAX_FILE_SIZE must be greater than zero"));
        }
        if self.max_files == 0 {
            return Err(CliError::config_error("MAX_FILES must be greater than zero"));
        }

        let domain = self
            .domain
            .filter(|d| !d.trim().is_empty())
            .map(|d| d.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| default_domain(self.port));

        let cors_origins = self
            .cors_origins
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(GatewayConfig {
            host: self.host,
            port: self.port,
            domain,
            api_key: self.api_key,
            uploads_dir: self.uploads_dir,
            max_file_size: self.max_file_size,
            max_files: self.max_files,
            cors_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Flags take precedence over the environment, so passing every flag keeps
    // these tests independent of the host's variables.
    fn parse(extra: &[&str]) -> CliResult<GatewayConfig> {
        let mut args = vec![
            "filegate",
            "--host",
            "0.0.0.0",
            "--port",
            "3000",
            "--api-key",
            "my-api-key-secret",
            "--uploads-dir",
            "./uploads",
            "--max-file-size",
            "104857600",
            "--max-files",
            "10",
            "--cors-origins",
            "",
        ];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap().into_config()
    }

    #[test]
    fn test_domain_defaults_to_port() {
        let config = parse(&["--port", "8081", "--domain", ""]).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.domain, "http://localhost:8081");
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_domain_trailing_slash_trimmed() {
        let config = parse(&["--domain", "https://files.example.com/"]).unwrap();
        assert_eq!(config.domain, "https://files.example.com");
    }

    #[test]
    fn test_cors_origins_split() {
        let config = parse(&["--cors-origins", "http://a.test, http://b.test"]).unwrap();
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_rejects_empty_api_key() {
        let err = parse(&["--api-key", ""]).unwrap_err();
        assert_eq!(err.code_str(), "FILEGATE_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_rejects_zero_limits() {
        assert!(parse(&["--max-file-size", "0"]).is_err());
        assert!(parse(&["--max-files", "0"]).is_err());
    }

    #[test]
    fn test_rejects_non_numeric_port() {
        assert!(Cli::try_parse_from(["filegate", "--port", "http"]).is_err());
    }
}
