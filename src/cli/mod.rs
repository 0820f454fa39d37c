//! CLI module for Filegate
//!
//! Turns flags and environment variables into a [`GatewayConfig`] and boots
//! the HTTP server.
//!
//! [`GatewayConfig`]: crate::http_server::GatewayConfig

mod args;
mod commands;
mod errors;

pub use args::Cli;
pub use commands::{init_logging, run, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
