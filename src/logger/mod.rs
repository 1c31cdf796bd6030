//! Logger module
//!
//! Installs the `tracing` subscriber and provides logging helpers for:
//! - Server lifecycle (startup banner, shutdown)
//! - Access logging with multiple formats
//! - Error and warning logging

mod format;

pub use format::AccessLogEntry;

use crate::config::{AccessLogFormat, Config, LoggingConfig};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Initialize the logger with configuration
///
/// `RUST_LOG` wins over `logging.level` when both are present.
/// Should be called once at application startup.
pub fn init(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    tracing_subscriber::fmt().with_env_filter(filter).try_init()
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!(
        address = %addr,
        log_level = %config.logging.level,
        workers = ?config.server.workers,
        "Server started"
    );
    for mount in &config.routes.mounts {
        tracing::info!("listening on http://{addr}/{}", mount.name);
    }
    tracing::info!("listening on http://{addr}/user/info");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!(peer = %peer_addr, "Connection accepted");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("Failed to serve connection: {err:?}");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: AccessLogFormat) {
    tracing::info!(target: "access", "{}", entry.format(format));
}

pub fn log_shutdown_started(grace: std::time::Duration) {
    tracing::info!(grace_secs = grace.as_secs(), "Shutdown signal received, draining connections");
}
