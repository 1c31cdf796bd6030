// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub routes: RoutesConfig,
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    /// Seconds in-flight connections get to finish after a shutdown signal
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
            shutdown_grace_secs: 5,
        }
    }
}

impl ServerConfig {
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback filter directive when `RUST_LOG` is not set
    pub level: String,
    pub access_log: bool,
    pub access_log_format: AccessLogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            access_log: true,
            access_log_format: AccessLogFormat::Combined,
        }
    }
}

/// Access log line layout
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessLogFormat {
    #[default]
    Combined,
    Common,
    Json,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Upper bound on the lifetime of one connection, in seconds
    pub connection_timeout: u64,
    pub max_connections: Option<u64>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            keep_alive: true,
            connection_timeout: 30,
            max_connections: None,
        }
    }
}

impl PerformanceConfig {
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }
}

/// Routes configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RoutesConfig {
    pub index_files: Vec<String>,
    /// Static mounts, registered in this order
    pub mounts: Vec<MountConfig>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            index_files: vec!["index.html".to_string()],
            mounts: vec![
                MountConfig::new("gameoflife", "gameoflife"),
                MountConfig::new("components", "components"),
            ],
        }
    }
}

/// A URL segment served from a directory
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MountConfig {
    pub name: String,
    pub path: String,
}

impl MountConfig {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// Abandoned handshakes are dropped after this many seconds
    pub handshake_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    /// NetBIOS domain announced in the challenge
    pub target_name: String,
    pub computer_name: String,
    /// Empty means every authenticated account is allowed
    pub allowed_accounts: Vec<String>,
    pub accounts: Vec<AccountConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            handshake_ttl_secs: 60,
            sweep_interval_secs: 30,
            target_name: "WORKGROUP".to_string(),
            computer_name: "LOCALHOST".to_string(),
            allowed_accounts: Vec::new(),
            accounts: Vec::new(),
        }
    }
}

impl AuthConfig {
    pub const fn handshake_ttl(&self) -> Duration {
        Duration::from_secs(self.handshake_ttl_secs)
    }

    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Account known to the NTLM server.
///
/// Exactly one of `password` or `nt_hash` (32 hex digits) must be set.
#[derive(Deserialize, Clone, Default)]
#[serde(default)]
pub struct AccountConfig {
    pub username: String,
    pub domain: String,
    pub password: Option<String>,
    pub nt_hash: Option<String>,
    pub display_name: Option<String>,
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = match (&self.password, &self.nt_hash) {
            (Some(_), _) => "password",
            (None, Some(_)) => "nt_hash",
            (None, None) => "none",
        };
        f.debug_struct("AccountConfig")
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("secret", &secret)
            .field("display_name", &self.display_name)
            .finish()
    }
}
