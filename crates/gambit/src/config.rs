//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable for the WebSocket listen address.
pub const ENV_WS_ADDR: &str = "GAMBIT_WS_ADDR";
/// Environment variable for the HTTP listen address.
pub const ENV_HTTP_ADDR: &str = "GAMBIT_HTTP_ADDR";
/// Environment variable for the idle timeout, in whole seconds.
pub const ENV_IDLE_TIMEOUT_SECS: &str = "GAMBIT_IDLE_TIMEOUT_SECS";
/// Environment variable naming the ledger file. Unset means in-memory.
pub const ENV_LEDGER: &str = "GAMBIT_LEDGER";

/// Errors from reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: invalid socket address {value:?}")]
    InvalidAddr { var: &'static str, value: String },

    #[error("{var}: expected a positive number of seconds, got {value:?}")]
    InvalidDuration { var: &'static str, value: String },
}

/// Everything needed to start a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Where WebSocket clients connect.
    pub ws_addr: SocketAddr,

    /// Where the HTTP query surface listens.
    pub http_addr: SocketAddr,

    /// A connection with no inbound traffic for this long is closed.
    /// Clients stay alive by sending `heartbeat`.
    pub idle_timeout: Duration,

    /// Append finished games to this JSON-lines file. `None` keeps
    /// results in memory only.
    pub ledger_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            http_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            idle_timeout: Duration::from_secs(60),
            ledger_path: None,
        }
    }
}

impl ServerConfig {
    /// Reads overrides from the process environment on top of the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set but unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env), but reads variables through
    /// `lookup`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_WS_ADDR) {
            config.ws_addr = parse_addr(ENV_WS_ADDR, value)?;
        }
        if let Some(value) = lookup(ENV_HTTP_ADDR) {
            config.http_addr = parse_addr(ENV_HTTP_ADDR, value)?;
        }
        if let Some(value) = lookup(ENV_IDLE_TIMEOUT_SECS) {
            config.idle_timeout = match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidDuration {
                        var: ENV_IDLE_TIMEOUT_SECS,
                        value,
                    });
                }
            };
        }
        if let Some(value) = lookup(ENV_LEDGER) {
            if !value.trim().is_empty() {
                config.ledger_path = Some(PathBuf::from(value));
            }
        }

        Ok(config)
    }
}

fn parse_addr(
    var: &'static str,
    value: String,
) -> Result<SocketAddr, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidAddr { var, value })
}
