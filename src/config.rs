//! Feed client configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`). Durations are whole seconds in the environment; code and
//! tests may set any [`Duration`] directly on the struct.

use std::time::Duration;

/// Default feed host.
pub const DEFAULT_HOST: &str = "dev.marshall-labs.com";

/// Default feed path on the host.
pub const DEFAULT_FEED_PATH: &str = "/api/brochat/connect";

/// Connection settings for [`crate::feed::FeedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Host (and optional port) of the chat server.
    pub host: String,

    /// `ws` or `wss`.
    pub scheme: String,

    /// Path of the feed endpoint.
    pub path: String,

    /// Interval between keepalive pings.
    pub keepalive_interval: Duration,

    /// Upper bound on the close handshake before the socket is dropped.
    pub shutdown_timeout: Duration,

    /// Upper bound on the WebSocket opening handshake.
    pub handshake_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            scheme: "ws".to_string(),
            path: DEFAULT_FEED_PATH.to_string(),
            keepalive_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl FeedConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to the defaults when a variable is missing or invalid.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            host: std::env::var("BROTERM_HOST").unwrap_or(defaults.host),
            scheme: std::env::var("BROTERM_FEED_SCHEME").unwrap_or(defaults.scheme),
            path: std::env::var("BROTERM_FEED_PATH").unwrap_or(defaults.path),
            keepalive_interval: parse_env_secs(
                "BROTERM_KEEPALIVE_INTERVAL_SECS",
                defaults.keepalive_interval,
            ),
            shutdown_timeout: parse_env_secs(
                "BROTERM_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout,
            ),
            handshake_timeout: parse_env_secs(
                "BROTERM_HANDSHAKE_TIMEOUT_SECS",
                defaults.handshake_timeout,
            ),
        }
    }

    /// Creates a configuration for `host` with default timings.
    #[must_use]
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Full feed URL, e.g. `ws://host/api/brochat/connect`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.path)
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
pub fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable holding whole seconds.
fn parse_env_secs(key: &str, default: Duration) -> Duration {
    Duration::from_secs(parse_env(key, default.as_secs()))
}
