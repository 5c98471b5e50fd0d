//! Client configuration.
//!
//! Defaults target a backend on `http://localhost:8000`. Every value can be
//! overridden from the environment with [`ClientConfig::from_env`] or through
//! the `with_*` builder methods.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default backend URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Environment variable names read by [`ClientConfig::from_env`].
pub const ENV_URL: &str = "EFSDRIVE_URL";
pub const ENV_PROXY: &str = "EFSDRIVE_PROXY";
pub const ENV_TIMEOUT: &str = "EFSDRIVE_TIMEOUT_SECS";
pub const ENV_SESSION_TTL: &str = "EFSDRIVE_SESSION_TTL_SECS";

/// Connection and session-refresh settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL, without a trailing slash.
    pub base_url: String,
    /// Optional HTTP proxy.
    pub proxy: Option<String>,
    /// Upper bound on a single HTTP exchange.
    pub request_timeout: Duration,
    /// Minimum time between two `/refresh` calls.
    pub min_refresh_interval: Duration,
    /// Lifetime the server gives a session token.
    pub session_ttl: Duration,
    /// How long before expiry the background refresh fires.
    pub refresh_margin: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            proxy: None,
            request_timeout: Duration::from_secs(20),
            min_refresh_interval: Duration::from_secs(20),
            session_ttl: Duration::from_secs(120),
            refresh_margin: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Create a config pointing at `base_url` with default timings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().with_base_url(base_url)
    }

    /// Build a config from defaults overridden by `EFSDRIVE_*` variables.
    ///
    /// Unparseable numeric values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = env_value(ENV_URL) {
            config = config.with_base_url(url);
        }
        if let Some(proxy) = env_value(ENV_PROXY) {
            config.proxy = Some(proxy);
        }
        if let Some(secs) = env_value(ENV_TIMEOUT).and_then(|v| v.parse::<u64>().ok()) {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_value(ENV_SESSION_TTL).and_then(|v| v.parse::<u64>().ok()) {
            config.session_ttl = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Delay after a successful refresh before the background refresh fires.
    ///
    /// Never shorter than `min_refresh_interval`, so the timer cannot outrun
    /// the refresh gate.
    pub fn background_refresh_delay(&self) -> Duration {
        self.session_ttl
            .saturating_sub(self.refresh_margin)
            .max(self.min_refresh_interval)
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
