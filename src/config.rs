//! Client configuration with tunable timings and endpoints.

use std::time::Duration;

use url::Url;

use crate::error::{SyncError, SyncResult};

/// Configuration for a [`MarketClient`](crate::MarketClient).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the pull interface (default: http://localhost:8000)
    pub api_url: String,
    /// Path of the push stream, appended to the ws form of `api_url` (default: /market/stream)
    pub stream_path: String,
    /// Fixed delay before a reconnect attempt (default: 3s)
    pub reconnect_delay: Duration,
    /// Interval of the background pull resync (default: 10s)
    pub resync_interval: Duration,
    /// Maximum retained event log entries (default: 50)
    pub event_log_capacity: usize,
    /// Timeout applied to each pull request (default: 30s)
    pub request_timeout: Duration,
    /// Capacity of the stream event channel (default: 100)
    pub link_channel_capacity: usize,
    /// Capacity of the outbound frame and handle command channels (default: 32)
    pub command_channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            stream_path: "/market/stream".to_string(),
            reconnect_delay: Duration::from_secs(3),
            resync_interval: Duration::from_secs(10),
            event_log_capacity: 50,
            request_timeout: Duration::from_secs(30),
            link_channel_capacity: 100,
            command_channel_capacity: 32,
        }
    }
}

impl SyncConfig {
    /// Create a new config builder.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// Unparseable numeric values are ignored and the default is kept.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("AEX_API_URL") {
            config.api_url = url;
        }
        if let Some(path) = lookup("AEX_STREAM_PATH") {
            config.stream_path = path;
        }
        if let Some(ms) = lookup("AEX_RECONNECT_DELAY_MS").and_then(|v| v.parse().ok()) {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = lookup("AEX_RESYNC_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            config.resync_interval = Duration::from_millis(ms);
        }
        if let Some(cap) = lookup("AEX_EVENT_LOG_CAPACITY").and_then(|v| v.parse().ok()) {
            config.event_log_capacity = cap;
        }
        if let Some(ms) = lookup("AEX_REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.request_timeout = Duration::from_millis(ms);
        }

        config
    }

    /// Derive the push-stream URL: `http` becomes `ws`, `https` becomes `wss`.
    pub fn stream_url(&self) -> SyncResult<Url> {
        let mut url = Url::parse(&self.api_url)?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(SyncError::ConnectionError(format!(
                    "unsupported API URL scheme '{}'",
                    other
                )))
            }
        };
        url.set_scheme(scheme).map_err(|()| {
            SyncError::ConnectionError(format!("cannot derive {} URL from {}", scheme, self.api_url))
        })?;

        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}{}", base, self.stream_path));
        Ok(url)
    }
}

/// Builder pattern for SyncConfig.
#[derive(Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    pub fn stream_path(mut self, path: impl Into<String>) -> Self {
        self.config.stream_path = path.into();
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    pub fn resync_interval(mut self, interval: Duration) -> Self {
        self.config.resync_interval = interval;
        self
    }

    pub fn event_log_capacity(mut self, capacity: usize) -> Self {
        self.config.event_log_capacity = capacity;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn link_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.link_channel_capacity = capacity;
        self
    }

    pub fn command_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.command_channel_capacity = capacity;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> SyncConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));
        assert_eq!(config.resync_interval, Duration::from_secs(10));
        assert_eq!(config.event_log_capacity, 50);
    }

    #[test]
    fn test_builder() {
        let config = SyncConfig::builder()
            .api_url("http://exchange.local:9000")
            .reconnect_delay(Duration::from_millis(250))
            .event_log_capacity(10)
            .build();

        assert_eq!(config.api_url, "http://exchange.local:9000");
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
        assert_eq!(config.event_log_capacity, 10);
        assert_eq!(config.resync_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("AEX_API_URL", "https://aex.example.com"),
            ("AEX_RECONNECT_DELAY_MS", "1500"),
            ("AEX_RESYNC_INTERVAL_MS", "not-a-number"),
            ("AEX_EVENT_LOG_CAPACITY", "20"),
        ]
        .into_iter()
        .collect();

        let config = SyncConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_url, "https://aex.example.com");
        assert_eq!(config.reconnect_delay, Duration::from_millis(1500));
        assert_eq!(config.resync_interval, Duration::from_secs(10));
        assert_eq!(config.event_log_capacity, 20);
    }

    #[test]
    fn test_stream_url_swaps_scheme() {
        let config = SyncConfig::default();
        assert_eq!(
            config.stream_url().unwrap().as_str(),
            "ws://localhost:8000/market/stream"
        );

        let tls = SyncConfig::builder()
            .api_url("https://aex.example.com/api/")
            .build();
        assert_eq!(
            tls.stream_url().unwrap().as_str(),
            "wss://aex.example.com/api/market/stream"
        );
    }

    #[test]
    fn test_stream_url_rejects_garbage() {
        let config = SyncConfig::builder().api_url("not a url").build();
        assert!(config.stream_url().is_err());
    }

    #[test]
    fn test_stream_url_rejects_foreign_scheme() {
        let config = SyncConfig::builder().api_url("foo://aex.example.com").build();
        assert!(matches!(
            config.stream_url(),
            Err(SyncError::ConnectionError(msg)) if msg.contains("foo")
        ));

        let ftp = SyncConfig::builder().api_url("ftp://aex.example.com").build();
        assert!(ftp.stream_url().is_err());
    }
}
