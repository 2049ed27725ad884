//! Client configuration: how to reach the server, and how to wait on tasks.

use std::time::Duration;

/// How requests authenticate.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Credentials {
    #[default]
    None,
    Basic {
        user: String,
        password: String,
    },
    /// Client certificate and private key, PEM-encoded in one buffer.
    Certificate { pem: Vec<u8> },
}

/// Settings for [`crate::transport::HttpTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Scheme, host and port, e.g. `https://space.example.com`. Relative
    /// request URLs are appended to it.
    pub base_url: String,

    pub credentials: Credentials,

    /// Per-request timeout. Must exceed the monitor's wait interval, since
    /// a pull blocks server-side for that long.
    pub timeout: Duration,

    /// Skip TLS certificate verification (lab servers with self-signed certs).
    pub accept_invalid_certs: bool,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: Credentials::None,
            timeout: Duration::from_secs(60),
            accept_invalid_certs: false,
        }
    }

    pub fn basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Credentials::Basic {
            user: user.into(),
            password: password.into(),
        };
        self
    }

    pub fn certificate(mut self, pem: Vec<u8>) -> Self {
        self.credentials = Credentials::Certificate { pem };
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

/// Settings for [`crate::task::TaskMonitor`].
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `HWIRE_WAIT_SECS` | `10` | Seconds a pull may block server-side (`accept-wait`) |
/// | `HWIRE_MAX_EMPTY_PULLS` | `10` | Consecutive empty pulls before giving up on a task |
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Sent as the `accept-wait` header, in whole seconds, and slept
    /// between empty pulls.
    pub wait_interval: Duration,

    /// Consecutive empty pulls tolerated before a wait fails.
    pub max_consecutive_empty: u32,

    /// Path of the queue-management endpoint.
    pub queues_path: String,

    /// Origin used in the queue location handed to the server. The server
    /// posts progress to itself, so this is its own loopback address.
    pub queue_location_base: String,

    /// Prefix of generated queue names.
    pub queue_prefix: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            wait_interval: Duration::from_secs(10),
            max_consecutive_empty: 10,
            queues_path: "/api/hornet-q/queues".into(),
            queue_location_base: "http://localhost:8080".into(),
            queue_prefix: "hyperwire".into(),
        }
    }
}

impl MonitorConfig {
    /// Defaults, overridden by environment variables where present.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let wait_interval = std::env::var("HWIRE_WAIT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.wait_interval);

        let max_consecutive_empty = std::env::var("HWIRE_MAX_EMPTY_PULLS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.max_consecutive_empty);

        Self {
            wait_interval,
            max_consecutive_empty,
            ..defaults
        }
    }

    pub fn wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval = interval;
        self
    }

    pub fn max_consecutive_empty(mut self, max: u32) -> Self {
        self.max_consecutive_empty = max;
        self
    }

    pub fn queue_location_base(mut self, base: impl Into<String>) -> Self {
        self.queue_location_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn queue_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.queue_prefix = prefix.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_defaults() {
        let c = MonitorConfig::default();
        assert_eq!(c.wait_interval, Duration::from_secs(10));
        assert_eq!(c.max_consecutive_empty, 10);
        assert_eq!(c.queues_path, "/api/hornet-q/queues");
    }

    #[test]
    fn transport_base_url_trailing_slash_trimmed() {
        let c = TransportConfig::new("https://space.example.com/").basic_auth("u", "p");
        assert_eq!(c.base_url, "https://space.example.com");
        assert!(matches!(c.credentials, Credentials::Basic { .. }));
    }
}
