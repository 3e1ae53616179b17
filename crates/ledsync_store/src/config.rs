//! Configuration for the persistence layer.

use std::time::Duration;

/// Configuration for the Redis backend.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backend URL, e.g. `redis://127.0.0.1:6379`.
    pub url: String,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Timeout for each read on an established connection.
    pub read_timeout: Duration,
    /// Timeout for each write on an established connection.
    pub write_timeout: Duration,
}

impl StoreConfig {
    /// Creates a configuration for the given URL with default timeouts.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the per-write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("redis://127.0.0.1:6379")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = StoreConfig::new("redis://cache:6380")
            .with_connect_timeout(Duration::from_secs(1))
            .with_read_timeout(Duration::from_millis(500));

        assert_eq!(config.url, "redis://cache:6380");
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.read_timeout, Duration::from_millis(500));
        assert_eq!(config.write_timeout, Duration::from_secs(5));
    }
}
