//! Client configuration

/// Connection settings for the spool daemon
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Daemon base URL, e.g. "http://127.0.0.1:3050"
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl ClientConfig {
    /// New configuration with default timeout
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), timeout: 30 }
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("http://localhost:3050");
        assert_eq!(config.base_url, "http://localhost:3050");
        assert_eq!(config.timeout, 30);

        let config = config.with_timeout(5);
        assert_eq!(config.timeout, 5);
    }
}
