pub mod selector;

pub use selector::{LabelSelector, SelectorError};

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Load-balancer host used when no override is configured
pub const DEFAULT_LB_HOST: &str = "127.0.0.1";

/// Network containers are attached to before being exposed
pub const DEFAULT_NETWORK: &str = "fleetlink";

/// Default bound on concurrently executing dispatch work
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Errors for configuration I/O
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load env file {path}: {message}")]
    EnvFile { path: String, message: String },

    #[error("max in-flight must be at least 1")]
    ZeroInFlight,
}

/// Process-wide controller configuration, immutable after startup
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Port of the load balancer's control endpoint
    pub endpoint_port: u16,

    /// Traffic port advertised for every container endpoint
    pub container_port: u16,

    /// Parsed selector; `None` when the configured string was invalid,
    /// in which case every event is ignored
    pub selector: Option<LabelSelector>,

    /// Load-balancer host override
    pub lb_host: Option<String>,

    /// Network used for attach/detach and address resolution
    pub network: String,

    /// Per-request timeout for load-balancer notifications
    pub notify_timeout: Duration,

    /// Bound on concurrently executing dispatch work
    pub max_in_flight: usize,
}

impl ControllerConfig {
    /// Create a config from the required values.
    ///
    /// An invalid selector string is logged and stored as `None` rather than
    /// rejected, so the controller still runs but manages nothing.
    pub fn new(endpoint_port: u16, container_port: u16, label: &str) -> Self {
        let selector = match label.parse::<LabelSelector>() {
            Ok(selector) => Some(selector),
            Err(e) => {
                warn!("{}; every container event will be ignored", e);
                None
            }
        };

        Self {
            endpoint_port,
            container_port,
            selector,
            lb_host: None,
            network: DEFAULT_NETWORK.to_string(),
            notify_timeout: Duration::from_secs(30),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Set the load-balancer host override
    pub fn with_lb_host(mut self, host: Option<String>) -> Self {
        self.lb_host = host.filter(|h| !h.is_empty());
        self
    }

    /// Set the attach network
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Set the notification timeout
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Set the in-flight bound
    pub fn with_max_in_flight(mut self, max: usize) -> Result<Self, ConfigError> {
        if max == 0 {
            return Err(ConfigError::ZeroInFlight);
        }
        self.max_in_flight = max;
        Ok(self)
    }

    /// Base URL of the load balancer's control endpoint
    pub fn balancer_url(&self) -> String {
        let host = self.lb_host.as_deref().unwrap_or(DEFAULT_LB_HOST);
        format!("http://{}:{}", host, self.endpoint_port)
    }
}

// ============================================================================
// SBIO: I/O wrapper
// ============================================================================

/// Load a `.env` file into the process environment
pub fn load_env_file(path: &Path) -> Result<(), ConfigError> {
    dotenvy::from_path(path).map_err(|e| ConfigError::EnvFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_balancer_url_defaults_to_loopback() {
        let config = ControllerConfig::new(8080, 80, "app=web");
        assert_eq!(config.balancer_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_balancer_url_with_host_override() {
        let config =
            ControllerConfig::new(8080, 80, "app=web").with_lb_host(Some("10.1.0.1".to_string()));
        assert_eq!(config.balancer_url(), "http://10.1.0.1:8080");

        let config = ControllerConfig::new(8080, 80, "app=web").with_lb_host(Some(String::new()));
        assert_eq!(config.balancer_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_invalid_selector_is_not_fatal() {
        let config = ControllerConfig::new(8080, 80, "app");
        assert!(config.selector.is_none());

        let config = ControllerConfig::new(8080, 80, "a=b=c");
        assert!(config.selector.is_none());

        let config = ControllerConfig::new(8080, 80, "app=web");
        assert_eq!(config.selector, Some(LabelSelector::new("app", "web")));
    }

    #[test]
    fn test_zero_in_flight_rejected() {
        let result = ControllerConfig::new(8080, 80, "app=web").with_max_in_flight(0);
        assert!(matches!(result, Err(ConfigError::ZeroInFlight)));
    }

    #[test]
    fn test_load_env_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "FLEETLINK_TEST_ENV_VALUE=loaded").unwrap();

        load_env_file(file.path()).unwrap();
        assert_eq!(
            std::env::var("FLEETLINK_TEST_ENV_VALUE").unwrap(),
            "loaded"
        );
        std::env::remove_var("FLEETLINK_TEST_ENV_VALUE");
    }

    #[test]
    fn test_load_missing_env_file() {
        let result = load_env_file(Path::new("/nonexistent/fleetlink.env"));
        assert!(matches!(result, Err(ConfigError::EnvFile { .. })));
    }
}
