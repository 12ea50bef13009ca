use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Data structures (pure, no I/O)
// ============================================================================

/// One traffic target known to the load balancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    /// Empty for removals
    pub ip: String,
    pub port: u16,
}

impl Endpoint {
    /// `ip:port`, as the load balancer addresses it
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// Add/remove instruction sent to the load balancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub endpoint: Endpoint,
    pub remove: bool,
}

impl Notification {
    /// Instruction to add a target. The address must be non-empty.
    pub fn add(id: &str, ip: &str, port: u16) -> Result<Self, NotifyError> {
        if ip.is_empty() {
            return Err(NotifyError::MissingAddress(id.to_string()));
        }
        Ok(Self {
            endpoint: Endpoint {
                id: id.to_string(),
                ip: ip.to_string(),
                port,
            },
            remove: false,
        })
    }

    /// Instruction to remove a target; only the id matters
    pub fn remove(id: &str, port: u16) -> Self {
        Self {
            endpoint: Endpoint {
                id: id.to_string(),
                ip: String::new(),
                port,
            },
            remove: true,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.remove { "Removed" } else { "Added" };
        write!(f, "{} {} {}", verb, self.endpoint.id, self.endpoint.addr())
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Transport(String),

    #[error("Failed: {0}")]
    Status(StatusCode),

    #[error("Refusing to add {0} without an address")]
    MissingAddress(String),
}

impl NotifyError {
    /// Whether the load balancer could not be reached at all
    pub fn is_transport(&self) -> bool {
        matches!(self, NotifyError::Transport(_))
    }
}

// ============================================================================
// SBIO: Trait for abstraction (allows mocking in tests)
// ============================================================================

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

// ============================================================================
// SBIO: I/O implementation (real HTTP client)
// ============================================================================

/// Delivers notifications with a single POST and no retry
#[derive(Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        // Only 200 counts; other 2xx codes are treated as failures too
        if response.status() != StatusCode::OK {
            return Err(NotifyError::Status(response.status()));
        }

        Ok(())
    }
}

// ============================================================================
// SBIO: Mock implementation for testing (no I/O)
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Records every notification; optionally fails them all
    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
        fail_with: Option<StatusCode>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(status: StatusCode) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_with: Some(status),
            }
        }

        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notification.clone());
            match self.fail_with {
                Some(status) => Err(NotifyError::Status(status)),
                None => Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_serialization() {
        let n = Notification::add("abc", "10.0.0.5", 8080).unwrap();
        assert_eq!(
            serde_json::to_value(&n).unwrap(),
            json!({"endpoint": {"id": "abc", "ip": "10.0.0.5", "port": 8080}, "remove": false})
        );
    }

    #[test]
    fn test_remove_serialization() {
        let n = Notification::remove("abc", 8080);
        assert_eq!(
            serde_json::to_value(&n).unwrap(),
            json!({"endpoint": {"id": "abc", "ip": "", "port": 8080}, "remove": true})
        );
    }

    #[test]
    fn test_add_requires_address() {
        assert!(matches!(
            Notification::add("abc", "", 8080),
            Err(NotifyError::MissingAddress(id)) if id == "abc"
        ));
    }

    #[test]
    fn test_display() {
        let n = Notification::add("abc", "10.0.0.5", 80).unwrap();
        assert_eq!(n.to_string(), "Added abc 10.0.0.5:80");
        assert_eq!(Notification::remove("abc", 80).to_string(), "Removed abc :80");
    }

    #[tokio::test]
    async fn test_unreachable_balancer_is_transport_error() {
        // Port 9 (discard) on loopback is almost never listening
        let notifier =
            HttpNotifier::new("http://127.0.0.1:9".to_string(), Duration::from_secs(2)).unwrap();
        let err = notifier
            .notify(&Notification::remove("abc", 80))
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = mock::RecordingNotifier::failing(StatusCode::INTERNAL_SERVER_ERROR);
        let result = notifier.notify(&Notification::remove("abc", 80)).await;
        assert!(matches!(result, Err(NotifyError::Status(s)) if s.as_u16() == 500));
        assert_eq!(notifier.sent().len(), 1);
    }
}
