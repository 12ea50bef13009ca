//! Docker CLI runtime
//!
//! Implements [`ContainerRuntime`] by shelling out to the `docker` binary.
//! Argument vectors and output parsing are pure functions so they can be
//! tested without a daemon.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

use super::{ContainerRuntime, EventFeed, RuntimeError};

/// Docker CLI backed runtime
#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: String,
    network: String,
}

impl DockerCli {
    pub fn new(bin: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            network: network.into(),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Run a docker command to completion and return trimmed stdout
    async fn run(&self, args: &[String]) -> Result<String, RuntimeError> {
        debug!("{} {:?}", self.bin, args);

        let output = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RuntimeError::Unreachable(format!("Failed to run {}: {}", self.bin, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Child process stdout that kills the `docker events` process when dropped
struct EventsPipe {
    _child: Child,
    stdout: ChildStdout,
}

impl AsyncRead for EventsPipe {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn events(&self) -> Result<EventFeed, RuntimeError> {
        // Fail fast if the daemon is down; `docker events` would otherwise
        // just exit and look like a closed stream.
        self.run(&generate_version_args()).await?;

        let mut child = Command::new(&self.bin)
            .args(generate_events_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RuntimeError::Unreachable(format!("Failed to run {} events: {}", self.bin, e))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            RuntimeError::IoError(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "docker events has no stdout",
            ))
        })?;

        Ok(Box::new(EventsPipe {
            _child: child,
            stdout,
        }))
    }

    async fn labels(&self, id: &str) -> Result<HashMap<String, String>, RuntimeError> {
        let out = self.run(&generate_inspect_args(id, LABELS_TEMPLATE)).await?;
        parse_labels(&out)
    }

    async fn address(&self, id: &str) -> Result<String, RuntimeError> {
        let out = self.run(&generate_inspect_args(id, NETWORKS_TEMPLATE)).await?;
        parse_network_address(&out, &self.network)
            .ok_or_else(|| RuntimeError::NoAddress(id.to_string()))
    }

    async fn attach(&self, id: &str) -> Result<(), RuntimeError> {
        match self.run(&generate_connect_args(&self.network, id)).await {
            Err(RuntimeError::CommandFailed(msg)) if msg.contains("already exists") => {
                debug!("Container {} already on network {}", id, self.network);
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }

    async fn detach(&self, id: &str) -> Result<(), RuntimeError> {
        match self.run(&generate_disconnect_args(&self.network, id)).await {
            Err(RuntimeError::CommandFailed(msg)) if msg.contains("is not connected") => {
                debug!("Container {} not on network {}", id, self.network);
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

const LABELS_TEMPLATE: &str = "{{json .Config.Labels}}";
const NETWORKS_TEMPLATE: &str = "{{json .NetworkSettings.Networks}}";

/// Generate Docker version arguments (daemon reachability check)
pub fn generate_version_args() -> Vec<String> {
    vec![
        "version".to_string(),
        "--format".to_string(),
        "{{.Server.Version}}".to_string(),
    ]
}

/// Generate Docker events arguments (newline-delimited JSON)
pub fn generate_events_args() -> Vec<String> {
    vec![
        "events".to_string(),
        "--format".to_string(),
        "{{json .}}".to_string(),
    ]
}

/// Generate Docker inspect arguments with a Go template
pub fn generate_inspect_args(id: &str, template: &str) -> Vec<String> {
    vec![
        "inspect".to_string(),
        "--type".to_string(),
        "container".to_string(),
        "--format".to_string(),
        template.to_string(),
        id.to_string(),
    ]
}

/// Generate Docker network connect arguments
pub fn generate_connect_args(network: &str, id: &str) -> Vec<String> {
    vec![
        "network".to_string(),
        "connect".to_string(),
        network.to_string(),
        id.to_string(),
    ]
}

/// Generate Docker network disconnect arguments
pub fn generate_disconnect_args(network: &str, id: &str) -> Vec<String> {
    vec![
        "network".to_string(),
        "disconnect".to_string(),
        network.to_string(),
        id.to_string(),
    ]
}

/// Map a failed command's stderr to a runtime error
pub fn classify_failure(stderr: &str) -> RuntimeError {
    let message = stderr.trim().to_string();
    if message.contains("No such") {
        RuntimeError::NotFound(message)
    } else if message.contains("Cannot connect to the Docker daemon") {
        RuntimeError::Unreachable(message)
    } else {
        RuntimeError::CommandFailed(message)
    }
}

/// Parse `{{json .Config.Labels}}` output
pub fn parse_labels(output: &str) -> Result<HashMap<String, String>, RuntimeError> {
    let labels: Option<HashMap<String, String>> =
        serde_json::from_str(output).map_err(|e| RuntimeError::Parse(e.to_string()))?;
    Ok(labels.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct NetworkEntry {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

/// Pick the container's IP from `{{json .NetworkSettings.Networks}}` output.
///
/// Prefers the given network; otherwise the first network (by name) with an
/// address.
pub fn parse_network_address(output: &str, network: &str) -> Option<String> {
    let networks: HashMap<String, NetworkEntry> = serde_json::from_str::<
        Option<HashMap<String, NetworkEntry>>,
    >(output)
    .ok()
    .flatten()?;

    if let Some(entry) = networks.get(network) {
        if !entry.ip_address.is_empty() {
            return Some(entry.ip_address.clone());
        }
    }

    let mut names: Vec<&String> = networks.keys().collect();
    names.sort();
    names
        .into_iter()
        .filter_map(|name| networks.get(name))
        .map(|entry| entry.ip_address.clone())
        .find(|ip| !ip.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_events_args() {
        assert_eq!(generate_events_args(), vec!["events", "--format", "{{json .}}"]);
    }

    #[test]
    fn test_generate_inspect_args() {
        let args = generate_inspect_args("abc", LABELS_TEMPLATE);
        assert_eq!(
            args,
            vec![
                "inspect",
                "--type",
                "container",
                "--format",
                "{{json .Config.Labels}}",
                "abc"
            ]
        );
    }

    #[test]
    fn test_generate_network_args() {
        assert_eq!(
            generate_connect_args("fleetlink", "abc"),
            vec!["network", "connect", "fleetlink", "abc"]
        );
        assert_eq!(
            generate_disconnect_args("fleetlink", "abc"),
            vec!["network", "disconnect", "fleetlink", "abc"]
        );
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure("Error: No such container: abc\n"),
            RuntimeError::NotFound(_)
        ));
        assert!(matches!(
            classify_failure(
                "Cannot connect to the Docker daemon at unix:///var/run/docker.sock."
            ),
            RuntimeError::Unreachable(_)
        ));
        assert!(matches!(
            classify_failure("endpoint with name web already exists in network fleetlink"),
            RuntimeError::CommandFailed(m) if m.contains("already exists")
        ));
    }

    #[test]
    fn test_parse_labels() {
        let labels = parse_labels(r#"{"app":"web","tier":"front"}"#).unwrap();
        assert_eq!(labels.get("app"), Some(&"web".to_string()));
        assert_eq!(labels.len(), 2);

        assert!(parse_labels("null").unwrap().is_empty());
        assert!(matches!(parse_labels("<no value>"), Err(RuntimeError::Parse(_))));
    }

    #[test]
    fn test_parse_network_address_prefers_configured_network() {
        let out = r#"{
            "bridge": {"IPAddress": "172.17.0.2"},
            "fleetlink": {"IPAddress": "10.0.0.5"}
        }"#;
        assert_eq!(
            parse_network_address(out, "fleetlink"),
            Some("10.0.0.5".to_string())
        );
    }

    #[test]
    fn test_parse_network_address_fallback() {
        let out = r#"{
            "zeta": {"IPAddress": "10.9.0.2"},
            "alpha": {"IPAddress": ""},
            "bridge": {"IPAddress": "172.17.0.2"}
        }"#;
        assert_eq!(
            parse_network_address(out, "fleetlink"),
            Some("172.17.0.2".to_string())
        );
    }

    #[test]
    fn test_parse_network_address_none() {
        assert_eq!(parse_network_address("{}", "fleetlink"), None);
        assert_eq!(parse_network_address("null", "fleetlink"), None);
        assert_eq!(
            parse_network_address(r#"{"host": {"IPAddress": ""}}"#, "fleetlink"),
            None
        );
    }
}
