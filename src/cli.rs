use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{ConfigError, ControllerConfig, DEFAULT_MAX_IN_FLIGHT, DEFAULT_NETWORK};

#[derive(Parser, Debug)]
#[command(name = "fleetlink")]
#[command(about = "Keep a load balancer's endpoints in sync with labelled Docker containers")]
#[command(version)]
pub struct Args {
    /// Port of the load balancer's control endpoint
    #[arg(long, env = "FLEETLINK_ENDPOINT_PORT", value_name = "PORT")]
    pub endpoint_port: u16,

    /// Traffic port advertised for every managed container
    #[arg(long, env = "FLEETLINK_CONTAINER_PORT", value_name = "PORT")]
    pub container_port: u16,

    /// Label a container must carry to be managed, as key=value
    #[arg(long, env = "FLEETLINK_LABEL", value_name = "KEY=VALUE")]
    pub label: String,

    /// Load balancer host (default: 127.0.0.1)
    #[arg(long, env = "FLEETLINK_LB_HOST", value_name = "HOST")]
    pub lb_host: Option<String>,

    /// Network containers are attached to before being exposed
    #[arg(long, env = "FLEETLINK_NETWORK", default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Docker CLI executable
    #[arg(long, env = "FLEETLINK_DOCKER_BIN", default_value = "docker")]
    pub docker_bin: String,

    /// Load balancer request timeout in seconds
    #[arg(long, default_value = "30")]
    pub notify_timeout: u64,

    /// Maximum concurrently executing dispatch operations
    #[arg(long, default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    pub max_in_flight: usize,

    /// Path to a .env file loaded before startup
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). Added/Removed lines show at the default level
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Default log filter for the verbosity count
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Build the immutable controller configuration
    pub fn controller_config(&self) -> Result<ControllerConfig, ConfigError> {
        ControllerConfig::new(self.endpoint_port, self.container_port, &self.label)
            .with_lb_host(self.lb_host.clone())
            .with_network(self.network.clone())
            .with_notify_timeout(Duration::from_secs(self.notify_timeout))
            .with_max_in_flight(self.max_in_flight)
    }
}

/// Pre-scan raw arguments for `--env-file` so the file can be loaded before
/// clap resolves `env` fallbacks.
pub fn env_file_arg<I, S>(args: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        if arg == "--env-file" {
            return iter.next().map(|v| PathBuf::from(v.as_ref()));
        }
        if let Some(value) = arg.strip_prefix("--env-file=") {
            return Some(PathBuf::from(value));
        }
    }
    None
}
