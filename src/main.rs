use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fleetlink::cli::{env_file_arg, Args};
use fleetlink::client::HttpNotifier;
use fleetlink::config::load_env_file;
use fleetlink::controller::Controller;
use fleetlink::runtime::DockerCli;

#[tokio::main]
async fn main() {
    // Load .env file first so clap's env fallbacks can see it
    let env_file = env_file_arg(std::env::args().skip(1));
    let env_result = env_file.as_deref().map(load_env_file);

    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter())),
        )
        .init();

    if let Some(Err(e)) = env_result {
        error!("{}", e);
        process::exit(1);
    }

    let config = match args.controller_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let notifier = match HttpNotifier::new(config.balancer_url(), config.notify_timeout) {
        Ok(n) => n,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            process::exit(1);
        }
    };

    info!("Notifying load balancer at {}", notifier.url());
    info!(
        "Managing containers on network {} with traffic port {}",
        config.network, config.container_port
    );

    let runtime = Arc::new(DockerCli::new(args.docker_bin.clone(), config.network.clone()));
    let controller = Controller::new(&config, runtime, Arc::new(notifier));

    tokio::select! {
        result = controller.run() => {
            match result {
                Ok(()) => error!("Event stream closed; exiting"),
                Err(e) => error!("{}", e),
            }
            process::exit(1);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt, shutting down");
        }
    }
}
