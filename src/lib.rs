//! fleetlink - keep a load balancer's endpoint table in sync with a container fleet
//!
//! Watches the container runtime's event feed, picks out containers carrying
//! the configured label and tells the load balancer to add or remove them as
//! traffic targets when they start or die.

pub mod cli;
pub mod client;
pub mod config;
pub mod controller;
pub mod events;
pub mod metrics;
pub mod runtime;
