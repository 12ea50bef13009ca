//! Controller event loop
//!
//! Owns the decode-and-filter loop. The loop itself never waits on the
//! runtime or the load balancer: relevant events are queued to per-container
//! workers (see [`dispatch`]) and the loop goes straight back to decoding.

pub mod dispatch;

pub use dispatch::{Dispatcher, Outcome};

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc::{error::SendError, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::client::Notifier;
use crate::config::ControllerConfig;
use crate::events::{decode_events, transition, EventStream, LifecycleEvent, Transition};
use crate::metrics::{ControllerStats, SharedStats};
use crate::runtime::{ContainerRuntime, RuntimeError};

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Failed to open event stream: {0}")]
    Open(#[from] RuntimeError),
}

/// Reactive controller bridging runtime events to load-balancer notifications
pub struct Controller {
    runtime: Arc<dyn ContainerRuntime>,
    dispatcher: Arc<Dispatcher>,
    stats: SharedStats,
    queues: HashMap<String, WorkerQueue>,
    /// Workers whose queue was closed by a die but which may still be running
    retiring: HashMap<String, JoinHandle<()>>,
}

/// Sender side of one container's worker
struct WorkerQueue {
    tx: UnboundedSender<LifecycleEvent>,
    handle: JoinHandle<()>,
}

impl Controller {
    pub fn new(
        config: &ControllerConfig,
        runtime: Arc<dyn ContainerRuntime>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let stats = Arc::new(ControllerStats::new());
        let dispatcher = Arc::new(Dispatcher::new(
            config,
            runtime.clone(),
            notifier,
            stats.clone(),
        ));

        Self {
            runtime,
            dispatcher,
            stats,
            queues: HashMap::new(),
            retiring: HashMap::new(),
        }
    }

    /// Counters shared with dispatch workers
    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }

    /// Open and decode the runtime's event feed
    pub async fn open(&self) -> Result<EventStream, ControllerError> {
        let feed = self.runtime.events().await?;
        Ok(decode_events(feed))
    }

    /// Open the feed and process events until it closes.
    ///
    /// Returns an error only if the feed cannot be opened. A normal return
    /// means the stream ended; there is no reconnect.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        let events = self.open().await?;

        match self.dispatcher.selector() {
            Some(selector) => info!("Listening for containers labelled {}", selector),
            None => warn!("No valid label selector; listening but ignoring every event"),
        }

        self.listen(events).await;
        Ok(())
    }

    /// Process an already-open event stream until it ends
    pub async fn listen(&mut self, mut events: EventStream) {
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    self.stats.record_frame();
                    self.handle(event);
                }
                Err(e) if e.is_terminal() => {
                    error!("{}", e);
                }
                Err(e) => {
                    warn!("{}", e);
                    self.stats.record_decode_error();
                }
            }
        }

        debug!("Event stream ended with {} open container queues", self.queues.len());
    }

    fn handle(&mut self, event: LifecycleEvent) {
        let Some(t) = transition(&event) else {
            trace!(
                "Ignoring {} event for {} ({:?})",
                event.entity_type,
                event.container_id,
                event.status
            );
            self.stats.record_ignored();
            return;
        };

        if self.dispatcher.selector().is_none() {
            self.stats.record_ignored();
            return;
        }

        let id = event.container_id.clone();
        self.enqueue(&id, event);

        // Close the queue after a die so the worker drains and exits. A later
        // start for the same id gets a new worker chained behind this one.
        if t == Transition::Remove {
            if let Some(queue) = self.queues.remove(&id) {
                self.retiring.retain(|_, handle| !handle.is_finished());
                self.retiring.insert(id, queue.handle);
            }
        }
    }

    fn enqueue(&mut self, id: &str, event: LifecycleEvent) {
        let dispatcher = &self.dispatcher;
        let retiring = &mut self.retiring;
        let queue = self.queues.entry(id.to_string()).or_insert_with(|| {
            let after = retiring.remove(id);
            let (tx, handle) = dispatch::spawn_worker(dispatcher.clone(), id.to_string(), after);
            WorkerQueue { tx, handle }
        });

        if let Err(SendError(event)) = queue.tx.send(event) {
            warn!("Worker for container {} stopped unexpectedly, restarting", id);
            let (tx, handle) = dispatch::spawn_worker(dispatcher.clone(), id.to_string(), None);
            if let Err(SendError(event)) = tx.send(event) {
                warn!(
                    "Dropping {:?} event for container {}: worker unavailable",
                    event.status, id
                );
            }
            self.queues.insert(id.to_string(), WorkerQueue { tx, handle });
        }
    }
}
