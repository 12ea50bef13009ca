//! Per-event dispatch work
//!
//! Runs off the event loop: finishes the label check, performs the
//! attach/detach step, resolves the address and delivers the notification.
//! Events for one container are handled by a dedicated worker in arrival
//! order; workers for different containers run concurrently, bounded by a
//! shared semaphore.

use std::fmt::Display;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::client::{Notification, Notifier};
use crate::config::{ControllerConfig, LabelSelector};
use crate::events::{decide, FilterDecision, LifecycleEvent};
use crate::metrics::{DropReason, SharedStats};
use crate::runtime::ContainerRuntime;

/// What happened to one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    Dropped(DropReason),
    Delivered(Notification),
    Failed(Notification),
}

/// Shared state for dispatch workers
pub struct Dispatcher {
    runtime: Arc<dyn ContainerRuntime>,
    notifier: Arc<dyn Notifier>,
    selector: Option<LabelSelector>,
    container_port: u16,
    stats: SharedStats,
    permits: Semaphore,
}

impl Dispatcher {
    pub fn new(
        config: &ControllerConfig,
        runtime: Arc<dyn ContainerRuntime>,
        notifier: Arc<dyn Notifier>,
        stats: SharedStats,
    ) -> Self {
        Self {
            runtime,
            notifier,
            selector: config.selector.clone(),
            container_port: config.container_port,
            stats,
            permits: Semaphore::new(config.max_in_flight),
        }
    }

    pub fn selector(&self) -> Option<&LabelSelector> {
        self.selector.as_ref()
    }

    /// Handle one container start/die event end to end
    pub async fn process(&self, event: &LifecycleEvent) -> Outcome {
        // The semaphore is never closed, so this only waits for capacity
        let _permit = self.permits.acquire().await.ok();
        let id = event.container_id.as_str();

        let labels = match self.runtime.labels(id).await {
            Ok(labels) => labels,
            Err(e) => return Outcome::Dropped(self.drop_event(id, DropReason::Inspect, e)),
        };

        let notification = match decide(event, &labels, self.selector.as_ref()) {
            FilterDecision::Ignore => {
                debug!("Ignoring container {}: label selector not matched", id);
                self.stats.record_ignored();
                return Outcome::Ignored;
            }
            FilterDecision::AddTarget => self.prepare_add(id).await,
            FilterDecision::RemoveTarget => self.prepare_remove(id).await,
        };

        match notification {
            Ok(notification) => self.deliver(notification).await,
            Err(reason) => Outcome::Dropped(reason),
        }
    }

    async fn prepare_add(&self, id: &str) -> Result<Notification, DropReason> {
        if let Err(e) = self.runtime.attach(id).await {
            return Err(self.drop_event(id, DropReason::Attach, e));
        }

        let ip = self
            .runtime
            .address(id)
            .await
            .map_err(|e| self.drop_event(id, DropReason::Resolve, e))?;

        Notification::add(id, &ip, self.container_port)
            .map_err(|e| self.drop_event(id, DropReason::Resolve, e))
    }

    async fn prepare_remove(&self, id: &str) -> Result<Notification, DropReason> {
        // A failed detach suppresses the removal, which can leave a stale
        // target registered with the load balancer.
        if let Err(e) = self.runtime.detach(id).await {
            return Err(self.drop_event(id, DropReason::Detach, e));
        }

        Ok(Notification::remove(id, self.container_port))
    }

    async fn deliver(&self, notification: Notification) -> Outcome {
        self.stats.record_attempt();

        match self.notifier.notify(&notification).await {
            Ok(()) => {
                info!("{}", notification);
                self.stats.record_delivery(true);
                Outcome::Delivered(notification)
            }
            Err(e) => {
                warn!(
                    "Notification for {} failed: {}",
                    notification.endpoint.id, e
                );
                if e.is_transport() {
                    warn!("Set --lb-host if the load balancer is not reachable on loopback");
                }
                self.stats.record_delivery(false);
                Outcome::Failed(notification)
            }
        }
    }

    fn drop_event(&self, id: &str, reason: DropReason, err: impl Display) -> DropReason {
        warn!("Dropping event for container {}: {}: {}", id, reason, err);
        self.stats.record_drop(reason);
        reason
    }
}

/// Spawn a sequential worker for one container id.
///
/// When `after` is given the worker waits for that earlier worker (a retired
/// queue for the same id) to finish before taking events, so a restart never
/// overtakes the preceding removal. The worker exits once every sender for
/// its queue has been dropped and the queue is drained.
pub fn spawn_worker(
    dispatcher: Arc<Dispatcher>,
    id: String,
    after: Option<JoinHandle<()>>,
) -> (mpsc::UnboundedSender<LifecycleEvent>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<LifecycleEvent>();

    let handle = tokio::spawn(async move {
        if let Some(previous) = after {
            if let Err(e) = previous.await {
                warn!("Previous worker for container {} failed: {}", id, e);
            }
        }
        while let Some(event) = rx.recv().await {
            dispatcher.process(&event).await;
        }
        trace!("Worker for container {} finished", id);
    });

    (tx, handle)
}
