//! Controller counters
//!
//! Every event the controller sees ends up in exactly one outcome bucket, so
//! callers (and tests) can assert on drop counts instead of log text.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Why a relevant event produced no notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Label lookup failed (container gone or runtime unreachable)
    Inspect,
    /// Network attach failed
    Attach,
    /// Address resolution failed
    Resolve,
    /// Network detach failed
    Detach,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::Inspect => "inspect failed",
            DropReason::Attach => "attach failed",
            DropReason::Resolve => "address resolution failed",
            DropReason::Detach => "detach failed",
        };
        f.write_str(s)
    }
}

/// Atomic counters updated by the loop and dispatch workers
#[derive(Debug, Default)]
pub struct ControllerStats {
    frames: AtomicU64,
    decode_errors: AtomicU64,
    ignored: AtomicU64,
    dropped_inspect: AtomicU64,
    dropped_attach: AtomicU64,
    dropped_resolve: AtomicU64,
    dropped_detach: AtomicU64,
    attempts: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

pub type SharedStats = Arc<ControllerStats>;

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames: u64,
    pub decode_errors: u64,
    pub ignored: u64,
    pub dropped_inspect: u64,
    pub dropped_attach: u64,
    pub dropped_resolve: u64,
    pub dropped_detach: u64,
    pub attempts: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl StatsSnapshot {
    pub fn dropped(&self) -> u64 {
        self.dropped_inspect + self.dropped_attach + self.dropped_resolve + self.dropped_detach
    }
}

impl ControllerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::Inspect => &self.dropped_inspect,
            DropReason::Attach => &self.dropped_attach,
            DropReason::Resolve => &self.dropped_resolve,
            DropReason::Detach => &self.dropped_detach,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery(&self, ok: bool) {
        if ok {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            dropped_inspect: self.dropped_inspect.load(Ordering::Relaxed),
            dropped_attach: self.dropped_attach.load(Ordering::Relaxed),
            dropped_resolve: self.dropped_resolve.load(Ordering::Relaxed),
            dropped_detach: self.dropped_detach.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_reasons_counted_separately() {
        let stats = ControllerStats::new();
        stats.record_drop(DropReason::Attach);
        stats.record_drop(DropReason::Attach);
        stats.record_drop(DropReason::Detach);

        let snap = stats.snapshot();
        assert_eq!(snap.dropped_attach, 2);
        assert_eq!(snap.dropped_detach, 1);
        assert_eq!(snap.dropped_inspect, 0);
        assert_eq!(snap.dropped(), 3);
    }

    #[test]
    fn test_delivery_outcomes() {
        let stats = ControllerStats::new();
        stats.record_attempt();
        stats.record_delivery(true);
        stats.record_attempt();
        stats.record_delivery(false);

        let snap = stats.snapshot();
        assert_eq!(snap.attempts, 2);
        assert_eq!(snap.delivered, 1);
        assert_eq!(snap.failed, 1);
    }

    #[test]
    fn test_snapshot_serialization() {
        let json = serde_json::to_value(ControllerStats::new().snapshot()).unwrap();
        assert_eq!(json["decode_errors"], 0);
        assert_eq!(
            serde_json::to_value(DropReason::Resolve).unwrap(),
            "resolve"
        );
    }
}
