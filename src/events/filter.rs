//! Event relevance filtering
//!
//! Decides whether a lifecycle event concerns a managed container and which
//! endpoint mutation it calls for. Everything here is pure; label lookups are
//! performed by the caller and passed in.

use std::collections::HashMap;

use super::decoder::{EventStatus, LifecycleEvent};
use crate::config::LabelSelector;

/// Entity type of container events
pub const CONTAINER_TYPE: &str = "container";

/// Endpoint mutation implied by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Add,
    Remove,
}

/// Outcome of filtering one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Ignore,
    AddTarget,
    RemoveTarget,
}

impl From<Transition> for FilterDecision {
    fn from(transition: Transition) -> Self {
        match transition {
            Transition::Add => FilterDecision::AddTarget,
            Transition::Remove => FilterDecision::RemoveTarget,
        }
    }
}

/// Label-independent part of the filter.
///
/// Returns the transition for container start/die events and `None` for
/// everything else. Callers use it to skip label inspection for events that
/// can never be relevant.
pub fn transition(event: &LifecycleEvent) -> Option<Transition> {
    if event.entity_type != CONTAINER_TYPE || event.container_id.is_empty() {
        return None;
    }

    match event.status {
        EventStatus::Started => Some(Transition::Add),
        EventStatus::Died => Some(Transition::Remove),
        EventStatus::Other => None,
    }
}

/// Full filter decision for an event given the container's current labels.
///
/// A missing selector (invalid configuration) ignores every event.
pub fn decide(
    event: &LifecycleEvent,
    labels: &HashMap<String, String>,
    selector: Option<&LabelSelector>,
) -> FilterDecision {
    let Some(selector) = selector else {
        return FilterDecision::Ignore;
    };

    match transition(event) {
        Some(t) if selector.matches(labels) => t.into(),
        _ => FilterDecision::Ignore,
    }
}
