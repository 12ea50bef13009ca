pub mod decoder;
pub mod filter;

pub use decoder::{decode_events, parse_frame, DecodeError, EventStatus, EventStream, LifecycleEvent};
pub use filter::{decide, transition, FilterDecision, Transition, CONTAINER_TYPE};
