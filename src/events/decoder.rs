//! Runtime event feed decoding
//!
//! Turns the newline-delimited JSON emitted by the runtime's event feed into a
//! lazy stream of [`LifecycleEvent`] values. A malformed frame yields a
//! recoverable [`DecodeError::Frame`] and decoding resumes with the next frame;
//! an I/O failure on the underlying reader ends the stream.

use std::collections::HashMap;
use std::pin::Pin;

use futures::stream::{self, Stream};
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Errors produced while decoding the event feed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed event frame: {0}")]
    Frame(String),

    #[error("Event stream read failed: {0}")]
    Io(String),
}

impl DecodeError {
    /// Whether the stream ends after this error
    pub fn is_terminal(&self) -> bool {
        matches!(self, DecodeError::Io(_))
    }
}

/// Lifecycle transition carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Started,
    Died,
    Other,
}

impl EventStatus {
    pub fn from_wire(status: &str) -> Self {
        match status {
            "start" => EventStatus::Started,
            "die" => EventStatus::Died,
            _ => EventStatus::Other,
        }
    }
}

/// One decoded event from the runtime feed
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub status: EventStatus,
    pub entity_type: String,
    pub container_id: String,
    pub attributes: HashMap<String, String>,
}

/// Decoded event stream
pub type EventStream = Pin<Box<dyn Stream<Item = Result<LifecycleEvent, DecodeError>> + Send>>;

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawEvent {
    /// Legacy status field, absent on newer engines
    #[serde(default)]
    status: Option<String>,

    #[serde(rename = "Action", default)]
    action: Option<String>,

    #[serde(rename = "Type", default)]
    entity_type: String,

    #[serde(default)]
    id: Option<String>,

    #[serde(rename = "Actor", default)]
    actor: RawActor,
}

#[derive(Debug, Default, Deserialize)]
struct RawActor {
    #[serde(rename = "ID", default)]
    id: String,

    #[serde(rename = "Attributes", default)]
    attributes: Option<HashMap<String, String>>,
}

// ============================================================================
// SBIO: Pure frame parsing (no I/O)
// ============================================================================

/// Parse a single frame of the event feed
pub fn parse_frame(frame: &[u8]) -> Result<LifecycleEvent, DecodeError> {
    let raw: RawEvent =
        serde_json::from_slice(frame).map_err(|e| DecodeError::Frame(e.to_string()))?;

    let status = raw
        .status
        .filter(|s| !s.is_empty())
        .or(raw.action)
        .unwrap_or_default();

    let container_id = raw
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or(raw.actor.id);

    Ok(LifecycleEvent {
        status: EventStatus::from_wire(&status),
        entity_type: raw.entity_type,
        container_id,
        attributes: raw.actor.attributes.unwrap_or_default(),
    })
}

// ============================================================================
// SBIO: I/O wrapper - frames a byte stream and delegates to parse_frame
// ============================================================================

/// Decode a byte stream into lifecycle events.
///
/// Blank lines are skipped. The returned stream ends when the reader reaches
/// EOF or after yielding a terminal [`DecodeError::Io`].
pub fn decode_events<R>(reader: R) -> EventStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let reader = BufReader::new(reader);

    Box::pin(stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        loop {
            let mut frame = Vec::new();
            match reader.read_until(b'\n', &mut frame).await {
                Ok(0) => return None,
                Ok(_) => {
                    if frame.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Some((parse_frame(&frame), Some(reader)));
                }
                Err(e) => return Some((Err(DecodeError::Io(e.to_string())), None)),
            }
        }
    }))
}
