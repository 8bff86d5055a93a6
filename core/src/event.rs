//! Event trait and related types for event sourcing.
//!
//! Events represent facts about things that have happened and are immutable once
//! written. Their identity is positional: the [`EventKey`](crate::key::EventKey) assigned
//! when the batch is built, never their content.
//!
//! # Design
//!
//! Events are stored as JSON (`serde_json`). Domain events are expected to be serde
//! internally-tagged enums keyed by a `type` field, with a `#[serde(other)]` catch-all
//! variant so that event types written by newer producers decode to a no-op instead of
//! failing the fold.
//!
//! # Example
//!
//! ```
//! use foldstore_core::event::Event;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! #[serde(tag = "type", rename_all = "lowercase")]
//! enum DeviceEvent {
//!     Paired { device: String },
//!     Unpaired { device: String },
//!     #[serde(other)]
//!     Unknown,
//! }
//!
//! impl Event for DeviceEvent {
//!     fn event_type(&self) -> &'static str {
//!         match self {
//!             DeviceEvent::Paired { .. } => "paired",
//!             DeviceEvent::Unpaired { .. } => "unpaired",
//!             DeviceEvent::Unknown => "unknown",
//!         }
//!     }
//! }
//! ```

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Error types for event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),
}

/// An event that can be appended to the log and folded into projections.
///
/// # Serialization
///
/// The trait provides default JSON implementations that work for any type
/// implementing `Serialize` and `DeserializeOwned`.
///
/// # Thread Safety
///
/// Events must be `Send + Sync + 'static` so batches can cross task boundaries.
pub trait Event: Send + Sync + 'static {
    /// Returns the event type identifier, the value of the serialized `type` tag.
    fn event_type(&self) -> &'static str;

    /// Serialize this event to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        serde_json::to_vec(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` if the bytes are not valid JSON for
    /// this event type.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        serde_json::from_slice(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}
