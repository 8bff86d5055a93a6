//! Projection system for maintaining materialized views from committed events.
//!
//! # Overview
//!
//! A projection is the state obtained by folding the event log through a
//! [`Reducer`](crate::reducer::Reducer). Each reducer owns one projection, persisted as
//! JSON under `p:<reducer name>`.
//!
//! ```text
//!  events ──► EventBatchWriter ──► store.write(batch)
//!                   │
//!                   │ CommittedBatch (commit order)
//!                   ▼
//!            CommitListener (ProjectionEngine)
//!                   │  per reducer: get p:<name> → fold → put p:<name>
//!                   ▼
//!              ApplyReport
//! ```
//!
//! ## Key Concepts
//!
//! - **Commit notification**: an explicit [`CommitListener`] injected into the writer,
//!   invoked once per successful batch commit.
//! - **Independent units of work**: each reducer's read-fold-write succeeds or fails on
//!   its own; a failure never rolls back a sibling reducer.
//! - **No partial projections**: the projection is written only after the fold
//!   completes, so a failure leaves the previous value intact.

use crate::key::EventKey;
use crate::store::StoreError;
use std::future::Future;
use std::pin::Pin;

/// Prefix of every projection key.
pub const PROJECTION_PREFIX: &str = "p:";

/// Key under which the projection of `reducer` is stored.
///
/// # Example
///
/// ```
/// use foldstore_core::projection::projection_key;
///
/// assert_eq!(projection_key("subscriptions"), "p:subscriptions");
/// ```
#[must_use]
pub fn projection_key(reducer: &str) -> String {
    format!("{PROJECTION_PREFIX}{reducer}")
}

/// Error type for projection operations.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// One reducer's read-fold-write failed at the store. Sibling reducers are unaffected.
    #[error("Projection '{reducer}' update failed: {source}")]
    Update {
        /// Name of the reducer whose update failed.
        reducer: String,
        /// Underlying store failure.
        source: StoreError,
    },

    /// A reducer with this name is already registered.
    #[error("Reducer already registered: {0}")]
    DuplicateReducer(String),

    /// No reducer with this name is registered.
    #[error("Unknown reducer: {0}")]
    UnknownReducer(String),
}

impl ProjectionError {
    /// Name of the reducer this error is scoped to.
    #[must_use]
    pub fn reducer(&self) -> &str {
        match self {
            Self::Update { reducer, .. }
            | Self::DuplicateReducer(reducer)
            | Self::UnknownReducer(reducer) => reducer,
        }
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

/// One event as committed: its assigned key and the event itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedEvent<E> {
    /// Storage key assigned at batch construction.
    pub key: EventKey,
    /// The event.
    pub event: E,
}

/// Every event of one successfully committed batch, in commit order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedBatch<E> {
    entries: Vec<CommittedEvent<E>>,
}

impl<E> CommittedBatch<E> {
    /// Wrap committed entries. Entries must already be in commit (key) order.
    #[must_use]
    pub const fn new(entries: Vec<CommittedEvent<E>>) -> Self {
        Self { entries }
    }

    /// Committed entries in commit order.
    #[must_use]
    pub fn entries(&self) -> &[CommittedEvent<E>] {
        &self.entries
    }

    /// Events in commit order.
    pub fn events(&self) -> impl Iterator<Item = &E> {
        self.entries.iter().map(|entry| &entry.event)
    }

    /// Assigned keys in commit order.
    pub fn keys(&self) -> impl Iterator<Item = &EventKey> {
        self.entries.iter().map(|entry| &entry.key)
    }

    /// Number of events in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of applying one committed batch to every registered reducer.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Reducers whose projection was written, in registration order.
    pub updated: Vec<String>,
    /// Reducers whose update failed, with the scoped error.
    pub failed: Vec<ProjectionError>,
}

impl ApplyReport {
    /// Whether every reducer was updated.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Receives a notification after every successful batch commit.
///
/// Injected into the batch writer by whoever wires projections to it; the writer
/// awaits the returned future before reporting the append as done.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so it can be held as
/// `Arc<dyn CommitListener<E>>`.
pub trait CommitListener<E>: Send + Sync {
    /// Handle a committed batch.
    fn on_commit<'a>(
        &'a self,
        batch: &'a CommittedBatch<E>,
    ) -> Pin<Box<dyn Future<Output = ApplyReport> + Send + 'a>>;
}
