//! Projection runtime for foldstore.
//!
//! # Overview
//!
//! This crate wires the core contracts together over any [`OrderedStore`]:
//! - **[`EventBatchWriter`]**: appends events atomically under monotonic keys
//! - **[`ProjectionEngine`]**: folds each committed batch into `p:<reducer>` projections
//! - **[`SnapshotDirectory`]**: newest-first queries over `snapshot:<namespace>:` keys
//! - **[`RetentionPruner`]**: deletes all but the newest snapshots of a namespace
//! - **[`SubscriptionsReducer`]**: the subscription projection
//!
//! # Wiring
//!
//! The engine is injected into the writer as its commit listener, so a projection
//! is up to date once `append` returns:
//!
//! ```text
//! EventBatchWriter ──commit──► store
//!        │
//!        └──on_commit──► ProjectionEngine ──get/put p:<name>──► store
//! ```
//!
//! ```ignore
//! use foldstore_projections::*;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let engine = Arc::new(
//!     ProjectionEngine::new(store.clone()).with_reducer(SubscriptionsReducer)?,
//! );
//! let writer = EventBatchWriter::new(store.clone()).with_listener(engine);
//!
//! writer.append(vec![subscribe("A", "B", "X"), subscribe("A", "B", "Y")]).await?;
//! writer.append(vec![unsubscribe("A", "B", "X")]).await?;
//!
//! let state: Option<SubscriptionState> = load_projection(store.as_ref(), "subscriptions").await?;
//! ```
//!
//! [`OrderedStore`]: foldstore_core::store::OrderedStore

pub mod config;
pub mod engine;
pub mod metrics;
pub mod retention;
pub mod snapshot;
pub mod subscriptions;
pub mod writer;

// Re-export main types for convenience
pub use config::{ConfigError, ProjectorConfig};
pub use engine::{ProjectionEngine, load_projection};
pub use retention::{DeleteSink, PruneReport, RetentionPolicy, RetentionPruner};
pub use snapshot::{Snapshot, SnapshotDirectory};
pub use subscriptions::{
    SubscriptionEvent, SubscriptionState, SubscriptionsReducer, subscribe, unsubscribe,
};
pub use writer::{BatchReceipt, EventBatchWriter};
