//! `ProjectionEngine` for folding committed batches into stored projections.
//!
//! # Overview
//!
//! The engine keeps a registry of reducers sharing one event type and, for every
//! committed batch, runs each reducer's read-fold-write against the store:
//!
//! ```text
//!             CommittedBatch
//!                   │
//!       ┌───────────┼───────────┐
//!       ▼           ▼           ▼
//!   get p:a     get p:b     get p:c
//!   fold        fold        fold
//!   put p:a     put p:b     put p:c
//!       │           │           │
//!       └──────► ApplyReport ◄──┘
//! ```
//!
//! Each reducer is its own unit of work. A failing store call is recorded in the
//! report for that reducer only; the others still run. A projection is written only
//! after its fold completed, so a failure leaves the previous value in place.
//!
//! # Corrupt projections
//!
//! A stored projection that does not decode as the reducer's state is reported as a
//! [`StoreError::Read`] for that reducer. It is never silently reset to the default
//! state; use [`ProjectionEngine::rebuild`] to recompute it from the event log.
//!
//! # Example
//!
//! ```ignore
//! use foldstore_projections::*;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let engine = Arc::new(
//!     ProjectionEngine::new(store.clone()).with_reducer(SubscriptionsReducer)?,
//! );
//!
//! let writer = EventBatchWriter::new(store.clone()).with_listener(engine.clone());
//! writer.append(vec![subscribe("A", "B", "X")]).await?;
//!
//! let state: Option<SubscriptionState> = load_projection(store.as_ref(), "subscriptions").await?;
//! ```

use crate::metrics::{PROJECTION_FAILURES, PROJECTION_UPDATES};
use foldstore_core::event::Event;
use foldstore_core::key::EventKey;
use foldstore_core::projection::{
    ApplyReport, CommitListener, CommittedBatch, ProjectionError, Result, projection_key,
};
use foldstore_core::reducer::Reducer;
use foldstore_core::store::{OrderedStore, StoreError};
use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// In-progress fold of one reducer's state.
trait Accumulator<E>: Send {
    fn apply(&mut self, event: &E);

    fn finish(self: Box<Self>) -> std::result::Result<Vec<u8>, serde_json::Error>;
}

/// A registered reducer with its state type erased behind JSON.
trait ErasedReducer<E>: Send + Sync {
    fn name(&self) -> &str;

    fn start(
        &self,
        stored: Option<&[u8]>,
    ) -> std::result::Result<Box<dyn Accumulator<E> + '_>, serde_json::Error>;
}

struct Registered<R>(R);

struct Folding<'r, R: Reducer> {
    reducer: &'r R,
    state: R::State,
}

impl<R: Reducer> Accumulator<R::Event> for Folding<'_, R> {
    fn apply(&mut self, event: &R::Event) {
        self.reducer.reduce(&mut self.state, event);
    }

    fn finish(self: Box<Self>) -> std::result::Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.state)
    }
}

impl<R> ErasedReducer<R::Event> for Registered<R>
where
    R: Reducer,
{
    fn name(&self) -> &str {
        self.0.name()
    }

    fn start(
        &self,
        stored: Option<&[u8]>,
    ) -> std::result::Result<Box<dyn Accumulator<R::Event> + '_>, serde_json::Error> {
        let state = match stored {
            Some(bytes) => serde_json::from_slice(bytes)?,
            None => R::State::default(),
        };
        Ok(Box::new(Folding {
            reducer: &self.0,
            state,
        }))
    }
}

/// Maintains every registered projection from committed event batches.
///
/// Registration order is the order in which reducers are folded and reported.
pub struct ProjectionEngine<S: ?Sized, E> {
    store: Arc<S>,
    reducers: Vec<Box<dyn ErasedReducer<E>>>,
}

impl<S, E> ProjectionEngine<S, E>
where
    S: OrderedStore + ?Sized,
    E: Send + Sync + 'static,
{
    /// Create an engine with no reducers.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            reducers: Vec::new(),
        }
    }

    /// Register a reducer.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::DuplicateReducer`] if a reducer with the same name
    /// is already registered.
    pub fn register<R>(&mut self, reducer: R) -> Result<()>
    where
        R: Reducer<Event = E> + 'static,
    {
        let name = reducer.name();
        if self.reducers.iter().any(|r| r.name() == name) {
            return Err(ProjectionError::DuplicateReducer(name.to_string()));
        }
        tracing::debug!(projection = name, "Registered reducer");
        self.reducers.push(Box::new(Registered(reducer)));
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::DuplicateReducer`] on a name clash.
    pub fn with_reducer<R>(mut self, reducer: R) -> Result<Self>
    where
        R: Reducer<Event = E> + 'static,
    {
        self.register(reducer)?;
        Ok(self)
    }

    /// Names of the registered reducers, in registration order.
    pub fn reducer_names(&self) -> impl Iterator<Item = &str> {
        self.reducers.iter().map(|r| r.name())
    }

    /// Fold one committed batch into every registered projection.
    ///
    /// Never fails as a whole: per-reducer failures are logged and collected in the
    /// returned report. An empty batch touches nothing.
    pub async fn apply_batch(&self, batch: &CommittedBatch<E>) -> ApplyReport {
        let mut report = ApplyReport::default();
        if batch.is_empty() {
            return report;
        }

        for reducer in &self.reducers {
            let name = reducer.name();
            match self.update(reducer.as_ref(), batch).await {
                Ok(()) => {
                    metrics::counter!(PROJECTION_UPDATES, "projection" => name.to_string())
                        .increment(1);
                    tracing::debug!(projection = name, events = batch.len(), "Projection updated");
                    report.updated.push(name.to_string());
                }
                Err(source) => {
                    metrics::counter!(PROJECTION_FAILURES, "projection" => name.to_string())
                        .increment(1);
                    tracing::error!(
                        projection = name,
                        error = %source,
                        events = batch.len(),
                        "Projection update failed"
                    );
                    report.failed.push(ProjectionError::Update {
                        reducer: name.to_string(),
                        source,
                    });
                }
            }
        }

        report
    }

    /// Read-fold-write of one reducer.
    async fn update(
        &self,
        reducer: &dyn ErasedReducer<E>,
        batch: &CommittedBatch<E>,
    ) -> std::result::Result<(), StoreError> {
        let key = projection_key(reducer.name());
        let stored = self.store.get(&key).await?;

        let mut fold = reducer
            .start(stored.as_deref())
            .map_err(|e| StoreError::read(&key, format!("corrupt projection: {e}")))?;
        for event in batch.events() {
            fold.apply(event);
        }
        let bytes = fold
            .finish()
            .map_err(|e| StoreError::write(format!("cannot encode projection '{key}': {e}")))?;

        self.store.put(&key, bytes).await
    }
}

impl<S, E> ProjectionEngine<S, E>
where
    S: OrderedStore + ?Sized,
    E: Event + DeserializeOwned,
{
    /// Recompute the projection `name` from the full event log.
    ///
    /// Events are streamed from the store oldest first and folded from the default
    /// state; the result overwrites `p:<name>`. Returns the number of events folded.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::UnknownReducer`] if `name` is not registered, or
    /// [`ProjectionError::Update`] if the log cannot be read or decoded, or the
    /// projection cannot be written. The stored projection is unchanged on error.
    pub async fn rebuild(&self, name: &str) -> Result<usize> {
        let reducer = self
            .reducers
            .iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| ProjectionError::UnknownReducer(name.to_string()))?;

        tracing::info!(projection = name, "Rebuilding projection");
        let events = self
            .replay(reducer.as_ref())
            .await
            .map_err(|source| {
                metrics::counter!(PROJECTION_FAILURES, "projection" => name.to_string())
                    .increment(1);
                ProjectionError::Update {
                    reducer: name.to_string(),
                    source,
                }
            })?;
        metrics::counter!(PROJECTION_UPDATES, "projection" => name.to_string()).increment(1);
        tracing::info!(projection = name, events, "Projection rebuilt");
        Ok(events)
    }

    /// Rebuild every registered projection, one after another.
    pub async fn rebuild_all(&self) -> ApplyReport {
        let mut report = ApplyReport::default();
        for reducer in &self.reducers {
            match self.rebuild(reducer.name()).await {
                Ok(_) => report.updated.push(reducer.name().to_string()),
                Err(error) => {
                    tracing::error!(projection = reducer.name(), error = %error, "Rebuild failed");
                    report.failed.push(error);
                }
            }
        }
        report
    }

    async fn replay(&self, reducer: &dyn ErasedReducer<E>) -> std::result::Result<usize, StoreError> {
        let key = projection_key(reducer.name());
        let mut fold = reducer
            .start(None)
            .map_err(|e| StoreError::read(&key, e.to_string()))?;

        let mut count = 0usize;
        let mut log = self.store.scan(EventKey::range());
        while let Some(entry) = log.try_next().await? {
            let event = E::from_bytes(&entry.value)
                .map_err(|e| StoreError::read(&entry.key, e.to_string()))?;
            fold.apply(&event);
            count += 1;
        }

        let bytes = fold
            .finish()
            .map_err(|e| StoreError::write(format!("cannot encode projection '{key}': {e}")))?;
        self.store.put(&key, bytes).await?;
        Ok(count)
    }
}

impl<S, E> CommitListener<E> for ProjectionEngine<S, E>
where
    S: OrderedStore + ?Sized,
    E: Send + Sync + 'static,
{
    fn on_commit<'a>(
        &'a self,
        batch: &'a CommittedBatch<E>,
    ) -> Pin<Box<dyn Future<Output = ApplyReport> + Send + 'a>> {
        Box::pin(self.apply_batch(batch))
    }
}

/// Read and decode the stored projection `name`.
///
/// Returns `Ok(None)` if the projection has never been written.
///
/// # Errors
///
/// Returns [`StoreError::Read`] if the read fails or the stored value does not
/// decode as `T`.
pub async fn load_projection<T, S>(store: &S, name: &str) -> std::result::Result<Option<T>, StoreError>
where
    T: DeserializeOwned,
    S: OrderedStore + ?Sized,
{
    let key = projection_key(name);
    store
        .get(&key)
        .await?
        .map(|bytes| serde_json::from_slice(&bytes))
        .transpose()
        .map_err(|e| StoreError::read(&key, format!("corrupt projection: {e}")))
}
