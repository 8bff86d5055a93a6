//! Projection test harness
//!
//! Drives any [`CommitListener`] with synthetic committed batches, standing in for
//! the batch writer, so projection updates can be tested in isolation.

#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use crate::FixedClock;
use crate::store_mocks::InMemoryStore;
use foldstore_core::key::KeyGenerator;
use foldstore_core::projection::{
    ApplyReport, CommitListener, CommittedBatch, CommittedEvent, projection_key,
};
use serde::de::DeserializeOwned;

/// Test harness for projections providing a fluent testing API.
///
/// The harness assigns keys from a [`FixedClock`], so keys are deterministic:
/// the clock's instant, then one nanosecond more for every following event.
///
/// # Example
///
/// ```ignore
/// let store = InMemoryStore::new();
/// let engine = ProjectionEngine::new(Arc::new(store.clone()));
/// let mut harness = ProjectionTestHarness::new(engine, store);
///
/// harness.given_batch(vec![subscribe("A", "B", "X")]).await;
/// let state: SubscriptionState = harness.projection("subscriptions").unwrap();
/// ```
pub struct ProjectionTestHarness<L> {
    listener: L,
    store: InMemoryStore,
    keys: KeyGenerator,
    reports: Vec<ApplyReport>,
}

impl<L> ProjectionTestHarness<L> {
    /// Create a new test harness for the given listener.
    ///
    /// - `listener`: The commit listener under test
    /// - `store`: The store the listener writes to (a clone of the same instance)
    #[must_use]
    pub fn new(listener: L, store: InMemoryStore) -> Self {
        Self {
            listener,
            store,
            keys: KeyGenerator::new(crate::test_clock()),
            reports: Vec::new(),
        }
    }

    /// Use a specific clock for key assignment.
    #[must_use]
    pub fn with_clock(mut self, clock: FixedClock) -> Self {
        self.keys = KeyGenerator::new(clock);
        self
    }

    /// Deliver one committed batch to the listener and record its report.
    pub async fn given_batch<E>(&mut self, events: Vec<E>) -> &ApplyReport
    where
        L: CommitListener<E>,
    {
        let entries = events
            .into_iter()
            .map(|event| CommittedEvent {
                key: self.keys.next_key(),
                event,
            })
            .collect();
        let batch = CommittedBatch::new(entries);
        let report = self.listener.on_commit(&batch).await;
        self.reports.push(report);
        &self.reports[self.reports.len() - 1]
    }

    /// Deliver several batches in order.
    pub async fn given_batches<E>(&mut self, batches: Vec<Vec<E>>) -> &mut Self
    where
        L: CommitListener<E>,
    {
        for events in batches {
            self.given_batch(events).await;
        }
        self
    }

    /// Decode the stored projection of `reducer`, if present.
    ///
    /// # Panics
    ///
    /// Panics if the stored value is not valid JSON for `T`.
    #[must_use]
    #[allow(clippy::panic)] // Intentional panic for test assertions
    pub fn projection<T: DeserializeOwned>(&self, reducer: &str) -> Option<T> {
        let key = projection_key(reducer);
        self.store.value(&key).map(|bytes| {
            serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                panic!("Projection at '{key}' is not valid for the requested type: {e}")
            })
        })
    }

    /// Raw JSON of the stored projection of `reducer`, if present.
    #[must_use]
    pub fn projection_json(&self, reducer: &str) -> Option<serde_json::Value> {
        self.store.json(&projection_key(reducer))
    }

    /// Assert that a projection exists for `reducer`.
    #[allow(clippy::panic)] // Intentional panic for test assertions
    pub fn then_contains(&self, reducer: &str) -> &Self {
        assert!(
            self.store.contains_key(&projection_key(reducer)),
            "Expected a projection for '{reducer}', but none was stored"
        );
        self
    }

    /// Assert that no projection exists for `reducer`.
    #[allow(clippy::panic)] // Intentional panic for test assertions
    pub fn then_not_contains(&self, reducer: &str) -> &Self {
        assert!(
            !self.store.contains_key(&projection_key(reducer)),
            "Expected no projection for '{reducer}', but one was stored"
        );
        self
    }

    /// Reports recorded so far, one per delivered batch.
    #[must_use]
    pub fn reports(&self) -> &[ApplyReport] {
        &self.reports
    }

    /// Get a reference to the underlying store.
    #[must_use]
    pub const fn store(&self) -> &InMemoryStore {
        &self.store
    }

    /// Get a reference to the listener under test.
    #[must_use]
    pub const fn listener(&self) -> &L {
        &self.listener
    }
}
