//! Event batch writer.
//!
//! Appends a sequence of events as one atomic batch, one strictly increasing
//! timestamp key per event, then notifies the injected [`CommitListener`].
//!
//! ```text
//! append([e1, e2, e3])
//!   ├─ keys:   k1 < k2 < k3       (assigned in sequence order)
//!   ├─ commit: write({k1: e1, k2: e2, k3: e3})   all or nothing
//!   └─ notify: listener.on_commit(batch).await   only after a successful commit
//! ```

use crate::metrics::EVENTS_APPENDED;
use foldstore_core::environment::SystemClock;
use foldstore_core::event::Event;
use foldstore_core::key::{EventKey, KeyGenerator};
use foldstore_core::projection::{ApplyReport, CommitListener, CommittedBatch, CommittedEvent};
use foldstore_core::store::{OrderedStore, StoreError, WriteBatch};
use serde::Serialize;
use std::sync::Arc;

/// Result of a successful append.
#[derive(Debug, Default)]
pub struct BatchReceipt {
    /// Keys assigned to the appended events, in input order.
    pub keys: Vec<EventKey>,
    /// What the commit listener reported (empty if there is none).
    pub projections: ApplyReport,
}

/// Writes event batches and announces each commit.
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(InMemoryStore::new());
/// let engine = Arc::new(ProjectionEngine::new(store.clone()).with_reducer(SubscriptionsReducer)?);
/// let writer = EventBatchWriter::new(store).with_listener(engine);
///
/// let receipt = writer.append(vec![subscribe("A", "B", "X")]).await?;
/// assert!(receipt.projections.is_success());
/// ```
pub struct EventBatchWriter<S: ?Sized, E> {
    store: Arc<S>,
    keys: KeyGenerator,
    listener: Option<Arc<dyn CommitListener<E>>>,
}

impl<S, E> EventBatchWriter<S, E>
where
    S: OrderedStore + ?Sized,
    E: Event + Serialize,
{
    /// Create a writer keyed by wall-clock time, with no listener.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self::with_keys(store, KeyGenerator::new(SystemClock))
    }

    /// Create a writer with a specific key source.
    #[must_use]
    pub fn with_keys(store: Arc<S>, keys: KeyGenerator) -> Self {
        Self {
            store,
            keys,
            listener: None,
        }
    }

    /// Notify `listener` after every successful commit.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn CommitListener<E>>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Append `events` as one atomic batch.
    ///
    /// Keys are assigned in sequence order at batch construction. The listener is
    /// awaited after the commit succeeds, so projections are up to date when this
    /// returns. An empty input commits nothing and notifies nobody.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if an event cannot be encoded or the commit
    /// fails. No event of the batch is visible then and the listener is not called.
    pub async fn append(&self, events: Vec<E>) -> Result<BatchReceipt, StoreError> {
        if events.is_empty() {
            return Ok(BatchReceipt::default());
        }

        let mut batch = WriteBatch::new();
        let mut entries = Vec::with_capacity(events.len());
        for event in events {
            let key = self.keys.next_key();
            let bytes = event
                .to_bytes()
                .map_err(|e| StoreError::write(format!("event at {key}: {e}")))?;
            batch.put(key.as_str(), bytes);
            entries.push(CommittedEvent { key, event });
        }

        let count = entries.len();
        self.store.write(batch).await.inspect_err(|e| {
            tracing::error!(events = count, error = %e, "Failed to commit event batch");
        })?;
        metrics::counter!(EVENTS_APPENDED).increment(count as u64);
        tracing::debug!(events = count, "Committed event batch");

        let committed = CommittedBatch::new(entries);
        let projections = match &self.listener {
            Some(listener) => listener.on_commit(&committed).await,
            None => ApplyReport::default(),
        };

        Ok(BatchReceipt {
            keys: committed.keys().cloned().collect(),
            projections,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::subscriptions::{SubscriptionEvent, subscribe, unsubscribe};
    use foldstore_testing::{InMemoryStore, test_clock};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingListener {
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl CommitListener<SubscriptionEvent> for RecordingListener {
        fn on_commit<'a>(
            &'a self,
            batch: &'a CommittedBatch<SubscriptionEvent>,
        ) -> Pin<Box<dyn Future<Output = ApplyReport> + Send + 'a>> {
            let keys = batch.keys().map(|key| key.as_str().to_string()).collect();
            self.seen.lock().unwrap().push(keys);
            Box::pin(async { ApplyReport::default() })
        }
    }

    fn writer(store: &InMemoryStore) -> EventBatchWriter<InMemoryStore, SubscriptionEvent> {
        EventBatchWriter::with_keys(Arc::new(store.clone()), KeyGenerator::new(test_clock()))
    }

    #[tokio::test]
    async fn assigns_increasing_keys_in_one_commit() {
        let store = InMemoryStore::new();

        let receipt = writer(&store)
            .append(vec![
                subscribe("A", "B", "X"),
                subscribe("A", "B", "Y"),
                unsubscribe("A", "B", "X"),
            ])
            .await
            .unwrap();

        let keys: Vec<&str> = receipt.keys.iter().map(EventKey::as_str).collect();
        assert_eq!(
            keys,
            vec!["01735689600000000000", "01735689600000000001", "01735689600000000002"]
        );
        assert_eq!(store.committed_batches(), 1);
        assert_eq!(
            store.json::<serde_json::Value>("01735689600000000001").unwrap(),
            serde_json::json!({"type": "subscribe", "dp": "A", "dr": "B", "oig": "Y"})
        );
    }

    #[tokio::test]
    async fn keys_keep_increasing_across_batches() {
        let store = InMemoryStore::new();
        let writer = writer(&store);

        let first = writer.append(vec![subscribe("A", "B", "X")]).await.unwrap();
        let second = writer.append(vec![subscribe("A", "B", "Y")]).await.unwrap();

        assert!(first.keys[0] < second.keys[0]);
    }

    #[tokio::test]
    async fn failed_commit_writes_nothing_and_skips_listener() {
        let store = InMemoryStore::new();
        store.fail_writes(true);
        let listener = Arc::new(RecordingListener::default());
        let writer = writer(&store).with_listener(listener.clone());

        let result = writer
            .append(vec![subscribe("A", "B", "X"), subscribe("A", "B", "Y")])
            .await;

        assert!(matches!(result, Err(StoreError::Write(_))));
        assert!(store.is_empty());
        assert!(listener.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn listener_sees_commit_order() {
        let store = InMemoryStore::new();
        let listener = Arc::new(RecordingListener::default());
        let writer = writer(&store).with_listener(listener.clone());

        let receipt = writer
            .append(vec![subscribe("A", "B", "X"), subscribe("C", "D", "Y")])
            .await
            .unwrap();

        let seen = listener.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let expected: Vec<String> = receipt.keys.iter().map(ToString::to_string).collect();
        assert_eq!(seen[0], expected);
    }

    #[tokio::test]
    async fn empty_append_is_noop() {
        let store = InMemoryStore::new();
        let listener = Arc::new(RecordingListener::default());
        let writer = writer(&store).with_listener(listener.clone());

        let receipt = writer.append(Vec::new()).await.unwrap();

        assert!(receipt.keys.is_empty());
        assert_eq!(store.committed_batches(), 0);
        assert!(listener.seen.lock().unwrap().is_empty());
    }
}
