//! Ordered store contract tests against `InMemoryStore`, plus harness behavior

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use foldstore_core::projection::{ApplyReport, CommitListener, CommittedBatch, projection_key};
use foldstore_core::reducer::{Reducer, fold};
use foldstore_core::snapshot::Namespace;
use foldstore_core::store::{OrderedStore, ScanOptions, StoreError, WriteBatch};
use foldstore_testing::{FixedClock, InMemoryStore, ProjectionTestHarness};
use futures::TryStreamExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

async fn scan_keys(store: &InMemoryStore, options: ScanOptions) -> Vec<String> {
    store
        .scan(options)
        .map_ok(|entry| entry.key)
        .try_collect()
        .await
        .expect("scan should succeed")
}

#[tokio::test]
async fn test_missing_key_is_none_not_error() {
    let store = InMemoryStore::new();

    assert_eq!(store.get("p:subscriptions").await.unwrap(), None);
}

#[tokio::test]
async fn test_put_get_delete() {
    let store = InMemoryStore::new();

    store.put("a", b"1".to_vec()).await.unwrap();
    assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));

    store.delete("a").await.unwrap();
    assert_eq!(store.get("a").await.unwrap(), None);

    // Deleting an absent key succeeds
    store.delete("a").await.unwrap();
}

#[tokio::test]
async fn test_batch_applies_in_order_and_atomically() {
    let store = InMemoryStore::new();
    store.insert("stale", "x");

    let mut batch = WriteBatch::new();
    batch
        .put("k", b"first".to_vec())
        .put("k", b"second".to_vec())
        .delete("stale");
    store.write(batch).await.unwrap();

    assert_eq!(store.value("k"), Some(b"second".to_vec()));
    assert!(!store.contains_key("stale"));
    assert_eq!(store.committed_batches(), 1);
}

#[tokio::test]
async fn test_failed_batch_is_invisible() {
    let store = InMemoryStore::new();
    store.poison("b");

    let mut batch = WriteBatch::new();
    batch.put("a", b"1".to_vec()).put("b", b"2".to_vec());
    let result = store.write(batch).await;

    assert!(matches!(result, Err(StoreError::Write(_))));
    assert!(store.is_empty());
    assert_eq!(store.committed_batches(), 0);
}

#[tokio::test]
async fn test_scan_bounds_reverse_and_limit() {
    let store = InMemoryStore::new();
    for key in ["a", "b", "c", "d", "e"] {
        store.insert(key, key);
    }

    assert_eq!(scan_keys(&store, ScanOptions::all().gte("b").lt("e")).await, ["b", "c", "d"]);
    assert_eq!(
        scan_keys(&store, ScanOptions::all().gt("a").lte("d").reverse()).await,
        ["d", "c", "b"]
    );
    assert_eq!(scan_keys(&store, ScanOptions::all().reverse().limit(2)).await, ["e", "d"]);
    assert!(scan_keys(&store, ScanOptions::all().gte("x")).await.is_empty());
}

#[tokio::test]
async fn test_keys_only_scan_omits_values() {
    let store = InMemoryStore::new();
    store.insert("a", "payload");

    let entries: Vec<_> = store
        .scan(ScanOptions::all().keys_only())
        .try_collect()
        .await
        .unwrap();

    assert_eq!(entries.len(), 1);
    assert!(entries[0].value.is_empty());
}

#[tokio::test]
async fn test_namespace_range_scan() {
    let store = InMemoryStore::new();
    store.insert("snapshot:foo:5", "a");
    store.insert("snapshot:foobar:1", "b");
    store.insert("snapshot:fo:9", "c");
    let foo: Namespace = "foo".parse().unwrap();

    assert_eq!(scan_keys(&store, foo.range()).await, ["snapshot:foo:5"]);
}

#[tokio::test]
async fn test_scan_failure_after_n_entries() {
    let store = InMemoryStore::new();
    for key in ["a", "b", "c"] {
        store.insert(key, key);
    }
    store.fail_scans_after(Some(1));

    let mut stream = store.scan(ScanOptions::all());
    assert_eq!(stream.try_next().await.unwrap().unwrap().key, "a");
    assert!(matches!(stream.try_next().await, Err(StoreError::Read { .. })));
}

#[tokio::test]
async fn test_failing_reads() {
    let store = InMemoryStore::new();
    store.insert("a", "1");
    store.fail_reads(true);

    assert!(store.get("a").await.is_err());
    let scanned: Result<Vec<_>, _> = store.scan(ScanOptions::all()).try_collect().await;
    assert!(scanned.is_err());

    store.fail_reads(false);
    assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));
}

// Minimal listener folding a per-connection event count into `p:tally`

struct Tally;

impl Reducer for Tally {
    type State = BTreeMap<String, u32>;
    type Event = String;

    fn name(&self) -> &str {
        "tally"
    }

    fn reduce(&self, state: &mut Self::State, event: &String) {
        *state.entry(event.clone()).or_default() += 1;
    }
}

struct TallyListener {
    store: InMemoryStore,
}

impl CommitListener<String> for TallyListener {
    fn on_commit<'a>(
        &'a self,
        batch: &'a CommittedBatch<String>,
    ) -> Pin<Box<dyn Future<Output = ApplyReport> + Send + 'a>> {
        Box::pin(async move {
            let key = projection_key(Tally.name());
            let state = self.store.json(&key).unwrap_or_default();
            let state = fold(&Tally, state, batch.events());
            self.store.put(&key, serde_json::to_vec(&state).unwrap()).await.unwrap();
            ApplyReport {
                updated: vec![Tally.name().to_string()],
                failed: Vec::new(),
            }
        })
    }
}

#[tokio::test]
async fn test_harness_delivers_batches_in_order() {
    let store = InMemoryStore::new();
    let listener = TallyListener {
        store: store.clone(),
    };
    let mut harness = ProjectionTestHarness::new(listener, store);

    harness
        .given_batches(vec![
            vec!["A:B".to_string(), "A:B".to_string()],
            vec!["C:D".to_string()],
        ])
        .await;

    let tally: BTreeMap<String, u32> = harness.projection("tally").unwrap();
    assert_eq!(tally.get("A:B"), Some(&2));
    assert_eq!(tally.get("C:D"), Some(&1));
    assert_eq!(harness.reports().len(), 2);
    harness.then_contains("tally").then_not_contains("subscriptions");
}

#[tokio::test]
async fn test_harness_with_custom_clock() {
    let store = InMemoryStore::new();
    let listener = TallyListener {
        store: store.clone(),
    };
    let clock = FixedClock::new(chrono::DateTime::from_timestamp(1, 0).unwrap());
    let mut harness = ProjectionTestHarness::new(listener, store).with_clock(clock);

    let report = harness.given_batch(vec!["A:B".to_string()]).await;

    assert!(report.is_success());
}
