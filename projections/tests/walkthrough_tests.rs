//! End-to-end scenarios: writer → engine → store, snapshots → pruner

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use foldstore_core::key::KeyGenerator;
use foldstore_core::snapshot::Namespace;
use foldstore_projections::{
    EventBatchWriter, ProjectionEngine, RetentionPruner, SnapshotDirectory, SubscriptionEvent,
    SubscriptionState, SubscriptionsReducer, load_projection, subscribe, unsubscribe,
};
use foldstore_testing::{InMemoryStore, test_clock};
use futures::TryStreamExt;
use serde_json::json;
use std::sync::Arc;

struct Fixture {
    store: InMemoryStore,
    engine: Arc<ProjectionEngine<InMemoryStore, SubscriptionEvent>>,
    writer: EventBatchWriter<InMemoryStore, SubscriptionEvent>,
}

fn fixture() -> Fixture {
    let store = InMemoryStore::new();
    let shared = Arc::new(store.clone());
    let engine = Arc::new(
        ProjectionEngine::new(shared.clone())
            .with_reducer(SubscriptionsReducer)
            .expect("single reducer registers"),
    );
    let writer: EventBatchWriter<InMemoryStore, SubscriptionEvent> =
        EventBatchWriter::with_keys(shared, KeyGenerator::new(test_clock()))
            .with_listener(engine.clone());
    Fixture {
        store,
        engine,
        writer,
    }
}

async fn subscriptions(store: &InMemoryStore) -> serde_json::Value {
    load_projection(store, "subscriptions")
        .await
        .expect("projection readable")
        .expect("projection written")
}

fn ns(name: &str) -> Namespace {
    name.parse().unwrap()
}

#[tokio::test]
async fn test_subscribe_then_unsubscribe() {
    let Fixture { store, writer, .. } = fixture();

    writer
        .append(vec![subscribe("A", "B", "X"), subscribe("A", "B", "Y")])
        .await
        .unwrap();
    let receipt = writer.append(vec![unsubscribe("A", "B", "X")]).await.unwrap();

    assert!(receipt.projections.is_success());
    assert_eq!(subscriptions(&store).await, json!({"A:B": ["Y"]}));
}

#[tokio::test]
async fn test_populate_walkthrough() {
    let Fixture { store, writer, .. } = fixture();
    let (dp1, dp5, dr) = ("120000001", "120000005", "120000002");

    writer
        .append(vec![
            subscribe(dp1, dr, "12000000100000000000"),
            subscribe(dp1, dr, "12000000100000000001"),
            subscribe(dp1, dr, "12000000100000000002"),
            subscribe(dp5, dr, "12000000500000000000"),
            subscribe(dp5, dr, "12000000500000000001"),
        ])
        .await
        .unwrap();
    assert_eq!(
        subscriptions(&store).await,
        json!({
            "120000001:120000002": [
                "12000000100000000000",
                "12000000100000000001",
                "12000000100000000002"
            ],
            "120000005:120000002": ["12000000500000000000", "12000000500000000001"]
        })
    );

    writer
        .append(vec![
            unsubscribe(dp1, dr, "12000000100000000001"),
            subscribe(dp1, dr, "12000000100000000003"),
            unsubscribe(dp1, dr, "12000000100000000000"),
            unsubscribe(dp5, dr, "12000000500000000001"),
            subscribe(dp5, dr, "12000000500000000005"),
        ])
        .await
        .unwrap();
    assert_eq!(
        subscriptions(&store).await,
        json!({
            "120000001:120000002": ["12000000100000000002", "12000000100000000003"],
            "120000005:120000002": ["12000000500000000000", "12000000500000000005"]
        })
    );

    writer
        .append(vec![
            unsubscribe(dp1, dr, "12000000100000000002"),
            unsubscribe(dp1, dr, "12000000100000000003"),
            unsubscribe(dp5, dr, "12000000500000000000"),
            unsubscribe(dp5, dr, "12000000500000000005"),
        ])
        .await
        .unwrap();
    assert_eq!(subscriptions(&store).await, json!({}));

    // Fourteen events under strictly increasing keys, plus the projection
    let events = store.keys_with_prefix("0");
    assert_eq!(events.len(), 14);
    assert!(events.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(store.committed_batches(), 3);
}

#[tokio::test]
async fn test_rebuild_recovers_corrupt_projection() {
    let Fixture {
        store,
        engine,
        writer,
    } = fixture();
    writer
        .append(vec![subscribe("A", "B", "X"), subscribe("C", "D", "Y")])
        .await
        .unwrap();
    writer
        .append(vec![subscribe("A", "B", "Z"), unsubscribe("C", "D", "Y")])
        .await
        .unwrap();
    let incremental: SubscriptionState = load_projection(&store, "subscriptions")
        .await
        .unwrap()
        .unwrap();

    // A corrupt projection stops incremental updates without being reset
    store.insert("p:subscriptions", "garbage");
    let receipt = writer.append(vec![subscribe("E", "F", "W")]).await.unwrap();
    assert!(!receipt.projections.is_success());
    assert_eq!(store.value("p:subscriptions"), Some(b"garbage".to_vec()));

    assert_eq!(engine.rebuild("subscriptions").await.unwrap(), 5);

    let rebuilt: SubscriptionState = load_projection(&store, "subscriptions")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rebuilt.len(), 2);
    assert_eq!(rebuilt.subscribers("A", "B"), incremental.subscribers("A", "B"));
    assert!(rebuilt.contains("E", "F", "W"));
}

#[tokio::test]
async fn test_prune_keeps_newest_payload() {
    let store = InMemoryStore::new();
    let shared = Arc::new(store.clone());
    let directory = SnapshotDirectory::new(shared.clone());
    let conn = ns("conn");
    for (ts, v) in [("1", 1), ("2", 2), ("3", 3)] {
        directory
            .put_snapshot(&conn, ts, json!({ "v": v }).to_string().into_bytes())
            .await
            .unwrap();
    }

    let report = RetentionPruner::new(shared).prune(&conn).await.unwrap();
    assert_eq!(report.deleted, 2);

    let remaining: Vec<serde_json::Value> = directory
        .snapshots(&conn)
        .map_ok(|entry| serde_json::from_slice(&entry.value).unwrap())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(remaining, vec![json!({ "v": 3 })]);
}

#[tokio::test]
async fn test_query_walkthrough() {
    let store = InMemoryStore::new();
    let shared = Arc::new(store.clone());
    let directory = SnapshotDirectory::new(shared.clone());
    let (subs, conns) = (ns("subscriptions"), ns("connections"));

    for (ts, payload) in [
        ("1523085867671174271", json!({})),
        ("1523085867678449691", json!({})),
        ("1523085867679616713", json!({"yeah": "baby"})),
    ] {
        directory
            .put_snapshot(&subs, ts, payload.to_string().into_bytes())
            .await
            .unwrap();
    }
    for (n, ts) in ["1523085867671159187", "1523085867678238770", "1523085867679616713"]
        .into_iter()
        .enumerate()
    {
        let payload = json!({"snapshot": n + 1, "timestamp": ts});
        directory
            .put_snapshot(&conns, ts, payload.to_string().into_bytes())
            .await
            .unwrap();
    }
    store.insert("x", json!({"tag": "end"}).to_string());

    let last = directory.last_snapshot(&conns).await.unwrap().unwrap();
    assert_eq!(
        last.json::<serde_json::Value>().unwrap(),
        json!({"snapshot": 3, "timestamp": "1523085867679616713"})
    );

    RetentionPruner::new(shared).prune(&subs).await.unwrap();

    let remaining: Vec<String> = directory
        .snapshots(&subs)
        .map_ok(|entry| entry.key)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(remaining, vec!["snapshot:subscriptions:01523085867679616713"]);
    assert_eq!(store.keys_with_prefix("snapshot:connections:").len(), 3);
    assert!(store.contains_key("x"));
}

#[tokio::test]
async fn test_capture_then_prune_projection_snapshots() {
    let Fixture { store, writer, .. } = fixture();
    let directory = SnapshotDirectory::with_keys(
        Arc::new(store.clone()),
        KeyGenerator::new(test_clock()),
    );
    let subs = ns("subscriptions");

    writer.append(vec![subscribe("A", "B", "X")]).await.unwrap();
    directory.capture_projection(&subs).await.unwrap().unwrap();
    writer.append(vec![subscribe("A", "B", "Y")]).await.unwrap();
    directory.capture_projection(&subs).await.unwrap().unwrap();

    RetentionPruner::new(Arc::new(store.clone()))
        .prune(&subs)
        .await
        .unwrap();

    let last = directory.last_snapshot(&subs).await.unwrap().unwrap();
    assert_eq!(last.json::<serde_json::Value>().unwrap(), json!({"A:B": ["X", "Y"]}));
    assert_eq!(store.keys_with_prefix("snapshot:").len(), 1);
}

#[tokio::test]
async fn test_unreachable_timestamp_is_refused_before_prune() {
    let store = InMemoryStore::new();
    let shared = Arc::new(store.clone());
    let directory = SnapshotDirectory::new(shared.clone());
    let conn = ns("conn");

    directory.put_snapshot(&conn, "1", b"old".to_vec()).await.unwrap();
    assert!(directory.put_snapshot(&conn, "\u{100}", b"new".to_vec()).await.is_err());

    let report = RetentionPruner::new(shared).prune(&conn).await.unwrap();
    assert_eq!((report.scanned, report.deleted), (1, 0));
    assert_eq!(store.keys_with_prefix("snapshot:conn:").len(), 1);
    let last = directory.last_snapshot(&conn).await.unwrap().unwrap();
    assert_eq!(last.value, b"old".to_vec());
}
