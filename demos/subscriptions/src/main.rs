//! Subscriptions Demo - Runnable walkthrough
//!
//! This example demonstrates:
//! - Appending subscribe/unsubscribe batches through the batch writer
//! - The projection engine keeping `p:subscriptions` current
//! - Querying the most recent snapshot of a namespace
//! - Pruning all but the newest snapshot
//!
//! Set `FOLDSTORE_LOG=debug` to see every store round trip.

use anyhow::Result;
use foldstore_core::snapshot::Namespace;
use foldstore_projections::metrics::register_metrics;
use foldstore_projections::{
    EventBatchWriter, ProjectionEngine, ProjectorConfig, RetentionPruner, SnapshotDirectory,
    SubscriptionEvent, SubscriptionsReducer, load_projection, subscribe, unsubscribe,
};
use foldstore_testing::InMemoryStore;
use futures::TryStreamExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ProjectorConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter)?)
        .with_target(false)
        .init();
    register_metrics();

    info!("🚀 Subscriptions Demo");
    info!("");

    let store = Arc::new(InMemoryStore::new());
    populate(&store).await?;
    info!("");
    query(&store, &config).await?;

    Ok(())
}

/// Append three batches and show the projection after each.
async fn populate(store: &Arc<InMemoryStore>) -> Result<()> {
    let engine = Arc::new(ProjectionEngine::new(store.clone()).with_reducer(SubscriptionsReducer)?);
    let writer: EventBatchWriter<InMemoryStore, SubscriptionEvent> =
        EventBatchWriter::new(store.clone()).with_listener(engine);

    let (dp1, dp5, dr) = ("120000001", "120000005", "120000002");
    let batches = vec![
        vec![
            subscribe(dp1, dr, "12000000100000000000"),
            subscribe(dp1, dr, "12000000100000000001"),
            subscribe(dp1, dr, "12000000100000000002"),
            subscribe(dp5, dr, "12000000500000000000"),
            subscribe(dp5, dr, "12000000500000000001"),
        ],
        vec![
            unsubscribe(dp1, dr, "12000000100000000001"),
            subscribe(dp1, dr, "12000000100000000003"),
            unsubscribe(dp1, dr, "12000000100000000000"),
            unsubscribe(dp5, dr, "12000000500000000001"),
            subscribe(dp5, dr, "12000000500000000005"),
        ],
        vec![
            unsubscribe(dp1, dr, "12000000100000000002"),
            unsubscribe(dp1, dr, "12000000100000000003"),
            unsubscribe(dp5, dr, "12000000500000000000"),
            unsubscribe(dp5, dr, "12000000500000000005"),
        ],
    ];

    info!("📝 Appending event batches...");
    for (n, batch) in batches.into_iter().enumerate() {
        let receipt = writer.append(batch).await?;
        for failure in &receipt.projections.failed {
            tracing::warn!(error = %failure, "Projection not updated");
        }
        let projection: Option<Value> = load_projection(store.as_ref(), "subscriptions").await?;
        info!(
            "  ✅ Batch {} ({} events): p:subscriptions = {}",
            n + 1,
            receipt.keys.len(),
            projection.unwrap_or_else(|| json!({}))
        );
    }

    Ok(())
}

/// Write snapshots, read the latest one, prune, and list what is left.
async fn query(store: &Arc<InMemoryStore>, config: &ProjectorConfig) -> Result<()> {
    let directory = SnapshotDirectory::new(store.clone());
    let subscriptions: Namespace = "subscriptions".parse()?;
    let connections: Namespace = "connections".parse()?;

    info!("📸 Writing snapshots...");
    for (timestamp, payload) in [
        ("1523085867671174271", json!({})),
        ("1523085867678449691", json!({})),
        ("1523085867679616713", json!({"yeah": "baby"})),
    ] {
        directory
            .put_snapshot(&subscriptions, timestamp, serde_json::to_vec(&payload)?)
            .await?;
    }
    for (n, timestamp) in ["1523085867671159187", "1523085867678238770", "1523085867679616713"]
        .into_iter()
        .enumerate()
    {
        let payload = json!({"snapshot": n + 1, "timestamp": timestamp});
        directory
            .put_snapshot(&connections, timestamp, serde_json::to_vec(&payload)?)
            .await?;
    }
    store.insert("x", serde_json::to_vec(&json!({"tag": "end"}))?);

    match directory.last_snapshot(&connections).await? {
        Some(snapshot) => {
            let payload: Value = snapshot.json()?;
            info!(
                "🔍 Latest {} snapshot ({}): {}",
                connections, snapshot.timestamp, payload
            );
        }
        None => info!("🔍 No {connections} snapshot"),
    }

    let pruner = RetentionPruner::new(store.clone()).with_policy(config.retention_policy()?);
    let report = pruner.prune(&subscriptions).await?;
    info!(
        "🧹 Pruned {}: deleted {}, kept {}",
        subscriptions,
        report.deleted,
        report.retained()
    );

    let mut remaining = directory.snapshots(&subscriptions);
    while let Some(entry) = remaining.try_next().await? {
        let value: Value = serde_json::from_slice(&entry.value)?;
        info!("  📄 {} = {}", entry.key, value);
    }

    Ok(())
}
