//! Snapshot retention: keep the newest snapshots of a namespace, delete the rest.
//!
//! Pruning is a two-stage pipeline over a keys-only, newest-first scan:
//!
//! ```text
//! scan(snapshot:<ns>:…, reverse) ──► skip newest `keep` ──► DeleteSink ──flush──► store.write
//! ```
//!
//! The sink only buffers keys, never values, and commits a single batch once the scan
//! has been fully consumed. A scan failure therefore deletes nothing, and running the
//! pruner twice over a stable snapshot set is a no-op the second time.

use crate::config::ConfigError;
use crate::metrics::SNAPSHOTS_PRUNED;
use foldstore_core::snapshot::Namespace;
use foldstore_core::store::{Entry, EntryStream, OrderedStore, StoreError, WriteBatch};
use futures::{Stream, TryStreamExt, future};
use std::pin::pin;
use std::sync::Arc;

/// How many snapshots to retain per namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    keep: usize,
}

impl RetentionPolicy {
    /// Keep the `keep` newest snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `keep` is zero; pruning never deletes
    /// a namespace's most recent snapshot.
    pub fn keep_newest(keep: usize) -> Result<Self, ConfigError> {
        if keep == 0 {
            return Err(ConfigError::Validation(
                "retention must keep at least one snapshot".to_string(),
            ));
        }
        Ok(Self { keep })
    }

    /// Number of snapshots retained.
    #[must_use]
    pub const fn keep(&self) -> usize {
        self.keep
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { keep: 1 }
    }
}

/// Outcome of pruning one namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PruneReport {
    /// Namespace that was pruned.
    pub namespace: Namespace,
    /// Snapshots seen by the scan.
    pub scanned: usize,
    /// Snapshots deleted.
    pub deleted: usize,
}

impl PruneReport {
    /// Snapshots left in place.
    #[must_use]
    pub const fn retained(&self) -> usize {
        self.scanned.saturating_sub(self.deleted)
    }
}

/// Skip stage: drops the first `keep` entries of a scan and passes the rest through.
///
/// Errors are never skipped, even inside the retained prefix.
pub fn skip_newest<'a>(
    entries: EntryStream<'a>,
    keep: usize,
) -> impl Stream<Item = Result<Entry, StoreError>> + Send + 'a {
    let mut seen = 0usize;
    entries.try_filter(move |_| {
        seen += 1;
        future::ready(seen > keep)
    })
}

/// Sink stage: accumulates keys to delete and commits them in one batch.
#[derive(Debug, Default)]
pub struct DeleteSink {
    batch: WriteBatch,
}

impl DeleteSink {
    /// Create an empty sink.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            batch: WriteBatch::new(),
        }
    }

    /// Queue `key` for deletion.
    pub fn feed(&mut self, key: impl Into<String>) {
        self.batch.delete(key);
    }

    /// Keys queued so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Commit every queued delete atomically, returning how many keys were deleted.
    ///
    /// An empty sink commits nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the commit fails; no key is deleted then.
    pub async fn flush<S>(self, store: &S) -> Result<usize, StoreError>
    where
        S: OrderedStore + ?Sized,
    {
        if self.batch.is_empty() {
            return Ok(0);
        }
        let deleted = self.batch.len();
        store.write(self.batch).await?;
        Ok(deleted)
    }
}

/// Deletes all but the newest snapshots of a namespace.
///
/// # Example
///
/// ```no_run
/// use foldstore_core::snapshot::Namespace;
/// use foldstore_projections::retention::RetentionPruner;
/// use foldstore_testing::InMemoryStore;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pruner = RetentionPruner::new(Arc::new(InMemoryStore::new()));
/// let report = pruner.prune(&"connections".parse::<Namespace>()?).await?;
/// println!("deleted {} snapshots", report.deleted);
/// # Ok(())
/// # }
/// ```
pub struct RetentionPruner<S: ?Sized> {
    store: Arc<S>,
    policy: RetentionPolicy,
}

impl<S> RetentionPruner<S>
where
    S: OrderedStore + ?Sized,
{
    /// Create a pruner keeping only the newest snapshot.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            policy: RetentionPolicy::default(),
        }
    }

    /// Use a different retention policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: RetentionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Active retention policy.
    #[must_use]
    pub const fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Prune one namespace.
    ///
    /// The scan is consumed to the end before anything is written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the scan fails and [`StoreError::Write`] if the
    /// delete batch cannot be committed. In both cases the snapshot set is unchanged.
    pub async fn prune(&self, namespace: &Namespace) -> Result<PruneReport, StoreError> {
        tracing::debug!(namespace = %namespace, keep = self.policy.keep, "Pruning snapshots");

        let mut scanned = 0usize;
        let mut sink = DeleteSink::new();
        {
            let entries = self
                .store
                .scan(namespace.range().reverse().keys_only())
                .inspect_ok(|_| scanned += 1);
            let mut stale = pin!(skip_newest(Box::pin(entries), self.policy.keep));
            while let Some(entry) = stale.try_next().await.inspect_err(|e| {
                tracing::error!(namespace = %namespace, error = %e, "Snapshot scan failed");
            })? {
                sink.feed(entry.key);
            }
        }

        let deleted = sink.flush(self.store.as_ref()).await.inspect_err(|e| {
            tracing::error!(namespace = %namespace, error = %e, "Failed to commit snapshot deletes");
        })?;

        if deleted > 0 {
            metrics::counter!(SNAPSHOTS_PRUNED, "namespace" => namespace.to_string())
                .increment(deleted as u64);
            tracing::info!(namespace = %namespace, scanned, deleted, "Pruned snapshots");
        } else {
            tracing::debug!(namespace = %namespace, scanned, "Nothing to prune");
        }

        Ok(PruneReport {
            namespace: namespace.clone(),
            scanned,
            deleted,
        })
    }

    /// Prune several namespaces, one after another.
    ///
    /// Each namespace is independent: a failure is recorded for that namespace and
    /// the remaining ones are still pruned.
    pub async fn prune_all<'n>(
        &self,
        namespaces: impl IntoIterator<Item = &'n Namespace>,
    ) -> Vec<(Namespace, Result<PruneReport, StoreError>)> {
        let mut results = Vec::new();
        for namespace in namespaces {
            let result = self.prune(namespace).await;
            results.push((namespace.clone(), result));
        }
        results
    }
}
