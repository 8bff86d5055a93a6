//! Snapshot directory: the query side of the `snapshot:` key space.
//!
//! Snapshots are written by an external producer (or by [`SnapshotDirectory::capture_projection`])
//! and read newest-first. "No snapshot" is `Ok(None)`, never an error.

use foldstore_core::environment::SystemClock;
use foldstore_core::key::KeyGenerator;
use foldstore_core::projection::projection_key;
use foldstore_core::snapshot::{Namespace, SnapshotTimestamp};
use foldstore_core::store::{EntryStream, OrderedStore, StoreError};
use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// A snapshot read back from the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// Namespace the snapshot belongs to.
    pub namespace: Namespace,
    /// Timestamp segment of its key.
    pub timestamp: String,
    /// Opaque payload.
    pub value: Vec<u8>,
}

impl Snapshot {
    /// Full storage key.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}{}", self.namespace.prefix(), self.timestamp)
    }

    /// Decode the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns the decode error if the payload is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.value)
    }
}

/// Reads and writes snapshots of one store.
pub struct SnapshotDirectory<S: ?Sized> {
    store: Arc<S>,
    keys: KeyGenerator,
}

impl<S> SnapshotDirectory<S>
where
    S: OrderedStore + ?Sized,
{
    /// Create a directory stamping captured snapshots with wall-clock time.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self::with_keys(store, KeyGenerator::new(SystemClock))
    }

    /// Create a directory with a specific timestamp source.
    #[must_use]
    pub const fn with_keys(store: Arc<S>, keys: KeyGenerator) -> Self {
        Self { store, keys }
    }

    /// Most recent snapshot of `namespace`, or `None` if it has none.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the scan fails.
    pub async fn last_snapshot(&self, namespace: &Namespace) -> Result<Option<Snapshot>, StoreError> {
        let mut newest = self.store.scan(namespace.range().reverse().limit(1));
        let Some(entry) = newest.try_next().await? else {
            return Ok(None);
        };

        let timestamp = namespace
            .timestamp_of(&entry.key)
            .ok_or_else(|| StoreError::read(&entry.key, "key outside namespace range"))?
            .to_string();
        Ok(Some(Snapshot {
            namespace: namespace.clone(),
            timestamp,
            value: entry.value,
        }))
    }

    /// Every snapshot of `namespace`, newest first.
    ///
    /// Lazy; each call opens a fresh scan.
    #[must_use]
    pub fn snapshots(&self, namespace: &Namespace) -> EntryStream<'_> {
        self.store.scan(namespace.range().reverse())
    }

    /// Store `value` as the snapshot of `namespace` taken at `timestamp`.
    ///
    /// `timestamp` is parsed as a [`SnapshotTimestamp`], so numeric stamps are
    /// padded to the event key width. Returns the key written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if `timestamp` is not a valid snapshot timestamp
    /// (nothing is written then) or if the put fails.
    pub async fn put_snapshot(
        &self,
        namespace: &Namespace,
        timestamp: &str,
        value: Vec<u8>,
    ) -> Result<String, StoreError> {
        let timestamp: SnapshotTimestamp = timestamp
            .parse()
            .map_err(|e| StoreError::write(format!("snapshot of '{namespace}': {e}")))?;
        self.write_snapshot(namespace, &timestamp, value).await
    }

    async fn write_snapshot(
        &self,
        namespace: &Namespace,
        timestamp: &SnapshotTimestamp,
        value: Vec<u8>,
    ) -> Result<String, StoreError> {
        let key = namespace.key(timestamp);
        self.store.put(&key, value).await?;
        tracing::debug!(namespace = %namespace, key = %key, "Stored snapshot");
        Ok(key)
    }

    /// Copy the current projection named like `namespace` into a new snapshot.
    ///
    /// Returns the snapshot key, or `None` if the projection has never been written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if reading the projection or writing the snapshot fails.
    pub async fn capture_projection(
        &self,
        namespace: &Namespace,
    ) -> Result<Option<String>, StoreError> {
        let Some(state) = self.store.get(&projection_key(namespace.as_str())).await? else {
            return Ok(None);
        };
        let timestamp = SnapshotTimestamp::from(self.keys.next_key());
        self.write_snapshot(namespace, &timestamp, state)
            .await
            .map(Some)
    }
}
