//! In-memory ordered store for testing
//!
//! Provides fast, deterministic storage for folding and retention tests:
//! - [`InMemoryStore`]: `BTreeMap`-backed [`OrderedStore`] with lazy cursor scans
//! - Fault injection: failing reads, failing writes, poisoned keys, scans that fail
//!   after N entries

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only happens if a test already panicked

use foldstore_core::store::{
    BatchOp, Entry, EntryStream, OrderedStore, ScanOptions, StoreError, WriteBatch,
};
use futures::stream;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::ops::Bound;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Faults {
    fail_reads: bool,
    fail_writes: bool,
    poisoned: BTreeSet<String>,
    fail_scans_after: Option<usize>,
}

#[derive(Debug, Default)]
struct Inner {
    data: BTreeMap<String, Vec<u8>>,
    faults: Faults,
    committed_batches: usize,
}

/// In-memory ordered store for fast, deterministic testing.
///
/// Clones share the same underlying data, so a test can keep one handle for
/// assertions while the code under test owns another.
///
/// Scans are lazy: each step re-reads the map from the last yielded key, so
/// nothing beyond the current entry is buffered and deletes that happen while a
/// scan is open are observed by it.
///
/// # Example
///
/// ```
/// use foldstore_testing::InMemoryStore;
/// use foldstore_core::store::{OrderedStore, WriteBatch};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryStore::new();
///
/// let mut batch = WriteBatch::new();
/// batch.put("a", b"1".to_vec()).put("b", b"2".to_vec());
/// store.write(batch).await?;
///
/// assert_eq!(store.get("a").await?, Some(b"1".to_vec()));
/// assert_eq!(store.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value directly, bypassing fault injection (for seeding fixtures)
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.inner
            .write()
            .unwrap()
            .data
            .insert(key.into(), value.into());
    }

    /// Insert a JSON-encoded value directly (for seeding fixtures)
    pub fn insert_json(&self, key: impl Into<String>, value: &serde_json::Value) {
        self.insert(key, serde_json::to_vec(value).unwrap());
    }

    /// Read a value directly, bypassing fault injection
    #[must_use]
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.read().unwrap().data.get(key).cloned()
    }

    /// Read and decode a JSON value directly
    ///
    /// Returns `None` if the key is absent or does not decode as `T`.
    #[must_use]
    pub fn json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.value(key)
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }

    /// All keys in ascending order
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().unwrap().data.keys().cloned().collect()
    }

    /// All keys starting with `prefix`, in ascending order
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.inner
            .read()
            .unwrap()
            .data
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Check if a key exists
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().unwrap().data.contains_key(key)
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().data.len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().data.is_empty()
    }

    /// Number of batches successfully committed through [`OrderedStore::write`]
    #[must_use]
    pub fn committed_batches(&self) -> usize {
        self.inner.read().unwrap().committed_batches
    }

    /// Clear all data and faults (for test isolation)
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.data.clear();
        inner.faults = Faults::default();
        inner.committed_batches = 0;
    }

    /// Make every `get` and newly opened `scan` fail
    pub fn fail_reads(&self, fail: bool) {
        self.inner.write().unwrap().faults.fail_reads = fail;
    }

    /// Make every `put`, `delete` and `write` fail
    pub fn fail_writes(&self, fail: bool) {
        self.inner.write().unwrap().faults.fail_writes = fail;
    }

    /// Make every read or write touching `key` fail, including batches containing it
    pub fn poison(&self, key: impl Into<String>) {
        self.inner.write().unwrap().faults.poisoned.insert(key.into());
    }

    /// Make scans opened from now on fail after yielding `count` entries
    pub fn fail_scans_after(&self, count: Option<usize>) {
        self.inner.write().unwrap().faults.fail_scans_after = count;
    }

    fn check_read(&self, key: &str) -> Result<(), StoreError> {
        let inner = self.inner.read().unwrap();
        if inner.faults.fail_reads {
            return Err(StoreError::read(key, "injected read failure"));
        }
        if inner.faults.poisoned.contains(key) {
            return Err(StoreError::read(key, "injected failure on poisoned key"));
        }
        Ok(())
    }

    fn check_write<'k>(&self, keys: impl IntoIterator<Item = &'k str>) -> Result<(), StoreError> {
        let inner = self.inner.read().unwrap();
        if inner.faults.fail_writes {
            return Err(StoreError::write("injected write failure"));
        }
        for key in keys {
            if inner.faults.poisoned.contains(key) {
                return Err(StoreError::write(format!(
                    "injected failure on poisoned key '{key}'"
                )));
            }
        }
        Ok(())
    }

    /// Next entry after `cursor` in scan direction, or the first one if no cursor yet.
    fn next_entry(&self, options: &ScanOptions, cursor: Option<&str>) -> Option<Entry> {
        let inner = self.inner.read().unwrap();

        let mut lower = options.lower.as_ref().map(String::as_str);
        let mut upper = options.upper.as_ref().map(String::as_str);
        if let Some(cursor) = cursor {
            if options.reverse {
                upper = Bound::Excluded(cursor);
            } else {
                lower = Bound::Excluded(cursor);
            }
        }
        if is_empty_range(lower, upper) {
            return None;
        }

        let mut range = inner.data.range::<str, _>((lower, upper));
        let (key, value) = if options.reverse {
            range.next_back()?
        } else {
            range.next()?
        };
        let value = if options.values {
            value.clone()
        } else {
            Vec::new()
        };
        Some(Entry::new(key.clone(), value))
    }
}

/// `BTreeMap::range` panics on inverted bounds; treat them as empty instead.
fn is_empty_range(lower: Bound<&str>, upper: Bound<&str>) -> bool {
    match (lower, upper) {
        (Bound::Included(l), Bound::Included(u)) => l > u,
        (Bound::Included(l) | Bound::Excluded(l), Bound::Excluded(u))
        | (Bound::Excluded(l), Bound::Included(u)) => l >= u,
        _ => false,
    }
}

struct Cursor {
    options: ScanOptions,
    last: Option<String>,
    yielded: usize,
    fail_after: Option<usize>,
    done: bool,
}

impl OrderedStore for InMemoryStore {
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.check_read(&key)?;
            Ok(self.value(&key))
        })
    }

    fn put(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.check_write([key.as_str()])?;
            self.inner.write().unwrap().data.insert(key, value);
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            self.check_write([key.as_str()])?;
            self.inner.write().unwrap().data.remove(&key);
            Ok(())
        })
    }

    fn write(
        &self,
        batch: WriteBatch,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            self.check_write(batch.ops().iter().map(BatchOp::key))?;

            // Single write guard: readers observe all of the batch or none of it.
            let mut inner = self.inner.write().unwrap();
            for op in batch.into_ops() {
                match op {
                    BatchOp::Put { key, value } => {
                        inner.data.insert(key, value);
                    }
                    BatchOp::Delete { key } => {
                        inner.data.remove(&key);
                    }
                }
            }
            inner.committed_batches += 1;
            Ok(())
        })
    }

    fn scan(&self, options: ScanOptions) -> EntryStream<'_> {
        let (fail_reads, fail_after) = {
            let inner = self.inner.read().unwrap();
            (inner.faults.fail_reads, inner.faults.fail_scans_after)
        };
        if fail_reads {
            let start = format!("{:?}", options.lower);
            return Box::pin(stream::once(async move {
                Err(StoreError::read(start, "injected read failure"))
            }));
        }

        let cursor = Cursor {
            options,
            last: None,
            yielded: 0,
            fail_after,
            done: false,
        };

        Box::pin(stream::unfold(cursor, move |mut cursor| async move {
            if cursor.done || cursor.options.limit.is_some_and(|limit| cursor.yielded >= limit) {
                return None;
            }
            if cursor.fail_after.is_some_and(|after| cursor.yielded >= after) {
                cursor.done = true;
                let at = cursor.last.clone().unwrap_or_default();
                return Some((Err(StoreError::read(at, "injected scan failure")), cursor));
            }

            let entry = self.next_entry(&cursor.options, cursor.last.as_deref())?;
            cursor.last = Some(entry.key.clone());
            cursor.yielded += 1;
            Some((Ok(entry), cursor))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    async fn collect_keys(store: &InMemoryStore, options: ScanOptions) -> Vec<String> {
        store
            .scan(options)
            .map_ok(|entry| entry.key)
            .try_collect()
            .await
            .unwrap()
    }

    fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        for key in ["a", "b", "c", "d"] {
            store.insert(key, key.as_bytes().to_vec());
        }
        store
    }

    #[tokio::test]
    async fn forward_and_reverse_scans() {
        let store = seeded();

        assert_eq!(collect_keys(&store, ScanOptions::all()).await, ["a", "b", "c", "d"]);
        assert_eq!(
            collect_keys(&store, ScanOptions::all().reverse()).await,
            ["d", "c", "b", "a"]
        );
    }

    #[tokio::test]
    async fn bounds_and_limit() {
        let store = seeded();

        let options = ScanOptions::all().gt("a").lte("c");
        assert_eq!(collect_keys(&store, options.clone()).await, ["b", "c"]);
        assert_eq!(collect_keys(&store, options.reverse().limit(1)).await, ["c"]);
    }

    #[tokio::test]
    async fn inverted_bounds_yield_nothing() {
        let store = seeded();
        let options = ScanOptions::all().gte("c").lte("b");
        assert!(collect_keys(&store, options).await.is_empty());
    }

    #[tokio::test]
    async fn keys_only_scan_omits_values() {
        let store = seeded();
        let entries: Vec<Entry> = store
            .scan(ScanOptions::all().keys_only().limit(1))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(entries, vec![Entry::new("a", Vec::new())]);
    }

    #[tokio::test]
    async fn failed_batch_is_not_partially_applied() {
        let store = seeded();
        store.poison("z");

        let mut batch = WriteBatch::new();
        batch.delete("a").put("z", b"z".to_vec());
        assert!(store.write(batch).await.is_err());

        assert!(store.contains_key("a"));
        assert!(!store.contains_key("z"));
        assert_eq!(store.committed_batches(), 0);
    }

    #[tokio::test]
    async fn scan_failure_after_n_entries() {
        let store = seeded();
        store.fail_scans_after(Some(2));

        let results: Vec<Result<Entry, StoreError>> = futures::StreamExt::collect(
            store.scan(ScanOptions::all()),
        )
        .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(StoreError::Read { .. })));
    }
}
