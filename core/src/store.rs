//! Ordered key-value store contract.
//!
//! This module defines the adapter that every other component in foldstore is written
//! against: a durable, lexicographically sorted mapping from string keys to byte values.
//!
//! # Design
//!
//! The `OrderedStore` trait is deliberately small. It provides exactly what event
//! folding and snapshot retention need:
//!
//! - Single-key `get` / `put` / `delete`
//! - Atomic multi-key writes via [`WriteBatch`]
//! - Bounded, reversible, limitable range scans exposed as a lazy [`EntryStream`]
//!
//! A missing key is not an error: `get` returns `Ok(None)`.
//!
//! # Implementations
//!
//! - `InMemoryStore` (in `foldstore-testing` crate): `BTreeMap`-backed, with fault injection
//!
//! # Example
//!
//! ```no_run
//! use foldstore_core::store::{OrderedStore, ScanOptions, StoreError, WriteBatch};
//! use futures::StreamExt;
//!
//! async fn example<S: OrderedStore>(store: &S) -> Result<(), StoreError> {
//!     let mut batch = WriteBatch::new();
//!     batch.put("a", b"1".to_vec());
//!     batch.put("b", b"2".to_vec());
//!     store.write(batch).await?;
//!
//!     let mut entries = store.scan(ScanOptions::all().reverse().limit(1));
//!     while let Some(entry) = entries.next().await {
//!         let entry = entry?;
//!         assert_eq!(entry.key, "b");
//!     }
//!     Ok(())
//! }
//! ```

use futures::Stream;
use std::future::Future;
use std::ops::Bound;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by an [`OrderedStore`].
///
/// There is no `NotFound` variant: absence is reported as `Ok(None)` by
/// [`OrderedStore::get`] and as an empty stream by [`OrderedStore::scan`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A point read or a scan failed (I/O fault, corrupt value).
    #[error("Store read failed at '{key}': {reason}")]
    Read {
        /// Key (or scan start) where the failure was observed.
        key: String,
        /// The reason for failure.
        reason: String,
    },

    /// A single-key write or a batch commit failed. Nothing from the write is visible.
    #[error("Store write failed: {0}")]
    Write(String),
}

impl StoreError {
    /// Build a read error for the given key.
    #[must_use]
    pub fn read(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Read {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Build a write error.
    #[must_use]
    pub fn write(reason: impl Into<String>) -> Self {
        Self::Write(reason.into())
    }
}

/// One key/value pair produced by a scan.
///
/// When the scan was opened with [`ScanOptions::keys_only`], `value` is empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// The stored key.
    pub key: String,
    /// The stored value (empty for keys-only scans).
    pub value: Vec<u8>,
}

impl Entry {
    /// Create a new entry.
    #[must_use]
    pub fn new(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Lazy sequence of scan results, ordered by key (or reverse key order).
pub type EntryStream<'a> = Pin<Box<dyn Stream<Item = Result<Entry, StoreError>> + Send + 'a>>;

/// A single operation inside a [`WriteBatch`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or overwrite `key`.
    Put {
        /// Target key.
        key: String,
        /// New value.
        value: Vec<u8>,
    },
    /// Remove `key` (no-op if absent).
    Delete {
        /// Target key.
        key: String,
    },
}

impl BatchOp {
    /// Key touched by this operation.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// An ordered set of writes committed atomically by [`OrderedStore::write`].
///
/// Operations are applied in insertion order, so a later `put` of the same key wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Queue a put.
    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) -> &mut Self {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value,
        });
        self
    }

    /// Queue a delete.
    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::Delete { key: key.into() });
        self
    }

    /// Number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Queued operations in insertion order.
    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Consume the batch, yielding its operations.
    #[must_use]
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Range scan parameters.
///
/// Bounds are compared lexicographically on the UTF-8 bytes of the key. By default
/// the scan is unbounded, ascending, unlimited, and returns values.
///
/// # Example
///
/// ```
/// use foldstore_core::store::ScanOptions;
/// use std::ops::Bound;
///
/// let options = ScanOptions::all().gte("a").lte("a\u{ff}").reverse().limit(1);
/// assert_eq!(options.lower, Bound::Included("a".to_string()));
/// assert!(options.reverse);
/// assert_eq!(options.limit, Some(1));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanOptions {
    /// Lower key bound.
    pub lower: Bound<String>,
    /// Upper key bound.
    pub upper: Bound<String>,
    /// Yield keys in descending order.
    pub reverse: bool,
    /// Stop after this many entries.
    pub limit: Option<usize>,
    /// Return values alongside keys.
    pub values: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::all()
    }
}

impl ScanOptions {
    /// Unbounded ascending scan over every key.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
            reverse: false,
            limit: None,
            values: true,
        }
    }

    /// Inclusive lower bound.
    #[must_use]
    pub fn gte(mut self, key: impl Into<String>) -> Self {
        self.lower = Bound::Included(key.into());
        self
    }

    /// Exclusive lower bound.
    #[must_use]
    pub fn gt(mut self, key: impl Into<String>) -> Self {
        self.lower = Bound::Excluded(key.into());
        self
    }

    /// Inclusive upper bound.
    #[must_use]
    pub fn lte(mut self, key: impl Into<String>) -> Self {
        self.upper = Bound::Included(key.into());
        self
    }

    /// Exclusive upper bound.
    #[must_use]
    pub fn lt(mut self, key: impl Into<String>) -> Self {
        self.upper = Bound::Excluded(key.into());
        self
    }

    /// Scan from the highest key downward.
    #[must_use]
    pub const fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Yield at most `limit` entries.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Omit values; every yielded [`Entry`] carries an empty value.
    #[must_use]
    pub const fn keys_only(mut self) -> Self {
        self.values = false;
        self
    }

    /// Whether `key` falls inside the configured bounds.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let above = match &self.lower {
            Bound::Included(lower) => key >= lower.as_str(),
            Bound::Excluded(lower) => key > lower.as_str(),
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(upper) => key <= upper.as_str(),
            Bound::Excluded(upper) => key < upper.as_str(),
            Bound::Unbounded => true,
        };
        above && below
    }
}

/// Ordered key-value store abstraction.
///
/// # Guarantees expected from implementations
///
/// - `write` is all-or-nothing: either every operation of the batch becomes visible
///   to subsequent reads, or none does.
/// - `scan` yields entries in lexicographic key order (descending when
///   [`ScanOptions::reverse`] is set) and is lazy: implementations must not require the
///   caller to hold the whole range in memory.
/// - Each call to `scan` opens a fresh cursor; streams are restartable by calling again.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so that it can be used as `Arc<dyn OrderedStore>`.
pub trait OrderedStore: Send + Sync {
    /// Read a single key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the underlying read fails. A missing key is `Ok(None)`.
    fn get(&self, key: &str)
    -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send + '_>>;

    /// Insert or overwrite a single key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the write fails.
    fn put(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Remove a single key. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the delete fails.
    fn delete(&self, key: &str) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Commit a batch atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the commit fails; no operation is visible then.
    fn write(&self, batch: WriteBatch) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Open a lazy range scan.
    ///
    /// Failures are reported as `Err` items on the stream.
    fn scan(&self, options: ScanOptions) -> EntryStream<'_>;
}
