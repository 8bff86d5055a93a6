//! Snapshot key space: `snapshot:<namespace>:<timestamp>`.
//!
//! Snapshots of one namespace occupy a contiguous key range, ordered by timestamp.
//! The range is bounded below by `snapshot:<namespace>:` and above by
//! `snapshot:<namespace>:\u{ff}`. The `:` terminator keeps namespaces that share a
//! prefix (`foo`, `foobar`) in disjoint ranges; the `\u{ff}` sentinel sorts after every
//! timestamp character.
//!
//! # Naming constraint
//!
//! A namespace must be non-empty, must not contain `:`, and must not contain any
//! character at or above `U+00FF`. A namespace containing the separator could nest
//! inside another namespace's range, and one containing a character past the sentinel
//! could escape it. [`Namespace`] enforces both when parsed.
//!
//! A timestamp is held to the same character rules through [`SnapshotTimestamp`],
//! except that it may not be empty either. Numeric timestamps are left-padded to the
//! event key width so that a 19-digit producer stamp and a 20-digit captured stamp
//! still sort by time.

use crate::key::{EventKey, KEY_WIDTH};
use crate::store::ScanOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix shared by every snapshot key.
pub const SNAPSHOT_PREFIX: &str = "snapshot";

/// Separator between key segments.
pub const SEPARATOR: char = ':';

/// Upper-bound sentinel appended to a namespace prefix.
pub const SENTINEL: char = '\u{ff}';

/// Error type for `Namespace` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid snapshot namespace: {0}")]
pub struct ParseNamespaceError(String);

/// Logical grouping label under which snapshots are ordered and pruned.
///
/// # Examples
///
/// ```
/// use foldstore_core::snapshot::Namespace;
///
/// let ns: Namespace = "connections".parse().unwrap();
/// let ts = "1523085867671159187".parse().unwrap();
/// assert_eq!(ns.key(&ts), "snapshot:connections:01523085867671159187");
///
/// assert!("".parse::<Namespace>().is_err());
/// assert!("a:b".parse::<Namespace>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    /// Get the namespace as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix shared by every snapshot key in this namespace (`snapshot:<ns>:`).
    #[must_use]
    pub fn prefix(&self) -> String {
        format!("{SNAPSHOT_PREFIX}{SEPARATOR}{}{SEPARATOR}", self.0)
    }

    /// Full key of the snapshot taken at `timestamp`.
    #[must_use]
    pub fn key(&self, timestamp: &SnapshotTimestamp) -> String {
        format!("{}{timestamp}", self.prefix())
    }

    /// Timestamp segment of a key in this namespace, if the key belongs to it.
    #[must_use]
    pub fn timestamp_of<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_prefix(self.prefix().as_str())
    }

    /// Scan bounds covering exactly this namespace's snapshots, oldest first.
    #[must_use]
    pub fn range(&self) -> ScanOptions {
        let prefix = self.prefix();
        let upper = format!("{prefix}{SENTINEL}");
        ScanOptions::all().gte(prefix).lte(upper)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Namespace {
    type Err = ParseNamespaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseNamespaceError("namespace cannot be empty".to_string()));
        }
        if s.contains(SEPARATOR) {
            return Err(ParseNamespaceError(format!(
                "'{s}' contains the key separator '{SEPARATOR}'"
            )));
        }
        if s.chars().any(|c| c >= SENTINEL) {
            return Err(ParseNamespaceError(format!(
                "'{s}' contains a character at or above the range sentinel U+00FF"
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for Namespace {
    type Error = ParseNamespaceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<&str> for Namespace {
    type Error = ParseNamespaceError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Namespace> for String {
    fn from(namespace: Namespace) -> Self {
        namespace.0
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Error type for `SnapshotTimestamp` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid snapshot timestamp: {0}")]
pub struct ParseSnapshotTimestampError(String);

/// Timestamp segment of a snapshot key.
///
/// Always sorts inside its namespace's [`range`](Namespace::range). All-digit input
/// is zero-padded to [`KEY_WIDTH`], the same width as [`EventKey`].
///
/// # Examples
///
/// ```
/// use foldstore_core::snapshot::SnapshotTimestamp;
///
/// let ts: SnapshotTimestamp = "1523085867671174271".parse().unwrap();
/// assert_eq!(ts.as_str(), "01523085867671174271");
/// assert_eq!(SnapshotTimestamp::from_nanos(1_523_085_867_671_174_271), ts);
///
/// assert!("".parse::<SnapshotTimestamp>().is_err());
/// assert!("1:2".parse::<SnapshotTimestamp>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotTimestamp(String);

impl SnapshotTimestamp {
    /// Render a nanosecond timestamp the way event keys are rendered.
    #[must_use]
    pub fn from_nanos(nanos: u64) -> Self {
        Self::from(EventKey::new(nanos))
    }

    /// Get the timestamp as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SnapshotTimestamp {
    type Err = ParseSnapshotTimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseSnapshotTimestampError(
                "timestamp cannot be empty".to_string(),
            ));
        }
        if s.contains(SEPARATOR) {
            return Err(ParseSnapshotTimestampError(format!(
                "'{s}' contains the key separator '{SEPARATOR}'"
            )));
        }
        if s.chars().any(|c| c >= SENTINEL) {
            return Err(ParseSnapshotTimestampError(format!(
                "'{s}' contains a character at or above the range sentinel U+00FF"
            )));
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            if s.len() > KEY_WIDTH {
                return Err(ParseSnapshotTimestampError(format!(
                    "'{s}' is wider than {KEY_WIDTH} digits"
                )));
            }
            return Ok(Self(format!("{s:0>width$}", width = KEY_WIDTH)));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<&str> for SnapshotTimestamp {
    type Error = ParseSnapshotTimestampError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EventKey> for SnapshotTimestamp {
    fn from(key: EventKey) -> Self {
        Self(key.into_inner())
    }
}

impl AsRef<str> for SnapshotTimestamp {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
