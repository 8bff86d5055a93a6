//! Monotonic, lexicographically sortable event keys.
//!
//! Every event appended to the log is stored under a bare timestamp key: the
//! number of nanoseconds since the Unix epoch, rendered as a fixed-width,
//! zero-padded decimal string. Fixed width makes string order equal numeric order,
//! and keeps event keys (all ASCII digits) disjoint from the `p:` and `snapshot:`
//! key spaces.

use crate::environment::Clock;
use crate::store::ScanOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Width of every rendered key. `u64::MAX` has 20 decimal digits.
pub const KEY_WIDTH: usize = 20;

/// Error type for `EventKey` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid event key: {0}")]
pub struct ParseEventKeyError(String);

/// Storage key of a single event.
///
/// Ordering of `EventKey` values matches both numeric order of the underlying
/// timestamp and lexicographic order of the rendered string.
///
/// # Examples
///
/// ```
/// use foldstore_core::key::EventKey;
///
/// let key = EventKey::new(1_523_085_867_671_174_271);
/// assert_eq!(key.as_str(), "01523085867671174271");
///
/// let parsed: EventKey = "01523085867671174271".parse().unwrap();
/// assert_eq!(parsed, key);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventKey(String);

impl EventKey {
    /// Render a timestamp as a key.
    #[must_use]
    pub fn new(nanos: u64) -> Self {
        Self(format!("{nanos:0width$}", width = KEY_WIDTH))
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the key into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Scan bounds covering every event key and nothing else.
    #[must_use]
    pub fn range() -> ScanOptions {
        ScanOptions::all()
            .gte("0".repeat(KEY_WIDTH))
            .lte("9".repeat(KEY_WIDTH))
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventKey {
    type Err = ParseEventKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != KEY_WIDTH || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseEventKeyError(format!(
                "expected {KEY_WIDTH} ASCII digits, got '{s}'"
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for EventKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hands out strictly increasing keys derived from a [`Clock`].
///
/// If the clock has not advanced since the previous key (or went backward),
/// the previous value plus one nanosecond is used instead, so two keys from the
/// same generator never collide. Safe to share across tasks.
///
/// # Examples
///
/// ```
/// use foldstore_core::environment::SystemClock;
/// use foldstore_core::key::KeyGenerator;
///
/// let keys = KeyGenerator::new(SystemClock);
/// let first = keys.next_key();
/// let second = keys.next_key();
/// assert!(first < second);
/// ```
pub struct KeyGenerator {
    clock: Box<dyn Clock>,
    last: AtomicU64,
}

impl KeyGenerator {
    /// Create a generator reading time from `clock`.
    #[must_use]
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            last: AtomicU64::new(0),
        }
    }

    /// Next timestamp, strictly greater than every previous one.
    pub fn next_nanos(&self) -> u64 {
        let now = clock_nanos(self.clock.as_ref());
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        now.max(previous.saturating_add(1))
    }

    /// Next event key.
    pub fn next_key(&self) -> EventKey {
        EventKey::new(self.next_nanos())
    }
}

impl fmt::Debug for KeyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGenerator")
            .field("last", &self.last.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn clock_nanos(clock: &dyn Clock) -> u64 {
    // Times before the epoch or past year 2262 clamp to the generator's own sequence.
    clock
        .now()
        .timestamp_nanos_opt()
        .and_then(|nanos| u64::try_from(nanos).ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;

    struct FrozenClock(DateTime<Utc>);

    impl Clock for FrozenClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn frozen() -> FrozenClock {
        FrozenClock(Utc.timestamp_opt(1_523_085_867, 671_174_271).single().unwrap_or_default())
    }

    #[test]
    fn keys_are_zero_padded() {
        assert_eq!(EventKey::new(42).as_str(), "00000000000000000042");
        assert_eq!(EventKey::new(u64::MAX).as_str().len(), KEY_WIDTH);
    }

    #[test]
    fn frozen_clock_still_yields_strictly_increasing_keys() {
        let keys = KeyGenerator::new(frozen());
        let first = keys.next_key();
        let second = keys.next_key();
        let third = keys.next_key();

        assert_eq!(first.as_str(), "01523085867671174271");
        assert_eq!(second.as_str(), "01523085867671174272");
        assert!(second < third);
    }

    #[test]
    fn parse_rejects_wrong_width_and_non_digits() {
        assert!("123".parse::<EventKey>().is_err());
        assert!("0152308586767117427x".parse::<EventKey>().is_err());
        assert!("01523085867671174271".parse::<EventKey>().is_ok());
    }

    #[test]
    fn event_range_excludes_other_key_spaces() {
        let range = EventKey::range();
        assert!(range.contains(EventKey::new(0).as_str()));
        assert!(range.contains(EventKey::new(u64::MAX).as_str()));
        assert!(!range.contains("p:subscriptions"));
        assert!(!range.contains("snapshot:conn:01523085867671174271"));
    }

    proptest! {
        #[test]
        fn string_order_matches_numeric_order(a in any::<u64>(), b in any::<u64>()) {
            let (ka, kb) = (EventKey::new(a), EventKey::new(b));
            prop_assert_eq!(a.cmp(&b), ka.as_str().cmp(kb.as_str()));
        }
    }
}
