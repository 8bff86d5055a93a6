//! # Foldstore Testing
//!
//! Testing utilities and helpers for foldstore.
//!
//! This crate provides:
//! - [`InMemoryStore`]: an ordered store with fault injection
//! - [`FixedClock`] / [`test_clock`]: deterministic time for key generation
//! - [`ProjectionTestHarness`]: drives a commit listener with synthetic batches
//! - [`ReducerTest`]: Given-When-Then assertions for reducers
//!
//! ## Example
//!
//! ```ignore
//! use foldstore_testing::{InMemoryStore, ProjectionTestHarness};
//!
//! #[tokio::test]
//! async fn test_subscriptions() {
//!     let store = InMemoryStore::new();
//!     let mut engine = ProjectionEngine::new(Arc::new(store.clone()));
//!     engine.register(SubscriptionsReducer).unwrap();
//!
//!     let mut harness = ProjectionTestHarness::new(engine, store);
//!     harness.given_batch(vec![subscribe("A", "B", "X")]).await;
//!     harness.then_contains("subscriptions");
//! }
//! ```

use chrono::{DateTime, Utc};
use foldstore_core::environment::Clock;

pub mod projection_harness;
pub mod store_mocks;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible. Key generators
    /// driven by a fixed clock still produce strictly increasing keys.
    ///
    /// # Example
    ///
    /// ```
    /// use foldstore_testing::mocks::FixedClock;
    /// use foldstore_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use projection_harness::ProjectionTestHarness;
pub use reducer_test::ReducerTest;
pub use store_mocks::InMemoryStore;

#[cfg(test)]
mod tests {
    use super::*;
    use foldstore_core::key::KeyGenerator;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_clock_keys_are_deterministic() {
        let keys = KeyGenerator::new(test_clock());
        assert_eq!(keys.next_key().as_str(), "01735689600000000000");
        assert_eq!(keys.next_key().as_str(), "01735689600000000001");
    }
}
