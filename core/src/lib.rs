//! # Foldstore Core
//!
//! Core traits and types for foldstore, an event-sourced state projector layered on
//! an ordered, durable key-value store.
//!
//! ## Core Concepts
//!
//! - **Ordered store**: sorted string keys, atomic batches, lazy range scans ([`store`])
//! - **Event**: immutable domain fact, appended under a monotonic timestamp key ([`event`], [`key`])
//! - **Reducer**: pure fold `(State, Event) → State` ([`reducer`])
//! - **Projection**: a reducer's folded state, stored under `p:<name>` ([`projection`])
//! - **Snapshot**: point-in-time value under `snapshot:<namespace>:<timestamp>` ([`snapshot`])
//!
//! ## Key Layout
//!
//! | Key pattern | Value |
//! |---|---|
//! | `<20-digit nanosecond timestamp>` | event (JSON) |
//! | `p:<reducer>` | projection state (JSON) |
//! | `snapshot:<namespace>:<timestamp>` | snapshot payload |
//!
//! ## Example
//!
//! ```
//! use foldstore_core::reducer::Reducer;
//! use std::collections::BTreeMap;
//!
//! struct Counter;
//!
//! impl Reducer for Counter {
//!     type State = BTreeMap<String, u64>;
//!     type Event = String;
//!
//!     fn name(&self) -> &str {
//!         "counter"
//!     }
//!
//!     fn reduce(&self, state: &mut Self::State, event: &String) {
//!         *state.entry(event.clone()).or_default() += 1;
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod event;
pub mod key;
pub mod projection;
pub mod snapshot;
pub mod store;

/// Reducer module - the fold function behind every projection
///
/// Reducers are pure functions: `(State, Event) → State`. They perform no I/O;
/// loading and persisting state is the projection engine's job.
pub mod reducer {
    use serde::{Serialize, de::DeserializeOwned};

    /// The Reducer trait - folds events into a projection state
    ///
    /// # Type Parameters
    ///
    /// - `State`: The projection this reducer maintains. `Default` is the state of a
    ///   projection that has never been written.
    /// - `Event`: The event type this reducer folds
    ///
    /// # Dispatch
    ///
    /// Match on the event enum exhaustively and let unknown or irrelevant variants fall
    /// through as no-ops; never fail on an event the reducer does not understand.
    pub trait Reducer: Send + Sync {
        /// The projection state type
        type State: Default + Serialize + DeserializeOwned + Send;

        /// The event type this reducer folds
        type Event;

        /// Unique name; the projection is stored under `p:<name>`
        fn name(&self) -> &str;

        /// Fold one event into the state, in place
        fn reduce(&self, state: &mut Self::State, event: &Self::Event);
    }

    /// Fold a sequence of events into a state, in order
    pub fn fold<'e, R>(
        reducer: &R,
        mut state: R::State,
        events: impl IntoIterator<Item = &'e R::Event>,
    ) -> R::State
    where
        R: Reducer + ?Sized,
        R::Event: 'e,
    {
        for event in events {
            reducer.reduce(&mut state, event);
        }
        state
    }
}

/// Environment module - injected dependencies
///
/// All sources of non-determinism are abstracted behind traits so tests can
/// substitute fixed values.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use foldstore_core::environment::{Clock, SystemClock};
    ///
    /// let now = SystemClock.now();
    /// assert!(now.timestamp() > 0);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
