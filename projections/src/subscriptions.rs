//! Subscription projection: which subscribers are attached to each connection.
//!
//! A connection is identified by a provider id (`dp`) and a recipient/device id
//! (`dr`), combined into the composite id `"<dp>:<dr>"`. Each connection maps to the
//! ordered, duplicate-free list of subscriber ids (`oig`) currently attached to it.
//!
//! ```text
//! {"A:B": ["X", "Y"]}  ──unsubscribe(A, B, X)──►  {"A:B": ["Y"]}
//!                      ──unsubscribe(A, B, Y)──►  {}
//! ```
//!
//! A connection whose last subscriber leaves is removed entirely; the state never
//! holds an empty list.

use foldstore_core::event::Event;
use foldstore_core::reducer::Reducer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Subscription domain events.
///
/// Serialized as `{"type": "subscribe", "dp": .., "dr": .., "oig": ..}`. Any other
/// `type` decodes to [`SubscriptionEvent::Unknown`] and is ignored by the reducer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SubscriptionEvent {
    /// Attach subscriber `oig` to connection `dp:dr`.
    Subscribe {
        /// Provider id
        dp: String,
        /// Recipient/device id
        dr: String,
        /// Subscriber id
        oig: String,
    },
    /// Detach subscriber `oig` from connection `dp:dr`.
    Unsubscribe {
        /// Provider id
        dp: String,
        /// Recipient/device id
        dr: String,
        /// Subscriber id
        oig: String,
    },
    /// An event type this version does not know.
    #[serde(other)]
    Unknown,
}

impl Event for SubscriptionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Unknown => "unknown",
        }
    }
}

/// Build a subscribe event.
#[must_use]
pub fn subscribe(
    dp: impl Into<String>,
    dr: impl Into<String>,
    oig: impl Into<String>,
) -> SubscriptionEvent {
    SubscriptionEvent::Subscribe {
        dp: dp.into(),
        dr: dr.into(),
        oig: oig.into(),
    }
}

/// Build an unsubscribe event.
#[must_use]
pub fn unsubscribe(
    dp: impl Into<String>,
    dr: impl Into<String>,
    oig: impl Into<String>,
) -> SubscriptionEvent {
    SubscriptionEvent::Unsubscribe {
        dp: dp.into(),
        dr: dr.into(),
        oig: oig.into(),
    }
}

/// Composite connection id `"<dp>:<dr>"`.
#[must_use]
pub fn connection_id(dp: &str, dr: &str) -> String {
    format!("{dp}:{dr}")
}

/// Projection state: connection id → subscriber ids in subscribe order.
///
/// Serialized as a plain JSON object. Decoding normalizes the stored value:
/// duplicate subscribers collapse to their first occurrence and empty lists are
/// dropped, so equivalent states always compare and encode identically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Vec<String>>",
    into = "BTreeMap<String, Vec<String>>"
)]
pub struct SubscriptionState {
    connections: BTreeMap<String, Vec<String>>,
}

impl SubscriptionState {
    /// Subscribers of connection `dp:dr`, if it has any.
    #[must_use]
    pub fn subscribers(&self, dp: &str, dr: &str) -> Option<&[String]> {
        self.connections
            .get(&connection_id(dp, dr))
            .map(Vec::as_slice)
    }

    /// Whether `oig` is subscribed to connection `dp:dr`.
    #[must_use]
    pub fn contains(&self, dp: &str, dr: &str, oig: &str) -> bool {
        self.subscribers(dp, dr)
            .is_some_and(|subscribers| subscribers.iter().any(|s| s == oig))
    }

    /// Number of connections with at least one subscriber.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection has a subscriber.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Connections and their subscribers, ordered by connection id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.connections
            .iter()
            .map(|(id, subscribers)| (id.as_str(), subscribers.as_slice()))
    }

    fn add(&mut self, connection: String, oig: &str) {
        let subscribers = self.connections.entry(connection).or_default();
        if !subscribers.iter().any(|s| s == oig) {
            subscribers.push(oig.to_string());
        }
    }

    fn remove(&mut self, connection: &str, oig: &str) {
        if let Some(subscribers) = self.connections.get_mut(connection) {
            subscribers.retain(|s| s != oig);
            if subscribers.is_empty() {
                self.connections.remove(connection);
            }
        }
    }
}

impl From<BTreeMap<String, Vec<String>>> for SubscriptionState {
    fn from(raw: BTreeMap<String, Vec<String>>) -> Self {
        let mut state = Self::default();
        for (connection, subscribers) in raw {
            for oig in subscribers {
                state.add(connection.clone(), &oig);
            }
        }
        state
    }
}

impl From<SubscriptionState> for BTreeMap<String, Vec<String>> {
    fn from(state: SubscriptionState) -> Self {
        state.connections
    }
}

/// Reducer maintaining the `subscriptions` projection.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubscriptionsReducer;

impl SubscriptionsReducer {
    /// Projection name; the state lives under `p:subscriptions`.
    pub const NAME: &'static str = "subscriptions";
}

impl Reducer for SubscriptionsReducer {
    type State = SubscriptionState;
    type Event = SubscriptionEvent;

    fn name(&self) -> &str {
        Self::NAME
    }

    fn reduce(&self, state: &mut SubscriptionState, event: &SubscriptionEvent) {
        match event {
            SubscriptionEvent::Subscribe { dp, dr, oig } => {
                state.add(connection_id(dp, dr), oig);
            }
            SubscriptionEvent::Unsubscribe { dp, dr, oig } => {
                state.remove(&connection_id(dp, dr), oig);
            }
            SubscriptionEvent::Unknown => {}
        }
    }
}
