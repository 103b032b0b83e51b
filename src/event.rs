//! Event and event shadow types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

/// An immutable event record stored by the bus.
///
/// Events are owned by the [`EventStore`](crate::store::EventStore) from
/// insertion until the completion watcher reclaims them. Fields never mutate
/// after storage; `(topic, id)` is the storage key and the caller is
/// responsible for id uniqueness within a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Caller-supplied identifier, unique per topic
    pub id: String,
    /// Topic this event is published under
    pub topic: String,
    /// Opaque payload
    pub data: serde_json::Value,
    /// Optional source tag identifying the producer
    pub source: Option<String>,
    /// Timestamp when the event record was created
    pub initialized_at: SystemTime,
    /// Optional timestamp of the underlying occurrence
    pub occurred_at: Option<SystemTime>,
    /// Optional time-to-live for TTL-based cleanup
    pub ttl: Option<Duration>,
}

impl Event {
    /// Create a new event
    pub fn new(
        topic: impl Into<String>,
        id: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            data,
            source: None,
            initialized_at: SystemTime::now(),
            occurred_at: None,
            ttl: None,
        }
    }

    /// Attach a source tag
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach an occurrence timestamp
    #[must_use]
    pub fn with_occurred_at(mut self, occurred_at: SystemTime) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    /// Attach a time-to-live
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Derive the lightweight reference passed to listeners
    pub fn shadow(&self) -> EventShadow {
        EventShadow::new(&self.topic, &self.id)
    }

    /// Whether this event's TTL has elapsed at `now`.
    ///
    /// Events without a TTL never expire.
    pub fn expired_at(&self, now: SystemTime) -> bool {
        match self.ttl {
            Some(ttl) => now
                .duration_since(self.initialized_at)
                .is_ok_and(|age| age >= ttl),
            None => false,
        }
    }
}

/// A lightweight `(topic, id)` reference to a stored event.
///
/// Dispatch hands shadows to listeners instead of full events so fan-out
/// never copies payloads; the full [`Event`] is fetched on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventShadow {
    /// Topic of the referenced event
    pub topic: String,
    /// Id of the referenced event
    pub id: String,
}

impl EventShadow {
    /// Create a new event shadow
    pub fn new(topic: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EventShadow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.id)
    }
}
