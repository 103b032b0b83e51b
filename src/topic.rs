//! Topic registry and per-topic backing storage

use crate::event::Event;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Backing storage shard for a single topic, keyed by event id.
///
/// Each topic gets its own lock so operations on distinct topics never
/// contend with each other.
pub(crate) type TopicShard = Arc<RwLock<HashMap<String, Arc<Event>>>>;

/// Registry of known topics and their backing storage handles.
///
/// Invariant: a topic's shard exists iff the topic is registered. Dropping
/// the shard on unregistration discards all events stored under the topic.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: RwLock<HashMap<String, TopicShard>>,
}

impl TopicRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a topic, creating its backing storage if absent.
    ///
    /// Idempotent; returns whether a new topic was created.
    pub async fn register(&self, topic: &str) -> bool {
        let mut topics = self.topics.write().await;
        if topics.contains_key(topic) {
            return false;
        }
        topics.insert(topic.to_string(), Arc::new(RwLock::new(HashMap::new())));
        info!(topic, "topic registered");
        true
    }

    /// Unregister a topic, discarding all events stored under it.
    ///
    /// Returns whether the topic existed. Safe no-op for unknown topics.
    pub async fn unregister(&self, topic: &str) -> bool {
        let removed = self.topics.write().await.remove(topic);
        match removed {
            Some(shard) => {
                let discarded = shard.read().await.len();
                info!(topic, discarded, "topic unregistered");
                true
            }
            None => {
                debug!(topic, "unregister of unknown topic ignored");
                false
            }
        }
    }

    /// Whether a topic is registered
    pub async fn exists(&self, topic: &str) -> bool {
        self.topics.read().await.contains_key(topic)
    }

    /// All registered topic names, sorted for stable output
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up the backing shard for a topic
    pub(crate) async fn shard(&self, topic: &str) -> Option<TopicShard> {
        self.topics.read().await.get(topic).cloned()
    }
}
