//! Event payload storage keyed by `(topic, id)`

use crate::error::{BusError, Result};
use crate::event::{Event, EventShadow};
use crate::topic::TopicRegistry;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Event storage layered over the topic registry's per-topic shards.
///
/// Operations on distinct topics take distinct locks; operations on the same
/// key are linearized by the topic shard's `RwLock`.
pub struct EventStore {
    registry: Arc<TopicRegistry>,
}

impl EventStore {
    /// Create a store backed by the given topic registry
    pub fn new(registry: Arc<TopicRegistry>) -> Self {
        Self { registry }
    }

    /// Store an event under `(topic, id)`.
    ///
    /// Fails with [`BusError::InvalidTopic`] if the topic is not registered.
    /// Overwriting an existing key replaces the prior payload; id uniqueness
    /// is the caller's responsibility.
    pub async fn insert(&self, event: Event) -> Result<()> {
        let shard = self
            .registry
            .shard(&event.topic)
            .await
            .ok_or_else(|| BusError::invalid_topic(&event.topic))?;
        let shadow = event.shadow();
        let replaced = shard
            .write()
            .await
            .insert(event.id.clone(), Arc::new(event));
        if replaced.is_some() {
            debug!(event = %shadow, "stored event replaced existing payload");
        } else {
            debug!(event = %shadow, "event stored");
        }
        Ok(())
    }

    /// Fetch the event referenced by a shadow.
    ///
    /// Fails with [`BusError::NotFound`] if the event was never stored,
    /// already reclaimed, or its topic unregistered.
    pub async fn fetch(&self, shadow: &EventShadow) -> Result<Arc<Event>> {
        let shard = self
            .registry
            .shard(&shadow.topic)
            .await
            .ok_or_else(|| BusError::not_found(&shadow.topic, &shadow.id))?;
        let event = shard.read().await.get(&shadow.id).cloned();
        event.ok_or_else(|| BusError::not_found(&shadow.topic, &shadow.id))
    }

    /// Fetch only the payload of the referenced event
    pub async fn fetch_data(&self, shadow: &EventShadow) -> Result<serde_json::Value> {
        Ok(self.fetch(shadow).await?.data.clone())
    }

    /// Delete the event referenced by a shadow.
    ///
    /// Idempotent; returns whether an event was actually removed.
    pub async fn delete(&self, shadow: &EventShadow) -> bool {
        let Some(shard) = self.registry.shard(&shadow.topic).await else {
            return false;
        };
        let removed = shard.write().await.remove(&shadow.id).is_some();
        if removed {
            debug!(event = %shadow, "event deleted");
        }
        removed
    }

    /// Shadows of stored events whose TTL has elapsed at `now`.
    ///
    /// Used by the TTL sweep for events that were never tracked by the
    /// watcher (dispatched with zero matching subscribers).
    pub async fn expired(&self, now: SystemTime) -> Vec<EventShadow> {
        let mut shadows = Vec::new();
        for topic in self.registry.list().await {
            let Some(shard) = self.registry.shard(&topic).await else {
                continue;
            };
            let guard = shard.read().await;
            shadows.extend(
                guard
                    .values()
                    .filter(|e| e.expired_at(now))
                    .map(|e| e.shadow()),
            );
        }
        shadows
    }
}
