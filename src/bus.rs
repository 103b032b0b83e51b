//! Bus facade wiring the engine components together

use crate::dispatch::{Dispatcher, FaultHook};
use crate::error::{BusError, Result};
use crate::event::{Event, EventShadow};
use crate::store::EventStore;
use crate::subscription::{ListenerSpec, SubscriptionRegistry};
use crate::topic::TopicRegistry;
use crate::watcher::{CompletionWatcher, Outcome, RecordOutcome};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::info;

/// Static bus configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusConfig {
    /// Topics registered at construction time
    #[serde(default)]
    pub topics: Vec<String>,
}

impl BusConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BusError::configuration(e.to_string()))
    }

    /// Load a configuration from a TOML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&content)
    }
}

/// Counters describing bus activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusStatistics {
    /// Events accepted by `notify`
    pub events_published: u64,
    /// Listener tasks scheduled across all notifies
    pub events_delivered: u64,
    /// Completed reports recorded
    pub events_completed: u64,
    /// Skipped reports recorded
    pub events_skipped: u64,
    /// Events reclaimed after their last report
    pub events_reclaimed: u64,
    /// Late or duplicate reports absorbed
    pub unknown_reports: u64,
    /// Currently registered topics
    pub active_topics: usize,
    /// Currently registered subscribers
    pub active_subscribers: usize,
    /// Events with a pending ledger
    pub pending_ledgers: usize,
}

/// The event bus: topic registry, subscription registry, event store,
/// notification dispatcher, and completion watcher behind one surface.
///
/// This facade only shapes arguments and forwards to the components; the
/// delivery and reclamation logic lives in them.
pub struct EventBus {
    topics: Arc<TopicRegistry>,
    subscriptions: Arc<SubscriptionRegistry>,
    store: Arc<EventStore>,
    watcher: Arc<CompletionWatcher>,
    dispatcher: Dispatcher,
    stats: Mutex<BusStatistics>,
}

impl EventBus {
    /// Create a bus with no topics registered
    pub fn new() -> Self {
        let topics = Arc::new(TopicRegistry::new());
        let subscriptions = Arc::new(SubscriptionRegistry::new());
        let store = Arc::new(EventStore::new(Arc::clone(&topics)));
        let watcher = Arc::new(CompletionWatcher::new(Arc::clone(&store)));
        let dispatcher = Dispatcher::new(
            Arc::clone(&subscriptions),
            Arc::clone(&store),
            Arc::clone(&watcher),
        );
        Self {
            topics,
            subscriptions,
            store,
            watcher,
            dispatcher,
            stats: Mutex::new(BusStatistics::default()),
        }
    }

    /// Create a bus and register the configured topics
    pub async fn with_config(config: BusConfig) -> Self {
        let bus = Self::new();
        for topic in &config.topics {
            bus.topics.register(topic).await;
        }
        info!(topics = config.topics.len(), "event bus configured");
        bus
    }

    /// Install the supervision callback for listener processing faults
    pub async fn set_fault_hook(&self, hook: FaultHook) {
        self.dispatcher.set_fault_hook(hook).await;
    }

    /// Register a topic; returns whether a new topic was created
    pub async fn register_topic(&self, topic: &str) -> bool {
        self.topics.register(topic).await
    }

    /// Unregister a topic, discarding its stored events and force-purging
    /// any pending ledgers referencing it.
    ///
    /// Returns whether the topic existed.
    pub async fn unregister_topic(&self, topic: &str) -> bool {
        // Purge ledgers first so no report can race a half-removed topic
        // into a store delete on a fresh re-registration.
        self.watcher.purge_topic(topic).await;
        self.topics.unregister(topic).await
    }

    /// Whether a topic is registered
    pub async fn topic_exists(&self, topic: &str) -> bool {
        self.topics.exists(topic).await
    }

    /// All registered topics
    pub async fn topics(&self) -> Vec<String> {
        self.topics.list().await
    }

    /// Subscribe a listener spec under the given regex patterns
    pub async fn subscribe(&self, spec: ListenerSpec, patterns: &[&str]) -> Result<()> {
        self.subscriptions.subscribe(spec, patterns).await
    }

    /// Remove a listener's subscription; no-op for unknown ids
    pub async fn unsubscribe(&self, listener_id: &str) -> bool {
        self.subscriptions.unsubscribe(listener_id).await
    }

    /// All subscribers in insertion order
    pub async fn subscribers(&self) -> Vec<ListenerSpec> {
        self.subscriptions.subscribers().await
    }

    /// Subscribers whose patterns match the topic, in insertion order
    pub async fn subscribers_for(&self, topic: &str) -> Vec<ListenerSpec> {
        self.subscriptions.subscribers_for(topic).await
    }

    /// Dispatch an event to all matching subscribers.
    ///
    /// Returns the number of listeners dispatched to, without waiting for
    /// any of them.
    pub async fn notify(&self, event: Event) -> Result<usize> {
        let dispatched = self.dispatcher.notify(event).await?;
        let mut stats = self.stats.lock().await;
        stats.events_published += 1;
        stats.events_delivered += dispatched as u64;
        Ok(dispatched)
    }

    /// Fetch the event a shadow references
    pub async fn fetch_event(&self, shadow: &EventShadow) -> Result<Arc<Event>> {
        self.store.fetch(shadow).await
    }

    /// Fetch only the payload the shadow references
    pub async fn fetch_event_data(&self, shadow: &EventShadow) -> Result<serde_json::Value> {
        self.store.fetch_data(shadow).await
    }

    /// Report that a listener finished processing an event
    pub async fn mark_as_completed(&self, listener_id: &str, topic: &str, id: &str) {
        self.record(listener_id, topic, id, Outcome::Completed).await;
    }

    /// Report that a listener skipped an event
    pub async fn mark_as_skipped(&self, listener_id: &str, topic: &str, id: &str) {
        self.record(listener_id, topic, id, Outcome::Skipped).await;
    }

    async fn record(&self, listener_id: &str, topic: &str, id: &str, outcome: Outcome) {
        let shadow = EventShadow::new(topic, id);
        let result = self.watcher.record(listener_id, &shadow, outcome).await;
        let mut stats = self.stats.lock().await;
        match result {
            RecordOutcome::Unknown => stats.unknown_reports += 1,
            RecordOutcome::Recorded | RecordOutcome::Reclaimed => {
                match outcome {
                    Outcome::Completed => stats.events_completed += 1,
                    Outcome::Skipped => stats.events_skipped += 1,
                }
                if result == RecordOutcome::Reclaimed {
                    stats.events_reclaimed += 1;
                }
            }
        }
    }

    /// Delete stored events whose TTL elapsed and that no ledger tracks.
    ///
    /// Covers events dispatched with zero matching subscribers; events with
    /// a pending ledger are left for watcher-driven reclamation. Returns the
    /// number of events swept.
    pub async fn purge_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut swept = 0;
        for shadow in self.store.expired(now).await {
            if self.watcher.has_pending(&shadow).await {
                continue;
            }
            if self.store.delete(&shadow).await {
                swept += 1;
            }
        }
        if swept > 0 {
            info!(swept, "expired events purged");
        }
        swept
    }

    /// Current bus statistics
    pub async fn statistics(&self) -> BusStatistics {
        let mut stats = self.stats.lock().await.clone();
        stats.active_topics = self.topics.list().await.len();
        stats.active_subscribers = self.subscriptions.len().await;
        stats.pending_ledgers = self.watcher.pending_count().await;
        stats
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_toml() {
        let config = BusConfig::from_toml_str(r#"topics = ["orders", "shipments"]"#).unwrap();
        assert_eq!(config.topics, vec!["orders", "shipments"]);

        let empty = BusConfig::from_toml_str("").unwrap();
        assert!(empty.topics.is_empty());

        assert!(BusConfig::from_toml_str("topics = 3").is_err());
    }

    #[tokio::test]
    async fn test_with_config_registers_topics() {
        let config = BusConfig {
            topics: vec!["orders".to_string(), "shipments".to_string()],
        };
        let bus = EventBus::with_config(config).await;
        assert!(bus.topic_exists("orders").await);
        assert!(bus.topic_exists("shipments").await);
        assert_eq!(bus.statistics().await.active_topics, 2);
    }
}
