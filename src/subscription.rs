//! Listener contract and pattern-based subscription registry

use crate::error::{BusError, Result};
use crate::event::EventShadow;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// The processing capability a subscriber exposes to the bus.
///
/// Implementations receive an [`EventShadow`] rather than the full event and
/// fetch the payload on demand. After `process` begins, the listener (or a
/// supervisor retrying on its behalf) must eventually call
/// `mark_as_completed` or `mark_as_skipped` for the `(listener, topic, id)`
/// triple, from any execution context. Returning `Err` is a processing
/// fault: the bus surfaces it to the fault hook and the listener stays in
/// the event's pending set.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Stable identity of this subscriber.
    ///
    /// Identity determines subscription uniqueness and is the key used in
    /// completion reports.
    fn id(&self) -> &str;

    /// Process one dispatched event.
    ///
    /// `config` carries the subscription configuration for configured
    /// listeners and is `None` for bare ones.
    async fn process(&self, shadow: EventShadow, config: Option<Value>) -> Result<()>;
}

/// A subscriber: a bare listener, or a listener paired with configuration.
///
/// The configured form lets one implementation be registered as multiple
/// independent subscribers, provided each instance reports a distinct id.
#[derive(Clone)]
pub enum ListenerSpec {
    /// A bare processing capability
    Bare(Arc<dyn Listener>),
    /// A processing capability paired with per-subscription configuration
    Configured(Arc<dyn Listener>, Value),
}

impl ListenerSpec {
    /// The subscriber identity (the wrapped listener's id)
    pub fn id(&self) -> &str {
        self.listener().id()
    }

    /// The wrapped processing capability
    pub fn listener(&self) -> &Arc<dyn Listener> {
        match self {
            Self::Bare(listener) | Self::Configured(listener, _) => listener,
        }
    }

    /// The subscription configuration, if any
    pub fn config(&self) -> Option<&Value> {
        match self {
            Self::Bare(_) => None,
            Self::Configured(_, config) => Some(config),
        }
    }
}

impl fmt::Debug for ListenerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bare(listener) => f.debug_tuple("Bare").field(&listener.id()).finish(),
            Self::Configured(listener, config) => f
                .debug_tuple("Configured")
                .field(&listener.id())
                .field(config)
                .finish(),
        }
    }
}

/// A pattern compiled at subscribe time.
///
/// Match semantics are regex full-match: the pattern is anchored as
/// `^(?:pattern)$` so `"orders"` matches the topic `orders` but not
/// `orders_created`.
#[derive(Debug, Clone)]
struct CompiledPattern {
    raw: String,
    regex: Regex,
}

impl CompiledPattern {
    fn compile(raw: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{raw})$")).map_err(|source| {
            BusError::InvalidPattern {
                pattern: raw.to_string(),
                source,
            }
        })?;
        Ok(Self {
            raw: raw.to_string(),
            regex,
        })
    }

    fn matches(&self, topic: &str) -> bool {
        self.regex.is_match(topic)
    }
}

/// One subscription entry: a spec plus its compiled patterns
#[derive(Clone)]
struct Subscription {
    spec: ListenerSpec,
    patterns: Vec<CompiledPattern>,
}

impl Subscription {
    fn matches(&self, topic: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(topic))
    }
}

#[derive(Default)]
struct RegistryInner {
    /// Subscriptions in insertion order
    entries: Vec<Subscription>,
    /// Per-topic match results, invalidated on any mutation
    match_cache: HashMap<String, Vec<ListenerSpec>>,
}

/// Registry of listener subscriptions with regex topic matching.
///
/// `subscribers_for` is deterministic and order-stable for a fixed registry
/// state: results follow subscribe-call insertion order, and an upsert keeps
/// the listener's original position.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: RwLock<RegistryInner>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a listener spec under the given patterns.
    ///
    /// Upserts by listener identity: an existing subscription has its spec
    /// and patterns replaced (not merged) and keeps its insertion position.
    pub async fn subscribe(&self, spec: ListenerSpec, patterns: &[&str]) -> Result<()> {
        let compiled = patterns
            .iter()
            .map(|p| CompiledPattern::compile(p))
            .collect::<Result<Vec<_>>>()?;

        let mut inner = self.inner.write().await;
        let subscription = Subscription {
            spec,
            patterns: compiled,
        };
        let id = subscription.spec.id().to_string();
        match inner.entries.iter().position(|s| s.spec.id() == id) {
            Some(pos) => {
                inner.entries[pos] = subscription;
                info!(listener = %id, ?patterns, "subscription replaced");
            }
            None => {
                inner.entries.push(subscription);
                info!(listener = %id, ?patterns, "subscribed");
            }
        }
        inner.match_cache.clear();
        Ok(())
    }

    /// Remove all pattern entries for a listener identity.
    ///
    /// Returns whether a subscription was removed; no-op for unknown ids.
    pub async fn unsubscribe(&self, listener_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner.entries.retain(|s| s.spec.id() != listener_id);
        let removed = inner.entries.len() < before;
        if removed {
            inner.match_cache.clear();
            info!(listener = listener_id, "unsubscribed");
        } else {
            debug!(listener = listener_id, "unsubscribe of unknown listener ignored");
        }
        removed
    }

    /// The raw pattern strings registered for a listener, if subscribed
    pub async fn patterns_of(&self, listener_id: &str) -> Option<Vec<String>> {
        self.inner
            .read()
            .await
            .entries
            .iter()
            .find(|s| s.spec.id() == listener_id)
            .map(|s| s.patterns.iter().map(|p| p.raw.clone()).collect())
    }

    /// All subscribed specs in insertion order
    pub async fn subscribers(&self) -> Vec<ListenerSpec> {
        self.inner
            .read()
            .await
            .entries
            .iter()
            .map(|s| s.spec.clone())
            .collect()
    }

    /// Specs whose patterns match the given topic, in insertion order.
    ///
    /// Match results are cached per topic until the next mutation.
    pub async fn subscribers_for(&self, topic: &str) -> Vec<ListenerSpec> {
        {
            let inner = self.inner.read().await;
            if let Some(cached) = inner.match_cache.get(topic) {
                return cached.clone();
            }
        }

        let mut inner = self.inner.write().await;
        if let Some(cached) = inner.match_cache.get(topic) {
            return cached.clone();
        }
        let matched: Vec<ListenerSpec> = inner
            .entries
            .iter()
            .filter(|s| s.matches(topic))
            .map(|s| s.spec.clone())
            .collect();
        inner
            .match_cache
            .insert(topic.to_string(), matched.clone());
        matched
    }

    /// Number of subscriptions
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
