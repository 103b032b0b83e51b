//! Completion tracking and storage reclamation

use crate::event::EventShadow;
use crate::store::EventStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Terminal per-listener outcome of processing one event.
///
/// Both outcomes count as "done" for reclamation; the distinction is kept
/// only for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The listener processed the event
    Completed,
    /// The listener declined the event
    Skipped,
}

/// What a completion report did to the event's ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The listener was removed from the pending set
    Recorded,
    /// The report emptied the pending set and the event was reclaimed
    Reclaimed,
    /// The report referenced no pending entry (late, duplicate, or
    /// never-dispatched) and was absorbed
    Unknown,
}

/// Tracks, per in-flight event, the set of listeners still expected to
/// report, and deletes the stored event once that set empties.
///
/// Ledgers are created as a snapshot at dispatch time; subscription changes
/// never touch an event already in flight. All set mutation and the
/// empties-and-deletes transition happen under one mutex, so the reclamation
/// fires exactly once even under simultaneous reports.
pub struct CompletionWatcher {
    store: Arc<EventStore>,
    ledgers: Mutex<HashMap<EventShadow, HashSet<String>>>,
}

impl CompletionWatcher {
    /// Create a watcher that reclaims storage from the given store
    pub fn new(store: Arc<EventStore>) -> Self {
        Self {
            store,
            ledgers: Mutex::new(HashMap::new()),
        }
    }

    /// Create the pending ledger for a dispatched event.
    ///
    /// An empty listener set creates no ledger (the event is then only
    /// eligible for TTL-based cleanup). Returns whether a ledger was
    /// created. Re-dispatching a key with a live ledger replaces it.
    pub async fn register_expectations(
        &self,
        shadow: EventShadow,
        listener_ids: HashSet<String>,
    ) -> bool {
        if listener_ids.is_empty() {
            debug!(event = %shadow, "no expectations to register");
            return false;
        }
        let mut ledgers = self.ledgers.lock().await;
        if ledgers.insert(shadow.clone(), listener_ids).is_some() {
            warn!(event = %shadow, "pending ledger replaced by re-dispatch");
        } else {
            debug!(event = %shadow, "expectations registered");
        }
        true
    }

    /// Record a completion or skip report for `(listener, event)`.
    ///
    /// Unknown reports are absorbed: reports are at-least-once on the
    /// listener side, so duplicates and post-purge stragglers are expected.
    /// When the report empties the pending set, the ledger is dropped and
    /// the stored event deleted.
    pub async fn record(
        &self,
        listener_id: &str,
        shadow: &EventShadow,
        outcome: Outcome,
    ) -> RecordOutcome {
        let emptied = {
            let mut ledgers = self.ledgers.lock().await;
            let Some(pending) = ledgers.get_mut(shadow) else {
                debug!(listener = listener_id, event = %shadow, "report for unknown event ignored");
                return RecordOutcome::Unknown;
            };
            if !pending.remove(listener_id) {
                debug!(listener = listener_id, event = %shadow, "duplicate report ignored");
                return RecordOutcome::Unknown;
            }
            debug!(listener = listener_id, event = %shadow, ?outcome, "report recorded");
            if pending.is_empty() {
                ledgers.remove(shadow);
                true
            } else {
                false
            }
        };

        if emptied {
            self.store.delete(shadow).await;
            info!(event = %shadow, "all listeners reported, event reclaimed");
            RecordOutcome::Reclaimed
        } else {
            RecordOutcome::Recorded
        }
    }

    /// Drop every ledger referencing the given topic.
    ///
    /// Used by topic unregistration: pending events are treated as fully
    /// acknowledged so nothing leaks; later reports for them become unknown
    /// no-ops. Returns the number of ledgers dropped.
    pub async fn purge_topic(&self, topic: &str) -> usize {
        let mut ledgers = self.ledgers.lock().await;
        let before = ledgers.len();
        ledgers.retain(|shadow, _| shadow.topic != topic);
        let purged = before - ledgers.len();
        if purged > 0 {
            info!(topic, purged, "pending ledgers force-purged");
        }
        purged
    }

    /// Whether an event still has a pending ledger
    pub async fn has_pending(&self, shadow: &EventShadow) -> bool {
        self.ledgers.lock().await.contains_key(shadow)
    }

    /// The listeners still expected to report for an event, if any
    pub async fn pending(&self, shadow: &EventShadow) -> Option<HashSet<String>> {
        self.ledgers.lock().await.get(shadow).cloned()
    }

    /// Number of events with a pending ledger
    pub async fn pending_count(&self) -> usize {
        self.ledgers.lock().await.len()
    }
}
