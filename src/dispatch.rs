//! Notification fan-out

use crate::error::{BusError, Result};
use crate::event::{Event, EventShadow};
use crate::store::EventStore;
use crate::subscription::SubscriptionRegistry;
use crate::watcher::CompletionWatcher;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Supervision callback invoked when a listener's processing capability
/// fails before reporting.
pub type FaultHook = Arc<dyn Fn(FaultReport) + Send + Sync>;

/// Details of a listener processing fault.
///
/// The faulted listener is still in the event's pending set; it is the
/// supervisor's job to retry or to report skipped on the listener's behalf.
#[derive(Debug)]
pub struct FaultReport {
    /// Identity of the faulted listener
    pub listener_id: String,
    /// The event being processed
    pub shadow: EventShadow,
    /// The failure the listener returned
    pub error: BusError,
}

/// Orchestrates a notify call: store the event, snapshot matching
/// subscribers, register the expectation set, then fan out one independent
/// task per matched listener.
pub struct Dispatcher {
    subscriptions: Arc<SubscriptionRegistry>,
    store: Arc<EventStore>,
    watcher: Arc<CompletionWatcher>,
    fault_hook: RwLock<Option<FaultHook>>,
}

impl Dispatcher {
    /// Create a dispatcher over the given components
    pub fn new(
        subscriptions: Arc<SubscriptionRegistry>,
        store: Arc<EventStore>,
        watcher: Arc<CompletionWatcher>,
    ) -> Self {
        Self {
            subscriptions,
            store,
            watcher,
            fault_hook: RwLock::new(None),
        }
    }

    /// Install the supervision callback for listener faults
    pub async fn set_fault_hook(&self, hook: FaultHook) {
        *self.fault_hook.write().await = Some(hook);
    }

    /// Dispatch an event.
    ///
    /// Fails fast with [`BusError::InvalidTopic`] for unregistered topics.
    /// Storage happens before any task is scheduled, so a listener can
    /// always fetch the event until reclamation. Returns once all listener
    /// tasks are scheduled (never awaits their completion) with the number
    /// of listeners dispatched to.
    pub async fn notify(&self, event: Event) -> Result<usize> {
        let shadow = event.shadow();
        self.store.insert(event).await?;

        let specs = self.subscriptions.subscribers_for(&shadow.topic).await;
        if specs.is_empty() {
            debug!(event = %shadow, "no matching subscribers, nothing tracks reclamation");
            return Ok(0);
        }

        let listener_ids: HashSet<String> =
            specs.iter().map(|s| s.id().to_string()).collect();
        self.watcher
            .register_expectations(shadow.clone(), listener_ids)
            .await;

        let hook = self.fault_hook.read().await.clone();
        let dispatched = specs.len();
        for spec in specs {
            let shadow = shadow.clone();
            let config = spec.config().cloned();
            let listener = Arc::clone(spec.listener());
            let hook = hook.clone();
            tokio::spawn(async move {
                let listener_id = listener.id().to_string();
                if let Err(err) = listener.process(shadow.clone(), config).await {
                    // Not converted to completed or skipped; the listener
                    // stays pending until it or a supervisor reports.
                    error!(listener = %listener_id, event = %shadow, %err, "listener processing fault");
                    if let Some(hook) = hook {
                        hook(FaultReport {
                            listener_id,
                            shadow,
                            error: err,
                        });
                    }
                }
            });
        }

        debug!(event = %shadow, dispatched, "event dispatched");
        Ok(dispatched)
    }
}
