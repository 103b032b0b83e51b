//! # ackbus
//!
//! A completion-tracked in-process event bus. Topics accept events,
//! subscribers register interest via regex patterns, and every matched
//! subscriber processes each event independently and reports completed or
//! skipped. The bus tracks, per event, which subscribers have finished and
//! reclaims event storage once all expected subscribers have reported.
//!
//! ## Features
//!
//! - **Regex topic matching**: patterns are compiled once at subscribe time
//! - **Fire-and-forget dispatch**: one concurrent task per matched listener,
//!   `notify` returns as soon as tasks are scheduled
//! - **Completion-driven reclamation**: events are deleted exactly once,
//!   when the last expected listener reports
//! - **At-least-once contract**: duplicate and late reports are absorbed
//! - **Async/await**: built on tokio
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use ackbus::{async_trait, Event, EventBus, EventShadow, Listener, ListenerSpec};
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! struct OrderLogger;
//!
//! #[async_trait]
//! impl Listener for OrderLogger {
//!     fn id(&self) -> &str {
//!         "order-logger"
//!     }
//!
//!     async fn process(&self, shadow: EventShadow, _config: Option<Value>) -> ackbus::Result<()> {
//!         println!("processing {shadow}");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> ackbus::Result<()> {
//!     let bus = EventBus::new();
//!     bus.register_topic("orders").await;
//!     bus.subscribe(ListenerSpec::Bare(Arc::new(OrderLogger)), &["orders", "order_.*"])
//!         .await?;
//!
//!     // Stored, then fanned out to every matching subscriber.
//!     bus.notify(Event::new("orders", "1", json!({"amount": 10}))).await?;
//!
//!     // Each listener reports when it is done; the last report reclaims
//!     // the stored event.
//!     bus.mark_as_completed("order-logger", "orders", "1").await;
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod store;
pub mod subscription;
pub mod topic;
pub mod watcher;

// Re-export main types for convenience
pub use async_trait::async_trait;
pub use bus::{BusConfig, BusStatistics, EventBus};
pub use dispatch::{Dispatcher, FaultHook, FaultReport};
pub use error::{BusError, Result};
pub use event::{Event, EventShadow};
pub use store::EventStore;
pub use subscription::{Listener, ListenerSpec, SubscriptionRegistry};
pub use topic::TopicRegistry;
pub use watcher::{CompletionWatcher, Outcome, RecordOutcome};
