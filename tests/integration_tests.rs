//! Integration tests for ackbus

use ackbus::{
    async_trait, BusConfig, BusError, Event, EventBus, EventShadow, Listener, ListenerSpec,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

/// Listener that records every shadow it is handed
struct Recording {
    id: String,
    seen: Arc<Mutex<Vec<EventShadow>>>,
}

impl Recording {
    fn new(id: &str) -> (Arc<Self>, Arc<Mutex<Vec<EventShadow>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let listener = Arc::new(Self {
            id: id.to_string(),
            seen: Arc::clone(&seen),
        });
        (listener, seen)
    }
}

#[async_trait]
impl Listener for Recording {
    fn id(&self) -> &str {
        &self.id
    }

    async fn process(&self, shadow: EventShadow, _config: Option<Value>) -> ackbus::Result<()> {
        self.seen.lock().await.push(shadow);
        Ok(())
    }
}

/// Listener that fetches the payload and immediately reports completed
struct Acking {
    id: String,
    bus: Arc<EventBus>,
    payloads: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl Listener for Acking {
    fn id(&self) -> &str {
        &self.id
    }

    async fn process(&self, shadow: EventShadow, _config: Option<Value>) -> ackbus::Result<()> {
        let data = self.bus.fetch_event_data(&shadow).await?;
        self.payloads.lock().await.push(data);
        self.bus
            .mark_as_completed(&self.id, &shadow.topic, &shadow.id)
            .await;
        Ok(())
    }
}

/// Listener that never reports
struct Stuck(String);

#[async_trait]
impl Listener for Stuck {
    fn id(&self) -> &str {
        &self.0
    }

    async fn process(&self, _shadow: EventShadow, _config: Option<Value>) -> ackbus::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_topic_lifecycle() {
    let bus = EventBus::new();

    assert!(bus.register_topic("orders").await);
    assert!(bus.topic_exists("orders").await);
    assert!(!bus.register_topic("orders").await);

    assert!(bus.unregister_topic("orders").await);
    assert!(!bus.topic_exists("orders").await);

    // Never-registered topic: safe no-op
    assert!(!bus.unregister_topic("payments").await);
}

#[tokio::test]
async fn test_subscription_visibility() {
    let bus = EventBus::new();
    let (listener, _) = Recording::new("audit");
    bus.subscribe(ListenerSpec::Bare(listener), &["orders", "ship.*"])
        .await
        .unwrap();

    let matched = bus.subscribers_for("orders").await;
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].id(), "audit");
    assert_eq!(bus.subscribers_for("shipments").await.len(), 1);
    assert!(bus.subscribers_for("payments").await.is_empty());

    bus.unsubscribe("audit").await;
    assert!(bus.subscribers_for("orders").await.is_empty());
    assert!(bus.subscribers().await.is_empty());
}

#[tokio::test]
async fn test_fan_out_to_all_matching_subscribers() {
    let bus = EventBus::new();
    bus.register_topic("orders").await;

    let mut sinks = Vec::new();
    for i in 0..3 {
        let (listener, seen) = Recording::new(&format!("listener-{i}"));
        bus.subscribe(ListenerSpec::Bare(listener), &[".*"])
            .await
            .unwrap();
        sinks.push(seen);
    }

    let dispatched = bus
        .notify(Event::new("orders", "1", json!({"amount": 10})))
        .await
        .unwrap();
    assert_eq!(dispatched, 3);

    sleep(Duration::from_millis(100)).await;
    let shadow = EventShadow::new("orders", "1");
    for seen in &sinks {
        assert_eq!(*seen.lock().await, vec![shadow.clone()]);
    }

    // Fewer than N completions: the payload stays fetchable
    bus.mark_as_completed("listener-0", "orders", "1").await;
    bus.mark_as_skipped("listener-1", "orders", "1").await;
    assert_eq!(
        bus.fetch_event_data(&shadow).await.unwrap(),
        json!({"amount": 10})
    );

    // Last report reclaims the event
    bus.mark_as_completed("listener-2", "orders", "1").await;
    assert!(matches!(
        bus.fetch_event(&shadow).await.unwrap_err(),
        BusError::NotFound { .. }
    ));

    let stats = bus.statistics().await;
    assert_eq!(stats.events_published, 1);
    assert_eq!(stats.events_delivered, 3);
    assert_eq!(stats.events_completed, 2);
    assert_eq!(stats.events_skipped, 1);
    assert_eq!(stats.events_reclaimed, 1);
    assert_eq!(stats.pending_ledgers, 0);
}

#[tokio::test]
async fn test_concurrent_reports_reclaim_exactly_once() {
    let bus = Arc::new(EventBus::new());
    bus.register_topic("orders").await;

    let ids: Vec<String> = (0..8).map(|_| Uuid::new_v4().to_string()).collect();
    for id in &ids {
        let (listener, _) = Recording::new(id);
        bus.subscribe(ListenerSpec::Bare(listener), &["orders"])
            .await
            .unwrap();
    }

    bus.notify(Event::new("orders", "1", json!(null)))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for id in ids {
        let bus = Arc::clone(&bus);
        handles.push(tokio::spawn(async move {
            bus.mark_as_completed(&id, "orders", "1").await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let shadow = EventShadow::new("orders", "1");
    assert!(bus.fetch_event(&shadow).await.is_err());
    let stats = bus.statistics().await;
    assert_eq!(stats.events_reclaimed, 1);
    assert_eq!(stats.events_completed, 8);
}

#[tokio::test]
async fn test_unknown_reports_are_idempotent_noops() {
    let bus = EventBus::new();
    bus.register_topic("orders").await;
    let (listener, _) = Recording::new("a");
    bus.subscribe(ListenerSpec::Bare(listener), &["orders"])
        .await
        .unwrap();

    bus.notify(Event::new("orders", "1", json!(null)))
        .await
        .unwrap();
    bus.mark_as_completed("a", "orders", "1").await;

    // Fully acknowledged: a second report never raises and never
    // re-triggers deletion.
    bus.mark_as_completed("a", "orders", "1").await;
    // Never dispatched at all
    bus.mark_as_completed("a", "orders", "999").await;
    bus.mark_as_skipped("nobody", "orders", "1").await;

    let stats = bus.statistics().await;
    assert_eq!(stats.events_reclaimed, 1);
    assert_eq!(stats.unknown_reports, 3);
}

#[tokio::test]
async fn test_single_listener_scenario() {
    // register_topic(:orders); subscribe(ListenerA, [".*"]);
    // notify(Event{id: "1", topic: :orders, data: %{amount: 10}})
    let bus = Arc::new(EventBus::new());
    bus.register_topic("orders").await;

    let payloads = Arc::new(Mutex::new(Vec::new()));
    let listener = Arc::new(Acking {
        id: "listener-a".to_string(),
        bus: Arc::clone(&bus),
        payloads: Arc::clone(&payloads),
    });
    bus.subscribe(ListenerSpec::Bare(listener), &[".*"])
        .await
        .unwrap();

    let matched = bus.subscribers_for("orders").await;
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].id(), "listener-a");

    bus.notify(Event::new("orders", "1", json!({"amount": 10})))
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    // The listener fetched the exact stored payload and its completion
    // reclaimed the event.
    assert_eq!(*payloads.lock().await, vec![json!({"amount": 10})]);
    assert!(matches!(
        bus.fetch_event(&EventShadow::new("orders", "1")).await,
        Err(BusError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_partial_match_does_not_block_reclamation() {
    let bus = EventBus::new();
    bus.register_topic("orders").await;

    let (a, seen_a) = Recording::new("a");
    let (b, seen_b) = Recording::new("b");
    bus.subscribe(ListenerSpec::Bare(a), &["orders"]).await.unwrap();
    bus.subscribe(ListenerSpec::Bare(b), &["ship.*"]).await.unwrap();

    let dispatched = bus
        .notify(Event::new("orders", "1", json!(null)))
        .await
        .unwrap();
    assert_eq!(dispatched, 1);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(seen_a.lock().await.len(), 1);
    assert!(seen_b.lock().await.is_empty());

    // Ledger has size 1: A's report alone reclaims the event.
    bus.mark_as_completed("a", "orders", "1").await;
    assert!(bus
        .fetch_event(&EventShadow::new("orders", "1"))
        .await
        .is_err());
}

#[tokio::test]
async fn test_notify_unregistered_topic_fails() {
    let bus = EventBus::new();
    let err = bus
        .notify(Event::new("orders", "1", json!(null)))
        .await
        .unwrap_err();
    assert!(matches!(err, BusError::InvalidTopic(_)));
}

#[tokio::test]
async fn test_unregister_topic_purges_pending_ledgers() {
    let bus = EventBus::new();
    bus.register_topic("orders").await;
    let (listener, _) = Recording::new("a");
    bus.subscribe(ListenerSpec::Bare(listener), &["orders"])
        .await
        .unwrap();

    bus.notify(Event::new("orders", "1", json!(null)))
        .await
        .unwrap();
    assert_eq!(bus.statistics().await.pending_ledgers, 1);

    bus.unregister_topic("orders").await;
    assert_eq!(bus.statistics().await.pending_ledgers, 0);

    // Late report after the forced purge is absorbed.
    bus.mark_as_completed("a", "orders", "1").await;
    assert_eq!(bus.statistics().await.unknown_reports, 1);
}

#[tokio::test]
async fn test_stuck_listener_leaks_detectably() {
    let bus = EventBus::new();
    bus.register_topic("orders").await;
    bus.subscribe(
        ListenerSpec::Bare(Arc::new(Stuck("stuck".to_string()))),
        &["orders"],
    )
    .await
    .unwrap();

    bus.notify(Event::new("orders", "1", json!(null)))
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    // The listener never reports: the event never becomes unfetchable and
    // the ledger stays pending. Detectable, not a crash.
    assert!(bus
        .fetch_event(&EventShadow::new("orders", "1"))
        .await
        .is_ok());
    assert_eq!(bus.statistics().await.pending_ledgers, 1);
}

#[tokio::test]
async fn test_zero_subscriber_event_swept_by_ttl() {
    let bus = EventBus::new();
    bus.register_topic("orders").await;

    let dispatched = bus
        .notify(Event::new("orders", "1", json!(null)).with_ttl(Duration::from_millis(0)))
        .await
        .unwrap();
    assert_eq!(dispatched, 0);

    sleep(Duration::from_millis(10)).await;
    assert_eq!(bus.purge_expired().await, 1);
    assert!(bus
        .fetch_event(&EventShadow::new("orders", "1"))
        .await
        .is_err());
}

#[tokio::test]
async fn test_config_file_loading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bus.toml");
    tokio::fs::write(&path, r#"topics = ["orders", "shipments"]"#)
        .await
        .unwrap();

    let config = BusConfig::load(&path).await.unwrap();
    let bus = EventBus::with_config(config).await;
    assert_eq!(bus.topics().await, vec!["orders", "shipments"]);
}

#[tokio::test]
async fn test_configured_listener_receives_config() {
    let bus = EventBus::new();
    bus.register_topic("orders").await;

    struct ConfigCapture {
        id: String,
        captured: Arc<Mutex<Vec<Option<Value>>>>,
    }

    #[async_trait]
    impl Listener for ConfigCapture {
        fn id(&self) -> &str {
            &self.id
        }

        async fn process(&self, _shadow: EventShadow, config: Option<Value>) -> ackbus::Result<()> {
            self.captured.lock().await.push(config);
            Ok(())
        }
    }

    let captured = Arc::new(Mutex::new(Vec::new()));
    bus.subscribe(
        ListenerSpec::Configured(
            Arc::new(ConfigCapture {
                id: "configured".to_string(),
                captured: Arc::clone(&captured),
            }),
            json!({"region": "eu"}),
        ),
        &["orders"],
    )
    .await
    .unwrap();

    bus.notify(Event::new("orders", "1", json!(null)))
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    assert_eq!(*captured.lock().await, vec![Some(json!({"region": "eu"}))]);
}
