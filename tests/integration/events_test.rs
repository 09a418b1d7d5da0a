//! Integration tests for event bus fan-out, one-shot listeners, and bridges.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

use siteplug_core::error::AppError;
use siteplug_plugin::events::bus::EventBus;

use crate::helpers;

fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    (count.clone(), count)
}

#[test]
fn test_emit_without_listeners_returns_empty() {
    let bus = EventBus::new(10);
    let results = bus.emit("nobody:listens", json!({ "x": 1 }));
    assert!(results.is_empty());
    assert_eq!(bus.history_for("nobody:listens").len(), 1);
}

#[test]
fn test_once_listener_fires_exactly_once() {
    let bus = EventBus::new(100);
    let (count, seen) = counter();
    bus.subscribe_once("page:view", move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    });

    for round in 0..5 {
        bus.emit("page:view", json!({ "round": round }));
    }
    bus.subscribe("page:view", |_| Ok(Value::Null));
    bus.emit("page:view", Value::Null);

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(bus.listener_count("page:view"), 1);
}

#[test]
fn test_failing_listener_does_not_stop_fan_out() {
    let bus = EventBus::new(10);
    bus.subscribe("order", |_| Err(AppError::internal("listener exploded")));
    bus.subscribe("order", |data| Ok(json!({ "echo": data.clone() })));

    let results = bus.emit("order", json!(7));

    assert_eq!(results, vec![json!({ "echo": 7 })]);
    assert_eq!(bus.status().listener_errors, 1);
}

#[test]
fn test_wildcard_listener_sees_every_event() {
    let bus = EventBus::new(10);
    let names = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = names.clone();
    bus.subscribe_any(move |event| {
        sink.lock().push(format!("{}@{}", event.event_type, event.source));
        Ok(Value::Null)
    });

    bus.emit("first", Value::Null);
    bus.emit_from("analytics", "second", Value::Null);

    assert_eq!(
        *names.lock(),
        vec!["first@system".to_string(), "second@analytics".to_string()]
    );
}

#[test]
fn test_listener_added_during_dispatch_waits_for_next_emit() {
    let bus = Arc::new(EventBus::new(10));
    let (late_count, late_seen) = counter();
    let inner_bus = bus.clone();
    bus.subscribe_once("grow", move |_| {
        let seen = late_seen.clone();
        inner_bus.subscribe("grow", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        });
        Ok(Value::Null)
    });

    bus.emit("grow", Value::Null);
    assert_eq!(late_count.load(Ordering::SeqCst), 0);

    bus.emit("grow", Value::Null);
    assert_eq!(late_count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let bus = EventBus::new(10);
    let (count, seen) = counter();
    let id = bus.subscribe("tick", move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    });

    bus.emit("tick", Value::Null);
    assert!(bus.unsubscribe("tick", id));
    assert!(!bus.unsubscribe("tick", id));
    bus.emit("tick", Value::Null);

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_history_is_bounded() {
    let bus = EventBus::new(3);
    for i in 0..10 {
        bus.emit("counted", json!(i));
    }
    let history = bus.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].data, json!(7));
    assert_eq!(bus.status().emitted_total, 10);
}

#[tokio::test]
async fn test_event_hook_bridge_forwards_payload() {
    let manager = helpers::manager();
    let received = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = received.clone();
    manager
        .hooks()
        .add_action("page:refresh", "test", 10, move |args| {
            sink.lock().extend_from_slice(args);
            Ok(())
        });

    manager.create_event_hook_bridge("page:view", "page:refresh");
    manager.bus().emit("page:view", json!({ "path": "/pricing" }));

    assert_eq!(*received.lock(), vec![json!({ "path": "/pricing" })]);
}
