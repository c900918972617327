use super::registry::{Callback, Iteration, Registry};
use super::topic::{is_valid_filter, is_valid_topic, matches};
use super::{Dispatcher, Message, SubscriptionId, UserData};
use crate::protocol::{Properties, SEQUENCE_NUM_KEY};
use crate::transport::QoS;
use crate::utils::Error;
use parking_lot::Mutex;
use std::sync::Arc;

fn callback<F>(f: F) -> Callback
where
    F: Fn(&Message, &str, &[u8], Option<&UserData>) + Send + Sync + 'static,
{
    Arc::new(f)
}

fn noop() -> Callback {
    callback(|_, _, _, _| {})
}

fn recording(log: &Arc<Mutex<Vec<String>>>, name: &str) -> Callback {
    let log = log.clone();
    let name = name.to_string();
    callback(move |_, _, _, _| log.lock().push(name.clone()))
}

#[test]
fn test_topic_matching_wildcards() {
    assert!(matches("a/+/c", "a/b/c").unwrap());
    assert!(matches("a/#", "a/b/c").unwrap());
    assert!(!matches("a/+", "a/b/c").unwrap());
    assert!(matches("a/#", "a").unwrap());
    assert!(matches("#", "a/b").unwrap());
    assert!(matches("+/+", "a/b").unwrap());
    assert!(!matches("+", "a/b").unwrap());
    assert!(!matches("a/b", "a/c").unwrap());
    assert!(matches("a//c", "a//c").unwrap());
    assert!(matches("a/+/c", "a//c").unwrap());
}

#[test]
fn test_topic_matching_system_topics() {
    assert!(!matches("#", "$SYS/broker").unwrap());
    assert!(!matches("+/broker", "$SYS/broker").unwrap());
    assert!(matches("$SYS/#", "$SYS/broker").unwrap());
}

#[test]
fn test_topic_matching_rejects_invalid_input() {
    assert!(matches!(matches("a/#/c", "a/b/c"), Err(Error::Protocol(_))));
    assert!(matches!(matches("a/b+", "a/b"), Err(Error::Protocol(_))));
    assert!(matches!(matches("", "a"), Err(Error::Protocol(_))));
    assert!(matches!(matches("a/+", "a/+"), Err(Error::Protocol(_))));
    assert!(matches!(matches("a", ""), Err(Error::Protocol(_))));
}

#[test]
fn test_filter_and_topic_validation() {
    assert!(is_valid_filter("sensors/+/temp"));
    assert!(is_valid_filter("#"));
    assert!(!is_valid_filter("sensors/#/temp"));
    assert!(!is_valid_filter("sensors/temp#"));
    assert!(is_valid_topic("sensors/1/temp"));
    assert!(!is_valid_topic("sensors/+"));
}

#[test]
fn test_registry_insert_preserves_order_and_duplicates() {
    let mut registry = Registry::new();
    let a = registry.insert("a/#", QoS::AtMostOnce, noop(), None);
    let b = registry.insert("a/#", QoS::AtLeastOnce, noop(), None);
    assert_ne!(a, b);
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.topics(), vec!["a/#".to_string(), "a/#".to_string()]);
    assert_eq!(registry.iter().map(|s| s.id).collect::<Vec<_>>(), vec![a, b]);
}

#[test]
fn test_registry_remove_unknown_leaves_registry_unchanged() {
    let mut registry = Registry::new();
    let a = registry.insert("a", QoS::AtMostOnce, noop(), None);
    assert!(registry.remove(a).is_some());
    assert!(registry.remove(a).is_none());
    assert!(registry.is_empty());
}

#[test]
fn test_registry_remove_under_cursor_marks_advanced() {
    let registry = std::cell::RefCell::new(Registry::new());
    let ids: Vec<SubscriptionId> = (0..3)
        .map(|_| registry.borrow_mut().insert("t", QoS::AtMostOnce, noop(), None))
        .collect();

    let iteration = Iteration::begin(&registry);
    assert_eq!(iteration.current().unwrap().id, ids[0]);
    iteration.advance();
    assert_eq!(iteration.current().unwrap().id, ids[1]);

    // remove the entry under the cursor: the next one slides in
    registry.borrow_mut().remove(ids[1]);
    assert_eq!(iteration.current().unwrap().id, ids[2]);
    iteration.advance();
    assert_eq!(iteration.current().unwrap().id, ids[2]);
    iteration.advance();
    assert!(iteration.current().is_none());

    drop(iteration);
    assert_eq!(registry.borrow().active_iterations(), 0);
}

#[test]
fn test_registry_remove_before_cursor_shifts_it() {
    let registry = std::cell::RefCell::new(Registry::new());
    let ids: Vec<SubscriptionId> = (0..3)
        .map(|_| registry.borrow_mut().insert("t", QoS::AtMostOnce, noop(), None))
        .collect();

    let iteration = Iteration::begin(&registry);
    iteration.advance();
    iteration.advance();
    assert_eq!(iteration.current().unwrap().id, ids[2]);

    registry.borrow_mut().remove(ids[0]);
    assert_eq!(iteration.current().unwrap().id, ids[2]);
}

#[test]
fn test_dispatch_invokes_each_match_once_in_order() {
    let registry = Registry::shared();
    let log = Arc::new(Mutex::new(Vec::new()));
    {
        let guard = registry.lock();
        let mut reg = guard.borrow_mut();
        reg.insert("a/+/c", QoS::AtMostOnce, recording(&log, "plus"), None);
        reg.insert("x/y", QoS::AtMostOnce, recording(&log, "other"), None);
        reg.insert("a/#", QoS::AtMostOnce, recording(&log, "hash"), None);
        reg.insert("a/b/c", QoS::AtMostOnce, recording(&log, "exact"), None);
    }

    let dispatcher = Dispatcher::new(registry);
    assert_eq!(dispatcher.dispatch("a/b/c", b"p", None).unwrap(), 3);
    assert_eq!(*log.lock(), vec!["plus", "hash", "exact"]);
}

#[test]
fn test_dispatch_passes_decoded_message_and_raw_payload() {
    let registry = Registry::shared();
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    registry.lock().borrow_mut().insert(
        "req/#",
        QoS::AtMostOnce,
        callback(move |msg, topic, payload, _| {
            *sink.lock() = Some((msg.clone(), topic.to_string(), payload.to_vec()));
        }),
        None,
    );

    let mut props = Properties::new();
    props
        .set_response_topic("resp/1")
        .set_correlation_data(b"id-9".to_vec())
        .add_user_property(SEQUENCE_NUM_KEY, "oops");
    Dispatcher::new(registry)
        .dispatch("req/x", b"\x00\x01body", Some(&props))
        .unwrap();

    let (msg, topic, payload) = seen.lock().clone().expect("callback ran");
    assert_eq!(topic, "req/x");
    assert_eq!(payload, b"\x00\x01body");
    assert_eq!(msg.response_topic.as_deref(), Some("resp/1"));
    assert_eq!(msg.correlation(), b"id-9");
    assert_eq!(msg.sequence, 0);
}

#[test]
fn test_dispatch_aborts_on_matcher_error() {
    let registry = Registry::shared();
    let log = Arc::new(Mutex::new(Vec::new()));
    {
        let guard = registry.lock();
        let mut reg = guard.borrow_mut();
        reg.insert("a", QoS::AtMostOnce, recording(&log, "first"), None);
        reg.insert("a/#/bad", QoS::AtMostOnce, recording(&log, "bad"), None);
        reg.insert("a", QoS::AtMostOnce, recording(&log, "third"), None);
    }

    let result = Dispatcher::new(registry.clone()).dispatch("a", b"", None);
    assert!(matches!(result, Err(Error::Protocol(_))));
    assert_eq!(*log.lock(), vec!["first"]);
    assert_eq!(registry.lock().borrow().active_iterations(), 0);
}

#[test]
fn test_dispatch_with_no_subscribers() {
    let dispatcher = Dispatcher::new(Registry::shared());
    assert_eq!(dispatcher.dispatch("a/b", b"x", None).unwrap(), 0);
}
