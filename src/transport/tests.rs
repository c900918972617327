use super::memory::{Call, MemoryTransport};
use super::{InboundHandler, LastWill, QoS, Transport, TransportError};
use crate::protocol::Properties;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(String, Vec<u8>, Option<Properties>)>>,
}

impl InboundHandler for Recorder {
    fn on_message(&self, topic: &str, payload: &[u8], properties: Option<&Properties>) {
        self.seen
            .lock()
            .push((topic.to_string(), payload.to_vec(), properties.cloned()));
    }
}

#[test]
fn test_qos_from_u8() {
    assert_eq!(QoS::try_from(0).unwrap(), QoS::AtMostOnce);
    assert_eq!(QoS::try_from(1).unwrap(), QoS::AtLeastOnce);
    assert_eq!(QoS::try_from(2).unwrap(), QoS::ExactlyOnce);
    assert!(QoS::try_from(3).is_err());
    assert_eq!(QoS::ExactlyOnce.to_string(), "2");
}

#[test]
fn test_transport_error_display() {
    let err = TransportError::new("subscribe", "not authorized");
    assert_eq!(err.to_string(), "subscribe failed: not authorized");
}

#[test]
fn test_memory_transport_records_calls() {
    let transport = MemoryTransport::new();
    transport.connect("localhost", 1883).unwrap();
    transport.subscribe("a/#", QoS::AtLeastOnce).unwrap();
    transport.publish("a/b", b"hi", QoS::AtMostOnce, true, None).unwrap();
    transport.unsubscribe("a/#").unwrap();

    assert!(transport.is_connected());
    assert_eq!(
        transport.calls(),
        vec![
            Call::Connect {
                host: "localhost".to_string(),
                port: 1883
            },
            Call::Subscribe {
                topic: "a/#".to_string(),
                qos: QoS::AtLeastOnce
            },
            Call::Publish(super::memory::Published {
                topic: "a/b".to_string(),
                payload: b"hi".to_vec(),
                qos: QoS::AtMostOnce,
                retain: true,
                properties: None,
            }),
            Call::Unsubscribe {
                topic: "a/#".to_string()
            },
        ]
    );
}

#[test]
fn test_memory_transport_injected_failure() {
    let transport = MemoryTransport::new();
    transport.fail("publish");
    let err = transport
        .publish("a", b"x", QoS::AtMostOnce, false, None)
        .unwrap_err();
    assert_eq!(err.op, "publish");

    transport.recover("publish");
    assert!(transport.publish("a", b"x", QoS::AtMostOnce, false, None).is_ok());
    // both attempts are on record
    assert_eq!(transport.published().len(), 2);
}

#[test]
fn test_memory_transport_disconnect_requires_connection() {
    let transport = MemoryTransport::new();
    assert!(transport.disconnect().is_err());
    transport.connect("localhost", 1883).unwrap();
    assert!(transport.disconnect().is_ok());
    assert!(!transport.is_connected());
}

#[test]
fn test_memory_transport_will_lifecycle() {
    let transport = MemoryTransport::new();
    let will = LastWill::new("status/dev1", b"offline".to_vec(), QoS::AtLeastOnce, true);
    transport.set_will(&will).unwrap();
    assert_eq!(transport.will(), Some(will));
    transport.clear_will();
    assert_eq!(transport.will(), None);
}

#[test]
fn test_memory_transport_deliver_reaches_handler() {
    let transport = MemoryTransport::new();
    assert!(!transport.deliver("a", b"lost", None));

    let recorder = Arc::new(Recorder::default());
    transport.set_handler(recorder.clone());

    let mut props = Properties::new();
    props.set_response_topic("r");
    assert!(transport.deliver("a/b", b"payload", Some(&props)));

    let seen = recorder.seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "a/b");
    assert_eq!(seen[0].1, b"payload");
    assert_eq!(seen[0].2.as_ref(), Some(&props));
}

#[test]
fn test_memory_transport_start_stop() {
    let transport = MemoryTransport::new();
    transport.start().unwrap();
    assert!(transport.is_running());
    transport.stop(false).unwrap();
    assert!(!transport.is_running());
}
