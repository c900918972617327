//! End-to-end request/reply between two clients joined by a tiny in-process
//! "broker" that forwards every publish to each client's transport.

use std::sync::Arc;

use parking_lot::Mutex;
use replymq::transport::MemoryTransport;
use replymq::transport::memory::Published;
use replymq::{Client, Message, QoS};

fn pump(from: &Client<MemoryTransport>, seen: &mut usize, to: &[&Client<MemoryTransport>]) {
    let published: Vec<Published> = from.transport().published();
    for p in &published[*seen..] {
        for client in to {
            client.transport().redeliver(p);
        }
    }
    *seen = published.len();
}

#[test]
fn multi_part_reply_reaches_requester_in_order() {
    let responder = Arc::new(Client::new("responder", MemoryTransport::new()));
    let requester = Client::new("requester", MemoryTransport::new());

    let weak = Arc::downgrade(&responder);
    responder
        .subscribe(
            "svc/upper",
            move |msg, _, payload, _| {
                let Some(client) = weak.upgrade() else { return };
                let text = String::from_utf8_lossy(payload).to_uppercase();
                let words: Vec<&str> = text.split(' ').collect();
                for (i, word) in words.iter().enumerate() {
                    let part = msg
                        .clone()
                        .with_sequence(i as i32 + 1)
                        .with_end_sequence(i + 1 == words.len());
                    client
                        .send_reply(&part, word.as_bytes(), QoS::AtLeastOnce, false)
                        .unwrap();
                }
            },
            None,
            QoS::AtLeastOnce,
        )
        .unwrap();

    let parts: Arc<Mutex<Vec<(Message, String)>>> = Arc::default();
    let sink = parts.clone();
    requester
        .subscribe(
            "svc/upper/reply/#",
            move |msg, _, payload, _| {
                sink.lock()
                    .push((msg.clone(), String::from_utf8_lossy(payload).into_owned()))
            },
            None,
            QoS::AtLeastOnce,
        )
        .unwrap();

    requester
        .publish_with_reply(
            "svc/upper",
            b"hello reply world",
            QoS::AtLeastOnce,
            false,
            "svc/upper/reply/requester",
            b"req-77",
        )
        .unwrap();

    let (mut from_requester, mut from_responder) = (0, 0);
    pump(&requester, &mut from_requester, &[&*responder]);
    pump(&responder, &mut from_responder, &[&requester]);

    let parts = parts.lock();
    let words: Vec<&str> = parts.iter().map(|(_, w)| w.as_str()).collect();
    assert_eq!(words, vec!["HELLO", "REPLY", "WORLD"]);
    let sequences: Vec<(i32, bool)> = parts
        .iter()
        .map(|(m, _)| (m.sequence, m.is_end_sequence))
        .collect();
    assert_eq!(sequences, vec![(1, false), (2, false), (3, true)]);
    assert!(parts.iter().all(|(m, _)| m.correlation() == b"req-77"));
}

#[test]
fn plain_publish_carries_no_reply_metadata() {
    let publisher = Client::new("pub", MemoryTransport::new());
    let subscriber = Client::new("sub", MemoryTransport::new());

    let got: Arc<Mutex<Option<Message>>> = Arc::default();
    let sink = got.clone();
    subscriber
        .subscribe(
            "sensors/+/temp",
            move |msg, _, _, _| *sink.lock() = Some(msg.clone()),
            None,
            QoS::AtMostOnce,
        )
        .unwrap();

    publisher
        .publish("sensors/kitchen/temp", b"21.5", QoS::AtMostOnce, false)
        .unwrap();
    let mut seen = 0;
    pump(&publisher, &mut seen, &[&subscriber]);

    let msg = got.lock().clone().expect("delivered");
    assert_eq!(msg.topic, "sensors/kitchen/temp");
    assert!(!msg.expects_reply());
    assert_eq!(msg.correlation, None);
}
