use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;
use libmqtt::network::application::mqtt::codec::{encode_publish, encode_suback};
use libmqtt::network::application::mqtt::{
    Client, ConnectionStatus, Error, FailureReason, Options, Packet, Publish, QoS, Suback,
};

use super::{CLIENT_TIMEOUT, client, client_with, test_options};
use crate::support::{
    Peer, capture_logs, logged, spawn_broker, spawn_broker_sessions, wait_for_log,
};

type Message = (String, Vec<u8>);

fn collect_messages(client: &Client) -> Receiver<Message> {
    let (tx, rx) = crossbeam_channel::unbounded();
    client.set_message_handler(move |topic, payload| {
        let _ = tx.send((topic.to_owned(), payload.to_vec()));
    });
    rx
}

fn next_message(messages: &Receiver<Message>) -> Message {
    messages
        .recv_timeout(CLIENT_TIMEOUT)
        .expect("message delivered to handler")
}

fn grant_subscription(peer: &mut Peer) {
    match peer.read_packet_skipping_pings() {
        Packet::Subscribe(subscribe) => peer.send(&encode_suback(&Suback {
            packet_id: subscribe.packet_id,
            return_codes: vec![0; subscribe.filters.len()],
        })),
        other => panic!("expected SUBSCRIBE, got {}", other.name()),
    }
}

#[test]
fn test_messages_dispatched_in_arrival_order() {
    let (address, broker) = spawn_broker(|peer| {
        peer.accept();
        grant_subscription(peer);

        // Three packets in one segment, then one split across many.
        let mut burst = Vec::new();
        for i in 0..3 {
            burst.extend(encode_publish(&Publish::new("test/seq", i.to_string())));
        }
        peer.send(&burst);
        for byte in encode_publish(&Publish::new("test/seq", "3")) {
            peer.send(&[byte]);
            thread::sleep(Duration::from_millis(2));
        }
        // Not covered by any subscription, still delivered.
        peer.send(&encode_publish(&Publish::new("other/topic", "4")));
        peer.wait_for_disconnect()
    });

    let mut client = client(&address, "ordered");
    let messages = collect_messages(&client);
    client.connect().expect("Failed to connect");
    client.subscribe("test/#").expect("Failed to subscribe");

    for i in 0..4 {
        let (topic, payload) = next_message(&messages);
        assert_eq!(topic, "test/seq");
        assert_eq!(payload, i.to_string().into_bytes());
    }
    assert_eq!(
        next_message(&messages),
        ("other/topic".to_string(), b"4".to_vec())
    );

    client.disconnect().expect("Failed to disconnect");
    assert!(broker.join().unwrap());
}

#[test]
fn test_large_payload_reassembled() {
    let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    let expected = payload.clone();
    let (address, broker) = spawn_broker(move |peer| {
        peer.accept();
        peer.send(&encode_publish(&Publish::new("bulk/data", payload)));
        peer.wait_for_disconnect()
    });

    let mut client = client(&address, "bulk");
    let messages = collect_messages(&client);
    client.connect().expect("Failed to connect");
    let (topic, received) = next_message(&messages);
    assert_eq!(topic, "bulk/data");
    assert_eq!(received, expected);
    client.disconnect().expect("Failed to disconnect");
    assert!(broker.join().unwrap());
}

#[test]
fn test_malformed_packets_are_skipped() {
    let (address, broker) = spawn_broker(|peer| {
        peer.accept();
        // Topic length runs past the end of the packet.
        peer.send(&[0x30, 0x03, 0x00, 0x05, b'a']);
        // Reserved control type.
        peer.send(&[0xF0, 0x00]);
        peer.send(&encode_publish(&Publish::new("test/ok", "fine")));
        peer.wait_for_disconnect()
    });

    let mut client = client(&address, "tolerant");
    let messages = collect_messages(&client);
    client.connect().expect("Failed to connect");
    assert_eq!(
        next_message(&messages),
        ("test/ok".to_string(), b"fine".to_vec())
    );
    assert!(client.is_connected());
    client.disconnect().expect("Failed to disconnect");
    assert!(broker.join().unwrap());
}

#[test]
fn test_qos1_message_is_acknowledged() {
    let (address, broker) = spawn_broker(|peer| {
        peer.accept();
        let publish = Publish {
            qos: QoS::AtLeastOnce,
            packet_id: Some(7),
            ..Publish::new("test/q", "x")
        };
        peer.send(&encode_publish(&publish));
        let ack = peer.read_frame();
        peer.wait_for_disconnect();
        ack
    });

    let mut client = client(&address, "acker");
    let messages = collect_messages(&client);
    client.connect().expect("Failed to connect");
    assert_eq!(next_message(&messages), ("test/q".to_string(), b"x".to_vec()));
    // The PUBACK follows the handler; give the broker time to read it.
    thread::sleep(Duration::from_millis(50));
    client.disconnect().expect("Failed to disconnect");
    assert_eq!(&broker.join().unwrap()[..], &[0x40, 0x02, 0x00, 0x07]);
}

#[test]
fn test_messages_without_handler_are_logged() {
    capture_logs();
    let (address, broker) = spawn_broker(|peer| {
        peer.accept();
        peer.send(&encode_publish(&Publish::new("test/unhandled", "only logged")));
        peer.wait_for_disconnect()
    });

    let mut client = client(&address, "no-handler");
    client.set_message_handler(|_, _| panic!("handler was cleared"));
    client.clear_message_handler();
    client.connect().expect("Failed to connect");
    assert!(wait_for_log(
        "INFO received message on topic test/unhandled: only logged"
    ));
    assert!(!logged("handler panicked on topic test/unhandled"));
    assert!(client.is_connected());
    client.disconnect().expect("Failed to disconnect");
    assert!(broker.join().unwrap());
}

#[test]
fn test_queued_messages_delivered_after_peer_close() {
    const COUNT: usize = 20;
    let (address, broker) = spawn_broker(|peer| {
        peer.accept();
        let mut burst = Vec::new();
        for i in 0..COUNT {
            burst.extend(encode_publish(&Publish::new("test/burst", i.to_string())));
        }
        peer.send(&burst);
        // Dropping the peer closes the stream right behind the burst.
    });

    let mut client = client(&address, "burst");
    let (tx, delivered) = crossbeam_channel::unbounded();
    client.set_message_handler(move |_, payload| {
        thread::sleep(Duration::from_millis(5));
        let _ = tx.send(payload.to_vec());
    });
    client.connect().expect("Failed to connect");
    broker.join().unwrap();

    let signal = client.shutdown_signal().unwrap();
    assert!(signal.wait_timeout(CLIENT_TIMEOUT));
    for i in 0..COUNT {
        let payload = delivered
            .recv_timeout(CLIENT_TIMEOUT)
            .expect("queued message delivered");
        assert_eq!(payload, i.to_string().into_bytes());
    }
    assert_eq!(client.last_failure(), Some(FailureReason::PeerClosed));
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
}

#[test]
fn test_bounded_queue_applies_backpressure_without_loss() {
    const COUNT: usize = 50;
    let (address, broker) = spawn_broker(|peer| {
        peer.accept();
        let mut burst = Vec::new();
        for i in 0..COUNT {
            burst.extend(encode_publish(&Publish::new("test/flood", i.to_string())));
        }
        peer.send(&burst);
        peer.wait_for_disconnect()
    });

    let options = Options {
        queue_capacity: 2,
        ..test_options()
    };
    let mut client = client_with(&address, "slow-consumer", options);
    let (tx, messages) = crossbeam_channel::unbounded();
    client.set_message_handler(move |_, payload| {
        thread::sleep(Duration::from_millis(2));
        let _ = tx.send(String::from_utf8_lossy(payload).into_owned());
    });
    client.connect().expect("Failed to connect");

    for i in 0..COUNT {
        let payload = messages
            .recv_timeout(CLIENT_TIMEOUT)
            .expect("message delivered to handler");
        assert_eq!(payload, i.to_string());
    }
    client.disconnect().expect("Failed to disconnect");
    assert!(broker.join().unwrap());
}

#[test]
fn test_panicking_handler_does_not_stop_dispatch() {
    let (address, broker) = spawn_broker(|peer| {
        peer.accept();
        peer.send(&encode_publish(&Publish::new("test/boom", "")));
        peer.send(&encode_publish(&Publish::new("test/fine", "ok")));
        peer.wait_for_disconnect()
    });

    let mut client = client(&address, "resilient");
    let (tx, messages) = crossbeam_channel::unbounded();
    client.set_message_handler(move |topic, _| {
        if topic == "test/boom" {
            panic!("handler failure");
        }
        let _ = tx.send(topic.to_owned());
    });
    client.connect().expect("Failed to connect");
    assert_eq!(
        messages.recv_timeout(CLIENT_TIMEOUT).unwrap(),
        "test/fine"
    );
    client.disconnect().expect("Failed to disconnect");
    assert!(broker.join().unwrap());
}

#[test]
fn test_keepalive_sends_pingreq() {
    let (pinged_tx, pinged) = crossbeam_channel::bounded(1);
    let (address, broker) = spawn_broker(move |peer| {
        peer.accept();
        for _ in 0..2 {
            assert_eq!(peer.read_packet(), Packet::Pingreq);
            peer.send(&[0xD0, 0x00]);
        }
        pinged_tx.send(()).unwrap();
        peer.wait_for_disconnect()
    });

    let options = Options {
        ping_interval_ms: 50,
        ..test_options()
    };
    let mut client = client_with(&address, "pinger", options);
    client.connect().expect("Failed to connect");
    pinged
        .recv_timeout(CLIENT_TIMEOUT)
        .expect("two PINGREQs sent");
    assert!(client.is_connected());
    client.disconnect().expect("Failed to disconnect");
    assert!(broker.join().unwrap());
}

#[test]
fn test_pingresp_keeps_idle_connection_alive() {
    let (address, broker) = spawn_broker(|peer| {
        peer.accept();
        peer.wait_for_disconnect()
    });

    // Pings every 50ms, each answered, well inside a 300ms read timeout.
    let options = Options {
        ping_interval_ms: 50,
        read_timeout_ms: 300,
        ..test_options()
    };
    let mut client = client_with(&address, "idle-but-alive", options);
    client.connect().expect("Failed to connect");
    thread::sleep(Duration::from_millis(700));
    assert!(client.is_connected());
    assert_eq!(client.last_failure(), None);
    client.disconnect().expect("Failed to disconnect");
    assert!(broker.join().unwrap());
}

#[test]
fn test_read_timeout_tears_down_connection() {
    let (address, broker) = spawn_broker(|peer| {
        peer.accept();
        peer.wait_for_disconnect()
    });

    let options = Options {
        read_timeout_ms: 200,
        ..test_options()
    };
    let mut client = client_with(&address, "silent-broker", options);
    client.connect().expect("Failed to connect");
    let signal = client.shutdown_signal().unwrap();
    assert!(signal.wait_timeout(CLIENT_TIMEOUT), "shutdown fired");

    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert_eq!(client.last_failure(), Some(FailureReason::ReadTimeout));
    assert!(matches!(client.publish("a", b"x"), Err(Error::NotConnected)));
    assert!(matches!(client.subscribe("a"), Err(Error::NotConnected)));
    assert!(matches!(client.disconnect(), Err(Error::NotConnected)));

    // The transport was closed without a DISCONNECT.
    assert!(!broker.join().unwrap());
}

#[test]
fn test_peer_close_then_reconnect() {
    let (address, broker) = spawn_broker_sessions(2, |peers| {
        let mut first = peers.next().unwrap();
        first.accept();
        drop(first);

        let mut second = peers.next().unwrap();
        second.accept();
        second.wait_for_disconnect()
    });

    let mut client = client(&address, "phoenix");
    client.connect().expect("Failed to connect");
    let signal = client.shutdown_signal().unwrap();
    signal.wait();
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert_eq!(client.last_failure(), Some(FailureReason::PeerClosed));

    client.connect().expect("Failed to reconnect");
    assert!(client.is_connected());
    assert_eq!(client.last_failure(), None);
    let fresh = client.shutdown_signal().unwrap();
    assert!(!fresh.is_triggered());
    client.disconnect().expect("Failed to disconnect");
    assert!(fresh.is_triggered());
    assert!(broker.join().unwrap());
}

#[test]
fn test_publish_from_many_threads() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 25;
    let (address, broker) = spawn_broker(|peer| {
        peer.accept();
        let mut topics = Vec::new();
        while let Packet::Publish(publish) = peer.read_packet() {
            topics.push(publish.topic);
        }
        topics
    });

    let mut client = client(&address, "fan-in");
    client.connect().expect("Failed to connect");
    thread::scope(|scope| {
        for t in 0..THREADS {
            let client = &client;
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    client
                        .publish(&format!("thread/{t}/{i}"), b"payload")
                        .expect("Failed to publish");
                }
            });
        }
    });
    client.disconnect().expect("Failed to disconnect");

    let topics = broker.join().unwrap();
    assert_eq!(topics.len(), THREADS * PER_THREAD);
    for t in 0..THREADS {
        let own: Vec<_> = topics
            .iter()
            .filter(|topic| topic.starts_with(&format!("thread/{t}/")))
            .cloned()
            .collect();
        let expected: Vec<_> = (0..PER_THREAD).map(|i| format!("thread/{t}/{i}")).collect();
        assert_eq!(own, expected);
    }
}
