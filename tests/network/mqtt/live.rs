//! Tests against a real broker. Run with `--ignored`; the broker address is
//! taken from `TEST_MQTT_ADDRESS` (a `.env` file works too).

use std::env;
use std::time::Duration;

use dotenvy::dotenv;

use super::client;

fn broker_address() -> String {
    dotenv().ok();
    env::var("TEST_MQTT_ADDRESS").unwrap_or("test.mosquitto.org:1883".to_string())
}

#[test]
#[ignore = "needs a reachable MQTT broker"]
fn test_connect_to_public_broker() {
    let mut client = client(&broker_address(), "libmqtt-test-client-12345");
    client.connect().expect("Failed to connect");
    assert!(client.is_connected());
    client.disconnect().expect("Failed to disconnect");
}

#[test]
#[ignore = "needs a reachable MQTT broker"]
fn test_publish_and_subscribe() {
    let mut client = client(&broker_address(), "libmqtt-test-client-67890");
    let (tx, rx) = crossbeam_channel::unbounded();
    client.set_message_handler(move |topic, payload| {
        let _ = tx.send((topic.to_owned(), payload.to_vec()));
    });
    client.connect().expect("Failed to connect");

    let topic = "libmqtt/test-topic";
    client.subscribe(topic).expect("Failed to subscribe");
    client.publish(topic, b"hello world").expect("Failed to publish");

    let (received_topic, payload) = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("Failed to receive");
    assert_eq!(received_topic, topic);
    assert_eq!(payload, b"hello world");
    client.disconnect().expect("Failed to disconnect");
}
