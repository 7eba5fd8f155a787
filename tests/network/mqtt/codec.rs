use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use libmqtt::network::application::mqtt::codec::{self, MAX_REMAINING_LENGTH};
use libmqtt::network::application::mqtt::frame::FrameBuffer;
use libmqtt::network::application::mqtt::{MalformedPacket, Packet, Publish, QoS};

fn random_topic(rng: &mut StdRng) -> String {
    let levels = rng.gen_range(1..5);
    (0..levels)
        .map(|_| {
            let len = rng.gen_range(0..8);
            (0..len)
                .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn random_publish(rng: &mut StdRng) -> Publish {
    let mut payload = vec![0u8; rng.gen_range(0..600)];
    rng.fill(&mut payload[..]);
    let qos = match rng.gen_range(0..3) {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    };
    Publish {
        dup: rng.r#gen(),
        qos,
        retain: rng.r#gen(),
        topic: random_topic(rng),
        packet_id: (qos != QoS::AtMostOnce).then(|| rng.gen_range(1..=u16::MAX)),
        payload,
    }
}

#[test]
fn test_random_publishes_survive_arbitrary_chunking() {
    let mut rng = StdRng::seed_from_u64(0x6d71_7474);
    let messages: Vec<Publish> = (0..200).map(|_| random_publish(&mut rng)).collect();
    let stream: Vec<u8> = messages.iter().flat_map(codec::encode_publish).collect();

    let mut frames = FrameBuffer::new();
    let mut decoded = Vec::new();
    let mut rest = &stream[..];
    while !rest.is_empty() {
        let take = rng.gen_range(1..=rest.len().min(97));
        frames.extend(&rest[..take]);
        rest = &rest[take..];
        while let Some(frame) = frames.next_frame().unwrap() {
            match codec::decode(&frame).unwrap() {
                Packet::Publish(publish) => decoded.push(publish),
                other => panic!("unexpected {}", other.name()),
            }
        }
    }
    assert!(frames.is_empty());
    assert_eq!(decoded, messages);
}

#[test]
fn test_remaining_length_matches_encoded_size() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..100 {
        let publish = random_publish(&mut rng);
        let encoded = codec::encode_publish(&publish);
        let (remaining, consumed) = codec::decode_remaining_length(&encoded[1..])
            .unwrap()
            .unwrap();
        assert_eq!(encoded.len(), 1 + consumed + remaining);
        assert_eq!(
            remaining,
            codec::publish_remaining_length(publish.topic.len(), publish.qos, publish.payload.len())
        );
    }
}

#[test]
fn test_random_lengths_round_trip_through_varint() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..1_000 {
        let len = rng.gen_range(0..=MAX_REMAINING_LENGTH);
        let encoded = codec::encode_remaining_length(len);
        assert_eq!(
            codec::decode_remaining_length(&encoded),
            Ok(Some((len, encoded.len())))
        );
    }
}

#[test]
fn test_truncated_publish_never_panics() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..100 {
        let encoded = codec::encode_publish(&random_publish(&mut rng));
        let cut = rng.gen_range(0..encoded.len());
        match codec::decode(&encoded[..cut]) {
            Err(
                MalformedPacket::Incomplete { .. }
                | MalformedPacket::TooShort { .. }
                | MalformedPacket::TopicLengthOverflow { .. }
                | MalformedPacket::MissingPacketId,
            ) => {}
            other => panic!("truncated at {cut} of {}: {other:?}", encoded.len()),
        }
    }
}
