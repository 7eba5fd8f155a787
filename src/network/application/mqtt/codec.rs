//! Bit-exact translation between [`Packet`] values and wire bytes.
//!
//! Encoding functions never fail: their inputs are structured values that the
//! [`Client`](super::Client) has already validated (topic lengths fit in a
//! `u16`, the remaining length fits in four bytes). Decoding functions check
//! every length before indexing and report a [`MalformedPacket`] instead.
//!
//! ```rust
//! use libmqtt::network::application::mqtt::{codec, Publish};
//!
//! let bytes = codec::encode_publish(&Publish::new("test/a", b"hi".to_vec()));
//! assert_eq!(bytes[0], 0x30);
//! let decoded = codec::decode_publish(&bytes).unwrap();
//! assert_eq!(decoded.topic, "test/a");
//! assert_eq!(decoded.payload, b"hi");
//! ```

use heapless::Vec as HVec;

use super::error::MalformedPacket;
use super::packet::{
    CONNACK, CONNECT, Connack, Connect, DISCONNECT, PINGREQ, PINGRESP, PUBACK, PUBLISH, Packet,
    Publish, QoS, SUBACK, SUBSCRIBE, Suback, Subscribe, SubscribeFilter,
};

/// Largest value the four-byte remaining length can express (2^28 - 1).
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// A complete PINGREQ packet.
pub const PINGREQ_PACKET: [u8; 2] = [PINGREQ, 0x00];
/// A complete PINGRESP packet.
pub const PINGRESP_PACKET: [u8; 2] = [PINGRESP, 0x00];
/// A complete DISCONNECT packet.
pub const DISCONNECT_PACKET: [u8; 2] = [DISCONNECT, 0x00];

type DecodeResult<T> = Result<T, MalformedPacket>;

/// Encode the remaining length field for an MQTT packet.
///
/// Each byte carries seven bits of the value, least significant group first;
/// the high bit is set when another byte follows. Values up to
/// [`MAX_REMAINING_LENGTH`] need at most four bytes. Larger values are clamped,
/// callers check sizes before encoding.
pub fn encode_remaining_length(len: usize) -> HVec<u8, 4> {
    debug_assert!(len <= MAX_REMAINING_LENGTH);
    let mut len = len.min(MAX_REMAINING_LENGTH);
    let mut out = HVec::new();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        // Four bytes always suffice for a clamped length.
        let _ = out.push(byte);
        if len == 0 {
            break;
        }
    }
    out
}

/// Decode a remaining length field from the start of `buf`.
///
/// Returns `Ok(Some((value, bytes_consumed)))` on success and `Ok(None)` when
/// `buf` ends before the last length byte. A fourth byte with its
/// continuation bit set is [`MalformedPacket::RemainingLengthOverflow`].
pub fn decode_remaining_length(buf: &[u8]) -> DecodeResult<Option<(usize, usize)>> {
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for (i, &byte) in buf.iter().enumerate() {
        value += (byte & 0x7F) as usize * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
        if i == 3 {
            return Err(MalformedPacket::RemainingLengthOverflow);
        }
        multiplier *= 128;
    }
    Ok(None)
}

/// Size of the remaining length of a PUBLISH with these parts.
pub fn publish_remaining_length(topic_len: usize, qos: QoS, payload_len: usize) -> usize {
    let packet_id = if qos == QoS::AtMostOnce { 0 } else { 2 };
    2 + topic_len + packet_id + payload_len
}

/// Size of the remaining length of a SUBSCRIBE carrying `filters`.
pub fn subscribe_remaining_length<'a>(filters: impl IntoIterator<Item = &'a str>) -> usize {
    filters
        .into_iter()
        .fold(2, |size, filter| size + 2 + filter.len() + 1)
}

/// Encode any packet.
pub fn encode(packet: &Packet) -> Vec<u8> {
    match packet {
        Packet::Connect(connect) => encode_connect(connect),
        Packet::Connack(connack) => encode_connack(connack).to_vec(),
        Packet::Publish(publish) => encode_publish(publish),
        Packet::Puback { packet_id } => encode_puback(*packet_id).to_vec(),
        Packet::Subscribe(subscribe) => encode_subscribe(subscribe),
        Packet::Suback(suback) => encode_suback(suback),
        Packet::Pingreq => PINGREQ_PACKET.to_vec(),
        Packet::Pingresp => PINGRESP_PACKET.to_vec(),
        Packet::Disconnect => DISCONNECT_PACKET.to_vec(),
    }
}

/// Encode a CONNECT packet.
///
/// Only the clean-session flag is ever set; no will, username or password.
pub fn encode_connect(connect: &Connect) -> Vec<u8> {
    // --- Variable Header ---
    let mut body = Vec::with_capacity(12 + connect.client_id.len());
    put_str(&mut body, &connect.protocol_name);
    body.push(connect.protocol_level);
    let mut connect_flags = 0;
    if connect.clean_session {
        connect_flags |= 0x02;
    }
    body.push(connect_flags);
    body.extend_from_slice(&connect.keep_alive.to_be_bytes());

    // --- Payload ---
    put_str(&mut body, &connect.client_id);

    frame(CONNECT, &body)
}

/// Encode a CONNACK packet.
pub fn encode_connack(connack: &Connack) -> [u8; 4] {
    [
        CONNACK,
        0x02,
        u8::from(connack.session_present),
        connack.return_code.code(),
    ]
}

/// Encode a PUBLISH packet.
///
/// The packet identifier is written only for QoS 1 and 2; the payload follows
/// the variable header without a length prefix.
pub fn encode_publish(publish: &Publish) -> Vec<u8> {
    let mut first = PUBLISH;
    if publish.dup {
        first |= 0x08;
    }
    first |= (publish.qos as u8) << 1;
    if publish.retain {
        first |= 0x01;
    }

    let mut body = Vec::with_capacity(publish_remaining_length(
        publish.topic.len(),
        publish.qos,
        publish.payload.len(),
    ));
    put_str(&mut body, &publish.topic);
    if publish.qos != QoS::AtMostOnce {
        body.extend_from_slice(&publish.packet_id.unwrap_or_default().to_be_bytes());
    }
    body.extend_from_slice(&publish.payload);

    frame(first, &body)
}

/// Encode a PUBACK packet.
pub fn encode_puback(packet_id: u16) -> [u8; 4] {
    let [hi, lo] = packet_id.to_be_bytes();
    [PUBACK, 0x02, hi, lo]
}

/// Encode a SUBSCRIBE packet.
pub fn encode_subscribe(subscribe: &Subscribe) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&subscribe.packet_id.to_be_bytes());
    for entry in &subscribe.filters {
        put_str(&mut body, &entry.filter);
        body.push(entry.qos as u8);
    }
    frame(SUBSCRIBE, &body)
}

/// Encode a SUBACK packet.
pub fn encode_suback(suback: &Suback) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + suback.return_codes.len());
    body.extend_from_slice(&suback.packet_id.to_be_bytes());
    body.extend_from_slice(&suback.return_codes);
    frame(SUBACK, &body)
}

/// Decode one complete packet.
///
/// `buf` must start at a fixed header; bytes beyond the declared remaining
/// length are ignored.
pub fn decode(buf: &[u8]) -> DecodeResult<Packet> {
    let Some(&first) = buf.first() else {
        return Err(MalformedPacket::TooShort {
            minimum: 2,
            actual: 0,
        });
    };
    match first & 0xF0 {
        CONNECT => decode_connect(buf).map(Packet::Connect),
        CONNACK => decode_connack(buf).map(Packet::Connack),
        PUBLISH => decode_publish(buf).map(Packet::Publish),
        PUBACK => decode_puback(buf).map(|packet_id| Packet::Puback { packet_id }),
        0x80 => decode_subscribe(buf).map(Packet::Subscribe),
        SUBACK => decode_suback(buf).map(Packet::Suback),
        PINGREQ => decode_empty(buf, PINGREQ).map(|()| Packet::Pingreq),
        PINGRESP => decode_empty(buf, PINGRESP).map(|()| Packet::Pingresp),
        DISCONNECT => decode_empty(buf, DISCONNECT).map(|()| Packet::Disconnect),
        _ => Err(MalformedPacket::UnexpectedPacketType(first)),
    }
}

/// Decode a CONNECT packet.
///
/// Will, username and password fields, when flagged, are left unparsed.
pub fn decode_connect(buf: &[u8]) -> DecodeResult<Connect> {
    let (first, body) = split_frame(buf)?;
    expect_header(CONNECT, first)?;
    let mut cursor = Cursor::new(body);
    let protocol_name = cursor.str()?.to_string();
    let protocol_level = cursor.u8()?;
    let flags = cursor.u8()?;
    let keep_alive = cursor.u16()?;
    let client_id = cursor.str()?.to_string();
    Ok(Connect {
        protocol_name,
        protocol_level,
        clean_session: flags & 0x02 != 0,
        keep_alive,
        client_id,
    })
}

/// Decode a CONNACK packet.
pub fn decode_connack(buf: &[u8]) -> DecodeResult<Connack> {
    let (first, body) = split_frame(buf)?;
    expect_header(CONNACK, first)?;
    if body.len() != 2 {
        return Err(MalformedPacket::InvalidRemainingLength {
            expected: 2,
            actual: body.len(),
        });
    }
    Ok(Connack {
        session_present: body[0] & 0x01 != 0,
        return_code: body[1].into(),
    })
}

/// Decode a PUBLISH packet.
///
/// All bytes after the topic (and packet identifier, for QoS above 0) up to
/// the declared remaining length are the payload.
pub fn decode_publish(buf: &[u8]) -> DecodeResult<Publish> {
    let (first, body) = split_frame(buf)?;
    if first & 0xF0 != PUBLISH {
        return Err(MalformedPacket::InvalidHeader {
            expected: PUBLISH,
            actual: first,
        });
    }
    let flags = first & 0x0F;
    let qos_bits = (flags >> 1) & 0x03;
    let qos = QoS::try_from(qos_bits).map_err(MalformedPacket::InvalidQoS)?;

    let mut cursor = Cursor::new(body);
    let topic = cursor.str()?.to_string();
    let packet_id = if qos == QoS::AtMostOnce {
        None
    } else {
        Some(cursor.u16().map_err(|_| MalformedPacket::MissingPacketId)?)
    };

    Ok(Publish {
        dup: flags & 0x08 != 0,
        qos,
        retain: flags & 0x01 != 0,
        topic,
        packet_id,
        payload: cursor.rest().to_vec(),
    })
}

/// Decode a PUBACK packet, returning its packet identifier.
pub fn decode_puback(buf: &[u8]) -> DecodeResult<u16> {
    let (first, body) = split_frame(buf)?;
    expect_header(PUBACK, first)?;
    if body.len() != 2 {
        return Err(MalformedPacket::InvalidRemainingLength {
            expected: 2,
            actual: body.len(),
        });
    }
    Ok(u16::from_be_bytes([body[0], body[1]]))
}

/// Decode a SUBSCRIBE packet.
pub fn decode_subscribe(buf: &[u8]) -> DecodeResult<Subscribe> {
    let (first, body) = split_frame(buf)?;
    expect_header(SUBSCRIBE, first)?;
    let mut cursor = Cursor::new(body);
    let packet_id = cursor.u16()?;
    let mut filters = Vec::new();
    while !cursor.is_empty() {
        let filter = cursor.str()?.to_string();
        let requested = cursor.u8()?;
        let qos = QoS::try_from(requested).map_err(MalformedPacket::InvalidQoS)?;
        filters.push(SubscribeFilter { filter, qos });
    }
    Ok(Subscribe { packet_id, filters })
}

/// Decode a SUBACK packet.
///
/// Every byte after the packet identifier is one return code, in the order the
/// filters were requested.
pub fn decode_suback(buf: &[u8]) -> DecodeResult<Suback> {
    if buf.len() < 4 {
        return Err(MalformedPacket::TooShort {
            minimum: 4,
            actual: buf.len(),
        });
    }
    expect_header(SUBACK, buf[0])?;
    let (_, body) = split_frame(buf)?;
    let mut cursor = Cursor::new(body);
    let packet_id = cursor.u16()?;
    Ok(Suback {
        packet_id,
        return_codes: cursor.rest().to_vec(),
    })
}

fn decode_empty(buf: &[u8], header: u8) -> DecodeResult<()> {
    let (first, body) = split_frame(buf)?;
    expect_header(header, first)?;
    if !body.is_empty() {
        return Err(MalformedPacket::InvalidRemainingLength {
            expected: 0,
            actual: body.len(),
        });
    }
    Ok(())
}

/// Split a buffer into its first byte and the `remaining length` bytes after
/// the fixed header.
fn split_frame(buf: &[u8]) -> DecodeResult<(u8, &[u8])> {
    let Some((&first, rest)) = buf.split_first() else {
        return Err(MalformedPacket::TooShort {
            minimum: 2,
            actual: 0,
        });
    };
    let Some((remaining, consumed)) = decode_remaining_length(rest)? else {
        return Err(MalformedPacket::TooShort {
            minimum: buf.len() + 1,
            actual: buf.len(),
        });
    };
    let available = rest.len() - consumed;
    if available < remaining {
        return Err(MalformedPacket::Incomplete {
            expected: remaining,
            actual: available,
        });
    }
    Ok((first, &rest[consumed..consumed + remaining]))
}

fn expect_header(expected: u8, actual: u8) -> DecodeResult<()> {
    if actual != expected {
        return Err(MalformedPacket::InvalidHeader { expected, actual });
    }
    Ok(())
}

fn put_str(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value.as_bytes());
}

fn frame(first: u8, body: &[u8]) -> Vec<u8> {
    let length = encode_remaining_length(body.len());
    let mut out = Vec::with_capacity(1 + length.len() + body.len());
    out.push(first);
    out.extend_from_slice(&length);
    out.extend_from_slice(body);
    out
}

/// Bounds-checked reader over a packet body.
struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize) -> DecodeResult<&'a [u8]> {
        if self.buf.len() < n {
            return Err(MalformedPacket::TooShort {
                minimum: n,
                actual: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> DecodeResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> DecodeResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn str(&mut self) -> DecodeResult<&'a str> {
        let len = self.u16()? as usize;
        if len > self.buf.len() {
            return Err(MalformedPacket::TopicLengthOverflow {
                declared: len,
                available: self.buf.len(),
            });
        }
        let bytes = self.take(len)?;
        core::str::from_utf8(bytes).map_err(|_| MalformedPacket::InvalidUtf8)
    }

    fn rest(self) -> &'a [u8] {
        self.buf
    }
}
