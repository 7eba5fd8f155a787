//! MQTT 3.1.1 control packet values.
//!
//! Each variant carries exactly the fields needed for its wire encoding. The
//! translation to and from bytes lives in [`codec`](super::codec).

use core::fmt;

// MQTT Control Packet types - these are the fixed header first-byte values
/// MQTT CONNECT packet type identifier.
pub const CONNECT: u8 = 0x10;
/// MQTT CONNACK packet type identifier.
pub const CONNACK: u8 = 0x20;
/// MQTT PUBLISH packet type identifier (flags live in the low nibble).
pub const PUBLISH: u8 = 0x30;
/// MQTT PUBACK packet type identifier.
pub const PUBACK: u8 = 0x40;
/// MQTT SUBSCRIBE packet type identifier, including its mandatory `0b0010` flags.
pub const SUBSCRIBE: u8 = 0x82;
/// MQTT SUBACK packet type identifier.
pub const SUBACK: u8 = 0x90;
/// MQTT PINGREQ packet type identifier.
pub const PINGREQ: u8 = 0xC0;
/// MQTT PINGRESP packet type identifier.
pub const PINGRESP: u8 = 0xD0;
/// MQTT DISCONNECT packet type identifier.
pub const DISCONNECT: u8 = 0xE0;

/// Protocol name carried in CONNECT.
pub const PROTOCOL_NAME: &str = "MQTT";
/// MQTT protocol level for version 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;

/// Quality of Service levels for MQTT messages.
///
/// ```rust
/// use libmqtt::network::application::mqtt::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::try_from(1), Ok(QoS::AtLeastOnce));
/// assert!(QoS::try_from(3).is_err());
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, PartialOrd, Ord, Hash)]
pub enum QoS {
    /// **QoS 0**: At most once delivery ("publish and hope").
    #[default]
    AtMostOnce = 0,
    /// **QoS 1**: At least once delivery, acknowledged with PUBACK.
    AtLeastOnce = 1,
    /// **QoS 2**: Exactly once delivery.
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(other),
        }
    }
}

/// CONNECT: opens an MQTT session.
///
/// Username, password and will fields are not supported.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Connect {
    /// Protocol name, `"MQTT"` for 3.1.1.
    pub protocol_name: String,
    /// Protocol level, `4` for 3.1.1.
    pub protocol_level: u8,
    /// Ask the broker to discard any previous session state.
    pub clean_session: bool,
    /// Keep-alive interval in seconds; `0` disables it.
    pub keep_alive: u16,
    /// The client identifier.
    pub client_id: String,
}

impl Connect {
    /// A 3.1.1 CONNECT for `client_id`.
    pub fn new(client_id: impl Into<String>, keep_alive: u16, clean_session: bool) -> Self {
        Self {
            protocol_name: PROTOCOL_NAME.to_string(),
            protocol_level: PROTOCOL_LEVEL,
            clean_session,
            keep_alive,
            client_id: client_id.into(),
        }
    }
}

/// CONNECT return codes carried in CONNACK.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectReturnCode {
    /// Connection accepted.
    Accepted,
    /// The broker does not support the requested protocol level.
    UnacceptableProtocolVersion,
    /// The client identifier is well formed but not allowed.
    IdentifierRejected,
    /// The MQTT service is unavailable.
    ServerUnavailable,
    /// The data in the user name or password is malformed.
    BadUserNameOrPassword,
    /// The client is not authorized to connect.
    NotAuthorized,
    /// A code outside the range defined by MQTT 3.1.1.
    Unknown(u8),
}

impl ConnectReturnCode {
    /// The raw code as sent on the wire.
    pub fn code(self) -> u8 {
        match self {
            ConnectReturnCode::Accepted => 0,
            ConnectReturnCode::UnacceptableProtocolVersion => 1,
            ConnectReturnCode::IdentifierRejected => 2,
            ConnectReturnCode::ServerUnavailable => 3,
            ConnectReturnCode::BadUserNameOrPassword => 4,
            ConnectReturnCode::NotAuthorized => 5,
            ConnectReturnCode::Unknown(code) => code,
        }
    }
}

impl From<u8> for ConnectReturnCode {
    fn from(code: u8) -> Self {
        match code {
            0 => ConnectReturnCode::Accepted,
            1 => ConnectReturnCode::UnacceptableProtocolVersion,
            2 => ConnectReturnCode::IdentifierRejected,
            3 => ConnectReturnCode::ServerUnavailable,
            4 => ConnectReturnCode::BadUserNameOrPassword,
            5 => ConnectReturnCode::NotAuthorized,
            other => ConnectReturnCode::Unknown(other),
        }
    }
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectReturnCode::Accepted => f.write_str("accepted"),
            ConnectReturnCode::UnacceptableProtocolVersion => {
                f.write_str("unacceptable protocol version")
            }
            ConnectReturnCode::IdentifierRejected => f.write_str("identifier rejected"),
            ConnectReturnCode::ServerUnavailable => f.write_str("server unavailable"),
            ConnectReturnCode::BadUserNameOrPassword => f.write_str("bad user name or password"),
            ConnectReturnCode::NotAuthorized => f.write_str("not authorized"),
            ConnectReturnCode::Unknown(code) => write!(f, "unknown return code {code}"),
        }
    }
}

/// CONNACK: the broker's reply to CONNECT.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Connack {
    /// The broker resumed a stored session.
    pub session_present: bool,
    /// Whether the connection was accepted, and if not, why.
    pub return_code: ConnectReturnCode,
}

/// PUBLISH: an application message travelling in either direction.
///
/// ```rust
/// use libmqtt::network::application::mqtt::{Publish, QoS};
///
/// let publish = Publish::new("sensors/temperature", b"23.5".to_vec());
/// assert_eq!(publish.qos, QoS::AtMostOnce);
/// assert_eq!(publish.packet_id, None);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Publish {
    /// Re-delivery of an earlier attempt.
    pub dup: bool,
    /// Delivery guarantee requested for this message.
    pub qos: QoS,
    /// Ask the broker to retain the message for future subscribers.
    pub retain: bool,
    /// The topic name the message was published on.
    pub topic: String,
    /// Present on the wire only when `qos` is above [`QoS::AtMostOnce`].
    pub packet_id: Option<u16>,
    /// The application payload, not length-prefixed on the wire.
    pub payload: Vec<u8>,
}

impl Publish {
    /// A QoS 0 message with no flags set.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: false,
            topic: topic.into(),
            packet_id: None,
            payload: payload.into(),
        }
    }
}

/// One `(topic filter, requested QoS)` entry of a SUBSCRIBE.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubscribeFilter {
    /// The topic filter, possibly containing wildcards.
    pub filter: String,
    /// Maximum QoS the client wants to receive on this filter.
    pub qos: QoS,
}

impl SubscribeFilter {
    /// A filter requesting [`QoS::AtMostOnce`].
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            qos: QoS::AtMostOnce,
        }
    }
}

/// SUBSCRIBE: request delivery of messages matching one or more filters.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Subscribe {
    /// Identifier echoed back in the SUBACK.
    pub packet_id: u16,
    /// Requested filters in order; the SUBACK answers in the same order.
    pub filters: Vec<SubscribeFilter>,
}

/// SUBACK failure return code.
pub const SUBACK_FAILURE: u8 = 0x80;

/// SUBACK: the broker's answer to SUBSCRIBE.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Suback {
    /// Identifier of the SUBSCRIBE being acknowledged.
    pub packet_id: u16,
    /// One granted QoS (`0..=2`) or failure code (`0x80`) per requested filter.
    pub return_codes: Vec<u8>,
}

impl Suback {
    /// Returns `true` if every filter was granted.
    pub fn is_success(&self) -> bool {
        !self.return_codes.is_empty() && self.return_codes.iter().all(|&code| code <= 2)
    }
}

/// A decoded or to-be-encoded MQTT control packet.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Packet {
    /// Client → broker session request.
    Connect(Connect),
    /// Broker → client session reply.
    Connack(Connack),
    /// Application message.
    Publish(Publish),
    /// QoS 1 acknowledgement.
    Puback {
        /// Identifier of the acknowledged PUBLISH.
        packet_id: u16,
    },
    /// Subscription request.
    Subscribe(Subscribe),
    /// Subscription reply.
    Suback(Suback),
    /// Liveness ping.
    Pingreq,
    /// Liveness pong.
    Pingresp,
    /// Graceful session end.
    Disconnect,
}

impl Packet {
    /// Short packet name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Connect(_) => "CONNECT",
            Packet::Connack(_) => "CONNACK",
            Packet::Publish(_) => "PUBLISH",
            Packet::Puback { .. } => "PUBACK",
            Packet::Subscribe(_) => "SUBSCRIBE",
            Packet::Suback(_) => "SUBACK",
            Packet::Pingreq => "PINGREQ",
            Packet::Pingresp => "PINGRESP",
            Packet::Disconnect => "DISCONNECT",
        }
    }
}
