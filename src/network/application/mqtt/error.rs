//! Error types for the MQTT client.

use thiserror::Error;

use super::packet::ConnectReturnCode;
use crate::network;

/// A decode-time length or structure violation.
///
/// Decoding never indexes past the end of its input; every precondition is
/// checked first and reported through one of these variants.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum MalformedPacket {
    /// The buffer ends before the declared remaining length.
    #[error("incomplete packet: need {expected} bytes, have {actual}")]
    Incomplete {
        /// Bytes the packet declares.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },
    /// The buffer is shorter than the smallest valid packet of this type.
    #[error("packet too short: need at least {minimum} bytes, have {actual}")]
    TooShort {
        /// Smallest valid size.
        minimum: usize,
        /// Bytes available.
        actual: usize,
    },
    /// The remaining length used more than four bytes.
    #[error("remaining length exceeds four bytes")]
    RemainingLengthOverflow,
    /// A fixed-size packet declared the wrong remaining length.
    #[error("invalid remaining length: expected {expected}, got {actual}")]
    InvalidRemainingLength {
        /// Length mandated by the packet type.
        expected: usize,
        /// Length found in the fixed header.
        actual: usize,
    },
    /// The topic length prefix points past the end of the packet.
    #[error("topic length {declared} exceeds the {available} bytes available")]
    TopicLengthOverflow {
        /// Length from the prefix.
        declared: usize,
        /// Bytes left in the packet.
        available: usize,
    },
    /// A QoS 1 or 2 publish ended before its packet identifier.
    #[error("missing packet identifier")]
    MissingPacketId,
    /// The fixed header byte does not match the packet being decoded.
    #[error("invalid fixed header: expected {expected:#04x}, got {actual:#04x}")]
    InvalidHeader {
        /// Expected first byte.
        expected: u8,
        /// First byte found.
        actual: u8,
    },
    /// The control type is not one this client understands.
    #[error("unexpected packet type {0:#04x}")]
    UnexpectedPacketType(u8),
    /// The publish flags encode QoS 3.
    #[error("invalid QoS {0}")]
    InvalidQoS(u8),
    /// The topic is not valid UTF-8.
    #[error("topic is not valid UTF-8")]
    InvalidUtf8,
}

/// Why the broker did not accept the handshake.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConnectRejection {
    /// The CONNACK carried a non-zero return code.
    #[error("{0}")]
    Refused(ConnectReturnCode),
    /// The reply was not a well-formed CONNACK.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(MalformedPacket),
}

/// Reasons a topic name or filter is refused before any I/O happens.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum TopicError {
    /// Topics and filters must contain at least one character.
    #[error("topic is empty")]
    Empty,
    /// The topic does not fit the two-byte length prefix.
    #[error("topic is longer than 65535 bytes")]
    TooLong,
    /// Topic names used for publishing cannot contain `+` or `#`.
    #[error("wildcards are not allowed in topic names")]
    WildcardInName,
    /// `+` and `#` must occupy a whole level, and `#` must be the last level.
    #[error("misplaced wildcard in topic filter")]
    InvalidWildcard,
}

/// Closed classification of client errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// Dial, read or write failure.
    Transport,
    /// The broker refused a handshake or subscription.
    Protocol,
    /// A packet violated the wire format.
    Malformed,
    /// The call was refused up front: wrong connection state or invalid input.
    State,
}

/// Errors returned by [`Client`](super::Client) operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] network::Error),
    /// The operation requires a live connection.
    #[error("not connected to broker")]
    NotConnected,
    /// `connect` was called on a client that is already connected.
    #[error("already connected to broker")]
    AlreadyConnected,
    /// The handshake failed.
    #[error("connection rejected by broker: {0}")]
    ConnectionRejected(ConnectRejection),
    /// The SUBACK did not confirm the subscription.
    #[error(
        "subscription rejected by broker: packet id {packet_id} (expected {expected_packet_id}), return codes {return_codes:?}"
    )]
    SubscriptionRejected {
        /// Identifier sent in the SUBSCRIBE.
        expected_packet_id: u16,
        /// Identifier found in the SUBACK.
        packet_id: u16,
        /// Return codes found in the SUBACK.
        return_codes: Vec<u8>,
    },
    /// A packet could not be decoded.
    #[error("malformed packet: {0}")]
    Malformed(#[from] MalformedPacket),
    /// The client identifier is empty or too long.
    #[error("invalid client identifier: {0}")]
    InvalidClientId(&'static str),
    /// The topic name or filter is not usable.
    #[error("invalid topic: {0}")]
    InvalidTopic(#[from] TopicError),
    /// The encoded packet would exceed the protocol's maximum size.
    #[error("payload too large: {size} bytes exceeds {max}")]
    PayloadTooLarge {
        /// Remaining length the packet would need.
        size: usize,
        /// Largest remaining length MQTT can express.
        max: usize,
    },
    /// A configuration value is out of range.
    #[error("invalid options: {0}")]
    InvalidOptions(&'static str),
    /// The broker did not answer in time.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

impl Error {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) | Error::Timeout(_) => ErrorKind::Transport,
            Error::ConnectionRejected(_) | Error::SubscriptionRejected { .. } => {
                ErrorKind::Protocol
            }
            Error::Malformed(_) => ErrorKind::Malformed,
            Error::NotConnected
            | Error::AlreadyConnected
            | Error::InvalidClientId(_)
            | Error::InvalidTopic(_)
            | Error::PayloadTooLarge { .. }
            | Error::InvalidOptions(_) => ErrorKind::State,
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(feature = "defmt")]
impl defmt::Format for ErrorKind {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ErrorKind::Transport => defmt::write!(f, "Transport"),
            ErrorKind::Protocol => defmt::write!(f, "Protocol"),
            ErrorKind::Malformed => defmt::write!(f, "Malformed"),
            ErrorKind::State => defmt::write!(f, "State"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Transport(err) => defmt::write!(f, "Transport({})", err),
            Error::NotConnected => defmt::write!(f, "NotConnected"),
            Error::AlreadyConnected => defmt::write!(f, "AlreadyConnected"),
            Error::ConnectionRejected(_) => defmt::write!(f, "ConnectionRejected"),
            Error::SubscriptionRejected { packet_id, .. } => {
                defmt::write!(f, "SubscriptionRejected({})", packet_id)
            }
            Error::Malformed(_) => defmt::write!(f, "Malformed"),
            Error::InvalidClientId(reason) => defmt::write!(f, "InvalidClientId({})", reason),
            Error::InvalidTopic(_) => defmt::write!(f, "InvalidTopic"),
            Error::PayloadTooLarge { size, max } => {
                defmt::write!(f, "PayloadTooLarge({}/{})", size, max)
            }
            Error::InvalidOptions(reason) => defmt::write!(f, "InvalidOptions({})", reason),
            Error::Timeout(what) => defmt::write!(f, "Timeout({})", what),
        }
    }
}
