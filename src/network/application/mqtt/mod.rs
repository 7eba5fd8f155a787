//! MQTT 3.1.1 client.
//!
//! MQTT uses a publish-subscribe pattern where:
//! - **Publishers** send messages to topics
//! - **Subscribers** receive messages from topics they're interested in
//! - **Brokers** route messages between publishers and subscribers
//!
//! This module implements the client side over any transport that satisfies
//! the [`Connection`](crate::network::Connection) contract:
//!
//! - a byte-exact codec for the packets a minimal client needs
//!   ([`codec`], [`packet`]);
//! - reassembly of packets from a stream ([`frame`]);
//! - a connection lifecycle with a background reader, an ordered dispatcher
//!   behind a bounded queue and a keepalive ticker ([`Client`]);
//! - topic filter matching with `+` and `#` wildcards ([`topic`]).
//!
//! Outbound publishing is QoS 0. Inbound QoS 1 messages are acknowledged once
//! the handler has run.
//!
//! # Usage
//!
//! ```rust,no_run
//! use libmqtt::network::application::mqtt::{Client, Options};
//! use libmqtt::network::tcp::TcpConnector;
//!
//! let options = Options {
//!     keep_alive_seconds: 120,
//!     ..Options::default()
//! };
//! let connector = TcpConnector::with_timeout(options.connect_timeout());
//! let mut client = Client::with_connector(connector, "localhost:1883", "iot_device_123", options)?;
//! client.connect()?;
//! client.subscribe("sensors/+")?;
//! client.publish("status", b"online")?;
//! # Ok::<(), libmqtt::network::application::mqtt::Error>(())
//! ```

/// Client handle and connection lifecycle.
pub mod client;

/// Packet encoding and decoding.
pub mod codec;

/// Error types.
pub mod error;

/// Stream reassembly.
pub mod frame;

/// Client configuration.
pub mod options;

/// Packet model and wire constants.
pub mod packet;

/// Packet identifier allocation.
pub mod packet_id;

mod pipeline;
mod session;

/// Shutdown signal.
pub mod shutdown;

/// Topic matching and validation.
pub mod topic;

pub use client::Client;
pub use error::{ConnectRejection, Error, ErrorKind, MalformedPacket, Result, TopicError};
pub use options::Options;
pub use packet::{Connack, ConnectReturnCode, Packet, Publish, QoS, Suback, Subscribe};
pub use session::{ConnectionStatus, FailureReason};
pub use shutdown::ShutdownSignal;
