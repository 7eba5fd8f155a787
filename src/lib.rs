//! # libmqtt - MQTT 3.1.1 client
//!
//! A small MQTT client for devices and services that talk to a broker over a
//! plain byte stream. It covers the packets a minimal client needs: CONNECT,
//! CONNACK, PUBLISH, PUBACK, SUBSCRIBE, SUBACK, PINGREQ, PINGRESP and
//! DISCONNECT.
//!
//! ## Features
//!
//! ### Network
//! - Transport traits ([`network::Read`], [`network::Write`],
//!   [`network::Close`], [`network::Connection`]) with a TCP implementation
//! - Byte-exact packet codec with stream reassembly
//!
//! ### Client
//! - Connection lifecycle with a background reader, an ordered dispatcher and
//!   keepalive pings
//! - Bounded inbound queue that applies backpressure to the reader
//! - Topic filter matching with `+` and `#` wildcards
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! libmqtt = "0.1.0"
//! ```
//!
//! ### MQTT Client Example
//!
//! ```rust,no_run
//! use libmqtt::network::application::mqtt::Client;
//!
//! let mut client = Client::new("test.mosquitto.org:1883", "libmqtt-demo")?;
//! client.set_message_handler(|topic, payload| {
//!     println!("{topic}: {}", String::from_utf8_lossy(payload));
//! });
//! client.connect()?;
//! client.subscribe("test/#")?;
//! client.publish("test/a", b"hi")?;
//! client.disconnect()?;
//! # Ok::<(), libmqtt::network::application::mqtt::Error>(())
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade: connection lifecycle at `info`,
//! lost connections and dropped packets at `warn`, routing detail at `debug`
//! and keepalive traffic at `trace`. Install any `log` backend to see it.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

/// Network transports and protocol clients.
pub mod network;
