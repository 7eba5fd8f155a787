//! # Application Layer Network Protocols
//!
//! Protocol clients written against the core network traits. Each client
//! works with any type implementing [`Connection`](crate::network::Connection),
//! so the same protocol code runs over TCP or over an in-memory stream in tests.
//!
//! ## Available Protocols
//!
//! - **[`mqtt`]**: MQTT 3.1.1 client for lightweight publish-subscribe messaging

/// MQTT client implementation.
///
/// Provides an MQTT 3.1.1 client for lightweight publish-subscribe messaging,
/// commonly used in IoT applications.
pub mod mqtt;
