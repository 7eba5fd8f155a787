//! Client configuration.

use core::time::Duration;

use serde::Deserialize;

use super::error::{Error, Result};

/// Configuration options for an MQTT client.
///
/// All fields have defaults, so a configuration only needs to name what it
/// changes. Options can also be loaded from JSON:
///
/// ```rust
/// use libmqtt::network::application::mqtt::Options;
///
/// let options = Options::from_json(r#"{"keep_alive_seconds": 120, "queue_capacity": 16}"#).unwrap();
/// assert_eq!(options.keep_alive_seconds, 120);
/// assert_eq!(options.queue_capacity, 16);
/// assert!(options.clean_session);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// The keep-alive time interval in seconds, sent in CONNECT.
    ///
    /// The broker drops a client it has not heard from for one and a half
    /// times this interval. A value of 0 disables the broker-side check.
    pub keep_alive_seconds: u16,

    /// Whether to start a clean session.
    pub clean_session: bool,

    /// How long `connect` waits for CONNACK, in milliseconds.
    pub connect_timeout_ms: u64,

    /// Read deadline applied by the reader on every read, in milliseconds.
    ///
    /// Silence for this long is treated as a dead connection. Keep it longer
    /// than `ping_interval_ms` so that PINGRESP traffic keeps an idle link up.
    pub read_timeout_ms: u64,

    /// Interval between PINGREQ packets, in milliseconds.
    pub ping_interval_ms: u64,

    /// How long `subscribe` waits for SUBACK, in milliseconds.
    pub subscribe_timeout_ms: u64,

    /// Inbound messages buffered between the reader and the dispatcher.
    ///
    /// When full, the reader stops reading until the handler catches up.
    pub queue_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            keep_alive_seconds: 60,
            clean_session: true,
            connect_timeout_ms: 10_000,
            read_timeout_ms: 45_000,
            ping_interval_ms: 30_000,
            subscribe_timeout_ms: 10_000,
            queue_capacity: 100,
        }
    }
}

impl Options {
    /// Parse options from a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        let (options, _) = serde_json_core::from_str::<Options>(json)
            .map_err(|_| Error::InvalidOptions("malformed JSON configuration"))?;
        options.validate()?;
        Ok(options)
    }

    /// Check that every timeout, interval and capacity is non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 {
            return Err(Error::InvalidOptions("connect_timeout_ms must be positive"));
        }
        if self.read_timeout_ms == 0 {
            return Err(Error::InvalidOptions("read_timeout_ms must be positive"));
        }
        if self.ping_interval_ms == 0 {
            return Err(Error::InvalidOptions("ping_interval_ms must be positive"));
        }
        if self.subscribe_timeout_ms == 0 {
            return Err(Error::InvalidOptions(
                "subscribe_timeout_ms must be positive",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidOptions("queue_capacity must be positive"));
        }
        Ok(())
    }

    /// [`connect_timeout_ms`](Self::connect_timeout_ms) as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// [`read_timeout_ms`](Self::read_timeout_ms) as a `Duration`.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// [`ping_interval_ms`](Self::ping_interval_ms) as a `Duration`.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// [`subscribe_timeout_ms`](Self::subscribe_timeout_ms) as a `Duration`.
    pub fn subscribe_timeout(&self) -> Duration {
        Duration::from_millis(self.subscribe_timeout_ms)
    }
}
