//! A byte-stream abstraction layer for protocol clients
//!
//! This module defines the transport contract the MQTT engine is written
//! against: an ordered, bidirectional byte stream with a settable read
//! deadline, blocking writes and an idempotent close. Any transport that can
//! honour this contract (TCP, a tunnel over a message-oriented socket, an
//! in-memory pipe in tests) can carry the protocol.
//!

#![deny(unsafe_code)]

use std::time::Duration;

/// Common error types for network operations
pub mod error;

/// TCP transport built on `std::net`
pub mod tcp;

/// Application layer protocols
pub mod application;

pub use error::Error;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, Read, Write};
}

/// The receiving half of a byte stream.
pub trait Read {
    /// Read data from the connection.
    ///
    /// Returns `Ok(0)` once the peer has closed the stream. An expired read
    /// deadline is reported as [`Error::Timeout`].
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Set the deadline applied to each subsequent `read` call.
    ///
    /// `None` blocks until data arrives.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Error>;
}

/// The sending half of a byte stream.
pub trait Write {
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error>;

    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Error>;

    /// Write an entire buffer, retrying short writes.
    fn write_all(&mut self, mut buf: &[u8]) -> Result<(), Error> {
        while !buf.is_empty() {
            match self.write(buf)? {
                0 => return Err(Error::ConnectionClosed),
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }
}

/// Closing a stream.
pub trait Close {
    /// Close the connection.
    ///
    /// Closing an already closed connection is a no-op and returns `Ok(())`.
    fn close(&mut self) -> Result<(), Error>;
}

/// A synchronous connection.
///
/// Besides reading and writing, a connection can hand out an independent read
/// handle on the same stream so one thread can block in `read` while another
/// writes. Closing the connection must also unblock that reader.
pub trait Connection: Read + Write + Close + Send + 'static {
    /// Read handle returned by [`Connection::try_clone_reader`].
    type Reader: Read + Send + 'static;

    /// Create a second handle that reads from the same stream.
    fn try_clone_reader(&self) -> Result<Self::Reader, Error>;
}

/// A synchronous connector (client)
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;

    /// Open a connection to `remote`
    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Error>;
}
