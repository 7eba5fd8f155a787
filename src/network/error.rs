//! Common error types for network operations

use std::io;

use thiserror::Error;

/// A common error type for transport operations.
///
/// Every byte-stream adapter reports failures through this enum so the
/// protocol layer can tell a read deadline apart from a closed or broken
/// stream without knowing which transport it is driving.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    #[error("connection is not open")]
    NotOpen,
    /// A read or write deadline expired.
    #[error("operation timed out")]
    Timeout,
    /// The peer closed the connection.
    #[error("connection closed by peer")]
    ConnectionClosed,
    /// An invalid address was provided.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// Any other I/O failure reported by the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl Error {
    /// Returns `true` if this error is an expired read or write deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Error::ConnectionClosed,
            io::ErrorKind::NotConnected => Error::NotOpen,
            _ => Error::Io(err),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress(_) => defmt::write!(f, "InvalidAddress"),
            Error::Io(_) => defmt::write!(f, "Io"),
        }
    }
}
