//! TCP transport for hosts with `std::net`.
//!
//! ```rust,no_run
//! use libmqtt::network::Connect;
//! use libmqtt::network::tcp::TcpConnector;
//! use std::time::Duration;
//!
//! let mut connector = TcpConnector::with_timeout(Duration::from_secs(5));
//! let connection = connector.connect("test.mosquitto.org:1883");
//! ```

use std::io::{Read as _, Write as _};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;

use super::{Close, Connect, Connection, Error, Read, Write};

/// Opens [`TcpConnection`]s to `host:port` addresses.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    connect_timeout: Option<Duration>,
}

impl TcpConnector {
    /// Create a connector that uses the operating system's connect timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector that gives up dialling after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            connect_timeout: Some(timeout),
        }
    }
}

impl Connect for TcpConnector {
    type Connection = TcpConnection;

    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Error> {
        let stream = match self.connect_timeout {
            Some(timeout) => {
                let addr = remote
                    .to_socket_addrs()
                    .map_err(|_| Error::InvalidAddress(remote.to_string()))?
                    .next()
                    .ok_or_else(|| Error::InvalidAddress(remote.to_string()))?;
                TcpStream::connect_timeout(&addr, timeout)?
            }
            None => TcpStream::connect(remote)?,
        };
        stream.set_nodelay(true)?;
        debug!("tcp connection open to {remote}");
        Ok(TcpConnection::new(stream))
    }
}

/// A [`Connection`] over a `TcpStream`.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    closed: bool,
}

impl TcpConnection {
    /// Wrap an already connected stream.
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

impl Read for TcpConnection {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.closed {
            return Err(Error::NotOpen);
        }
        Ok(self.stream.read(buf)?)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Error> {
        Ok(self.stream.set_read_timeout(timeout)?)
    }
}

impl Write for TcpConnection {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        if self.closed {
            return Err(Error::NotOpen);
        }
        Ok(self.stream.write(buf)?)
    }

    fn flush(&mut self) -> Result<(), Error> {
        if self.closed {
            return Err(Error::NotOpen);
        }
        Ok(self.stream.flush()?)
    }
}

impl Close for TcpConnection {
    fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // The peer may already have torn the socket down.
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Connection for TcpConnection {
    type Reader = TcpReader;

    fn try_clone_reader(&self) -> Result<Self::Reader, Error> {
        Ok(TcpReader {
            stream: self.stream.try_clone()?,
        })
    }
}

/// Read handle sharing the socket of a [`TcpConnection`].
#[derive(Debug)]
pub struct TcpReader {
    stream: TcpStream,
}

impl Read for TcpReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        Ok(self.stream.read(buf)?)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), Error> {
        Ok(self.stream.set_read_timeout(timeout)?)
    }
}
