//! MQTT 3.1.1 client handle.
//!
//! A [`Client`] owns the configuration for one broker and, while connected,
//! the running pipeline. Publishing and subscribing are plain blocking calls
//! made from any thread; inbound messages are delivered on a background
//! dispatcher thread to the handler registered with
//! [`set_message_handler`](Client::set_message_handler).
//!
//! # Connection lifecycle
//!
//! ```text
//! Disconnected --connect--> Connecting --CONNACK accepted--> Connected
//!      ^                        |                                |
//!      +------ dial/handshake --+                                |
//!      +------ disconnect, read timeout, EOF, write failure -----+
//! ```
//!
//! A connection that fails on its own records a [`FailureReason`] and drops
//! back to `Disconnected`; the client can then be connected again.
//!
//! # Examples
//!
//! ```rust,no_run
//! use libmqtt::network::application::mqtt::Client;
//!
//! let mut client = Client::new("localhost:1883", "sensor_device_01")?;
//! client.set_message_handler(|topic, payload| {
//!     println!("{topic}: {}", String::from_utf8_lossy(payload));
//! });
//! client.connect()?;
//! client.subscribe("commands/#")?;
//! client.publish("sensors/temperature", b"23.5")?;
//! client.disconnect()?;
//! # Ok::<(), libmqtt::network::application::mqtt::Error>(())
//! ```

use std::sync::Arc;

use crossbeam_channel::select;
use log::{debug, info};

use super::codec::{self, DISCONNECT_PACKET, MAX_REMAINING_LENGTH};
use super::error::{ConnectRejection, Error, MalformedPacket, Result, TopicError};
use super::frame::FrameBuffer;
use super::options::Options;
use super::packet::{Connect, ConnectReturnCode, Publish, QoS, Subscribe, SubscribeFilter};
use super::pipeline::Pipeline;
use super::session::{ClientState, ConnectionStatus, FailureReason, Session};
use super::shutdown::ShutdownSignal;
use super::topic::{validate_topic_filter, validate_topic_name};
use crate::network::tcp::TcpConnector;
use crate::network::{self, Close, Connection, Read, Write};

const HANDSHAKE_CHUNK: usize = 256;

/// An MQTT 3.1.1 client for publish-subscribe messaging.
///
/// The client is generic over the [`Connect`](crate::network::Connect)
/// implementation used to dial the broker; [`Client::new`] uses TCP.
///
/// Publishing is QoS 0 only. Subscriptions request QoS 0, and inbound QoS 1
/// messages are acknowledged after the handler returns.
///
/// Dropping a connected client tears the connection down without sending
/// DISCONNECT.
pub struct Client<N: network::Connect = TcpConnector> {
    connector: N,
    broker: String,
    client_id: String,
    options: Options,
    state: Arc<ClientState>,
    session: Option<Arc<Session<N::Connection>>>,
    pipeline: Option<Pipeline>,
}

impl<N: network::Connect> core::fmt::Debug for Client<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("broker", &self.broker)
            .field("client_id", &self.client_id)
            .field("options", &self.options)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Client<TcpConnector> {
    /// Create a client for a TCP broker at `broker` (`host:port`).
    ///
    /// No I/O happens until [`connect`](Client::connect).
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidClientId`] - `client_id` is empty or longer than
    ///   65535 bytes
    pub fn new(broker: impl Into<String>, client_id: impl Into<String>) -> Result<Self> {
        let options = Options::default();
        let connector = TcpConnector::with_timeout(options.connect_timeout());
        Self::with_connector(connector, broker, client_id, options)
    }
}

impl<N: network::Connect> Client<N> {
    /// Create a client that dials `broker` through `connector`.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidClientId`] - `client_id` is empty or longer than
    ///   65535 bytes
    /// * [`Error::InvalidOptions`] - a timeout, interval or capacity is zero
    pub fn with_connector(
        connector: N,
        broker: impl Into<String>,
        client_id: impl Into<String>,
        options: Options,
    ) -> Result<Self> {
        let client_id = client_id.into();
        if client_id.is_empty() {
            return Err(Error::InvalidClientId("client identifier is empty"));
        }
        if client_id.len() > usize::from(u16::MAX) {
            return Err(Error::InvalidClientId(
                "client identifier is longer than 65535 bytes",
            ));
        }
        options.validate()?;

        Ok(Self {
            connector,
            broker: broker.into(),
            client_id,
            options,
            state: Arc::new(ClientState::new()),
            session: None,
            pipeline: None,
        })
    }

    /// Establish an MQTT connection with the broker.
    ///
    /// Dials the broker, sends CONNECT and waits up to the connect timeout for
    /// CONNACK. On acceptance the reader, dispatcher and keepalive threads are
    /// started and the client becomes [`ConnectionStatus::Connected`].
    ///
    /// # Errors
    ///
    /// * [`Error::AlreadyConnected`] - the client is connected
    /// * [`Error::Transport`] - dialing or the handshake I/O failed
    /// * [`Error::Timeout`] - no CONNACK arrived within the connect timeout
    /// * [`Error::ConnectionRejected`] - the broker refused the connection or
    ///   answered with something other than a CONNACK
    ///
    /// On any error the transport is closed and the client stays
    /// `Disconnected`.
    pub fn connect(&mut self) -> Result<()> {
        if self.state.status.load() != ConnectionStatus::Disconnected {
            return Err(Error::AlreadyConnected);
        }
        self.reap();
        self.state.status.store(ConnectionStatus::Connecting);

        match self.open_session() {
            Ok(()) => {
                info!("connected to MQTT broker {}", self.broker);
                Ok(())
            }
            Err(err) => {
                self.state.status.store(ConnectionStatus::Disconnected);
                Err(err)
            }
        }
    }

    fn open_session(&mut self) -> Result<()> {
        info!("connecting to {} as {}", self.broker, self.client_id);
        let mut connection = self.connector.connect(&self.broker)?;
        let prepared = self
            .handshake(&mut connection)
            .and_then(|frames| Ok((connection.try_clone_reader()?, frames)));
        let (reader, frames) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                if let Err(close_err) = connection.close() {
                    debug!("error closing connection: {close_err}");
                }
                return Err(err);
            }
        };

        if self.options.clean_session {
            self.state.clear_subscriptions();
        }
        self.state.set_last_failure(None);

        let session = Arc::new(Session::new(connection, Arc::clone(&self.state)));
        self.state.status.store(ConnectionStatus::Connected);
        let pipeline = Pipeline::start(&session, reader, frames, &self.options)?;
        self.session = Some(session);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Send CONNECT and read until a whole reply packet has arrived.
    ///
    /// Bytes that follow the CONNACK are returned for the reader.
    fn handshake(&self, connection: &mut N::Connection) -> Result<FrameBuffer> {
        let connect = Connect::new(
            self.client_id.as_str(),
            self.options.keep_alive_seconds,
            self.options.clean_session,
        );
        connection.write_all(&codec::encode_connect(&connect))?;
        connection.flush()?;
        connection.set_read_timeout(Some(self.options.connect_timeout()))?;

        let mut frames = FrameBuffer::new();
        let mut buf = [0u8; HANDSHAKE_CHUNK];
        let reply = loop {
            if let Some(frame) = frames.next_frame().map_err(unexpected_reply)? {
                break frame;
            }
            match connection.read(&mut buf) {
                Ok(0) => return Err(network::Error::ConnectionClosed.into()),
                Ok(n) => frames.extend(&buf[..n]),
                Err(network::Error::Timeout) => return Err(Error::Timeout("CONNACK")),
                Err(err) => return Err(err.into()),
            }
        };

        let connack = codec::decode_connack(&reply).map_err(unexpected_reply)?;
        if connack.return_code != ConnectReturnCode::Accepted {
            return Err(Error::ConnectionRejected(ConnectRejection::Refused(
                connack.return_code,
            )));
        }
        debug!("CONNACK accepted, session present: {}", connack.session_present);
        Ok(frames)
    }

    /// Gracefully close the connection.
    ///
    /// Sends DISCONNECT (best effort), stops the pipeline, closes the
    /// transport and waits for the background threads to exit.
    ///
    /// # Errors
    ///
    /// * [`Error::NotConnected`] - the client is not connected; no I/O is
    ///   performed
    pub fn disconnect(&mut self) -> Result<()> {
        let transitioned = self
            .state
            .status
            .transition(ConnectionStatus::Connected, ConnectionStatus::Disconnecting);
        let Some(session) = self.session.as_ref().filter(|_| transitioned) else {
            if transitioned {
                self.state.status.store(ConnectionStatus::Disconnected);
            }
            self.reap();
            return Err(Error::NotConnected);
        };

        if let Err(err) = session.send(&DISCONNECT_PACKET) {
            debug!("DISCONNECT not sent: {err}");
        }
        self.reap();
        self.state.status.store(ConnectionStatus::Disconnected);
        info!("disconnected from MQTT broker {}", self.broker);
        Ok(())
    }

    /// Shut down and join whatever is left of the previous connection.
    fn reap(&mut self) {
        if let Some(session) = self.session.take() {
            session.shut_down();
        }
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.join();
        }
    }

    /// Publish `payload` to `topic` at QoS 0.
    ///
    /// The packet is written in full before this returns; there is no
    /// acknowledgement at QoS 0.
    ///
    /// # Errors
    ///
    /// * [`Error::NotConnected`] - the client is not connected
    /// * [`Error::InvalidTopic`] - the topic is empty, too long or contains
    ///   a wildcard
    /// * [`Error::PayloadTooLarge`] - the packet would exceed the maximum
    ///   remaining length
    /// * [`Error::Transport`] - the write failed; the connection is torn down
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use libmqtt::network::application::mqtt::Client;
    /// # let mut client = Client::new("localhost:1883", "weather_station")?;
    /// # client.connect()?;
    /// client.publish("devices/sensor01/data", br#"{"temp":23.5,"humidity":65}"#)?;
    /// # Ok::<(), libmqtt::network::application::mqtt::Error>(())
    /// ```
    pub fn publish(&self, topic: &str, payload: impl AsRef<[u8]>) -> Result<()> {
        let session = self.live_session()?;
        validate_topic_name(topic)?;
        let payload = payload.as_ref();
        let size = codec::publish_remaining_length(topic.len(), QoS::AtMostOnce, payload.len());
        if size > MAX_REMAINING_LENGTH {
            return Err(Error::PayloadTooLarge {
                size,
                max: MAX_REMAINING_LENGTH,
            });
        }

        let packet = codec::encode_publish(&Publish::new(topic, payload));
        self.send(session, &packet)
    }

    /// Subscribe to a single topic filter at QoS 0.
    ///
    /// Blocks until the broker's SUBACK arrives or the subscribe timeout
    /// elapses. See [`subscribe_many`](Self::subscribe_many).
    pub fn subscribe(&self, filter: &str) -> Result<()> {
        self.subscribe_many(&[filter])
    }

    /// Subscribe to several topic filters with one SUBSCRIBE packet.
    ///
    /// The filters are recorded as confirmed subscriptions only after a SUBACK
    /// that echoes the packet identifier and grants every filter.
    ///
    /// # Errors
    ///
    /// * [`Error::NotConnected`] - the client is not connected, or the
    ///   connection was lost while waiting
    /// * [`Error::InvalidTopic`] - a filter is malformed, or none was given
    /// * [`Error::PayloadTooLarge`] - the filters do not fit in one packet
    /// * [`Error::Transport`] - the write failed; the connection is torn down
    /// * [`Error::Timeout`] - no SUBACK arrived within the subscribe timeout
    /// * [`Error::SubscriptionRejected`] - the SUBACK carried another packet
    ///   identifier or a failure return code
    pub fn subscribe_many(&self, filters: &[&str]) -> Result<()> {
        let session = self.live_session()?;
        if filters.is_empty() {
            return Err(TopicError::Empty.into());
        }
        for filter in filters {
            validate_topic_filter(filter)?;
        }
        let size = codec::subscribe_remaining_length(filters.iter().copied());
        if size > MAX_REMAINING_LENGTH {
            return Err(Error::PayloadTooLarge {
                size,
                max: MAX_REMAINING_LENGTH,
            });
        }

        let packet_id = session.packet_ids.next_id();
        let subscribe = Subscribe {
            packet_id,
            filters: filters.iter().map(|f| SubscribeFilter::new(*f)).collect(),
        };
        let reply = session.expect_suback(packet_id);
        if let Err(err) = self.send(session, &codec::encode_subscribe(&subscribe)) {
            session.forget_suback(packet_id);
            return Err(err);
        }

        let suback = select! {
            recv(reply) -> suback => suback.map_err(|_| Error::NotConnected),
            recv(session.shutdown.receiver()) -> _ => reply.try_recv().map_err(|_| Error::NotConnected),
            default(self.options.subscribe_timeout()) => Err(Error::Timeout("SUBACK")),
        };
        let suback = match suback {
            Ok(suback) => suback,
            Err(err) => {
                session.forget_suback(packet_id);
                return Err(err);
            }
        };

        if suback.packet_id != packet_id
            || suback.return_codes.len() != filters.len()
            || !suback.is_success()
        {
            return Err(Error::SubscriptionRejected {
                expected_packet_id: packet_id,
                packet_id: suback.packet_id,
                return_codes: suback.return_codes,
            });
        }

        self.state.add_subscriptions(filters.iter().copied());
        info!("subscribed to {}", filters.join(", "));
        Ok(())
    }

    /// Register the callback that receives inbound messages.
    ///
    /// Replaces any previous handler. The handler runs on the dispatcher
    /// thread, one message at a time in arrival order; while it runs, further
    /// messages queue up to the configured capacity.
    pub fn set_message_handler<F>(&self, handler: F)
    where
        F: Fn(&str, &[u8]) + Send + Sync + 'static,
    {
        self.state.set_handler(Some(Arc::new(handler)));
    }

    /// Remove the message handler. Messages are then only logged.
    pub fn clear_message_handler(&self) {
        self.state.set_handler(None);
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.state.status.load()
    }

    /// Returns `true` while the client is connected.
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Broker address this client dials.
    pub fn broker(&self) -> &str {
        &self.broker
    }

    /// Client identifier sent in CONNECT.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Options this client was created with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Filters confirmed by a SUBACK, in subscription order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.state.subscriptions()
    }

    /// Why the most recent connection failed, if it did.
    ///
    /// Cleared by a successful [`connect`](Self::connect).
    pub fn last_failure(&self) -> Option<FailureReason> {
        self.state.last_failure()
    }

    /// Shutdown signal of the current or most recent connection.
    ///
    /// Fires when that connection is torn down for any reason. `None` before
    /// the first successful connect.
    pub fn shutdown_signal(&self) -> Option<ShutdownSignal> {
        self.session.as_ref().map(|session| session.shutdown.clone())
    }

    fn live_session(&self) -> Result<&Arc<Session<N::Connection>>> {
        match &self.session {
            Some(session) if self.state.status.load() == ConnectionStatus::Connected => Ok(session),
            _ => Err(Error::NotConnected),
        }
    }

    fn send(&self, session: &Session<N::Connection>, packet: &[u8]) -> Result<()> {
        session.send(packet).map_err(|err| {
            session.fail(FailureReason::WriteFailed(err.to_string()));
            Error::Transport(err)
        })
    }
}

impl<N: network::Connect> Drop for Client<N> {
    fn drop(&mut self) {
        self.state
            .status
            .transition(ConnectionStatus::Connected, ConnectionStatus::Disconnecting);
        self.reap();
        self.state.status.store(ConnectionStatus::Disconnected);
    }
}

fn unexpected_reply(err: MalformedPacket) -> Error {
    Error::ConnectionRejected(ConnectRejection::UnexpectedReply(err))
}
