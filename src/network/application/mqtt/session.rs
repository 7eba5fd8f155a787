//! State shared between the client handle and the pipeline activities.
//!
//! [`ClientState`] outlives individual connections: it carries the status,
//! the message handler, the confirmed subscriptions and the last failure.
//! [`Session`] lives for exactly one connection and owns its writer, its
//! shutdown signal and the SUBACKs it is waiting for.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use parking_lot::Mutex;

use super::packet::Suback;
use super::packet_id::PacketIdGenerator;
use super::shutdown::ShutdownSignal;
use super::topic;
use crate::network::{self, Connection};

/// Callback invoked by the dispatcher for every inbound message.
pub(crate) type MessageHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync + 'static>;

/// Lifecycle state of a client's connection.
///
/// A connection that fails while connected falls back to `Disconnected`; the
/// cause is kept in [`Client::last_failure`](super::Client::last_failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionStatus {
    /// No connection. The initial state, and the state after any teardown.
    Disconnected = 0,
    /// Dialing and waiting for CONNACK.
    Connecting = 1,
    /// The broker accepted the handshake and the pipeline is running.
    Connected = 2,
    /// A graceful disconnect is in progress.
    Disconnecting = 3,
}

impl ConnectionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Disconnecting,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// Why a live connection was torn down without a call to `disconnect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Nothing arrived within the read timeout.
    ReadTimeout,
    /// The broker closed the stream.
    PeerClosed,
    /// A read failed.
    Transport(String),
    /// A PINGREQ could not be written.
    KeepaliveFailed(String),
    /// A PUBLISH, SUBSCRIBE or PUBACK could not be written.
    WriteFailed(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadTimeout => f.write_str("read timeout, connection may be lost"),
            Self::PeerClosed => f.write_str("connection closed by broker"),
            Self::Transport(err) => write!(f, "read error: {err}"),
            Self::KeepaliveFailed(err) => write!(f, "ping error: {err}"),
            Self::WriteFailed(err) => write!(f, "write error: {err}"),
        }
    }
}

/// Atomic cell holding a [`ConnectionStatus`].
#[derive(Debug)]
pub(crate) struct StatusCell(AtomicU8);

impl StatusCell {
    fn new(status: ConnectionStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    pub(crate) fn load(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, status: ConnectionStatus) {
        self.0.store(status as u8, Ordering::Release);
    }

    /// Move from `from` to `to`. Returns `false` if the status was not `from`.
    pub(crate) fn transition(&self, from: ConnectionStatus, to: ConnectionStatus) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Client-wide state that survives reconnects.
pub(crate) struct ClientState {
    pub(crate) status: StatusCell,
    handler: Mutex<Option<MessageHandler>>,
    subscriptions: Mutex<Vec<String>>,
    last_failure: Mutex<Option<FailureReason>>,
}

impl fmt::Debug for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientState")
            .field("status", &self.status.load())
            .field("has_handler", &self.handler.lock().is_some())
            .field("subscriptions", &*self.subscriptions.lock())
            .field("last_failure", &*self.last_failure.lock())
            .finish()
    }
}

impl ClientState {
    pub(crate) fn new() -> Self {
        Self {
            status: StatusCell::new(ConnectionStatus::Disconnected),
            handler: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
            last_failure: Mutex::new(None),
        }
    }

    pub(crate) fn set_handler(&self, handler: Option<MessageHandler>) {
        *self.handler.lock() = handler;
    }

    /// The handler as of now. Cloned out so it runs without the lock held.
    pub(crate) fn handler(&self) -> Option<MessageHandler> {
        self.handler.lock().clone()
    }

    pub(crate) fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().clone()
    }

    pub(crate) fn add_subscriptions<'a>(&self, filters: impl IntoIterator<Item = &'a str>) {
        let mut subscriptions = self.subscriptions.lock();
        for filter in filters {
            if !subscriptions.iter().any(|existing| existing == filter) {
                subscriptions.push(filter.to_owned());
            }
        }
    }

    pub(crate) fn clear_subscriptions(&self) {
        self.subscriptions.lock().clear();
    }

    /// Returns `true` if any confirmed subscription selects `topic`.
    pub(crate) fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions
            .lock()
            .iter()
            .any(|filter| topic::matches(filter, topic))
    }

    pub(crate) fn last_failure(&self) -> Option<FailureReason> {
        self.last_failure.lock().clone()
    }

    pub(crate) fn set_last_failure(&self, failure: Option<FailureReason>) {
        *self.last_failure.lock() = failure;
    }
}

struct PendingSuback {
    packet_id: u16,
    reply: Sender<Suback>,
}

/// One connection's worth of shared state.
pub(crate) struct Session<C> {
    pub(crate) state: Arc<ClientState>,
    pub(crate) shutdown: ShutdownSignal,
    pub(crate) packet_ids: PacketIdGenerator,
    writer: Mutex<C>,
    closed: AtomicBool,
    pending: Mutex<VecDeque<PendingSuback>>,
}

impl<C> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("shutdown", &self.shutdown.is_triggered())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .field("pending", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}

impl<C: Connection> Session<C> {
    pub(crate) fn new(connection: C, state: Arc<ClientState>) -> Self {
        Self {
            state,
            shutdown: ShutdownSignal::new(),
            packet_ids: PacketIdGenerator::new(),
            writer: Mutex::new(connection),
            closed: AtomicBool::new(false),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Write one complete packet. Concurrent senders never interleave bytes.
    pub(crate) fn send(&self, packet: &[u8]) -> Result<(), network::Error> {
        let mut writer = self.writer.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(network::Error::NotOpen);
        }
        writer.write_all(packet)?;
        writer.flush()
    }

    /// Close the transport. Only the first call reaches it.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(err) = self.writer.lock().close() {
            debug!("error closing connection: {err}");
        }
    }

    /// Fire the shutdown signal and close the transport.
    pub(crate) fn shut_down(&self) {
        self.shutdown.trigger();
        self.close();
    }

    /// Tear the connection down after an unrequested failure.
    ///
    /// Only the failure that moves the status out of `Connected` is recorded
    /// and logged; later ones, and failures racing a graceful disconnect,
    /// just join the teardown.
    pub(crate) fn fail(&self, reason: FailureReason) {
        if self
            .state
            .status
            .transition(ConnectionStatus::Connected, ConnectionStatus::Disconnected)
        {
            warn!("{reason}");
            self.state.set_last_failure(Some(reason));
        } else {
            debug!("ignoring failure during teardown: {reason}");
        }
        self.shut_down();
    }

    /// Register interest in the SUBACK for `packet_id`.
    pub(crate) fn expect_suback(&self, packet_id: u16) -> Receiver<Suback> {
        let (reply, receiver) = crossbeam_channel::bounded(1);
        self.pending
            .lock()
            .push_back(PendingSuback { packet_id, reply });
        receiver
    }

    /// Withdraw a registration made with [`expect_suback`](Self::expect_suback).
    pub(crate) fn forget_suback(&self, packet_id: u16) {
        self.pending
            .lock()
            .retain(|pending| pending.packet_id != packet_id);
    }

    /// Hand a SUBACK to the subscriber waiting for it.
    ///
    /// A SUBACK whose identifier matches nobody goes to the oldest waiter,
    /// which then reports the mismatch.
    pub(crate) fn complete_suback(&self, suback: Suback) {
        let waiter = {
            let mut pending = self.pending.lock();
            match pending
                .iter()
                .position(|pending| pending.packet_id == suback.packet_id)
            {
                Some(index) => pending.remove(index),
                None => pending.pop_front(),
            }
        };
        match waiter {
            Some(waiter) => {
                // The subscriber may have timed out already.
                let _ = waiter.reply.try_send(suback);
            }
            None => debug!("unsolicited SUBACK for packet id {}", suback.packet_id),
        }
    }
}
