//! The three activities that run while a connection is up.
//!
//! - the **reader** owns the read half of the transport, reassembles and
//!   decodes packets, routes SUBACKs to waiting subscribers and queues
//!   PUBLISHes for the dispatcher;
//! - the **dispatcher** drains that bounded queue in arrival order and hands
//!   each message to the registered handler;
//! - the **keepalive** writes a PINGREQ on every tick of the ping interval.
//!
//! All three stop when the session's shutdown signal fires. The reader also
//! fires it, by failing the session, when the transport times out, errors or
//! reaches end of stream. Messages already queued at that point are still
//! handed to the handler before the dispatcher exits.

use core::time::Duration;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError, select};
use log::{debug, error, info, trace, warn};

use super::codec::{self, PINGREQ_PACKET};
use super::frame::FrameBuffer;
use super::options::Options;
use super::packet::{Packet, Publish, QoS};
use super::session::{ConnectionStatus, FailureReason, Session};
use crate::network::{self, Connection, Read};

const READ_CHUNK: usize = 4096;

/// Join handles of a running pipeline.
#[derive(Debug)]
pub(crate) struct Pipeline {
    handles: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Spawn the reader, dispatcher and keepalive for `session`.
    ///
    /// `frames` holds whatever arrived after CONNACK during the handshake. If
    /// a thread cannot be spawned the session is shut down and the ones that
    /// did start are joined before the error is returned.
    pub(crate) fn start<C: Connection>(
        session: &Arc<Session<C>>,
        reader: C::Reader,
        frames: FrameBuffer,
        options: &Options,
    ) -> Result<Self, network::Error> {
        let (incoming_tx, incoming_rx) = crossbeam_channel::bounded(options.queue_capacity);
        let mut pipeline = Self {
            handles: Vec::with_capacity(3),
        };

        let reader_task = {
            let session = Arc::clone(session);
            let read_timeout = options.read_timeout();
            move || run_reader(session, reader, frames, incoming_tx, read_timeout)
        };
        let dispatcher_task = {
            let session = Arc::clone(session);
            move || run_dispatcher(session, incoming_rx)
        };
        let keepalive_task = {
            let session = Arc::clone(session);
            let interval = options.ping_interval();
            move || run_keepalive(session, interval)
        };

        let spawned = pipeline
            .spawn("mqtt-reader", reader_task)
            .and_then(|()| pipeline.spawn("mqtt-dispatcher", dispatcher_task))
            .and_then(|()| pipeline.spawn("mqtt-keepalive", keepalive_task));
        if let Err(err) = spawned {
            session.shut_down();
            pipeline.join();
            return Err(err.into());
        }
        Ok(pipeline)
    }

    fn spawn<F>(&mut self, name: &str, task: F) -> std::io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new().name(name.to_owned()).spawn(task)?;
        self.handles.push(handle);
        Ok(())
    }

    /// Wait for every activity to finish.
    ///
    /// Returns immediately once the shutdown signal has fired and the
    /// transport is closed.
    pub(crate) fn join(self) {
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("mqtt").to_owned();
            if handle.join().is_err() {
                error!("{name} thread panicked");
            }
        }
    }
}

fn run_reader<C: Connection>(
    session: Arc<Session<C>>,
    mut reader: C::Reader,
    mut frames: FrameBuffer,
    incoming: Sender<Publish>,
    read_timeout: Duration,
) {
    let mut buf = [0u8; READ_CHUNK];
    if drain_frames(&session, &mut frames, &incoming) {
        loop {
            if session.shutdown.is_triggered() {
                break;
            }
            // Re-armed before every read so silence is measured from the
            // last byte received.
            if let Err(err) = reader.set_read_timeout(Some(read_timeout)) {
                session.fail(FailureReason::Transport(err.to_string()));
                break;
            }
            match reader.read(&mut buf) {
                Ok(0) => {
                    session.fail(FailureReason::PeerClosed);
                    break;
                }
                Ok(n) => {
                    frames.extend(&buf[..n]);
                    if !drain_frames(&session, &mut frames, &incoming) {
                        break;
                    }
                }
                Err(err) if session.shutdown.is_triggered() => {
                    trace!("read interrupted by shutdown: {err}");
                    break;
                }
                Err(network::Error::Timeout) => {
                    session.fail(FailureReason::ReadTimeout);
                    break;
                }
                Err(network::Error::ConnectionClosed) => {
                    session.fail(FailureReason::PeerClosed);
                    break;
                }
                Err(err) => {
                    session.fail(FailureReason::Transport(err.to_string()));
                    break;
                }
            }
        }
    }
    debug!("reader stopped");
}

/// Decode and route every complete packet in `frames`.
///
/// Returns `false` if shutdown fired while waiting for room in the queue.
fn drain_frames<C: Connection>(
    session: &Session<C>,
    frames: &mut FrameBuffer,
    incoming: &Sender<Publish>,
) -> bool {
    loop {
        match frames.next_frame() {
            Ok(Some(frame)) => match codec::decode(&frame) {
                Ok(packet) => {
                    if !route(session, packet, incoming) {
                        return false;
                    }
                }
                Err(err) => warn!("dropping malformed packet: {err}"),
            },
            Ok(None) => return true,
            Err(err) => warn!("discarding buffered input: {err}"),
        }
    }
}

fn route<C: Connection>(session: &Session<C>, packet: Packet, incoming: &Sender<Publish>) -> bool {
    match packet {
        Packet::Publish(publish) => enqueue(session, publish, incoming),
        Packet::Suback(suback) => {
            trace!("SUBACK for packet id {}", suback.packet_id);
            session.complete_suback(suback);
            true
        }
        Packet::Pingresp => {
            trace!("PINGRESP received");
            true
        }
        Packet::Puback { packet_id } => {
            debug!("PUBACK for packet id {packet_id}");
            true
        }
        other => {
            warn!("ignoring unexpected {} packet", other.name());
            true
        }
    }
}

/// Queue a message for the dispatcher, blocking while the queue is full.
fn enqueue<C: Connection>(session: &Session<C>, publish: Publish, incoming: &Sender<Publish>) -> bool {
    let publish = match incoming.try_send(publish) {
        Ok(()) => return true,
        Err(TrySendError::Disconnected(_)) => return false,
        Err(TrySendError::Full(publish)) => publish,
    };
    debug!("inbound queue full, waiting for the dispatcher");
    select! {
        send(incoming, publish) -> sent => sent.is_ok(),
        recv(session.shutdown.receiver()) -> _ => false,
    }
}

fn run_dispatcher<C: Connection>(session: Arc<Session<C>>, incoming: Receiver<Publish>) {
    let shutdown = session.shutdown.receiver().clone();
    loop {
        select! {
            recv(incoming) -> publish => match publish {
                Ok(publish) => deliver(&session, publish),
                Err(_) => break,
            },
            recv(shutdown) -> _ => {
                drain_queue(&session, &incoming);
                break;
            }
        }
    }
    debug!("dispatcher stopped");
}

/// Deliver whatever the reader queued before it stopped.
///
/// Returns once the reader has exited and dropped its end of the queue.
fn drain_queue<C: Connection>(session: &Session<C>, incoming: &Receiver<Publish>) {
    let mut delivered = 0usize;
    for publish in incoming.iter() {
        deliver(session, publish);
        delivered += 1;
    }
    if delivered > 0 {
        debug!("delivered {delivered} queued message(s) after shutdown");
    }
}

fn deliver<C: Connection>(session: &Session<C>, publish: Publish) {
    if !session.state.is_subscribed(&publish.topic) {
        debug!("message on {} matches no confirmed subscription", publish.topic);
    }

    match session.state.handler() {
        Some(handler) => {
            let topic = publish.topic.as_str();
            let payload = publish.payload.as_slice();
            if panic::catch_unwind(AssertUnwindSafe(|| handler(topic, payload))).is_err() {
                error!("message handler panicked on topic {topic}");
            }
        }
        None => info!(
            "received message on topic {}: {}",
            publish.topic,
            String::from_utf8_lossy(&publish.payload)
        ),
    }

    match (publish.qos, publish.packet_id) {
        (QoS::AtLeastOnce, Some(packet_id)) => {
            match session.send(&codec::encode_puback(packet_id)) {
                Ok(()) => {}
                Err(err) if session.shutdown.is_triggered() => {
                    debug!("PUBACK for packet id {packet_id} not sent: {err}")
                }
                Err(err) => session.fail(FailureReason::WriteFailed(err.to_string())),
            }
        }
        (QoS::ExactlyOnce, _) => {
            warn!("QoS 2 delivery on {} was not acknowledged", publish.topic)
        }
        _ => {}
    }
}

fn run_keepalive<C: Connection>(session: Arc<Session<C>>, interval: Duration) {
    let ticker = crossbeam_channel::tick(interval);
    let shutdown = session.shutdown.receiver().clone();
    loop {
        select! {
            recv(ticker) -> _ => {
                if session.state.status.load() != ConnectionStatus::Connected {
                    break;
                }
                trace!("sending PINGREQ");
                if let Err(err) = session.send(&PINGREQ_PACKET) {
                    session.fail(FailureReason::KeepaliveFailed(err.to_string()));
                    break;
                }
            },
            recv(shutdown) -> _ => break,
        }
    }
    debug!("keepalive stopped");
}
