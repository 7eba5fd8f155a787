//! Broadcast shutdown signal shared by the pipeline activities.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::Arc;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

/// A one-shot, level-triggered signal.
///
/// Nothing is ever sent on the underlying channel: triggering drops the only
/// sender, which wakes every receiver at once and keeps them woken. Every
/// clone observes the same signal, and triggering more than once is a no-op.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    triggered: AtomicBool,
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
}

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                triggered: AtomicBool::new(false),
                sender: Mutex::new(Some(sender)),
                receiver,
            }),
        }
    }

    /// Fire the signal. Returns `true` for the call that actually fired it.
    pub(crate) fn trigger(&self) -> bool {
        if self.inner.triggered.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.sender.lock().take();
        true
    }

    /// Returns `true` once the signal has fired.
    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// Block until the signal fires.
    pub fn wait(&self) {
        // Only ever returns with `Disconnected`.
        let _ = self.inner.receiver.recv();
    }

    /// Block until the signal fires or `timeout` elapses.
    ///
    /// Returns `true` if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.inner.receiver.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            _ => self.is_triggered(),
        }
    }

    /// Receiver that becomes ready, permanently, when the signal fires.
    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.inner.receiver
    }
}
