//! Packet identifier generation.
//!
//! SUBSCRIBE (and QoS > 0 PUBLISH) packets carry a 16-bit identifier that the
//! broker echoes in its acknowledgement. Identifiers are handed out in
//! increasing order and wrap from 65535 back to 1; zero is never used.

use core::sync::atomic::{AtomicU16, Ordering};

/// Monotonic, wrapping packet identifier source, one per connection.
#[derive(Debug)]
pub struct PacketIdGenerator {
    next: AtomicU16,
}

impl Default for PacketIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketIdGenerator {
    /// A generator whose first identifier is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// A generator whose first identifier is `first` (or 1 if `first` is 0).
    pub fn starting_at(first: u16) -> Self {
        Self {
            next: AtomicU16::new(first.max(1)),
        }
    }

    /// Take the next identifier.
    pub fn next_id(&self) -> u16 {
        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            let following = match current.wrapping_add(1) {
                0 => 1,
                id => id,
            };
            match self.next.compare_exchange_weak(
                current,
                following,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current,
                Err(actual) => current = actual,
            }
        }
    }
}
