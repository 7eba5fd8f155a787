//! Reassembly of packets from an unframed byte stream.
//!
//! A transport read can end in the middle of a packet or carry several
//! packets at once, so reads are accumulated here and split on the declared
//! remaining length before anything is decoded.

use bytes::{Bytes, BytesMut};

use super::codec::decode_remaining_length;
use super::error::MalformedPacket;

/// Accumulates stream bytes and yields complete packets.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the transport.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if no bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Remove and return everything buffered so far.
    pub fn take_remaining(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Split off the next complete packet, fixed header included.
    ///
    /// Returns `Ok(None)` until the whole packet has been buffered. A remaining
    /// length longer than four bytes leaves no way to find the next packet
    /// boundary, so the buffer is cleared before the error is returned.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, MalformedPacket> {
        if self.buf.len() < 2 {
            return Ok(None);
        }
        let (remaining, consumed) = match decode_remaining_length(&self.buf[1..]) {
            Ok(Some(length)) => length,
            Ok(None) => return Ok(None),
            Err(err) => {
                self.buf.clear();
                return Err(err);
            }
        };
        let frame_len = 1 + consumed + remaining;
        if self.buf.len() < frame_len {
            self.buf.reserve(frame_len - self.buf.len());
            return Ok(None);
        }
        Ok(Some(self.buf.split_to(frame_len).freeze()))
    }
}
