//! Incremental frame extraction from an arbitrarily chunked byte stream.
//!
//! The transport hands us bytes in whatever sizes it likes: half a header,
//! three frames glued together, one frame split across five reads. The
//! [`FrameDecoder`] owns a receive buffer that soaks all of that up and
//! hands back frames one at a time, only ever consuming bytes that belong
//! to a *complete* frame.
//!
//! ```text
//! feed([..6 bytes header..][..4 of 10 payload bytes..])
//!     try_extract_frame() → None        buffer keeps all 10 bytes
//! feed([..remaining 6 payload bytes..][..next header..])
//!     try_extract_frame() → Some(frame) buffer keeps the next header
//!     try_extract_frame() → None
//! ```

use bytes::BytesMut;

use crate::{Frame, FrameHeader, HEADER_SIZE, WireError, WireLimits};

/// Initial receive buffer capacity. Grows (amortized doubling, courtesy
/// of `BytesMut`) when a burst needs more.
const INITIAL_CAPACITY: usize = 8 * 1024;

/// Owns the receive buffer and slices complete frames off its front.
///
/// Single owner, no interior mutability: whoever holds `&mut FrameDecoder`
/// is the only thing that can touch the buffer, so bytes are always
/// consumed in arrival order.
#[derive(Debug)]
pub struct FrameDecoder {
    /// Bytes received but not yet returned as part of a frame.
    buffer: BytesMut,
    /// Cap on `buffer.len()`.
    max_buffer_bytes: usize,
}

impl FrameDecoder {
    /// Creates a decoder with the default [`WireLimits`].
    pub fn new() -> Self {
        Self::with_limits(&WireLimits::default())
    }

    /// Creates a decoder whose buffer is capped by `limits.max_buffer_bytes`.
    pub fn with_limits(limits: &WireLimits) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            max_buffer_bytes: limits.max_buffer_bytes,
        }
    }

    /// Appends newly arrived bytes to the receive buffer.
    ///
    /// # Errors
    /// Returns [`WireError::BufferOverflow`] if the buffer would exceed its
    /// cap. Nothing is appended in that case; the caller is expected to
    /// tear the connection down.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        let wanted = self.buffer.len() + bytes.len();
        if wanted > self.max_buffer_bytes {
            return Err(WireError::BufferOverflow {
                buffered: self.buffer.len(),
                incoming: bytes.len(),
                limit: self.max_buffer_bytes,
            });
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Tries to pull one complete frame off the front of the buffer.
    ///
    /// - fewer than [`HEADER_SIZE`] bytes buffered → `None`
    /// - header known, payload incomplete → `None`, **nothing consumed**
    /// - otherwise → the frame, and exactly `HEADER_SIZE + length` bytes
    ///   are removed from the front
    ///
    /// One `feed` may carry several frames, so callers loop until this
    /// returns `None`.
    pub fn try_extract_frame(&mut self) -> Option<Frame> {
        // Peek at the header. `parse` borrows the buffer immutably and
        // returns a Copy value, so no bytes move yet.
        let header = FrameHeader::parse(&self.buffer)?;
        let frame_len = header.frame_len();

        if self.buffer.len() < frame_len {
            tracing::trace!(
                buffered = self.buffer.len(),
                needed = frame_len,
                "waiting for rest of frame"
            );
            return None;
        }

        // `split_to` detaches the first `frame_len` bytes into their own
        // handle without copying. `freeze` turns that into immutable
        // `Bytes`, and `slice` is another zero-copy view.
        let raw = self.buffer.split_to(frame_len).freeze();
        Some(Frame {
            header,
            payload: raw.slice(HEADER_SIZE..),
        })
    }

    /// Extracts every complete frame currently buffered, in order.
    ///
    /// Trailing partial bytes stay in the buffer untouched.
    pub fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_frame() {
            frames.push(frame);
        }
        frames
    }

    /// Number of bytes waiting in the receive buffer.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// The bytes waiting in the receive buffer.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drops every buffered byte. Used when a connection is torn down.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
