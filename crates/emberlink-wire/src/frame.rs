//! The frame: one header-prefixed, length-delimited unit on the wire.
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬─────────────────────┐
//! │ type_tag u16 │ sequence u16 │ length u16   │ payload[length]     │
//! └──────────────┴──────────────┴──────────────┴─────────────────────┘
//!   bytes 0-1      bytes 2-3      bytes 4-5      bytes 6..6+length
//! ```
//!
//! All integers are little-endian. The framing layer never looks inside
//! the payload. It only needs the length to know where the next frame
//! starts.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::WireError;

/// Size of the fixed frame header in bytes: `u16 + u16 + u16`.
pub const HEADER_SIZE: usize = 2 + 2 + 2;

/// Largest payload a single frame can carry (the 16-bit length field).
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Largest possible frame: header plus a maximum-length payload.
pub const MAX_FRAME_LEN: usize = HEADER_SIZE + MAX_PAYLOAD_LEN;

// ---------------------------------------------------------------------------
// FrameHeader
// ---------------------------------------------------------------------------

/// The three fixed fields at the front of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    /// Which message variant the payload holds (or the multipart tag).
    pub type_tag: u16,
    /// Sender-side counter. Informational only: nothing reorders or acks
    /// on it.
    pub sequence: u16,
    /// Number of payload bytes following the header.
    pub length: u16,
}

impl FrameHeader {
    /// Parses a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// Returns `None` when fewer than [`HEADER_SIZE`] bytes are available.
    /// Nothing is consumed: `bytes` is a shared slice, so this is a pure
    /// "peek".
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        // `Buf` is implemented for `&[u8]`: each `get_*` call advances the
        // local slice, not the caller's buffer.
        let mut cursor = &bytes[..HEADER_SIZE];
        Some(Self {
            type_tag: cursor.get_u16_le(),
            sequence: cursor.get_u16_le(),
            length: cursor.get_u16_le(),
        })
    }

    /// Appends the header's wire form to `buf`.
    pub fn write_to(&self, buf: &mut impl BufMut) {
        buf.put_u16_le(self.type_tag);
        buf.put_u16_le(self.sequence);
        buf.put_u16_le(self.length);
    }

    /// Total size of the frame this header describes.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + usize::from(self.length)
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A complete frame: header plus exactly `header.length` payload bytes.
///
/// Frames are transient. The decoder hands them out, the connection
/// decodes their payload, and they're dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    /// Builds a frame, checking that the payload fits the length field.
    ///
    /// # Errors
    /// Returns [`WireError::FrameTooLarge`] if `payload` is longer than
    /// [`MAX_PAYLOAD_LEN`].
    pub fn new(
        type_tag: u16,
        sequence: u16,
        payload: Bytes,
    ) -> Result<Self, WireError> {
        let length = u16::try_from(payload.len()).map_err(|_| {
            WireError::FrameTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            }
        })?;
        Ok(Self {
            header: FrameHeader {
                type_tag,
                sequence,
                length,
            },
            payload,
        })
    }

    /// Parses `bytes` as exactly one frame.
    ///
    /// Returns `None` if the header is incomplete or if the declared
    /// length doesn't match the bytes provided (short *or* trailing).
    /// Used for payloads that arrive already delimited, such as a
    /// reassembled multipart group.
    pub fn parse_exact(bytes: Bytes) -> Option<Self> {
        let header = FrameHeader::parse(&bytes)?;
        if bytes.len() != header.frame_len() {
            return None;
        }
        Some(Self {
            header,
            payload: bytes.slice(HEADER_SIZE..),
        })
    }

    pub fn type_tag(&self) -> u16 {
        self.header.type_tag
    }

    pub fn sequence(&self) -> u16 {
        self.header.sequence
    }

    /// Total size on the wire (header + payload).
    pub fn len(&self) -> usize {
        self.header.frame_len()
    }

    /// A frame always has a header, so it's never truly empty. This
    /// reports whether the *payload* is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Serializes the frame into one contiguous buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len());
        self.header.write_to(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }
}

/// Wraps `payload` in a header and returns the transmittable bytes.
///
/// No side effects: this is a pure function of its arguments.
///
/// # Errors
/// Returns [`WireError::FrameTooLarge`] if `payload` exceeds the 16-bit
/// length field. Callers must fragment before this point.
pub fn encode_frame(
    type_tag: u16,
    sequence: u16,
    payload: &[u8],
) -> Result<Bytes, WireError> {
    let length =
        u16::try_from(payload.len()).map_err(|_| WireError::FrameTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        })?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    FrameHeader {
        type_tag,
        sequence,
        length,
    }
    .write_to(&mut buf);
    buf.extend_from_slice(payload);
    Ok(buf.freeze())
}
