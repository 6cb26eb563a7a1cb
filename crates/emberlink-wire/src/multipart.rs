//! Splitting oversized frames into bounded-size parts.
//!
//! A datagram can only carry so much. When an encoded frame would exceed
//! the transmission budget, the sender wraps it in several *part frames*,
//! all tagged [`MULTIPART_TAG`] and sharing one `group_id`:
//!
//! ```text
//! inner frame (2000 B) ──split──→ part 0 │ part 1 │ part 2 │ part 3 │ part 4
//!                                  ↓ each wrapped in its own outer frame
//!                                 [hdr|PartFrame{0, g, 5, chunk0}] ...
//! ```
//!
//! Part frame payload layout (little-endian):
//!
//! ```text
//! u16 part_index | u32 group_id | u16 total_parts | u32 chunk_len | chunk
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::{Frame, HEADER_SIZE, WireError, encode_frame};

/// The reserved type tag for part frames.
pub const MULTIPART_TAG: u16 = 1;

/// Bytes of bookkeeping in front of every chunk:
/// `part_index (2) + group_id (4) + total_parts (2) + chunk_len (4)`.
pub const PART_OVERHEAD: usize = 2 + 4 + 2 + 4;

/// Default per-datagram budget, header included.
pub const DEFAULT_MAX_TRANSMISSION_SIZE: usize = 512;

/// Largest chunk that keeps a part frame inside `max_transmission_size`.
///
/// Returns 0 when the budget can't even hold the headers.
pub const fn max_chunk_for(max_transmission_size: usize) -> usize {
    max_transmission_size.saturating_sub(HEADER_SIZE + PART_OVERHEAD)
}

// ---------------------------------------------------------------------------
// PartFrame
// ---------------------------------------------------------------------------

/// One fragment of a larger message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartFrame {
    /// 0-based position of this chunk within its group.
    pub part_index: u16,
    /// Identifies which fragmented message this part belongs to.
    pub group_id: u32,
    /// How many parts the group has in total.
    pub total_parts: u16,
    /// This part's slice of the original bytes.
    pub chunk: Bytes,
}

impl PartFrame {
    /// Exact size of this part's encoded payload.
    pub fn encoded_len(&self) -> usize {
        PART_OVERHEAD + self.chunk.len()
    }

    /// Appends the part's wire form to `buf`.
    pub fn write_to(&self, buf: &mut impl BufMut) {
        buf.put_u16_le(self.part_index);
        buf.put_u32_le(self.group_id);
        buf.put_u16_le(self.total_parts);
        // Chunks are bounded by the frame length field, so they always fit.
        buf.put_u32_le(self.chunk.len() as u32);
        buf.put_slice(&self.chunk);
    }

    /// Encodes the part into a standalone payload.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Decodes a part from the front of `bytes`.
    ///
    /// Returns the part and the number of bytes it occupied, so callers
    /// embedding parts in a larger buffer can advance past it.
    ///
    /// # Errors
    /// Returns [`WireError::Truncated`] if `bytes` ends before the fixed
    /// fields or the declared chunk do.
    pub fn decode_prefix(bytes: &[u8]) -> Result<(Self, usize), WireError> {
        if bytes.len() < PART_OVERHEAD {
            return Err(WireError::Truncated {
                needed: PART_OVERHEAD,
                available: bytes.len(),
            });
        }

        let mut cursor = bytes;
        let part_index = cursor.get_u16_le();
        let group_id = cursor.get_u32_le();
        let total_parts = cursor.get_u16_le();
        let chunk_len = cursor.get_u32_le() as usize;

        // `cursor` now points just past the fixed fields.
        if cursor.len() < chunk_len {
            return Err(WireError::Truncated {
                needed: PART_OVERHEAD + chunk_len,
                available: bytes.len(),
            });
        }

        let part = Self {
            part_index,
            group_id,
            total_parts,
            chunk: Bytes::copy_from_slice(&cursor[..chunk_len]),
        };
        Ok((part, PART_OVERHEAD + chunk_len))
    }

    /// Wraps this part in an outer frame tagged [`MULTIPART_TAG`].
    ///
    /// # Errors
    /// Returns [`WireError::FrameTooLarge`] if the chunk is too big for a
    /// single frame.
    pub fn into_frame(self, sequence: u16) -> Result<Frame, WireError> {
        Frame::new(MULTIPART_TAG, sequence, self.to_bytes())
    }
}

/// Splits `bytes` into consecutive parts of at most `max_chunk_bytes`.
///
/// The last part may be shorter. Parts come back in ascending
/// `part_index` order. An empty input still produces one (empty) part, so
/// the receiver always sees a well-formed group.
///
/// # Errors
/// - [`WireError::InvalidChunkSize`] if `max_chunk_bytes` is 0
/// - [`WireError::TooManyParts`] if more than `u16::MAX` parts are needed
pub fn split(
    group_id: u32,
    bytes: &Bytes,
    max_chunk_bytes: usize,
) -> Result<Vec<PartFrame>, WireError> {
    if max_chunk_bytes == 0 {
        return Err(WireError::InvalidChunkSize);
    }

    let parts = bytes.len().div_ceil(max_chunk_bytes).max(1);
    let total_parts =
        u16::try_from(parts).map_err(|_| WireError::TooManyParts {
            parts,
            max: usize::from(u16::MAX),
        })?;

    // `total_parts` fits in u16, so every index does too.
    let frames = (0..total_parts)
        .map(|part_index| {
            let start = usize::from(part_index) * max_chunk_bytes;
            let end = (start + max_chunk_bytes).min(bytes.len());
            PartFrame {
                part_index,
                group_id,
                total_parts,
                chunk: bytes.slice(start..end),
            }
        })
        .collect();

    Ok(frames)
}

// ---------------------------------------------------------------------------
// Fragmenter
// ---------------------------------------------------------------------------

/// Turns oversized frames into sequences of part frames.
///
/// Holds the group id counter. Each connection owns exactly one, so ids
/// are unique for the life of that connection. Wraparound at 2^32 is
/// accepted (that's four billion fragmented messages).
#[derive(Debug, Default)]
pub struct Fragmenter {
    last_group_id: u32,
}

impl Fragmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next group id. The first id handed out is 1.
    pub fn next_group_id(&mut self) -> u32 {
        self.last_group_id = self.last_group_id.wrapping_add(1);
        self.last_group_id
    }

    /// Fragments one message into multipart frames.
    ///
    /// The unit being split is the *complete inner frame*
    /// (`type_tag`, `sequence`, `payload` with its header), so the receiver
    /// can feed the reassembled bytes straight back into frame decoding.
    /// Every outer frame reuses `sequence`.
    ///
    /// # Errors
    /// - [`WireError::FrameTooLarge`] if `payload` can't fit one inner frame
    /// - [`WireError::InvalidChunkSize`] / [`WireError::TooManyParts`]
    ///   from [`split`]
    pub fn fragment(
        &mut self,
        type_tag: u16,
        sequence: u16,
        payload: &[u8],
        max_chunk_bytes: usize,
    ) -> Result<Vec<Frame>, WireError> {
        let inner = encode_frame(type_tag, sequence, payload)?;
        let group_id = self.next_group_id();
        let parts = split(group_id, &inner, max_chunk_bytes)?;

        tracing::trace!(
            group_id,
            type_tag,
            inner_len = inner.len(),
            parts = parts.len(),
            "fragmented frame"
        );

        parts
            .into_iter()
            .map(|part| part.into_frame(sequence))
            .collect()
    }
}
