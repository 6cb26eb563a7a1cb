//! Byte-level plumbing for Emberlink.
//!
//! This crate knows how bytes become frames and how frames that are too
//! big for one datagram get split up and put back together. It knows
//! nothing about what a frame *means*.
//!
//! - **Frames** ([`FrameHeader`], [`Frame`], [`encode_frame`]): the 6-byte
//!   header and its payload.
//! - **Stream decoding** ([`FrameDecoder`]): turns an arbitrarily chunked
//!   byte stream into whole frames.
//! - **Fragmentation** ([`PartFrame`], [`split`], [`Fragmenter`]): the
//!   send side of multipart messages.
//! - **Reassembly** ([`Reassembler`]): the receive side.
//! - **Limits** ([`WireLimits`]): caps that keep a hostile peer from
//!   exhausting memory.
//!
//! # Architecture
//!
//! ```text
//! Transport (datagrams) → FrameDecoder (frames) → Reassembler (inner frames)
//!                                                     ↓
//!                                   emberlink-protocol (typed messages)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod decoder;
mod error;
mod frame;
mod limits;
mod multipart;
mod reassembly;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use decoder::FrameDecoder;
pub use error::{FragmentationFault, WireError};
pub use frame::{Frame, FrameHeader, HEADER_SIZE, MAX_FRAME_LEN, MAX_PAYLOAD_LEN, encode_frame};
pub use limits::WireLimits;
pub use multipart::{
    DEFAULT_MAX_TRANSMISSION_SIZE, Fragmenter, MULTIPART_TAG, PART_OVERHEAD, PartFrame,
    max_chunk_for, split,
};
pub use reassembly::Reassembler;
