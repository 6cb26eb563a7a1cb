//! Error types for the wire layer.
//!
//! Everything here is about *bytes and boundaries*: frames that are too
//! big to describe, buffers that grew past their cap, and multipart groups
//! whose parts disagree with each other. Nothing in this file knows what
//! a "Login" or an "Entity" is; that's the protocol crate's job.

/// Errors that can occur while framing, fragmenting, or reassembling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// A single frame was asked to carry more payload than the 16-bit
    /// length field can describe.
    ///
    /// This is a programmer error on the send path: the caller should
    /// have fragmented the message first. It is fatal to that one send,
    /// never to the connection.
    #[error("frame payload of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    /// The receive buffer would grow past its configured cap.
    ///
    /// The peer is sending faster than frames are being extracted (or is
    /// sending garbage that never resolves into a frame). This one IS
    /// fatal: the connection must be reset.
    #[error(
        "receive buffer overflow: {buffered} buffered + {incoming} incoming exceeds {limit} bytes"
    )]
    BufferOverflow {
        buffered: usize,
        incoming: usize,
        limit: usize,
    },

    /// The parts of a multipart group contradict each other (or a part
    /// contradicts itself). The group is discarded; the connection lives on.
    #[error("inconsistent fragmentation in group {group_id}: {fault}")]
    InconsistentFragmentation {
        group_id: u32,
        fault: FragmentationFault,
    },

    /// A multipart payload ended before its declared fields did.
    #[error("truncated part frame: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// `max_chunk_bytes` must leave room for at least one payload byte.
    #[error("chunk size must be at least 1 byte")]
    InvalidChunkSize,

    /// Splitting would produce more parts than the 16-bit part counter
    /// (or the configured limit) allows.
    #[error("payload needs {parts} parts, limit is {max}")]
    TooManyParts { parts: usize, max: usize },
}

/// The specific way a multipart group went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FragmentationFault {
    /// `part_index` is not below `total_parts`.
    #[error("part index {part_index} out of range for {total_parts} parts")]
    PartIndexOutOfRange { part_index: u16, total_parts: u16 },

    /// A later part declared a different `total_parts` than the first one.
    #[error("total parts changed from {expected} to {found}")]
    TotalPartsMismatch { expected: u16, found: u16 },

    /// A group cannot consist of zero parts.
    #[error("group declares zero parts")]
    ZeroParts,

    /// The group is larger than the receiver is willing to hold.
    #[error("group declares {total_parts} parts, limit is {max}")]
    TooManyParts { total_parts: u16, max: usize },
}
