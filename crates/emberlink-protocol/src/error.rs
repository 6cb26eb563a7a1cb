//! Error types for the protocol layer.
//!
//! Each crate in Emberlink defines its own error enum. A `ProtocolError`
//! means the bytes were delimited correctly but didn't make sense as a
//! message: an unknown tag, a field that runs past the end, invalid UTF-8.

use emberlink_wire::WireError;

/// Errors that can occur while encoding or decoding messages.
///
/// None of these are fatal to a connection. The offending payload is
/// dropped and the stream carries on from the next frame boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The type tag isn't in the catalogue (or wasn't registered).
    ///
    /// Kept non-fatal so a newer peer can send types we don't know yet.
    #[error("unknown message type {0}")]
    UnknownMessageType(u16),

    /// The payload doesn't match its variant's schema.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] Malformed),

    /// A framing-level failure surfaced while handling a message.
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// What exactly was wrong with a malformed payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Malformed {
    /// A field (or its length prefix) needs more bytes than remain.
    #[error("field `{field}` needs {needed} bytes, {remaining} remain")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// A string field isn't valid UTF-8. We never substitute.
    #[error("field `{field}` is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    /// The schema was fully read but bytes were left over.
    #[error("{count} trailing bytes after message")]
    TrailingBytes { count: usize },

    /// The payload of a multipart frame couldn't be read as a part.
    #[error("bad part frame: {0}")]
    PartFrame(WireError),

    /// A reassembled group turned out to contain another multipart frame.
    #[error("multipart frame nested inside a multipart group")]
    NestedMultipart,

    /// A reassembled group isn't exactly one complete frame.
    #[error("reassembled {len} bytes do not form exactly one frame")]
    InnerFrame { len: usize },
}
