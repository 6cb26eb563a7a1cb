//! Unified error type for Emberlink.

use emberlink_protocol::ProtocolError;
use emberlink_transport::TransportError;
use emberlink_wire::WireError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `emberlink` crate you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum EmberlinkError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (unknown type, malformed payload).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A framing-level error (oversized frame, buffer overflow).
    #[error(transparent)]
    Wire(#[from] WireError),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The messenger task has already stopped.
    #[error("messenger closed")]
    Closed,

    /// The messenger task panicked or was cancelled.
    #[error("messenger task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl EmberlinkError {
    /// Whether the connection has to be torn down after this error.
    ///
    /// Per-message problems (bad payload, unknown type, an oversized send)
    /// are not fatal. A receive buffer overflow, a dead transport, or a
    /// stopped messenger are.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Wire(WireError::BufferOverflow { .. })
            | Self::Protocol(ProtocolError::Wire(WireError::BufferOverflow { .. })) => true,
            Self::Transport(_) | Self::Closed | Self::Task(_) => true,
            Self::Wire(_) | Self::Protocol(_) | Self::Config(_) => false,
        }
    }
}
