//! Sanity limits for the receive side.

use serde::{Deserialize, Serialize};

use crate::MAX_FRAME_LEN;

/// Caps that keep a misbehaving peer from growing our memory without bound.
///
/// These are hardening limits. The protocol itself has none. Every field
/// is generous enough that a well-behaved peer never hits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireLimits {
    /// Maximum number of not-yet-framed bytes the receive buffer may hold.
    ///
    /// Must be at least [`MAX_FRAME_LEN`], otherwise a legal maximum-size
    /// frame could never complete. Exceeding it is a fatal
    /// [`BufferOverflow`](crate::WireError::BufferOverflow).
    pub max_buffer_bytes: usize,

    /// Largest `total_parts` a reassembly group may declare.
    pub max_parts: usize,

    /// How many incomplete groups may be open at once. When a new group
    /// would exceed this, the oldest open group is evicted.
    pub max_open_groups: usize,
}

impl Default for WireLimits {
    fn default() -> Self {
        Self {
            // Room for a few maximum-size frames queued back to back.
            max_buffer_bytes: 256 * 1024,
            // 1024 parts × ~500 bytes ≈ 500 KB per message, far above
            // anything the 16-bit inner frame length can produce.
            max_parts: 1024,
            max_open_groups: 64,
        }
    }
}

impl WireLimits {
    /// Small limits for tests that want to hit the edges quickly.
    pub const fn for_testing() -> Self {
        Self {
            max_buffer_bytes: MAX_FRAME_LEN,
            max_parts: 16,
            max_open_groups: 4,
        }
    }
}
