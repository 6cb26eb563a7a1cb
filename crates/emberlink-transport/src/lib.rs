//! Transport abstraction layer for Emberlink.
//!
//! Provides the [`Transport`] trait: something that can move whole
//! datagrams to and from one peer. The framing layer above only ever
//! calls `send(bytes)` and `recv()`, so anything from a UDP socket to an
//! in-process channel can carry the protocol.
//!
//! # Feature Flags
//!
//! - `udp` (default): [`UdpTransport`] over a connected `tokio` UDP socket

mod error;
mod memory;
#[cfg(feature = "udp")]
mod udp;

pub use error::TransportError;
pub use memory::MemoryTransport;
#[cfg(feature = "udp")]
pub use udp::UdpTransport;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A datagram link to a single peer.
///
/// Every `send` is delivered (if at all) as one unit, and every `recv`
/// yields exactly one unit. Delivery order and reliability are whatever
/// the underlying medium gives.
///
/// The methods return `Send` futures so a transport can be driven from a
/// spawned Tokio task. Implementations just write `async fn`.
pub trait Transport: Send + Sync + 'static {
    /// Sends one datagram to the peer.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Waits for the next datagram.
    ///
    /// Returns `Ok(None)` once the transport is closed. Must be
    /// cancel-safe: dropping the future before it completes loses no data.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the transport. Pending and future `recv` calls return `None`.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
