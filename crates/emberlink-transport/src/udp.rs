//! UDP transport over a connected `tokio` socket.

use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;

use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::sync::watch;

use crate::{ConnectionId, Transport, TransportError};

/// Largest datagram we'll accept. Anything longer is truncated by the OS,
/// and the frame decoder will then wait for bytes that never come.
const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// A [`Transport`] over one UDP socket talking to one peer.
///
/// Bind first, then [`connect`](Self::connect) to fix the peer address.
/// After that `send`/`recv` only exchange datagrams with that peer.
pub struct UdpTransport {
    id: ConnectionId,
    socket: UdpSocket,
    /// Scratch space for `recv`. Only locked around the non-blocking
    /// `try_recv`, never across an `.await`.
    recv_buf: Mutex<Vec<u8>>,
    closed: watch::Sender<bool>,
}

impl UdpTransport {
    /// Binds a socket to `addr`. Use port 0 to let the OS pick.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        let id = ConnectionId::next();
        if let Ok(local) = socket.local_addr() {
            tracing::info!(%id, %local, "UDP transport bound");
        }
        Ok(Self {
            id,
            socket,
            recv_buf: Mutex::new(vec![0u8; RECV_BUFFER_SIZE]),
            closed: watch::Sender::new(false),
        })
    }

    /// Fixes the peer address for `send` and filters `recv` to it.
    pub async fn connect(&self, peer: SocketAddr) -> Result<(), TransportError> {
        self.socket
            .connect(peer)
            .await
            .map_err(TransportError::BindFailed)?;
        tracing::debug!(id = %self.id, %peer, "UDP transport connected");
        Ok(())
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket.local_addr().map_err(TransportError::BindFailed)
    }
}

impl UdpTransport {
    fn try_recv_datagram(&self) -> io::Result<Vec<u8>> {
        // A panic while holding the lock can't leave the buffer invalid.
        let mut buf = self.recv_buf.lock().unwrap_or_else(|e| e.into_inner());
        let n = self.socket.try_recv(&mut buf)?;
        Ok(buf[..n].to_vec())
    }
}

impl Transport for UdpTransport {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if *self.closed.borrow() {
            return Err(TransportError::ConnectionClosed("closed locally".into()));
        }
        self.socket
            .send(data)
            .await
            .map_err(TransportError::SendFailed)?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }

        loop {
            tokio::select! {
                ready = self.socket.readable() => {
                    ready.map_err(TransportError::ReceiveFailed)?;
                }
                _ = closed.changed() => return Ok(None),
            }

            match self.try_recv_datagram() {
                Ok(datagram) => return Ok(Some(datagram)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                // ICMP port unreachable from an earlier send: the peer isn't
                // listening (yet). Datagram links carry on.
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    tracing::debug!(id = %self.id, error = %e, "peer refused datagram");
                    continue;
                }
                Err(e) => return Err(TransportError::ReceiveFailed(e)),
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.send_replace(true);
        tracing::debug!(id = %self.id, "UDP transport closed");
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
