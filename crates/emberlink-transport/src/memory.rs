//! In-process transport over Tokio channels.
//!
//! [`MemoryTransport::pair`] returns two ends wired to each other. Each
//! `send` arrives at the other end as one datagram, in order, with no
//! loss. Handy for tests and for running client and server in one binary.

use tokio::sync::{Mutex, mpsc, watch};

use crate::{ConnectionId, Transport, TransportError};

/// One end of an in-memory datagram link.
pub struct MemoryTransport {
    id: ConnectionId,
    /// `None` once closed. Dropping the sender is what tells the peer.
    tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    closed: watch::Sender<bool>,
}

impl MemoryTransport {
    /// Creates a connected pair. Each direction buffers up to `capacity`
    /// datagrams before `send` waits.
    pub fn pair(capacity: usize) -> (Self, Self) {
        let capacity = capacity.max(1);
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(tx: mpsc::Sender<Vec<u8>>, rx: mpsc::Receiver<Vec<u8>>) -> Self {
        let id = ConnectionId::next();
        tracing::debug!(%id, "memory transport created");
        Self {
            id,
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
            closed: watch::Sender::new(false),
        }
    }
}

impl Transport for MemoryTransport {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        // Clone the sender out so the lock isn't held while we wait for
        // channel capacity.
        let tx = self
            .tx
            .lock()
            .await
            .clone()
            .ok_or_else(|| TransportError::ConnectionClosed("closed locally".into()))?;

        tx.send(data.to_vec())
            .await
            .map_err(|_| TransportError::ConnectionClosed("peer dropped".into()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }

        let mut rx = self.rx.lock().await;
        tokio::select! {
            datagram = rx.recv() => Ok(datagram),
            _ = closed.changed() => Ok(None),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.tx.lock().await.take();
        self.closed.send_replace(true);
        tracing::debug!(id = %self.id, "memory transport closed");
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_both_ways() {
        let (a, b) = MemoryTransport::pair(4);
        a.send(b"ping").await.unwrap();
        b.send(b"pong").await.unwrap();

        assert_eq!(b.recv().await.unwrap().unwrap(), b"ping");
        assert_eq!(a.recv().await.unwrap().unwrap(), b"pong");
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream_after_drain() {
        let (a, b) = MemoryTransport::pair(4);
        a.send(b"last words").await.unwrap();
        a.close().await.unwrap();

        assert_eq!(b.recv().await.unwrap().unwrap(), b"last words");
        assert!(b.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_closed_end_rejects_send_and_recv() {
        let (a, _b) = MemoryTransport::pair(4);
        a.close().await.unwrap();

        assert!(matches!(
            a.send(b"x").await,
            Err(TransportError::ConnectionClosed(_))
        ));
        assert!(a.recv().await.unwrap().is_none());
    }
}
