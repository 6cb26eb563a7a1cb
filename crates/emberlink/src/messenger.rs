//! Async driver that runs a [`Connection`] over a [`Transport`].
//!
//! All connection state lives on one spawned Tokio task. The rest of the
//! program talks to it through a [`MessengerHandle`]:
//!
//! ```text
//!  MessengerHandle ── Command::Send ──→ ┌────────────────────────┐ ── datagrams ──→ Transport
//!                  ── Command::Close ─→ │ messenger task         │
//!                                       │   Connection (owned)   │ ←─ datagrams ─── Transport
//!  MessengerHandle ←── Message queue ── │   eviction interval    │
//!                                       └────────────────────────┘
//! ```
//!
//! Because only the task touches the `Connection`, bytes are always
//! consumed in arrival order without any locking.

use std::time::Duration;

use emberlink_protocol::{Disconnected, Message};
use emberlink_transport::{ConnectionId, Transport};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use crate::{Connection, ConnectionConfig, EmberlinkError};

/// Requests from the handle to the task.
enum Command {
    Send {
        message: Message,
        reply: oneshot::Sender<Result<(), EmberlinkError>>,
    },
    Close,
}

/// The task side: owns the transport and the connection.
pub struct Messenger<T: Transport> {
    transport: T,
    connection: Connection,
    commands: mpsc::Receiver<Command>,
    inbound: mpsc::Sender<Message>,
    eviction_interval: Duration,
}

impl<T: Transport> Messenger<T> {
    /// Validates `config`, then spawns the task driving `transport`.
    ///
    /// # Errors
    /// Returns [`EmberlinkError::Config`] if `config` is invalid.
    pub fn spawn(transport: T, config: ConnectionConfig) -> Result<MessengerHandle, EmberlinkError> {
        config.validate()?;

        let id = transport.id();
        let (command_tx, command_rx) = mpsc::channel(config.queue_capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(config.queue_capacity);

        let messenger = Self {
            transport,
            connection: Connection::new(&config),
            commands: command_rx,
            inbound: inbound_tx,
            eviction_interval: config.eviction_interval,
        };

        let span = tracing::info_span!("messenger", conn_id = %id);
        let task = tokio::spawn(messenger.run().instrument(span));

        Ok(MessengerHandle {
            id,
            commands: command_tx,
            inbound: inbound_rx,
            task,
        })
    }

    async fn run(mut self) -> Result<(), EmberlinkError> {
        let mut eviction = tokio::time::interval(self.eviction_interval);
        eviction.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("messenger started");

        let result = loop {
            tokio::select! {
                received = self.transport.recv() => match received {
                    Ok(Some(datagram)) => match self.connection.on_bytes(&datagram) {
                        Ok(messages) => {
                            if self.deliver(messages).await {
                                tracing::info!("peer disconnected");
                                break Ok(());
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "fatal receive error");
                            break Err(e);
                        }
                    },
                    Ok(None) => {
                        tracing::info!("transport closed");
                        break Ok(());
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "transport receive failed");
                        break Err(e.into());
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command::Send { message, reply }) => {
                        let result = self.write(&message).await;
                        // The caller may have stopped waiting.
                        let _ = reply.send(result);
                    }
                    Some(Command::Close) | None => {
                        self.say_goodbye().await;
                        break Ok(());
                    }
                },
                tick = eviction.tick() => {
                    self.connection.evict_idle(tick.into_std());
                }
            }
        };

        self.connection.reset();
        if let Err(e) = self.transport.close().await {
            tracing::debug!(error = %e, "transport close failed");
        }
        tracing::info!("messenger stopped");
        result
    }

    /// Pushes decoded messages to the handle.
    ///
    /// Returns `true` once a `Disconnected` has been delivered. Anything
    /// after it in the same batch is dropped.
    async fn deliver(&mut self, messages: Vec<Message>) -> bool {
        for message in messages {
            let disconnected = matches!(message, Message::Disconnected(_));
            if self.inbound.send(message).await.is_err() {
                tracing::debug!("inbound queue closed, message dropped");
            }
            if disconnected {
                return true;
            }
        }
        false
    }

    async fn write(&mut self, message: &Message) -> Result<(), EmberlinkError> {
        let datagrams = self.connection.send(message)?;
        for datagram in &datagrams {
            self.transport.send(datagram).await?;
        }
        tracing::trace!(
            message_type = %message.message_type(),
            datagrams = datagrams.len(),
            "message sent"
        );
        Ok(())
    }

    /// Best-effort `Disconnected` so the peer can tear down too.
    async fn say_goodbye(&mut self) {
        if let Err(e) = self.write(&Disconnected {}.into()).await {
            tracing::debug!(error = %e, "failed to send Disconnected");
        }
    }
}

// ---------------------------------------------------------------------------
// MessengerHandle
// ---------------------------------------------------------------------------

/// The caller side of a running [`Messenger`].
///
/// Dropping the handle stops the task as well (after sending
/// `Disconnected`), but [`close`](Self::close) also reports how the task
/// ended.
///
/// Keep draining [`recv`](Self::recv): while the inbound queue is full
/// the task stops reading the transport, and a `send` issued from the
/// same place that should be draining will wait forever.
pub struct MessengerHandle {
    id: ConnectionId,
    commands: mpsc::Sender<Command>,
    inbound: mpsc::Receiver<Message>,
    task: JoinHandle<Result<(), EmberlinkError>>,
}

impl MessengerHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Encodes, fragments if needed, and writes one message.
    ///
    /// Resolves once every datagram has been handed to the transport.
    ///
    /// # Errors
    /// - [`EmberlinkError::Closed`] if the task has stopped
    /// - any encode or transport error from this send
    pub async fn send(&self, message: impl Into<Message>) -> Result<(), EmberlinkError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send {
                message: message.into(),
                reply,
            })
            .await
            .map_err(|_| EmberlinkError::Closed)?;
        response.await.map_err(|_| EmberlinkError::Closed)?
    }

    /// Waits for the next decoded message.
    ///
    /// Returns `None` once the task has stopped and the queue is drained.
    pub async fn recv(&mut self) -> Option<Message> {
        self.inbound.recv().await
    }

    /// Sends `Disconnected`, stops the task, and returns how it ended.
    ///
    /// # Errors
    /// Whatever ended the task, if it wasn't a clean close.
    pub async fn close(self) -> Result<(), EmberlinkError> {
        // If the task already stopped the send fails, which is fine.
        let _ = self.commands.send(Command::Close).await;
        self.task.await?
    }
}
