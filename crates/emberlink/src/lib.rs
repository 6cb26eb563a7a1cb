//! # Emberlink
//!
//! Framed, fragmenting message link for game clients and servers.
//!
//! Emberlink turns typed game messages into datagrams and back. Messages
//! are encoded with the binary catalogue from `emberlink-protocol`,
//! wrapped in 6-byte frames, split into parts when they don't fit one
//! datagram, and reassembled on the other side.
//!
//! - [`Connection`]: the synchronous pipeline. Owns the receive buffer
//!   and reassembly state for one link. No I/O.
//! - [`Messenger`]: runs a `Connection` over any
//!   [`Transport`](emberlink_transport::Transport) on its own task.
//! - [`ConnectionConfig`]: transmission size, limits, timeouts.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use emberlink::prelude::*;
//!
//! # async fn demo() -> Result<(), EmberlinkError> {
//! let transport = UdpTransport::bind("0.0.0.0:0").await?;
//! transport.connect("127.0.0.1:7777".parse().unwrap()).await?;
//!
//! let mut link = Messenger::spawn(transport, ConnectionConfig::default())?;
//! link.send(Login { name: "alice".into(), password: "secret".into() }).await?;
//!
//! while let Some(message) = link.recv().await {
//!     println!("{:?}", message.message_type());
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod error;
mod messenger;

pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use connection::Connection;
pub use error::EmberlinkError;
pub use messenger::{Messenger, MessengerHandle};

pub use emberlink_protocol as protocol;
pub use emberlink_transport as transport;
pub use emberlink_wire as wire;

/// Installs a `tracing` subscriber that logs to stdout.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. Calling it
/// more than once is harmless: only the first call installs anything.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// The types most programs need, in one import.
pub mod prelude {
    pub use crate::{
        Connection, ConnectionConfig, EmberlinkError, Messenger, MessengerHandle,
    };
    pub use emberlink_protocol::*;
    pub use emberlink_transport::{ConnectionId, MemoryTransport, Transport, UdpTransport};
}
