//! Message catalogue and codecs for Emberlink.
//!
//! This crate defines what the bytes inside a frame *mean*:
//!
//! - **Types** ([`Message`], [`MessageType`], and one struct per variant):
//!   the versioned catalogue of everything that travels on the wire.
//! - **Field codec** ([`WireFormat`], [`Reader`]): the little-endian,
//!   length-prefixed binary layout every field uses.
//! - **Registry** ([`CodecRegistry`], the [`Codec`] trait): tag → decoder
//!   lookup, so a `u16` from a frame header becomes a typed message.
//! - **Errors** ([`ProtocolError`], [`Malformed`]).
//!
//! # Architecture
//!
//! The protocol layer sits between framing (delimited payloads) and the
//! connection (which routes messages). It never touches a socket.
//!
//! ```text
//! emberlink-wire (Frame) → Protocol (Message) → emberlink (Connection)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod registry;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{Codec, Reader, WireFormat};
pub use error::{Malformed, ProtocolError};
pub use registry::{CodecRegistry, DecodeFn, decode_as};
pub use types::{
    AbilityResult, Character, Connected, CreateAccount, CreateAccountResponse, CreateCharacter,
    CreateCharacterResponse, CreateGame, CreateGameResponse, DeleteCharacter, Disconnected, EndGame,
    Entity, GameConnected, GameMasterFrame, Heartbeat, JoinGame, ListGames, ListGamesResponse,
    Login, LoginResponse, Message, MessageType, MovePlayer, PROTOCOL_VERSION, UseAbility,
};
