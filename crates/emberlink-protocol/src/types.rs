//! The message catalogue: every type that travels on the wire.
//!
//! Each message is a plain struct whose fields are encoded in declaration
//! order (see [`WireFormat`](crate::WireFormat)). The [`Message`] enum is
//! the tagged union over all of them, and [`MessageType`] is the numbered
//! table that maps variants to the `type_tag` in the frame header.
//!
//! Tags are a contract with every deployed peer. Changing a tag or a
//! field layout means bumping [`PROTOCOL_VERSION`].

use bytes::BufMut;
use emberlink_wire::PartFrame;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::{Reader, WireFormat};
use crate::registry::{CodecRegistry, decode_as};
use crate::ProtocolError;

/// Version of the tag table and field layouts below.
pub const PROTOCOL_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// wire_struct!
// ---------------------------------------------------------------------------

/// Declares a message struct and derives its [`WireFormat`] impl from the
/// field list. Fields go on the wire in the order written here.
macro_rules! wire_struct {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                pub $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub struct $name {
            $(
                $(#[$fmeta])*
                pub $field: $ty,
            )*
        }

        impl WireFormat for $name {
            fn encoded_len(&self) -> usize {
                0 $( + self.$field.encoded_len() )*
            }

            fn encode(&self, _buf: &mut impl BufMut) {
                $( self.$field.encode(_buf); )*
            }

            fn decode(
                _reader: &mut Reader<'_>,
                _field: &'static str,
            ) -> Result<Self, ProtocolError> {
                Ok(Self {
                    $(
                        $field: WireFormat::decode(
                            _reader,
                            concat!(stringify!($name), ".", stringify!($field)),
                        )?,
                    )*
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

wire_struct! {
    /// Keep-alive carrying the sender's clock.
    pub struct Heartbeat {
        /// Sender time in nanoseconds since the Unix epoch.
        pub time: i64,
    }
}

wire_struct! {
    /// Server's answer to a new client: are you in?
    pub struct Connected {
        /// Non-zero means connected.
        pub is_connected: u8,
    }
}

wire_struct! {
    /// Either side is going away. Receiving this closes the connection.
    pub struct Disconnected {}
}

// ---------------------------------------------------------------------------
// Accounts and characters
// ---------------------------------------------------------------------------

wire_struct! {
    pub struct CreateAccount {
        pub name: String,
        pub password: String,
        /// Name of the first character, created along with the account.
        pub char_name: String,
    }
}

wire_struct! {
    pub struct CreateAccountResponse {
        pub account_id: u32,
        pub name: String,
    }
}

wire_struct! {
    pub struct Login {
        pub name: String,
        pub password: String,
    }
}

wire_struct! {
    pub struct LoginResponse {
        /// Non-zero on success.
        pub success: u8,
        pub name: String,
        pub account_id: u32,
        pub characters: Vec<Character>,
    }
}

wire_struct! {
    pub struct CreateCharacter {
        pub account_id: u32,
        pub name: String,
        /// Starting class.
        pub kit: u8,
    }
}

wire_struct! {
    pub struct CreateCharacterResponse {
        pub account_id: u32,
        pub character: Character,
    }
}

wire_struct! {
    pub struct DeleteCharacter {
        pub id: u32,
    }
}

wire_struct! {
    /// A playable character. Also appears inline inside other messages.
    pub struct Character {
        pub id: u32,
        pub name: String,
    }
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

wire_struct! {
    pub struct ListGames {}
}

wire_struct! {
    /// Open games as two parallel arrays: `ids[i]` is named `names[i]`.
    pub struct ListGamesResponse {
        pub ids: Vec<u32>,
        pub names: Vec<String>,
    }
}

wire_struct! {
    pub struct CreateGame {
        pub name: String,
    }
}

wire_struct! {
    pub struct CreateGameResponse {
        pub name: String,
        pub id: u32,
        /// World generation seed.
        pub seed: u64,
        pub entities: Vec<Entity>,
    }
}

wire_struct! {
    pub struct JoinGame {
        pub id: u32,
        pub char_id: u32,
    }
}

wire_struct! {
    pub struct GameConnected {
        pub seed: u64,
        pub entities: Vec<Entity>,
    }
}

// ---------------------------------------------------------------------------
// In game
// ---------------------------------------------------------------------------

wire_struct! {
    /// Anything that exists in the world: players, monsters, projectiles.
    pub struct Entity {
        pub id: u32,
        pub etype: u16,
        pub seed: u64,
        pub x: u32,
        pub y: u32,
        pub height: u32,
        pub width: u32,
        /// 0..=100.
        pub health_percent: u8,
    }
}

wire_struct! {
    pub struct MovePlayer {
        pub entity_id: u32,
        /// Simulation tick the move was issued on.
        pub tick_id: u32,
        pub direction: i16,
    }
}

wire_struct! {
    pub struct UseAbility {
        pub ability_id: i32,
        pub target: u32,
    }
}

wire_struct! {
    pub struct AbilityResult {
        pub target: Entity,
        pub damage: i32,
        pub state: u8,
    }
}

wire_struct! {
    pub struct EndGame {}
}

wire_struct! {
    /// Authoritative world snapshot for one tick.
    pub struct GameMasterFrame {
        pub tick_id: u32,
        pub entities: Vec<Entity>,
    }
}

// ---------------------------------------------------------------------------
// catalogue!
// ---------------------------------------------------------------------------

/// Builds [`MessageType`], [`Message`], and the registry wiring from one
/// table so the three can never drift apart.
macro_rules! catalogue {
    ( $( $tag:literal => $variant:ident($ty:ty), )* ) => {
        /// The numbered message-type table.
        ///
        /// Tag 0 is reserved and never decodes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u16)]
        pub enum MessageType {
            $( $variant = $tag, )*
        }

        impl MessageType {
            /// Every catalogued type, in tag order.
            pub const ALL: &'static [MessageType] = &[ $( MessageType::$variant, )* ];

            pub const fn as_u16(self) -> u16 {
                self as u16
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $( MessageType::$variant => stringify!($variant), )*
                }
            }
        }

        impl TryFrom<u16> for MessageType {
            type Error = ProtocolError;

            fn try_from(tag: u16) -> Result<Self, Self::Error> {
                match tag {
                    $( $tag => Ok(MessageType::$variant), )*
                    other => Err(ProtocolError::UnknownMessageType(other)),
                }
            }
        }

        /// Any message, tagged by variant.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub enum Message {
            $( $variant($ty), )*
        }

        impl Message {
            pub fn message_type(&self) -> MessageType {
                match self {
                    $( Message::$variant(_) => MessageType::$variant, )*
                }
            }

            /// Exact payload size, without the frame header.
            pub fn encoded_len(&self) -> usize {
                match self {
                    $( Message::$variant(inner) => inner.encoded_len(), )*
                }
            }

            /// Appends the payload bytes (no frame header) to `buf`.
            pub fn encode_into(&self, buf: &mut impl BufMut) {
                match self {
                    $( Message::$variant(inner) => inner.encode(buf), )*
                }
            }
        }

        $(
            impl From<$ty> for Message {
                fn from(inner: $ty) -> Self {
                    Message::$variant(inner)
                }
            }
        )*

        /// Registers a decoder for every catalogued tag.
        pub(crate) fn register_catalogue(registry: &mut CodecRegistry) {
            $( registry.register($tag, decode_as::<$ty>); )*
        }
    };
}

catalogue! {
    1 => Multipart(PartFrame),
    2 => Heartbeat(Heartbeat),
    3 => Connected(Connected),
    4 => Disconnected(Disconnected),
    5 => CreateAccount(CreateAccount),
    6 => CreateAccountResponse(CreateAccountResponse),
    7 => Login(Login),
    8 => LoginResponse(LoginResponse),
    9 => CreateCharacter(CreateCharacter),
    10 => CreateCharacterResponse(CreateCharacterResponse),
    11 => DeleteCharacter(DeleteCharacter),
    12 => Character(Character),
    13 => ListGames(ListGames),
    14 => ListGamesResponse(ListGamesResponse),
    15 => CreateGame(CreateGame),
    16 => CreateGameResponse(CreateGameResponse),
    17 => JoinGame(JoinGame),
    18 => GameConnected(GameConnected),
    19 => Entity(Entity),
    20 => MovePlayer(MovePlayer),
    21 => UseAbility(UseAbility),
    22 => AbilityResult(AbilityResult),
    23 => EndGame(EndGame),
    24 => GameMasterFrame(GameMasterFrame),
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u16())
    }
}

impl Message {
    /// The tag this message carries in its frame header.
    pub fn type_tag(&self) -> u16 {
        self.message_type().as_u16()
    }

    /// Encodes the payload into a fresh, exactly-sized buffer.
    pub fn to_payload(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_contiguous_from_one() {
        for (i, ty) in MessageType::ALL.iter().enumerate() {
            assert_eq!(usize::from(ty.as_u16()), i + 1);
            assert_eq!(MessageType::try_from(ty.as_u16()).unwrap(), *ty);
        }
        assert_eq!(MessageType::ALL.len(), 24);
    }

    #[test]
    fn test_tag_zero_is_reserved() {
        assert_eq!(
            MessageType::try_from(0).unwrap_err(),
            ProtocolError::UnknownMessageType(0)
        );
    }

    #[test]
    fn test_display_shows_name_and_tag() {
        assert_eq!(MessageType::Login.to_string(), "Login(7)");
        assert_eq!(MessageType::Multipart.name(), "Multipart");
    }

    #[test]
    fn test_login_payload_is_nineteen_bytes() {
        let login = Message::from(Login {
            name: "alice".into(),
            password: "secret".into(),
        });
        assert_eq!(login.type_tag(), 7);
        assert_eq!(login.encoded_len(), 4 + 5 + 4 + 6);

        let payload = login.to_payload();
        assert_eq!(&payload[..4], &[5, 0, 0, 0]);
        assert_eq!(&payload[4..9], b"alice");
        assert_eq!(&payload[9..13], &[6, 0, 0, 0]);
        assert_eq!(&payload[13..], b"secret");
    }

    #[test]
    fn test_entity_is_fixed_size() {
        // 4 + 2 + 8 + 4*4 + 1
        assert_eq!(Entity::default().encoded_len(), 31);
    }

    #[test]
    fn test_empty_messages_have_empty_payload() {
        assert!(Message::from(Disconnected {}).to_payload().is_empty());
        assert!(Message::from(ListGames {}).to_payload().is_empty());
        assert!(Message::from(EndGame {}).to_payload().is_empty());
    }

    #[test]
    fn test_nested_character_is_inline() {
        let response = CreateCharacterResponse {
            account_id: 1,
            character: Character {
                id: 2,
                name: "Ash".into(),
            },
        };
        let payload = Message::from(response).to_payload();
        assert_eq!(
            payload,
            vec![1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, b'A', b's', b'h']
        );
    }
}
