//! Tag → decoder lookup.
//!
//! Decoding is the one direction where we don't already hold a typed
//! value: all we have is a `u16` from the frame header and some bytes.
//! The registry maps each tag to a plain function pointer that knows how
//! to build the right [`Message`] variant.

use std::collections::HashMap;

use crate::codec::{Codec, Reader, WireFormat};
use crate::types::register_catalogue;
use crate::{Message, ProtocolError};

/// Decodes one variant's payload into a [`Message`].
pub type DecodeFn = fn(&[u8]) -> Result<Message, ProtocolError>;

/// Decodes `payload` as exactly one `T`.
///
/// Leftover bytes are an error: a payload must be consumed exactly.
pub fn decode_as<T>(payload: &[u8]) -> Result<Message, ProtocolError>
where
    T: WireFormat + Into<Message>,
{
    let mut reader = Reader::new(payload);
    let value = T::decode(&mut reader, std::any::type_name::<T>())?;
    reader.finish()?;
    Ok(value.into())
}

/// The codec for the binary catalogue.
///
/// `CodecRegistry::new()` knows every version-1 type. Tags can be
/// overridden or added with [`register`](Self::register), which is how a
/// deployment would plug in an extension type without touching the enum
/// dispatch.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    decoders: HashMap<u16, DecodeFn>,
}

impl CodecRegistry {
    /// A registry with the full catalogue registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        register_catalogue(&mut registry);
        registry
    }

    /// A registry that knows no tags at all.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers `decode` for `type_tag`, returning any decoder it replaced.
    pub fn register(&mut self, type_tag: u16, decode: DecodeFn) -> Option<DecodeFn> {
        self.decoders.insert(type_tag, decode)
    }

    /// Removes the decoder for `type_tag`.
    pub fn unregister(&mut self, type_tag: u16) -> Option<DecodeFn> {
        self.decoders.remove(&type_tag)
    }

    pub fn contains(&self, type_tag: u16) -> bool {
        self.decoders.contains_key(&type_tag)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for CodecRegistry {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, ProtocolError> {
        let type_tag = message.type_tag();
        if !self.contains(type_tag) {
            return Err(ProtocolError::UnknownMessageType(type_tag));
        }
        Ok(message.to_payload())
    }

    fn decode(&self, type_tag: u16, payload: &[u8]) -> Result<Message, ProtocolError> {
        let decode = self
            .decoders
            .get(&type_tag)
            .ok_or(ProtocolError::UnknownMessageType(type_tag))?;
        decode(payload)
    }
}
