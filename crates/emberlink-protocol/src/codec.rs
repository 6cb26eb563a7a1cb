//! The binary field codec and the [`Codec`] trait.
//!
//! Every message is a flat sequence of fields, each written with a fixed
//! rule:
//!
//! | field type            | wire form                                   |
//! |-----------------------|---------------------------------------------|
//! | `u8` .. `i64`         | fixed width, little-endian                  |
//! | `String`              | `u32` byte count, then UTF-8 bytes          |
//! | `Vec<T>`              | `u32` element count, then each element      |
//! | sub-message           | its own fields inline, no wrapper           |
//!
//! [`WireFormat`] captures that rule per type, so a message's codec is
//! just "do each field in order". The `wire_struct!` macro in
//! `types.rs` writes that part.

use bytes::BufMut;
use emberlink_wire::PartFrame;

use crate::{Malformed, Message, ProtocolError};

/// A value that knows its own binary layout.
pub trait WireFormat: Sized {
    /// Exact number of bytes [`encode`](Self::encode) will write.
    fn encoded_len(&self) -> usize;

    /// Appends the value to `buf`.
    fn encode(&self, buf: &mut impl BufMut);

    /// Reads one value off the front of `reader`.
    ///
    /// `field` names the field being read, for error messages.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedPayload`] when the bytes run out
    /// or don't form a valid value.
    fn decode(reader: &mut Reader<'_>, field: &'static str) -> Result<Self, ProtocolError>;
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// A forward-only cursor over a payload.
///
/// Every read is bounds-checked against what's left, so a lying length
/// prefix turns into an error instead of a panic.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.bytes.len()
    }

    /// The unread bytes, without consuming them.
    pub fn rest(&self) -> &'a [u8] {
        self.bytes
    }

    /// Consumes and returns the next `n` bytes.
    pub fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], ProtocolError> {
        if n > self.bytes.len() {
            return Err(Malformed::Truncated {
                field,
                needed: n,
                remaining: self.bytes.len(),
            }
            .into());
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    /// Consumes the next `N` bytes as a fixed-size array.
    pub fn read_array<const N: usize>(
        &mut self,
        field: &'static str,
    ) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    /// Reads a `u32` length prefix and widens it.
    fn read_len(&mut self, field: &'static str) -> Result<usize, ProtocolError> {
        Ok(u32::from_le_bytes(self.read_array(field)?) as usize)
    }

    /// Ends the read, failing if anything is left over.
    pub fn finish(self) -> Result<(), ProtocolError> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(Malformed::TrailingBytes {
                count: self.bytes.len(),
            }
            .into())
        }
    }
}

// ---------------------------------------------------------------------------
// Primitive impls
// ---------------------------------------------------------------------------

macro_rules! impl_int {
    ($($ty:ty),*) => {$(
        impl WireFormat for $ty {
            fn encoded_len(&self) -> usize {
                std::mem::size_of::<$ty>()
            }

            fn encode(&self, buf: &mut impl BufMut) {
                buf.put_slice(&self.to_le_bytes());
            }

            fn decode(reader: &mut Reader<'_>, field: &'static str) -> Result<Self, ProtocolError> {
                Ok(<$ty>::from_le_bytes(reader.read_array(field)?))
            }
        }
    )*};
}

impl_int!(u8, u16, u32, u64, i16, i32, i64);

impl WireFormat for String {
    fn encoded_len(&self) -> usize {
        4 + self.len()
    }

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.len() as u32);
        buf.put_slice(self.as_bytes());
    }

    fn decode(reader: &mut Reader<'_>, field: &'static str) -> Result<Self, ProtocolError> {
        let len = reader.read_len(field)?;
        let bytes = reader.take(len, field)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| Malformed::InvalidUtf8 { field }.into())
    }
}

impl<T: WireFormat> WireFormat for Vec<T> {
    fn encoded_len(&self) -> usize {
        4 + self.iter().map(WireFormat::encoded_len).sum::<usize>()
    }

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.len() as u32);
        for item in self {
            item.encode(buf);
        }
    }

    fn decode(reader: &mut Reader<'_>, field: &'static str) -> Result<Self, ProtocolError> {
        let count = reader.read_len(field)?;
        // Every element takes at least one byte, so the remaining length
        // bounds the allocation no matter what the count claims.
        let mut items = Vec::with_capacity(count.min(reader.remaining()));
        for _ in 0..count {
            items.push(T::decode(reader, field)?);
        }
        Ok(items)
    }
}

impl WireFormat for PartFrame {
    fn encoded_len(&self) -> usize {
        PartFrame::encoded_len(self)
    }

    fn encode(&self, buf: &mut impl BufMut) {
        self.write_to(buf);
    }

    fn decode(reader: &mut Reader<'_>, field: &'static str) -> Result<Self, ProtocolError> {
        let (part, used) = PartFrame::decode_prefix(reader.rest()).map_err(Malformed::PartFrame)?;
        reader.take(used, field)?;
        Ok(part)
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Converts messages to payload bytes and back.
///
/// ## Trait bounds
///
/// - `Send + Sync`: a codec lives inside a connection that may be moved
///   onto any Tokio worker thread.
/// - `'static`: it owns everything it needs, so it can sit in a
///   long-lived task.
///
/// The tag travels in the frame header, not in the payload, which is why
/// `decode` takes it separately.
pub trait Codec: Send + Sync + 'static {
    /// Encodes a message's payload (no frame header).
    ///
    /// # Errors
    /// Returns [`ProtocolError::UnknownMessageType`] if this codec doesn't
    /// handle the message's type.
    fn encode(&self, message: &Message) -> Result<Vec<u8>, ProtocolError>;

    /// Decodes the payload of a frame tagged `type_tag`.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownMessageType`] for unregistered tags
    /// - [`ProtocolError::MalformedPayload`] if the bytes don't fit the
    ///   variant's schema exactly
    fn decode(&self, type_tag: u16, payload: &[u8]) -> Result<Message, ProtocolError>;
}
