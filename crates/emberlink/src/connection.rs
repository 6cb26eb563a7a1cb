//! The per-connection pipeline: messages in, datagrams out, and back.
//!
//! A [`Connection`] owns every piece of state one link needs: the receive
//! buffer, the open multipart groups, and the two counters. It never does
//! I/O itself. The caller hands it bytes and gets messages, or hands it a
//! message and gets datagrams to write.
//!
//! ```text
//! send:     Message → encode → frame ─┬─ fits? ──→ [datagram]
//!                                     └─ too big → fragment → [part, part, ...]
//!
//! on_bytes: bytes → FrameDecoder → frame ─┬─ Multipart → Reassembler ─┐
//!                                         │                          ↓ (complete)
//!                                         │              inner frame (one level only)
//!                                         ↓                          ↓
//!                                      Codec::decode ←───────────────┘
//! ```

use std::time::{Duration, Instant};

use bytes::Bytes;
use emberlink_protocol::{
    Codec, CodecRegistry, Malformed, Message, ProtocolError, Reader, WireFormat,
};
use emberlink_wire::{
    Fragmenter, Frame, FrameDecoder, HEADER_SIZE, MULTIPART_TAG, PartFrame, Reassembler, WireError,
    encode_frame,
};

use crate::{ConnectionConfig, EmberlinkError};

/// One end of a framed, fragmenting message link.
///
/// Single-owner and synchronous: whoever holds `&mut Connection` drives
/// it, so bytes are always consumed in arrival order. To use it from
/// async code, put it on one task (see [`Messenger`](crate::Messenger)).
#[derive(Debug)]
pub struct Connection<C: Codec = CodecRegistry> {
    codec: C,
    decoder: FrameDecoder,
    reassembler: Reassembler,
    fragmenter: Fragmenter,
    /// Sequence number for the next outgoing message.
    next_sequence: u16,
    max_transmission_size: usize,
    max_chunk_bytes: usize,
    group_idle_timeout: Duration,
}

impl Connection<CodecRegistry> {
    /// Creates a connection that speaks the full version-1 catalogue.
    pub fn new(config: &ConnectionConfig) -> Self {
        Self::with_codec(config, CodecRegistry::new())
    }
}

impl<C: Codec> Connection<C> {
    /// Creates a connection with a custom codec.
    pub fn with_codec(config: &ConnectionConfig, codec: C) -> Self {
        Self {
            codec,
            decoder: FrameDecoder::with_limits(&config.limits),
            reassembler: Reassembler::with_limits(&config.limits),
            fragmenter: Fragmenter::new(),
            next_sequence: 1,
            max_transmission_size: config.max_transmission_size,
            max_chunk_bytes: config.max_chunk_bytes(),
            group_idle_timeout: config.group_idle_timeout,
        }
    }

    // -----------------------------------------------------------------------
    // Send path
    // -----------------------------------------------------------------------

    /// Encodes `message` into the datagrams to write, in order.
    ///
    /// One datagram if the frame fits `max_transmission_size`, otherwise
    /// one per part. Each call uses the next sequence number, wrapping at
    /// `u16::MAX`.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownMessageType`] if the codec can't encode it
    /// - [`WireError::FrameTooLarge`] if the payload can't fit one frame
    ///   even before fragmenting (the 16-bit length field)
    ///
    /// Neither is fatal to the connection.
    pub fn send(&mut self, message: &Message) -> Result<Vec<Bytes>, EmberlinkError> {
        let payload = self.codec.encode(message)?;
        let type_tag = message.type_tag();
        let sequence = self.next_sequence;

        let datagrams = if HEADER_SIZE + payload.len() <= self.max_transmission_size {
            vec![encode_frame(type_tag, sequence, &payload)?]
        } else {
            let frames =
                self.fragmenter
                    .fragment(type_tag, sequence, &payload, self.max_chunk_bytes)?;
            tracing::debug!(
                type_tag,
                sequence,
                payload_len = payload.len(),
                parts = frames.len(),
                "message fragmented"
            );
            frames.iter().map(Frame::to_bytes).collect()
        };

        self.next_sequence = sequence.wrapping_add(1);
        Ok(datagrams)
    }

    // -----------------------------------------------------------------------
    // Receive path
    // -----------------------------------------------------------------------

    /// Feeds newly received bytes and returns every message they complete.
    ///
    /// Frames that fail to decode (unknown type, malformed payload,
    /// inconsistent fragmentation) are logged and dropped. Decoding
    /// carries on with the next frame.
    ///
    /// # Errors
    /// Returns [`WireError::BufferOverflow`] (wrapped) if the receive
    /// buffer is full. That one is fatal: call [`reset`](Self::reset) or
    /// drop the connection.
    pub fn on_bytes(&mut self, bytes: &[u8]) -> Result<Vec<Message>, EmberlinkError> {
        self.decoder.feed(bytes)?;

        let mut messages = Vec::new();
        while let Some(frame) = self.decoder.try_extract_frame() {
            let type_tag = frame.type_tag();
            let sequence = frame.sequence();
            match self.handle_frame(frame) {
                Ok(Some(message)) => messages.push(message),
                Ok(None) => {}
                Err(e @ ProtocolError::Wire(WireError::InconsistentFragmentation { .. })) => {
                    tracing::warn!(type_tag, sequence, error = %e, "dropped multipart group");
                }
                Err(e) => {
                    tracing::debug!(type_tag, sequence, error = %e, "dropped frame");
                }
            }
        }
        Ok(messages)
    }

    /// Decodes one frame. `Ok(None)` means a part was stored and its
    /// group is still incomplete.
    fn handle_frame(&mut self, frame: Frame) -> Result<Option<Message>, ProtocolError> {
        if frame.type_tag() != MULTIPART_TAG {
            return self.codec.decode(frame.type_tag(), &frame.payload).map(Some);
        }

        let mut reader = Reader::new(&frame.payload);
        let part = PartFrame::decode(&mut reader, "Multipart")?;
        reader.finish()?;

        match self.reassembler.accept_part(part)? {
            Some(inner) => self.decode_reassembled(inner).map(Some),
            None => Ok(None),
        }
    }

    /// A completed group must be exactly one ordinary frame.
    fn decode_reassembled(&self, bytes: Bytes) -> Result<Message, ProtocolError> {
        let len = bytes.len();
        let inner = Frame::parse_exact(bytes).ok_or(Malformed::InnerFrame { len })?;
        if inner.type_tag() == MULTIPART_TAG {
            return Err(Malformed::NestedMultipart.into());
        }
        tracing::trace!(type_tag = inner.type_tag(), len, "reassembled message");
        self.codec.decode(inner.type_tag(), &inner.payload)
    }

    // -----------------------------------------------------------------------
    // Housekeeping
    // -----------------------------------------------------------------------

    /// Drops multipart groups idle for longer than the configured timeout.
    ///
    /// Returns the evicted group ids.
    pub fn evict_idle(&mut self, now: Instant) -> Vec<u32> {
        let evicted = self.reassembler.evict_idle(now, self.group_idle_timeout);
        if !evicted.is_empty() {
            tracing::warn!(count = evicted.len(), "evicted idle multipart groups");
        }
        evicted
    }

    /// Discards all buffered bytes and every open group.
    ///
    /// Counters keep running so ids stay unique for the life of the
    /// connection.
    pub fn reset(&mut self) {
        self.decoder.clear();
        self.reassembler.clear();
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn buffered_len(&self) -> usize {
        self.decoder.buffered_len()
    }

    /// Multipart groups still waiting for parts.
    pub fn pending_groups(&self) -> usize {
        self.reassembler.len()
    }

    /// The sequence number the next `send` will use.
    pub fn next_sequence(&self) -> u16 {
        self.next_sequence
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberlink_protocol::{Heartbeat, Login};

    fn connection() -> Connection {
        Connection::new(&ConnectionConfig::default())
    }

    #[test]
    fn test_sequence_starts_at_one_and_wraps() {
        let mut conn = connection();
        let msg = Message::from(Heartbeat { time: 0 });

        let first = conn.send(&msg).unwrap();
        assert_eq!(Frame::parse_exact(first[0].clone()).unwrap().sequence(), 1);

        conn.next_sequence = u16::MAX;
        conn.send(&msg).unwrap();
        assert_eq!(conn.next_sequence(), 0);
    }

    #[test]
    fn test_small_message_is_one_datagram() {
        let mut conn = connection();
        let datagrams = conn
            .send(&Login {
                name: "alice".into(),
                password: "secret".into(),
            }
            .into())
            .unwrap();
        assert_eq!(datagrams.len(), 1);
        assert_eq!(datagrams[0].len(), 25);
    }

    #[test]
    fn test_failed_send_does_not_consume_sequence() {
        let mut conn = Connection::with_codec(&ConnectionConfig::default(), CodecRegistry::empty());
        let err = conn.send(&Heartbeat { time: 1 }.into()).unwrap_err();
        assert!(matches!(
            err,
            EmberlinkError::Protocol(ProtocolError::UnknownMessageType(2))
        ));
        assert_eq!(conn.next_sequence(), 1);
    }

    #[test]
    fn test_reassembled_multipart_is_rejected() {
        // A group whose contents are themselves a multipart frame.
        let conn = connection();
        let nested = PartFrame {
            part_index: 0,
            group_id: 1,
            total_parts: 1,
            chunk: Bytes::from_static(b"x"),
        };
        let inner = encode_frame(MULTIPART_TAG, 1, &nested.to_bytes()).unwrap();
        assert_eq!(
            conn.decode_reassembled(inner).unwrap_err(),
            ProtocolError::MalformedPayload(Malformed::NestedMultipart)
        );
    }

    #[test]
    fn test_reassembled_bytes_must_be_one_frame() {
        let conn = connection();
        let mut two = encode_frame(2, 1, &[0; 8]).unwrap().to_vec();
        two.extend_from_slice(&encode_frame(2, 2, &[0; 8]).unwrap());
        assert_eq!(
            conn.decode_reassembled(Bytes::from(two)).unwrap_err(),
            ProtocolError::MalformedPayload(Malformed::InnerFrame { len: 28 })
        );
    }

    #[test]
    fn test_reset_discards_partial_state() {
        let mut conn = connection();
        // Half a header plus the first part of a two-part group.
        let part = PartFrame {
            part_index: 0,
            group_id: 9,
            total_parts: 2,
            chunk: Bytes::from_static(b"abc"),
        };
        let frame = encode_frame(MULTIPART_TAG, 1, &part.to_bytes()).unwrap();
        conn.on_bytes(&frame).unwrap();
        conn.on_bytes(&[2, 0, 1]).unwrap();
        assert_eq!(conn.pending_groups(), 1);
        assert_eq!(conn.buffered_len(), 3);

        conn.reset();
        assert_eq!(conn.pending_groups(), 0);
        assert_eq!(conn.buffered_len(), 0);
    }
}
