//! # Packet Codec
//!
//! `tokio_util` framing for [`Packet`]s over any `AsyncRead`/`AsyncWrite`.
//!
//! The decoder only yields complete packets. A partial header or payload
//! leaves the buffer untouched and reserves room for the rest; the declared
//! length is checked against the configured maximum before anything is
//! allocated for it.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::{MAX_PACKET_SIZE, PROTOCOL_VERSION};
use crate::core::packet::{Packet, HEADER_SIZE};
use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, Copy)]
pub struct PacketCodec {
    max_payload_size: usize,
}

impl PacketCodec {
    pub fn new(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(MAX_PACKET_SIZE)
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        if src.len() < HEADER_SIZE {
            src.reserve(HEADER_SIZE - src.len());
            return Ok(None);
        }

        let version = src[0];
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let length = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        if length > self.max_payload_size {
            return Err(ProtocolError::OversizedPacket(length));
        }

        let total = HEADER_SIZE + length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(length).freeze();
        Ok(Some(Packet { version, payload }))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        if packet.payload.len() > self.max_payload_size {
            return Err(ProtocolError::OversizedPacket(packet.payload.len()));
        }
        packet.write_to(dst)
    }
}
