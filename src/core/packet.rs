//! # Packet
//!
//! One complete transport packet: the unit a connection receiver reads and
//! hands to the dispatch pool.
//!
//! ## Wire Format
//! ```text
//! [Version(1)] [Length(4, BE u32)] [Payload(N)]
//! ```
//! The payload carries the encoded message body and is kept as `Bytes` so
//! that splitting it out of the read buffer does not copy.

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::{MAX_PACKET_SIZE, PROTOCOL_VERSION};
use crate::error::{ProtocolError, Result};

/// Size of the fixed packet header.
pub const HEADER_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub version: u8,
    pub payload: Bytes,
}

impl Packet {
    /// Packet with the current protocol version.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload: payload.into(),
        }
    }

    /// Length on the wire, header included.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize header and payload into a single buffer.
    ///
    /// Fails with `OversizedPacket` for payloads over `MAX_PACKET_SIZE`, the
    /// same limit [`Packet::from_bytes`] enforces.
    pub fn to_bytes(&self) -> Result<Bytes> {
        if self.payload.len() > MAX_PACKET_SIZE {
            return Err(ProtocolError::OversizedPacket(self.payload.len()));
        }
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Append header and payload to `buf`. The caller enforces its own size
    /// limit; only lengths the header cannot carry are rejected here.
    pub(crate) fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        let length = u32::try_from(self.payload.len())
            .map_err(|_| ProtocolError::OversizedPacket(self.payload.len()))?;
        buf.reserve(self.encoded_len());
        buf.put_u8(self.version);
        buf.put_u32(length);
        buf.put_slice(&self.payload);
        Ok(())
    }

    /// Parse one complete packet from the front of `data`.
    ///
    /// Trailing bytes beyond the declared payload are ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::truncated(HEADER_SIZE, data.len()));
        }

        let version = data[0];
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let length = u32::from_be_bytes([data[1], data[2], data[3], data[4]]) as usize;
        if length > MAX_PACKET_SIZE {
            return Err(ProtocolError::OversizedPacket(length));
        }

        let body = &data[HEADER_SIZE..];
        if body.len() < length {
            return Err(ProtocolError::truncated(length, body.len()));
        }

        Ok(Self {
            version,
            payload: Bytes::copy_from_slice(&body[..length]),
        })
    }
}
