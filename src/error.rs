//! # Error Types
//!
//! Error handling for the attribute codec, packet framing and stream transport.
//!
//! ## Error Categories
//! - **Decode errors**: truncated input, bad length prefixes, invalid UTF-8,
//!   unknown attribute tags
//! - **Encode errors**: fields too large for the configured length width,
//!   values outside the wire domain, list length mismatches
//! - **Framing errors**: unsupported versions, oversized packets
//! - **Stream errors**: socket failures while reading, accept failures
//! - **Dispatch errors**: closed dispatch queue, packet handler failures
//!
//! Codec errors always surface to the immediate caller. Stream errors are
//! handled by the connection receiver and never cross connections.
//!
//! ## Example Usage
//! ```rust
//! use mal_transport::core::{AttributeDecoder, WireProfile};
//! use mal_transport::error::ProtocolError;
//!
//! let mut decoder = AttributeDecoder::from_slice(&[0x00, 0x01], WireProfile::spp(true));
//! match decoder.decode_ulong() {
//!     Err(ProtocolError::TruncatedInput { requested, available }) => {
//!         assert_eq!((requested, available), (8, 2));
//!     }
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

// ProtocolError is the primary error type for all codec and transport operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Truncated input: requested {requested} bytes, {available} available")]
    TruncatedInput { requested: usize, available: usize },

    #[error("Stream I/O error: {0}")]
    StreamIo(#[from] io::Error),

    #[error("Accept error: {0}")]
    Accept(#[source] io::Error),

    #[error("Invalid UTF-8 in string field: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid length prefix: {0}")]
    InvalidLength(i64),

    #[error("Field too large: {len} exceeds maximum of {max}")]
    OversizedField { len: usize, max: usize },

    #[error("Value out of range for {field}: {value}")]
    ValueOutOfRange { field: &'static str, value: i128 },

    #[error("Unexpected null value for non-nullable {0}")]
    UnexpectedNull(&'static str),

    #[error("Unknown attribute tag: {0}")]
    UnknownAttributeTag(i16),

    #[error("List length mismatch: declared {declared}, written {written}")]
    ListLengthMismatch { declared: usize, written: usize },

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Dispatch queue closed")]
    DispatchClosed,

    #[error("Packet handler error: {0}")]
    Handler(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Shorthand used by cursors when a read runs past the available bytes.
    pub(crate) fn truncated(requested: usize, available: usize) -> Self {
        ProtocolError::TruncatedInput {
            requested,
            available,
        }
    }

    /// True for errors caused by running out of input bytes.
    pub fn is_truncation(&self) -> bool {
        matches!(self, ProtocolError::TruncatedInput { .. })
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
