//! # mal-transport
//!
//! Wire-level transport bindings for CCSDS MO MAL messaging over constrained
//! space links.
//!
//! The crate has two halves:
//! - **core**: the SPP binary attribute codec (`AttributeEncoder`,
//!   `AttributeDecoder`) built on `ByteSink`/`ByteCursor`, plus the packet
//!   framing used on the stream transport.
//! - **transport**: the connection acceptor, per-connection receivers and the
//!   dispatch pool that hands complete packets to the outer messaging layer.
//!
//! ## Example
//! ```rust
//! use mal_transport::core::{AttributeDecoder, AttributeEncoder, WireProfile};
//! use mal_transport::core::attribute::Duration;
//!
//! # fn main() -> mal_transport::error::Result<()> {
//! let profile = WireProfile::spp(true);
//! let mut encoder = AttributeEncoder::new(profile);
//! encoder.encode_duration(Duration::from_secs_f64(1.5))?;
//! encoder.encode_nullable_string(Some("hello"))?;
//!
//! let bytes = encoder.into_bytes();
//! let mut decoder = AttributeDecoder::from_slice(&bytes, profile);
//! assert_eq!(decoder.decode_duration()?.as_secs_f64(), 1.5);
//! assert_eq!(decoder.decode_nullable_string()?.as_deref(), Some("hello"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod transport;
pub mod utils;

pub use crate::core::{AttributeDecoder, AttributeEncoder, ByteCursor, ByteSink, WireProfile};
pub use crate::error::{ProtocolError, Result};
