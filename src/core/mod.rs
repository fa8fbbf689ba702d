//! # Core Codec Components
//!
//! The SPP binary attribute codec and the packet framing used on stream
//! transports.
//!
//! ## Components
//! - **ByteCursor / ByteSink**: big-endian primitive reads and writes with a
//!   configurable length-field width
//! - **AttributeEncoder / AttributeDecoder**: per-type attribute rules,
//!   nullable envelopes, lists and attribute-kind tags
//! - **Packet / PacketCodec**: length-prefixed framing over byte streams
//!
//! ## Wire Format
//! ```text
//! nullable value:  [Flag(1)] [Value(N)]        flag 0 = absent
//! blob / string:   [Size(2|4, signed)] [Bytes]  size -1 = blob without value
//! list:            [Count(2|4, unsigned)] [Element]*
//! time-like:       [Seconds(4, signed)] [Millis(3, signed)]
//! packet:          [Version(1)] [Length(4)] [Payload(N)]
//! ```

pub mod attribute;
pub mod codec;
pub mod cursor;
pub mod decoder;
pub mod encoder;
pub mod packet;
pub mod profile;
pub mod sink;

pub use attribute::{Attribute, AttributeKind};
pub use codec::PacketCodec;
pub use cursor::{ByteCursor, ByteSource, SliceSource, StreamSource};
pub use decoder::{AttributeDecoder, ListDecoder};
pub use encoder::{AttributeEncoder, ListEncoder};
pub use packet::Packet;
pub use profile::{LengthField, WireProfile};
pub use sink::ByteSink;
