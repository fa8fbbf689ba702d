//! # Attribute Encoder
//!
//! Encodes attribute values into the SPP binary wire profile.
//!
//! ## Wire Layouts
//! ```text
//! Boolean             [flag(1)]
//! Octet..Long, floats [fixed width, big-endian]
//! ULong               [magnitude(8), big-endian unsigned]
//! Time/FineTime/Dur.  [seconds(4, signed)] [millis(3, signed)]
//! Blob/String         [size(2|4, signed)] [bytes(N)]
//! List                [count(2|4, unsigned)] [element]*
//! Nullable<T>         [present(1)] [T]?
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::attribute::{
    Attribute, AttributeKind, Blob, Duration, FineTime, Identifier, Time, Uri,
};
use crate::core::profile::WireProfile;
use crate::core::sink::ByteSink;
use crate::error::{ProtocolError, Result};

const MILLIS_PER_SECOND: i64 = 1000;

/// Clamp a magnitude into the unsigned 64-bit wire domain.
pub fn clamp_ulong(value: i128) -> u64 {
    value.clamp(0, i128::from(u64::MAX)) as u64
}

/// Split milliseconds into whole seconds and a non-negative millisecond part.
///
/// The millisecond part is always in `[0, 999]`; the seconds carry the sign.
pub fn split_millis(millis: i64) -> (i64, i32) {
    (
        millis.div_euclid(MILLIS_PER_SECOND),
        millis.rem_euclid(MILLIS_PER_SECOND) as i32,
    )
}

/// Encoder for one wire profile, writing into a [`ByteSink`].
#[derive(Debug)]
pub struct AttributeEncoder<B = BytesMut> {
    sink: ByteSink<B>,
    profile: WireProfile,
}

impl AttributeEncoder<BytesMut> {
    pub fn new(profile: WireProfile) -> Self {
        Self::with_sink(ByteSink::new(profile.length_field), profile)
    }

    pub fn into_bytes(self) -> Bytes {
        self.sink.freeze()
    }
}

impl<B: BufMut> AttributeEncoder<B> {
    pub fn with_buffer(buf: B, profile: WireProfile) -> Self {
        Self::with_sink(ByteSink::with_buffer(buf, profile.length_field), profile)
    }

    fn with_sink(sink: ByteSink<B>, profile: WireProfile) -> Self {
        Self { sink, profile }
    }

    pub fn profile(&self) -> WireProfile {
        self.profile
    }

    /// Direct access for fields this encoder has no dedicated rule for.
    pub fn sink(&mut self) -> &mut ByteSink<B> {
        &mut self.sink
    }

    pub fn len(&self) -> usize {
        self.sink.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sink.is_empty()
    }

    pub fn into_inner(self) -> B {
        self.sink.into_inner()
    }

    pub fn encode_boolean(&mut self, value: bool) -> Result<()> {
        self.sink.put_bool(value);
        Ok(())
    }

    pub fn encode_octet(&mut self, value: i8) -> Result<()> {
        self.sink.put_i8(value);
        Ok(())
    }

    pub fn encode_uoctet(&mut self, value: u8) -> Result<()> {
        self.sink.put_u8(value);
        Ok(())
    }

    pub fn encode_short(&mut self, value: i16) -> Result<()> {
        self.sink.put_i16(value);
        Ok(())
    }

    pub fn encode_ushort(&mut self, value: u16) -> Result<()> {
        self.sink.put_u16(value);
        Ok(())
    }

    pub fn encode_integer(&mut self, value: i32) -> Result<()> {
        self.sink.put_i32(value);
        Ok(())
    }

    pub fn encode_uinteger(&mut self, value: u32) -> Result<()> {
        self.sink.put_u32(value);
        Ok(())
    }

    pub fn encode_long(&mut self, value: i64) -> Result<()> {
        self.sink.put_i64(value);
        Ok(())
    }

    /// Eight bytes, big-endian unsigned. Negative input is written as 0 and
    /// anything above `u64::MAX` as `u64::MAX`.
    pub fn encode_ulong(&mut self, value: impl Into<i128>) -> Result<()> {
        self.sink.put_u64(clamp_ulong(value.into()));
        Ok(())
    }

    pub fn encode_float(&mut self, value: f32) -> Result<()> {
        self.sink.put_f32(value);
        Ok(())
    }

    pub fn encode_double(&mut self, value: f64) -> Result<()> {
        self.sink.put_f64(value);
        Ok(())
    }

    /// A blob without a value is written as the `-1` size sentinel.
    pub fn encode_blob(&mut self, value: &Blob) -> Result<()> {
        self.sink.put_sized_bytes(value.value())
    }

    pub fn encode_string(&mut self, value: &str) -> Result<()> {
        self.sink.put_string(value)
    }

    pub fn encode_identifier(&mut self, value: &Identifier) -> Result<()> {
        self.sink.put_string(value.as_str())
    }

    pub fn encode_uri(&mut self, value: &Uri) -> Result<()> {
        self.sink.put_string(value.as_str())
    }

    pub fn encode_time(&mut self, value: Time) -> Result<()> {
        self.put_seconds_millis("Time", value.as_millis())
    }

    pub fn encode_fine_time(&mut self, value: FineTime) -> Result<()> {
        self.put_seconds_millis("FineTime", value.as_millis())
    }

    pub fn encode_duration(&mut self, value: Duration) -> Result<()> {
        let scaled = (value.as_secs_f64() * MILLIS_PER_SECOND as f64).round();
        if !scaled.is_finite() {
            return Err(ProtocolError::ValueOutOfRange {
                field: "Duration",
                value: 0,
            });
        }
        self.put_seconds_millis("Duration", scaled as i64)
    }

    fn put_seconds_millis(&mut self, field: &'static str, millis: i64) -> Result<()> {
        let (seconds, millis_part) = split_millis(millis);
        let seconds = i32::try_from(seconds).map_err(|_| ProtocolError::ValueOutOfRange {
            field,
            value: i128::from(millis),
        })?;
        self.sink.put_i32(seconds);
        self.sink.put_raw(&millis_part.to_be_bytes()[1..]);
        Ok(())
    }

    /// Flag byte, then the ordinary encoding when a value is present.
    pub fn encode_nullable<T, F>(&mut self, value: Option<T>, encode: F) -> Result<()>
    where
        F: FnOnce(&mut Self, T) -> Result<()>,
    {
        match value {
            Some(value) => {
                self.sink.put_bool(true);
                encode(self, value)
            }
            None => {
                self.sink.put_bool(false);
                Ok(())
            }
        }
    }

    pub fn encode_nullable_boolean(&mut self, value: Option<bool>) -> Result<()> {
        self.encode_nullable(value, Self::encode_boolean)
    }

    pub fn encode_nullable_ulong(&mut self, value: Option<impl Into<i128>>) -> Result<()> {
        self.encode_nullable(value, |encoder, value| encoder.encode_ulong(value))
    }

    pub fn encode_nullable_time(&mut self, value: Option<Time>) -> Result<()> {
        self.encode_nullable(value, Self::encode_time)
    }

    pub fn encode_nullable_fine_time(&mut self, value: Option<FineTime>) -> Result<()> {
        self.encode_nullable(value, Self::encode_fine_time)
    }

    pub fn encode_nullable_duration(&mut self, value: Option<Duration>) -> Result<()> {
        self.encode_nullable(value, Self::encode_duration)
    }

    /// A missing blob and a blob without a value both encode as absent.
    pub fn encode_nullable_blob(&mut self, value: Option<&Blob>) -> Result<()> {
        let value = value.filter(|blob| !blob.is_null_value());
        self.encode_nullable(value, Self::encode_blob)
    }

    pub fn encode_nullable_string(&mut self, value: Option<&str>) -> Result<()> {
        self.encode_nullable(value, Self::encode_string)
    }

    pub fn encode_nullable_identifier(&mut self, value: Option<&Identifier>) -> Result<()> {
        self.encode_nullable(value, Self::encode_identifier)
    }

    pub fn encode_nullable_uri(&mut self, value: Option<&Uri>) -> Result<()> {
        self.encode_nullable(value, Self::encode_uri)
    }

    /// Attribute tag as one unsigned byte, shifted by the profile's tag offset.
    pub fn encode_attribute_kind(&mut self, kind: AttributeKind) -> Result<()> {
        let tag = i16::from(kind.short_form()) + self.profile.attribute_tag_offset;
        let tag = u8::try_from(tag).map_err(|_| ProtocolError::ValueOutOfRange {
            field: "AttributeKind",
            value: i128::from(tag),
        })?;
        self.sink.put_u8(tag);
        Ok(())
    }

    /// Tag followed by the value, for fields that may hold any attribute.
    pub fn encode_attribute(&mut self, value: &Attribute) -> Result<()> {
        self.encode_attribute_kind(value.kind())?;
        match value {
            Attribute::Blob(v) => self.encode_blob(v),
            Attribute::Boolean(v) => self.encode_boolean(*v),
            Attribute::Duration(v) => self.encode_duration(*v),
            Attribute::Float(v) => self.encode_float(*v),
            Attribute::Double(v) => self.encode_double(*v),
            Attribute::Identifier(v) => self.encode_identifier(v),
            Attribute::Octet(v) => self.encode_octet(*v),
            Attribute::UOctet(v) => self.encode_uoctet(*v),
            Attribute::Short(v) => self.encode_short(*v),
            Attribute::UShort(v) => self.encode_ushort(*v),
            Attribute::Integer(v) => self.encode_integer(*v),
            Attribute::UInteger(v) => self.encode_uinteger(*v),
            Attribute::Long(v) => self.encode_long(*v),
            Attribute::ULong(v) => self.encode_ulong(*v),
            Attribute::String(v) => self.encode_string(v),
            Attribute::Time(v) => self.encode_time(*v),
            Attribute::FineTime(v) => self.encode_fine_time(*v),
            Attribute::Uri(v) => self.encode_uri(v),
        }
    }

    pub fn encode_nullable_attribute(&mut self, value: Option<&Attribute>) -> Result<()> {
        self.encode_nullable(value, Self::encode_attribute)
    }

    /// Write the count prefix and return an encoder for exactly `count` elements.
    pub fn create_list_encoder(&mut self, count: usize) -> Result<ListEncoder<'_, B>> {
        self.sink.put_count(count)?;
        Ok(ListEncoder {
            encoder: self,
            declared: count,
            written: 0,
        })
    }

    pub fn encode_list<T, F>(&mut self, values: &[T], mut encode: F) -> Result<()>
    where
        F: FnMut(&mut Self, &T) -> Result<()>,
    {
        let mut list = self.create_list_encoder(values.len())?;
        for value in values {
            list.element(|encoder| encode(encoder, value))?;
        }
        list.finish()
    }
}

/// Element writer returned by [`AttributeEncoder::create_list_encoder`].
#[derive(Debug)]
pub struct ListEncoder<'a, B> {
    encoder: &'a mut AttributeEncoder<B>,
    declared: usize,
    written: usize,
}

impl<B: BufMut> ListEncoder<'_, B> {
    /// Encode the next element. Fails once the declared count is reached.
    pub fn element<F>(&mut self, encode: F) -> Result<()>
    where
        F: FnOnce(&mut AttributeEncoder<B>) -> Result<()>,
    {
        if self.written == self.declared {
            return Err(ProtocolError::ListLengthMismatch {
                declared: self.declared,
                written: self.written + 1,
            });
        }
        encode(&mut *self.encoder)?;
        self.written += 1;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.declared - self.written
    }

    /// Check that every declared element was written.
    pub fn finish(self) -> Result<()> {
        if self.written != self.declared {
            return Err(ProtocolError::ListLengthMismatch {
                declared: self.declared,
                written: self.written,
            });
        }
        Ok(())
    }
}
