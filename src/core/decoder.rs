//! # Attribute Decoder
//!
//! Decodes attribute values from the SPP binary wire profile, mirroring
//! [`AttributeEncoder`](crate::core::AttributeEncoder).
//!
//! A decode either returns a complete value or an error; it never hands back a
//! partially populated value. Unsigned 64-bit values are rebuilt as `u64`, so
//! the high bit is never read as a sign.

use std::io::Read;
use std::iter::FusedIterator;

use crate::core::attribute::{
    Attribute, AttributeKind, Blob, Duration, FineTime, Identifier, Time, Uri,
};
use crate::core::cursor::{ByteCursor, ByteSource, SliceSource, StreamSource};
use crate::core::profile::WireProfile;
use crate::error::{ProtocolError, Result};

/// Decoder for one wire profile, reading from a [`ByteCursor`].
#[derive(Debug)]
pub struct AttributeDecoder<S> {
    cursor: ByteCursor<S>,
    profile: WireProfile,
}

impl<'a> AttributeDecoder<SliceSource<'a>> {
    pub fn from_slice(data: &'a [u8], profile: WireProfile) -> Self {
        Self::new(SliceSource::new(data), profile)
    }

    /// Start decoding at `offset`, e.g. just past an already parsed header.
    pub fn with_offset(data: &'a [u8], offset: usize, profile: WireProfile) -> Self {
        Self::new(SliceSource::with_offset(data, offset), profile)
    }
}

impl<R: Read> AttributeDecoder<StreamSource<R>> {
    pub fn from_reader(reader: R, profile: WireProfile) -> Self {
        Self::new(StreamSource::new(reader), profile)
    }
}

impl<S: ByteSource> AttributeDecoder<S> {
    pub fn new(source: S, profile: WireProfile) -> Self {
        Self {
            cursor: ByteCursor::new(source, profile.length_field),
            profile,
        }
    }

    pub fn profile(&self) -> WireProfile {
        self.profile
    }

    /// Direct access for fields this decoder has no dedicated rule for.
    pub fn cursor(&mut self) -> &mut ByteCursor<S> {
        &mut self.cursor
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn remaining(&self) -> Option<usize> {
        self.cursor.remaining()
    }

    pub fn decode_boolean(&mut self) -> Result<bool> {
        self.cursor.read_bool()
    }

    pub fn decode_octet(&mut self) -> Result<i8> {
        self.cursor.read_i8()
    }

    pub fn decode_uoctet(&mut self) -> Result<u8> {
        self.cursor.read_u8()
    }

    pub fn decode_short(&mut self) -> Result<i16> {
        self.cursor.read_i16()
    }

    pub fn decode_ushort(&mut self) -> Result<u16> {
        self.cursor.read_u16()
    }

    pub fn decode_integer(&mut self) -> Result<i32> {
        self.cursor.read_i32()
    }

    pub fn decode_uinteger(&mut self) -> Result<u32> {
        self.cursor.read_u32()
    }

    pub fn decode_long(&mut self) -> Result<i64> {
        self.cursor.read_i64()
    }

    pub fn decode_ulong(&mut self) -> Result<u64> {
        self.cursor.read_u64()
    }

    pub fn decode_float(&mut self) -> Result<f32> {
        self.cursor.read_f32()
    }

    pub fn decode_double(&mut self) -> Result<f64> {
        self.cursor.read_f64()
    }

    /// The `-1` size sentinel yields a blob without a value.
    pub fn decode_blob(&mut self) -> Result<Blob> {
        self.cursor.read_sized_bytes().map(Blob::from)
    }

    pub fn decode_string(&mut self) -> Result<String> {
        self.cursor
            .read_string()?
            .ok_or(ProtocolError::UnexpectedNull("String"))
    }

    pub fn decode_identifier(&mut self) -> Result<Identifier> {
        self.cursor
            .read_string()?
            .map(Identifier::from)
            .ok_or(ProtocolError::UnexpectedNull("Identifier"))
    }

    pub fn decode_uri(&mut self) -> Result<Uri> {
        self.cursor
            .read_string()?
            .map(Uri::from)
            .ok_or(ProtocolError::UnexpectedNull("URI"))
    }

    pub fn decode_time(&mut self) -> Result<Time> {
        self.read_seconds_millis().map(Time::from_millis)
    }

    pub fn decode_fine_time(&mut self) -> Result<FineTime> {
        self.read_seconds_millis().map(FineTime::from_millis)
    }

    pub fn decode_duration(&mut self) -> Result<Duration> {
        self.read_seconds_millis().map(Duration::from_millis)
    }

    // 4-byte signed seconds, then a 3-byte signed millisecond count.
    fn read_seconds_millis(&mut self) -> Result<i64> {
        let seconds = self.cursor.read_i32()?;
        let [b0, b1, b2] = self.cursor.read_array::<3>()?;
        let sign = if b0 & 0x80 != 0 { 0xFF } else { 0x00 };
        let millis = i32::from_be_bytes([sign, b0, b1, b2]);
        Ok(i64::from(seconds) * 1000 + i64::from(millis))
    }

    /// Read the flag byte, then the ordinary encoding when it is nonzero.
    pub fn decode_nullable<T, F>(&mut self, decode: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        if self.cursor.read_bool()? {
            decode(self).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn decode_nullable_boolean(&mut self) -> Result<Option<bool>> {
        self.decode_nullable(Self::decode_boolean)
    }

    pub fn decode_nullable_ulong(&mut self) -> Result<Option<u64>> {
        self.decode_nullable(Self::decode_ulong)
    }

    pub fn decode_nullable_time(&mut self) -> Result<Option<Time>> {
        self.decode_nullable(Self::decode_time)
    }

    pub fn decode_nullable_fine_time(&mut self) -> Result<Option<FineTime>> {
        self.decode_nullable(Self::decode_fine_time)
    }

    pub fn decode_nullable_duration(&mut self) -> Result<Option<Duration>> {
        self.decode_nullable(Self::decode_duration)
    }

    pub fn decode_nullable_blob(&mut self) -> Result<Option<Blob>> {
        self.decode_nullable(Self::decode_blob)
    }

    pub fn decode_nullable_string(&mut self) -> Result<Option<String>> {
        self.decode_nullable(Self::decode_string)
    }

    pub fn decode_nullable_identifier(&mut self) -> Result<Option<Identifier>> {
        self.decode_nullable(Self::decode_identifier)
    }

    pub fn decode_nullable_uri(&mut self) -> Result<Option<Uri>> {
        self.decode_nullable(Self::decode_uri)
    }

    /// Read one tag byte and undo the profile's tag offset.
    pub fn decode_attribute_kind(&mut self) -> Result<AttributeKind> {
        let tag = i16::from(self.cursor.read_u8()?) - self.profile.attribute_tag_offset;
        AttributeKind::from_short_form(tag).ok_or(ProtocolError::UnknownAttributeTag(tag))
    }

    pub fn decode_attribute(&mut self) -> Result<Attribute> {
        let value = match self.decode_attribute_kind()? {
            AttributeKind::Blob => Attribute::Blob(self.decode_blob()?),
            AttributeKind::Boolean => Attribute::Boolean(self.decode_boolean()?),
            AttributeKind::Duration => Attribute::Duration(self.decode_duration()?),
            AttributeKind::Float => Attribute::Float(self.decode_float()?),
            AttributeKind::Double => Attribute::Double(self.decode_double()?),
            AttributeKind::Identifier => Attribute::Identifier(self.decode_identifier()?),
            AttributeKind::Octet => Attribute::Octet(self.decode_octet()?),
            AttributeKind::UOctet => Attribute::UOctet(self.decode_uoctet()?),
            AttributeKind::Short => Attribute::Short(self.decode_short()?),
            AttributeKind::UShort => Attribute::UShort(self.decode_ushort()?),
            AttributeKind::Integer => Attribute::Integer(self.decode_integer()?),
            AttributeKind::UInteger => Attribute::UInteger(self.decode_uinteger()?),
            AttributeKind::Long => Attribute::Long(self.decode_long()?),
            AttributeKind::ULong => Attribute::ULong(self.decode_ulong()?),
            AttributeKind::String => Attribute::String(self.decode_string()?),
            AttributeKind::Time => Attribute::Time(self.decode_time()?),
            AttributeKind::FineTime => Attribute::FineTime(self.decode_fine_time()?),
            AttributeKind::Uri => Attribute::Uri(self.decode_uri()?),
        };
        Ok(value)
    }

    pub fn decode_nullable_attribute(&mut self) -> Result<Option<Attribute>> {
        self.decode_nullable(Self::decode_attribute)
    }

    /// Read the count prefix and return an iterator yielding exactly that many
    /// elements, each decoded with `element`.
    ///
    /// For in-memory sources a count larger than the bytes left is rejected up
    /// front, since every element takes at least one byte.
    pub fn create_list_decoder<T, F>(&mut self, element: F) -> Result<ListDecoder<'_, S, F>>
    where
        F: FnMut(&mut Self) -> Result<T>,
    {
        let count = self.cursor.read_count()?;
        if let Some(available) = self.cursor.remaining() {
            if count > available {
                return Err(ProtocolError::truncated(count, available));
            }
        }
        Ok(ListDecoder {
            decoder: self,
            declared: count,
            remaining: count,
            element,
        })
    }

    pub fn decode_list<T, F>(&mut self, element: F) -> Result<Vec<T>>
    where
        F: FnMut(&mut Self) -> Result<T>,
    {
        self.create_list_decoder(element)?.collect()
    }
}

/// Finite, single-pass iterator over list elements.
///
/// Stops after the declared count, or right after the first failed element.
pub struct ListDecoder<'a, S, F> {
    decoder: &'a mut AttributeDecoder<S>,
    declared: usize,
    remaining: usize,
    element: F,
}

impl<S: std::fmt::Debug, F> std::fmt::Debug for ListDecoder<'_, S, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListDecoder")
            .field("decoder", &self.decoder)
            .field("declared", &self.declared)
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

impl<S, F> ListDecoder<'_, S, F> {
    /// Element count read from the wire.
    pub fn declared_len(&self) -> usize {
        self.declared
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl<S, T, F> Iterator for ListDecoder<'_, S, F>
where
    S: ByteSource,
    F: FnMut(&mut AttributeDecoder<S>) -> Result<T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let item = (self.element)(&mut *self.decoder);
        if item.is_err() {
            self.remaining = 0;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<S, T, F> FusedIterator for ListDecoder<'_, S, F>
where
    S: ByteSource,
    F: FnMut(&mut AttributeDecoder<S>) -> Result<T>,
{
}
