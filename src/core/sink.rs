//! # Byte Sink
//!
//! Append-only primitive writer, the write-side counterpart of
//! [`ByteCursor`](crate::core::ByteCursor).
//!
//! The sink writes into any growable `bytes::BufMut` (`BytesMut` by default,
//! `Vec<u8>` also works). Multi-byte values are big-endian. Size prefixes are
//! signed so that `-1` can mark a blob without a value; list counts are
//! unsigned.

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::profile::LengthField;
use crate::error::{ProtocolError, Result};

/// Primitive writer honouring the configured length-field width.
#[derive(Debug)]
pub struct ByteSink<B = BytesMut> {
    buf: B,
    length_field: LengthField,
    written: usize,
}

impl ByteSink<BytesMut> {
    pub fn new(length_field: LengthField) -> Self {
        Self::with_buffer(BytesMut::new(), length_field)
    }

    pub fn with_capacity(capacity: usize, length_field: LengthField) -> Self {
        Self::with_buffer(BytesMut::with_capacity(capacity), length_field)
    }

    /// Hand the accumulated bytes over without copying.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

impl<B: BufMut> ByteSink<B> {
    pub fn with_buffer(buf: B, length_field: LengthField) -> Self {
        Self {
            buf,
            length_field,
            written: 0,
        }
    }

    pub fn length_field(&self) -> LengthField {
        self.length_field
    }

    /// Bytes written through this sink.
    pub fn len(&self) -> usize {
        self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    pub fn into_inner(self) -> B {
        self.buf
    }

    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
        self.written += bytes.len();
    }

    pub fn put_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
        self.written += 1;
    }

    pub fn put_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
        self.written += 1;
    }

    pub fn put_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
        self.written += 2;
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
        self.written += 2;
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
        self.written += 4;
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
        self.written += 4;
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
        self.written += 8;
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.put_u64(value);
        self.written += 8;
    }

    pub fn put_f32(&mut self, value: f32) {
        self.buf.put_f32(value);
        self.written += 4;
    }

    pub fn put_f64(&mut self, value: f64) {
        self.buf.put_f64(value);
        self.written += 8;
    }

    /// Signed size prefix in the configured width.
    pub fn put_size(&mut self, len: usize) -> Result<()> {
        let max = self.length_field.max_size();
        if len > max {
            return Err(ProtocolError::OversizedField { len, max });
        }
        match self.length_field {
            LengthField::Short => self.put_i16(len as i16),
            LengthField::Long => self.put_i32(len as i32),
        }
        Ok(())
    }

    /// The `-1` size prefix standing in for a blob with no value.
    pub fn put_null_size(&mut self) {
        match self.length_field {
            LengthField::Short => self.put_i16(-1),
            LengthField::Long => self.put_i32(-1),
        }
    }

    /// Unsigned list count in the configured width.
    pub fn put_count(&mut self, count: usize) -> Result<()> {
        let max = self.length_field.max_count();
        if count > max {
            return Err(ProtocolError::OversizedField { len: count, max });
        }
        match self.length_field {
            LengthField::Short => self.put_u16(count as u16),
            LengthField::Long => self.put_u32(count as u32),
        }
        Ok(())
    }

    /// Size prefix followed by the bytes, or the null sentinel for `None`.
    pub fn put_sized_bytes(&mut self, bytes: Option<&[u8]>) -> Result<()> {
        match bytes {
            Some(bytes) => {
                self.put_size(bytes.len())?;
                self.put_raw(bytes);
            }
            None => self.put_null_size(),
        }
        Ok(())
    }

    pub fn put_string(&mut self, value: &str) -> Result<()> {
        self.put_sized_bytes(Some(value.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_primitive_layout() {
        let mut sink = ByteSink::new(LengthField::Long);
        sink.put_bool(true);
        sink.put_i16(-2);
        sink.put_u32(0x0102_0304);

        assert_eq!(sink.len(), 7);
        assert_eq!(sink.as_slice(), &[0x01, 0xFF, 0xFE, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_string_prefix_width() {
        let mut short = ByteSink::new(LengthField::Short);
        short.put_string("ab").unwrap();
        assert_eq!(short.as_slice(), &[0x00, 0x02, b'a', b'b']);

        let mut long = ByteSink::new(LengthField::Long);
        long.put_string("ab").unwrap();
        assert_eq!(long.as_slice(), &[0x00, 0x00, 0x00, 0x02, b'a', b'b']);
    }

    #[test]
    fn test_null_sized_bytes_sentinel() {
        let mut short = ByteSink::new(LengthField::Short);
        short.put_sized_bytes(None).unwrap();
        assert_eq!(short.as_slice(), &[0xFF, 0xFF]);

        let mut long = ByteSink::new(LengthField::Long);
        long.put_sized_bytes(None).unwrap();
        assert_eq!(long.as_slice(), &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_oversized_field_rejected_under_short_width() {
        let mut sink = ByteSink::new(LengthField::Short);
        let big = vec![0u8; i16::MAX as usize + 1];
        let err = sink.put_sized_bytes(Some(&big)).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::OversizedField { len: 32_768, max: 32_767 }
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_count_is_unsigned() {
        let mut sink = ByteSink::new(LengthField::Short);
        sink.put_count(u16::MAX as usize).unwrap();
        assert_eq!(sink.as_slice(), &[0xFF, 0xFF]);
        assert!(sink.put_count(u16::MAX as usize + 1).is_err());
    }

    #[test]
    fn test_vec_backed_sink() {
        let mut sink = ByteSink::with_buffer(Vec::new(), LengthField::Long);
        sink.put_u64(1);
        assert_eq!(sink.into_inner(), vec![0, 0, 0, 0, 0, 0, 0, 1]);
    }
}
