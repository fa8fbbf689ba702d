//! # Byte Cursor
//!
//! Position-tracked, forward-only primitive reads over an in-memory buffer or a
//! streaming reader.
//!
//! Every multi-byte value is big-endian. A read that needs more bytes than the
//! source holds fails with `ProtocolError::TruncatedInput` and never pads.
//! A slice read that fails consumes nothing; a streaming read that hits EOF
//! early advances the position by the bytes it did pull off the stream.

use std::io::{self, Read};

use crate::core::profile::LengthField;
use crate::error::{ProtocolError, Result};

/// A source of bytes a [`ByteCursor`] can consume.
pub trait ByteSource {
    /// Fill `buf` completely from the source.
    fn read_into(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Take exactly `len` bytes as an owned buffer.
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.read_into(&mut out)?;
        Ok(out)
    }

    /// Bytes consumed so far.
    fn position(&self) -> usize;

    /// Bytes still available, when the source can tell.
    fn remaining(&self) -> Option<usize>;
}

/// In-memory source over a borrowed slice.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Start reading at `offset` instead of the beginning of `data`.
    pub fn with_offset(data: &'a [u8], offset: usize) -> Self {
        Self {
            data,
            offset: offset.min(data.len()),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let available = self.data.len() - self.offset;
        if len > available {
            return Err(ProtocolError::truncated(len, available));
        }
        let span = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(span)
    }
}

impl ByteSource for SliceSource<'_> {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let span = self.take(buf.len())?;
        buf.copy_from_slice(span);
        Ok(())
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        self.take(len).map(<[u8]>::to_vec)
    }

    fn position(&self) -> usize {
        self.offset
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.data.len() - self.offset)
    }
}

/// Streaming source over any blocking reader.
#[derive(Debug)]
pub struct StreamSource<R> {
    reader: R,
    consumed: usize,
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            consumed: 0,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> ByteSource for StreamSource<R> {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.consumed += filled;
                    return Err(ProtocolError::truncated(buf.len(), filled));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.consumed += filled;
                    return Err(e.into());
                }
            }
        }
        self.consumed += filled;
        Ok(())
    }

    // Grows the buffer as data arrives so a bogus length prefix cannot force a
    // huge up-front allocation.
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let result = self
            .reader
            .by_ref()
            .take(len as u64)
            .read_to_end(&mut out);
        self.consumed += out.len();
        result?;
        if out.len() < len {
            return Err(ProtocolError::truncated(len, out.len()));
        }
        Ok(out)
    }

    fn position(&self) -> usize {
        self.consumed
    }

    fn remaining(&self) -> Option<usize> {
        None
    }
}

/// Primitive reader honouring the configured length-field width.
#[derive(Debug)]
pub struct ByteCursor<S> {
    source: S,
    length_field: LengthField,
}

impl<'a> ByteCursor<SliceSource<'a>> {
    pub fn from_slice(data: &'a [u8], length_field: LengthField) -> Self {
        Self::new(SliceSource::new(data), length_field)
    }
}

impl<R: Read> ByteCursor<StreamSource<R>> {
    pub fn from_reader(reader: R, length_field: LengthField) -> Self {
        Self::new(StreamSource::new(reader), length_field)
    }
}

impl<S: ByteSource> ByteCursor<S> {
    pub fn new(source: S, length_field: LengthField) -> Self {
        Self {
            source,
            length_field,
        }
    }

    pub fn length_field(&self) -> LengthField {
        self.length_field
    }

    pub fn position(&self) -> usize {
        self.source.position()
    }

    pub fn remaining(&self) -> Option<usize> {
        self.source.remaining()
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.source.read_into(&mut buf)?;
        Ok(buf)
    }

    /// Raw span of caller-given length.
    pub fn read_span(&mut self, len: usize) -> Result<Vec<u8>> {
        self.source.read_vec(len)
    }

    /// One flag byte: zero is false, anything else is true.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_be_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }

    /// Signed size prefix in the configured width.
    pub fn read_size(&mut self) -> Result<i64> {
        match self.length_field {
            LengthField::Short => self.read_i16().map(i64::from),
            LengthField::Long => self.read_i32().map(i64::from),
        }
    }

    /// Unsigned list count in the configured width.
    pub fn read_count(&mut self) -> Result<usize> {
        match self.length_field {
            LengthField::Short => self.read_u16().map(usize::from),
            LengthField::Long => self.read_u32().map(|count| count as usize),
        }
    }

    /// Size-prefixed bytes; a size of -1 is the null sentinel.
    pub fn read_sized_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        match self.read_size()? {
            -1 => Ok(None),
            size if size < 0 => Err(ProtocolError::InvalidLength(size)),
            size => self.read_span(size as usize).map(Some),
        }
    }

    /// Size-prefixed UTF-8 text; a size of -1 yields `None`.
    pub fn read_string(&mut self) -> Result<Option<String>> {
        match self.read_sized_bytes()? {
            Some(bytes) => Ok(Some(String::from_utf8(bytes)?)),
            None => Ok(None),
        }
    }
}
