//! Streaming reader for the tagged-field wire format
//!
//! A container payload is a flat sequence of fields. Each field starts with a
//! varint tag: the low three bits are the wire type, the remaining bits the
//! field number. Only length-delimited payloads are handed to callers; the
//! other wire types are validated and skipped.
//!
//! The reader holds at most one field payload at a time and reuses its buffer
//! between fields, so it can walk containers far larger than memory.

use std::io::{self, Read};
use thiserror::Error;

/// Longest encoding of a 64-bit varint.
pub const MAX_VARINT_BYTES: usize = 10;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("varint is not terminated within {MAX_VARINT_BYTES} bytes")]
    MalformedVarint,

    #[error("stream ended inside a field")]
    Truncated,

    #[error("unsupported wire type {0}")]
    UnknownWireType(u8),

    #[error("length-delimited field of {0} bytes exceeds the supported range")]
    LengthOverflow(u64),

    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

pub type WireResult<T> = Result<T, WireError>;

/// How a field's payload is laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    pub fn bits(self) -> u8 {
        match self {
            WireType::Varint => 0,
            WireType::Fixed64 => 1,
            WireType::LengthDelimited => 2,
            WireType::Fixed32 => 5,
        }
    }
}

impl TryFrom<u8> for WireType {
    type Error = WireError;

    fn try_from(bits: u8) -> WireResult<Self> {
        match bits {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            other => Err(WireError::UnknownWireType(other)),
        }
    }
}

/// A raw field tag split into its two halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag(u64);

impl Tag {
    pub fn from_raw(raw: u64) -> Self {
        Tag(raw)
    }

    pub fn new(field_number: u64, wire_type: WireType) -> Self {
        Tag((field_number << 3) | u64::from(wire_type.bits()))
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn field_number(self) -> u64 {
        self.0 >> 3
    }

    pub fn wire_type_bits(self) -> u8 {
        (self.0 & 0x7) as u8
    }

    pub fn wire_type(self) -> WireResult<WireType> {
        WireType::try_from(self.wire_type_bits())
    }
}

/// One length-delimited field. The payload borrows the reader's buffer and is
/// only valid until the next call to [`FieldReader::next_field`].
#[derive(Debug)]
pub struct Field<'a> {
    pub number: u64,
    pub payload: &'a [u8],
}

/// Forward-only reader over a decompressed container payload.
pub struct FieldReader<R> {
    inner: R,
    buf: Vec<u8>,
    fields_read: u64,
}

impl<R: Read> FieldReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            fields_read: 0,
        }
    }

    /// Number of length-delimited fields yielded so far.
    pub fn fields_read(&self) -> u64 {
        self.fields_read
    }

    /// Advance to the next length-delimited field.
    ///
    /// Returns `Ok(None)` once the stream is exhausted at a field boundary.
    /// Running out of bytes anywhere else is [`WireError::Truncated`].
    pub fn next_field(&mut self) -> WireResult<Option<Field<'_>>> {
        loop {
            let tag = match read_varint(&mut self.inner)? {
                Some(raw) => Tag::from_raw(raw),
                None => return Ok(None),
            };

            match tag.wire_type()? {
                WireType::LengthDelimited => {
                    let length = read_varint(&mut self.inner)?.ok_or(WireError::Truncated)?;
                    if length > i32::MAX as u64 {
                        return Err(WireError::LengthOverflow(length));
                    }

                    // `take` bounds the allocation by what the stream actually holds.
                    self.buf.clear();
                    let read = (&mut self.inner).take(length).read_to_end(&mut self.buf)?;
                    if read as u64 != length {
                        return Err(WireError::Truncated);
                    }

                    self.fields_read += 1;
                    return Ok(Some(Field {
                        number: tag.field_number(),
                        payload: &self.buf,
                    }));
                }
                WireType::Varint => {
                    read_varint(&mut self.inner)?.ok_or(WireError::Truncated)?;
                }
                WireType::Fixed64 => skip_exact::<8, _>(&mut self.inner)?,
                WireType::Fixed32 => skip_exact::<4, _>(&mut self.inner)?,
            }
        }
    }

    /// Walk every remaining field, handing each to `on_field`.
    ///
    /// The first error from either the stream or the callback stops the walk.
    pub fn for_each_field<E, F>(&mut self, mut on_field: F) -> Result<(), E>
    where
        E: From<WireError>,
        F: FnMut(u64, &[u8]) -> Result<(), E>,
    {
        while let Some(field) = self.next_field()? {
            on_field(field.number, field.payload)?;
        }
        Ok(())
    }
}

/// Read one byte, distinguishing a clean end of stream.
fn read_byte<R: Read>(reader: &mut R) -> WireResult<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(WireError::Io(e)),
        }
    }
}

/// Decode one varint. `Ok(None)` means the stream was already exhausted
/// before the first byte.
pub fn read_varint<R: Read>(reader: &mut R) -> WireResult<Option<u64>> {
    let mut result = 0u64;
    for index in 0..MAX_VARINT_BYTES {
        let byte = match read_byte(reader)? {
            Some(b) => b,
            None if index == 0 => return Ok(None),
            None => return Err(WireError::Truncated),
        };
        result |= u64::from(byte & 0x7f) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok(Some(result));
        }
    }
    Err(WireError::MalformedVarint)
}

/// Append the varint encoding of `value` to `out`.
pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Append one length-delimited field to `out`.
pub fn write_length_delimited(out: &mut Vec<u8>, field_number: u64, payload: &[u8]) {
    write_varint(out, Tag::new(field_number, WireType::LengthDelimited).raw());
    write_varint(out, payload.len() as u64);
    out.extend_from_slice(payload);
}

fn skip_exact<const N: usize, R: Read>(reader: &mut R) -> WireResult<()> {
    let mut scratch = [0u8; N];
    reader.read_exact(&mut scratch).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => WireError::Truncated,
        _ => WireError::Io(e),
    })
}
