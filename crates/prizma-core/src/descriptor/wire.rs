//! Low-level protobuf wire format primitives.
//!
//! This module implements the cursor-based reader used by both the
//! descriptor parser and the message decode engine, plus the small
//! write-side helpers the encoder builds on.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages)
//! - 5: I32 (fixed32, sfixed32, float)
//!
//! Group wire types (3 and 4) are recognized but rejected: the engine
//! does not support group encoding.

use crate::error::{Error, Result};
use bytes::BufMut;
use std::fmt;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(Error::InvalidWireType { value }),
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Varint => "varint",
            WireType::I64 => "i64",
            WireType::Len => "len",
            WireType::StartGroup => "start-group",
            WireType::EndGroup => "end-group",
            WireType::I32 => "i32",
        };
        f.write_str(name)
    }
}

/// A bounds-checked reading cursor over a byte buffer.
///
/// Reading past the end of the buffer is the only failure mode; every
/// read either consumes exactly the bytes it describes or leaves an
/// error for the caller to propagate.
#[derive(Debug)]
pub struct WireCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireCursor<'a> {
    /// Creates a cursor positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current byte offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns true once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Consume exactly `n` bytes and return them as a slice.
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let start = self.pos;
        let end = start
            .checked_add(n)
            .ok_or_else(|| Error::truncated(start, n))?;
        if end > self.buf.len() {
            return Err(Error::truncated(start, end - self.buf.len()));
        }
        self.pos = end;
        Ok(&self.buf[start..end])
    }

    /// Decode a base-128 varint (continuation bit 0x80, 7 payload bits
    /// per byte, at most 10 bytes for a 64-bit value).
    pub fn read_varint(&mut self) -> Result<u64> {
        let start = self.pos;
        let mut result: u64 = 0;
        let mut shift = 0u32;

        while let Some(&byte) = self.buf.get(self.pos) {
            if self.pos - start >= 10 {
                return Err(Error::varint_decode(start));
            }
            self.pos += 1;
            result |= u64::from(byte & 0x7F) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }

        Err(Error::varint_decode(start))
    }

    /// Decode a varint whose value is descriptor metadata.
    ///
    /// Field numbers, enum values and labels are small non-negative
    /// integers; the accumulator is truncated to 32 bits, which covers
    /// every value the descriptor format can carry.
    pub fn read_varint32(&mut self) -> Result<u32> {
        self.read_varint().map(|v| v as u32)
    }

    /// Read a field tag and split it into field number and wire type.
    pub fn read_tag(&mut self) -> Result<(u32, WireType)> {
        let tag = self.read_varint()?;
        let wire_type = WireType::try_from((tag & 0x07) as u8)?;
        Ok(((tag >> 3) as u32, wire_type))
    }

    /// Read a length-delimited byte slice: a varint length prefix
    /// followed by that many bytes.
    pub fn read_len_delimited(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()? as usize;
        self.take(len)
    }

    /// Read a length-delimited slice and decode it as UTF-8, replacing
    /// invalid sequences. Text decoding never fails; a truncated buffer
    /// is the only error.
    pub fn read_string(&mut self) -> Result<String> {
        Ok(String::from_utf8_lossy(self.read_len_delimited()?).into_owned())
    }

    /// Read a little-endian 32-bit fixed-width value.
    pub fn read_fixed32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a little-endian 64-bit fixed-width value.
    pub fn read_fixed64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Skip one field payload of the given wire type.
    pub fn skip(&mut self, wire_type: WireType) -> Result<()> {
        match wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::I64 => {
                self.take(8)?;
            }
            WireType::Len => {
                self.read_len_delimited()?;
            }
            WireType::I32 => {
                self.take(4)?;
            }
            WireType::StartGroup | WireType::EndGroup => {
                return Err(Error::UnsupportedWireType { wire_type });
            }
        }
        Ok(())
    }
}

/// Append a base-128 varint to `buf`.
pub fn write_varint(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            return;
        }
        buf.put_u8(byte | 0x80);
    }
}

/// Append a field tag (`field_number << 3 | wire_type`) to `buf`.
pub fn write_tag(buf: &mut impl BufMut, field_number: u32, wire_type: WireType) {
    write_varint(buf, (u64::from(field_number) << 3) | u64::from(wire_type as u8));
}
