// VCDIFF variable-length integers and raw byte reads (RFC 3284, Section 2).
//
// Base-128, big-endian: most-significant group first.
// Each byte has bit 7 set except the final byte.
// Only 32-bit integers are accepted: at most 5 bytes, and on the 5th byte
// the value accumulated so far must fit in 25 bits with no continuation.

use std::io::{Read, Write};

use super::error::{DecodeError, VarIntError};

/// Maximum encoded length of a 32-bit value (ceil(32/7) = 5).
pub const MAX_VARINT_LEN: usize = 5;

/// Largest byte count a single raw read may request.
pub const MAX_READ_LEN: u32 = i32::MAX as u32;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a `u32` into the tail of `buf`.
/// Returns the number of bytes written (1..=5); the encoding is
/// `buf[MAX_VARINT_LEN - len..]`.
#[inline]
pub fn encode_u32(mut num: u32, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = MAX_VARINT_LEN;
    loop {
        i -= 1;
        buf[i] = (num as u8 & 0x7F) | 0x80;
        num >>= 7;
        if num == 0 {
            break;
        }
    }
    buf[MAX_VARINT_LEN - 1] &= 0x7F; // clear MSB on last byte
    MAX_VARINT_LEN - i
}

/// Encode a `u32` and write it to a `Write` sink.
pub fn write_u32<W: Write>(w: &mut W, num: u32) -> std::io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u32(num, &mut buf);
    w.write_all(&buf[MAX_VARINT_LEN - len..])
}

/// Encoded byte-length of a `u32` value.
#[inline]
pub fn sizeof_u32(num: u32) -> usize {
    let bits = 32 - num.leading_zeros();
    bits.max(1).div_ceil(7) as usize
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Fold the `index`-th byte of an integer into `val`.
#[inline]
fn accumulate(val: u32, index: usize, byte: u8) -> Result<u32, VarIntError> {
    if index == MAX_VARINT_LEN - 1 && (val >> (32 - 7) != 0 || byte & 0x80 != 0) {
        return Err(VarIntError::Overflow);
    }
    Ok((val << 7) | u32::from(byte & 0x7F))
}

/// Decode a `u32` from the start of a byte slice.
/// Returns `(value, bytes_consumed)`.
pub fn read_u32(data: &[u8]) -> Result<(u32, usize), VarIntError> {
    let mut val: u32 = 0;
    for (i, &byte) in data.iter().take(MAX_VARINT_LEN).enumerate() {
        val = accumulate(val, i, byte)?;
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
    }
    Err(VarIntError::EndOfInput)
}

/// Read one byte from a stream.
pub fn stream_read_byte<R: Read>(r: &mut R) -> Result<u8, DecodeError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read exactly `len` bytes from a stream.
///
/// The buffer grows with the bytes actually present, so a hostile length
/// on a short stream fails with `EndOfInput` instead of allocating it up
/// front.
pub fn stream_read_bytes<R: Read>(r: &mut R, len: u32) -> Result<Vec<u8>, DecodeError> {
    if len > MAX_READ_LEN {
        return Err(VarIntError::LengthTooLarge(len).into());
    }
    let mut data = Vec::new();
    r.take(u64::from(len)).read_to_end(&mut data)?;
    if data.len() != len as usize {
        return Err(DecodeError::EndOfInput);
    }
    Ok(data)
}

/// Read a `u32` varint from a stream.
pub fn stream_read_u32<R: Read>(r: &mut R) -> Result<u32, DecodeError> {
    let mut val: u32 = 0;
    for i in 0..MAX_VARINT_LEN {
        let byte = stream_read_byte(r)?;
        val = accumulate(val, i, byte)?;
        if byte & 0x80 == 0 {
            break;
        }
    }
    Ok(val)
}

// ---------------------------------------------------------------------------
// Section cursor
// ---------------------------------------------------------------------------

/// An owned byte section of a window with a read cursor.
///
/// Used for the DATA, INST and ADDR sections, which are consumed
/// independently of each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    bytes: Vec<u8>,
    pos: usize,
}

impl Section {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Total section length.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Current read position.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// True once every byte has been consumed.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// The whole section, independent of the cursor.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn read_byte(&mut self) -> Result<u8, VarIntError> {
        let byte = *self.bytes.get(self.pos).ok_or(VarIntError::EndOfInput)?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, len: u32) -> Result<&[u8], VarIntError> {
        if len > MAX_READ_LEN {
            return Err(VarIntError::LengthTooLarge(len));
        }
        let end = self
            .pos
            .checked_add(len as usize)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(VarIntError::EndOfInput)?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u32(&mut self) -> Result<u32, VarIntError> {
        let (val, consumed) = read_u32(&self.bytes[self.pos..])?;
        self.pos += consumed;
        Ok(val)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
