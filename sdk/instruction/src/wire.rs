//! Fixed-width little-endian primitives.
//!
//! A `u128` never goes on the wire as 16 contiguous bytes of one integer: it
//! is split into two `u64` words, low word first. Deployed programs read the
//! field that way, so this is part of the format.

use crate::CodecError;

/// Types with a fixed binary layout inside an instruction payload.
pub trait WireFormat: Sized {
    /// Encoded size in bytes
    const LEN: usize;

    fn write(&self, out: &mut Vec<u8>);

    fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError>;
}

pub fn put_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Two LE u64 words, low word first.
pub fn put_u128(out: &mut Vec<u8>, value: u128) {
    put_u64(out, value as u64);
    put_u64(out, (value >> 64) as u64);
}

pub fn put_bool(out: &mut Vec<u8>, value: bool) {
    out.push(u8::from(value));
}

/// Cursor over an instruction payload. Every read that runs past the end
/// fails with `MalformedInstruction` instead of panicking.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::MalformedInstruction(format!(
                "need {len} bytes at offset {}, only {} left",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn u128(&mut self) -> Result<u128, CodecError> {
        let low = self.u64()?;
        let high = self.u64()?;
        Ok(u128::from(low) | (u128::from(high) << 64))
    }

    /// Strict boolean: only 0 and 1 are accepted.
    pub fn bool(&mut self) -> Result<bool, CodecError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::MalformedInstruction(format!(
                "invalid bool byte {other}"
            ))),
        }
    }

    /// Fails if any bytes are left over.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(CodecError::MalformedInstruction(format!(
                "{extra} trailing bytes"
            ))),
        }
    }
}

/// Copy a caller-supplied slice into a fixed-width argument.
pub fn fixed<const N: usize>(field: &'static str, bytes: &[u8]) -> Result<[u8; N], CodecError> {
    <[u8; N]>::try_from(bytes).map_err(|_| CodecError::InvalidArgumentLength {
        field,
        expected: N,
        actual: bytes.len(),
    })
}
