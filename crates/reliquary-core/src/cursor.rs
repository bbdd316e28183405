//! Seekable, appendable byte cursor with typed little-endian primitives.
//!
//! Every layer above this one expresses its framing purely through
//! [`ByteCursor::tell`], [`ByteCursor::seek`] and the typed read/write
//! methods. A write at a position inside the buffer overwrites in place and a
//! write at the end appends, so a placeholder written earlier can be patched
//! once the real value is known.
//!
//! # Wire primitives
//!
//! - fixed-width integers and floats: little-endian
//! - `bool`: one byte, nonzero reads as `true`
//! - string: `i32` byte length followed by UTF-8 bytes
//! - string list: `i32` count followed by strings
//! - byte array: `i32` length followed by raw bytes
//! - persistent id: 16 raw bytes

use crate::id::PersistentId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by cursor reads and seeks. Writes never fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CursorError {
    #[error("unexpected end of buffer at {pos}: wanted {wanted} bytes, buffer holds {len}")]
    UnexpectedEof { pos: u64, wanted: usize, len: usize },
    #[error("offset {pos} is outside the buffer (length {len})")]
    SeekOutOfRange { pos: i64, len: usize },
    #[error("offset {offset} read at {at} points backwards")]
    BackwardOffset { at: u64, offset: u64 },
    #[error("negative length {len} at {pos}")]
    NegativeLength { pos: u64, len: i64 },
    #[error("invalid UTF-8 in string at {pos}")]
    InvalidUtf8 { pos: u64 },
}

// ---------------------------------------------------------------------------
// ByteCursor
// ---------------------------------------------------------------------------

/// A growable byte buffer with a read/write position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteCursor {
    buf: Vec<u8>,
    pos: usize,
}

macro_rules! scalar_io {
    ($($write:ident, $read:ident, $ty:ty;)*) => {
        $(
            pub fn $write(&mut self, value: $ty) {
                self.write_raw(&value.to_le_bytes());
            }

            pub fn $read(&mut self) -> Result<$ty, CursorError> {
                Ok(<$ty>::from_le_bytes(self.read_array()?))
            }
        )*
    };
}

impl ByteCursor {
    /// An empty cursor positioned at 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            pos: 0,
        }
    }

    /// Wrap existing bytes for reading. The position starts at 0.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current absolute position.
    pub fn tell(&self) -> u64 {
        self.pos as u64
    }

    /// Whether the position is at (or past) the end of the buffer.
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Move to an absolute position. Seeking to exactly `len()` is allowed.
    pub fn seek(&mut self, pos: u64) -> Result<(), CursorError> {
        if pos > self.buf.len() as u64 {
            return Err(CursorError::SeekOutOfRange {
                pos: pos as i64,
                len: self.buf.len(),
            });
        }
        self.pos = pos as usize;
        Ok(())
    }

    /// Move to the end of the buffer.
    pub fn seek_end(&mut self) {
        self.pos = self.buf.len();
    }

    // -----------------------------------------------------------------------
    // Raw bytes
    // -----------------------------------------------------------------------

    /// Write bytes at the current position, overwriting or extending.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    /// Read exactly `n` bytes.
    pub fn read_raw(&mut self, n: usize) -> Result<&[u8], CursorError> {
        let start = self.pos;
        let end = start
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(CursorError::UnexpectedEof {
                pos: start as u64,
                wanted: n,
                len: self.buf.len(),
            })?;
        self.pos = end;
        Ok(&self.buf[start..end])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CursorError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_raw(N)?);
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Scalars
    // -----------------------------------------------------------------------

    scalar_io! {
        write_u8, read_u8, u8;
        write_u16, read_u16, u16;
        write_u32, read_u32, u32;
        write_u64, read_u64, u64;
        write_i32, read_i32, i32;
        write_i64, read_i64, i64;
        write_f32, read_f32, f32;
        write_f64, read_f64, f64;
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn read_bool(&mut self) -> Result<bool, CursorError> {
        Ok(self.read_u8()? != 0)
    }

    // -----------------------------------------------------------------------
    // Length-prefixed data
    // -----------------------------------------------------------------------

    /// Read an `i32` length or count, rejecting negative values.
    pub fn read_len(&mut self) -> Result<usize, CursorError> {
        let pos = self.tell();
        let len = self.read_i32()?;
        if len < 0 {
            return Err(CursorError::NegativeLength {
                pos,
                len: i64::from(len),
            });
        }
        Ok(len as usize)
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_i32(value.len() as i32);
        self.write_raw(value.as_bytes());
    }

    pub fn read_string(&mut self) -> Result<String, CursorError> {
        let pos = self.tell();
        let len = self.read_len()?;
        std::str::from_utf8(self.read_raw(len)?)
            .map(str::to_owned)
            .map_err(|_| CursorError::InvalidUtf8 { pos })
    }

    pub fn write_string_list(&mut self, values: &[String]) {
        self.write_i32(values.len() as i32);
        for value in values {
            self.write_string(value);
        }
    }

    pub fn read_string_list(&mut self) -> Result<Vec<String>, CursorError> {
        let count = self.read_len()?;
        let mut out = Vec::new();
        for _ in 0..count {
            out.push(self.read_string()?);
        }
        Ok(out)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_i32(bytes.len() as i32);
        self.write_raw(bytes);
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, CursorError> {
        let len = self.read_len()?;
        Ok(self.read_raw(len)?.to_vec())
    }

    pub fn write_guid(&mut self, id: PersistentId) {
        self.write_raw(id.as_bytes());
    }

    pub fn read_guid(&mut self) -> Result<PersistentId, CursorError> {
        Ok(PersistentId::from_bytes(self.read_array()?))
    }

    // -----------------------------------------------------------------------
    // Placeholders and offsets
    // -----------------------------------------------------------------------

    /// Write an `i64` zero and return its position for a later patch.
    pub fn reserve_i64(&mut self) -> u64 {
        let at = self.tell();
        self.write_i64(0);
        at
    }

    /// Write an `i32` zero and return its position for a later patch.
    pub fn reserve_i32(&mut self) -> u64 {
        let at = self.tell();
        self.write_i32(0);
        at
    }

    /// Overwrite the `i64` at `at`, then return to the current position.
    pub fn patch_i64(&mut self, at: u64, value: i64) -> Result<(), CursorError> {
        let back = self.tell();
        self.seek(at)?;
        self.write_i64(value);
        self.seek(back)
    }

    /// Overwrite the `i32` at `at`, then return to the current position.
    pub fn patch_i32(&mut self, at: u64, value: i32) -> Result<(), CursorError> {
        let back = self.tell();
        self.seek(at)?;
        self.write_i32(value);
        self.seek(back)
    }

    /// Read an absolute `i64` offset and check that it lies inside the buffer
    /// and not before the position right after the offset itself.
    pub fn read_offset(&mut self) -> Result<u64, CursorError> {
        let raw = self.read_i64()?;
        if raw < 0 || raw as u64 > self.buf.len() as u64 {
            return Err(CursorError::SeekOutOfRange {
                pos: raw,
                len: self.buf.len(),
            });
        }
        let offset = raw as u64;
        if offset < self.tell() {
            return Err(CursorError::BackwardOffset {
                at: self.tell(),
                offset,
            });
        }
        Ok(offset)
    }
}
