// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read/write cursors over little-endian archive bytes.
//!
//! The writer owns a growable buffer and can seek backwards, which the tagged
//! protocol needs to back-patch record sizes once a payload is written.

use crate::error::{ArchiveError, ArchiveResult};

/// Upper bound for a single length-prefixed string (sanity check on corrupt input).
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

macro_rules! impl_write_le {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) -> ArchiveResult<()> {
            self.write_bytes(&value.to_le_bytes())
        }
    };
}

macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> ArchiveResult<$type> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.read_bytes($size)?);
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Writing cursor. Writes overwrite at the current position and extend the
/// buffer when they run past its end.
#[derive(Debug, Default, Clone)]
pub struct ArchiveWriter {
    buffer: Vec<u8>,
    offset: usize,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            offset: 0,
        }
    }

    impl_write_le!(write_u8, u8);
    impl_write_le!(write_i8, i8);
    impl_write_le!(write_u16, u16);
    impl_write_le!(write_i16, i16);
    impl_write_le!(write_u32, u32);
    impl_write_le!(write_i32, i32);
    impl_write_le!(write_u64, u64);
    impl_write_le!(write_i64, i64);

    pub fn write_f32(&mut self, value: f32) -> ArchiveResult<()> {
        self.write_u32(value.to_bits())
    }

    pub fn write_f64(&mut self, value: f64) -> ArchiveResult<()> {
        self.write_u64(value.to_bits())
    }

    pub fn write_bool(&mut self, value: bool) -> ArchiveResult<()> {
        self.write_u8(u8::from(value))
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> ArchiveResult<()> {
        let end = self.offset + data.len();
        if end > self.buffer.len() {
            self.buffer.resize(end, 0);
        }
        self.buffer[self.offset..end].copy_from_slice(data);
        self.offset = end;
        Ok(())
    }

    /// Length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) -> ArchiveResult<()> {
        if value.len() > MAX_STRING_LEN {
            return Err(ArchiveError::WriteFailed {
                offset: self.offset,
                reason: format!("string of {} bytes exceeds limit", value.len()),
            });
        }
        self.write_u32(value.len() as u32)?;
        self.write_bytes(value.as_bytes())
    }

    pub fn tell(&self) -> usize {
        self.offset
    }

    pub fn seek(&mut self, offset: usize) -> ArchiveResult<()> {
        if offset > self.buffer.len() {
            return Err(ArchiveError::SeekFailed {
                offset,
                len: self.buffer.len(),
            });
        }
        self.offset = offset;
        Ok(())
    }

    /// Seek to the end of written data.
    pub fn seek_end(&mut self) {
        self.offset = self.buffer.len();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

/// Reading cursor (bounds-checked, zero-copy).
#[derive(Debug, Clone)]
pub struct ArchiveReader<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> ArchiveReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_read_le!(read_u8, u8, 1);
    impl_read_le!(read_i8, i8, 1);
    impl_read_le!(read_u16, u16, 2);
    impl_read_le!(read_i16, i16, 2);
    impl_read_le!(read_u32, u32, 4);
    impl_read_le!(read_i32, i32, 4);
    impl_read_le!(read_u64, u64, 8);
    impl_read_le!(read_i64, i64, 8);

    pub fn read_f32(&mut self) -> ArchiveResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> ArchiveResult<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub fn read_bool(&mut self) -> ArchiveResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_bytes(&mut self, len: usize) -> ArchiveResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(ArchiveError::ReadFailed {
                offset: self.offset,
                reason: "unexpected end of archive".into(),
            });
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn read_string(&mut self) -> ArchiveResult<String> {
        let start = self.offset;
        let len = self.read_u32()? as usize;
        if len > MAX_STRING_LEN {
            return Err(ArchiveError::InvalidData {
                offset: start,
                reason: format!("string length {} exceeds limit", len),
            });
        }
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ArchiveError::InvalidData {
            offset: start,
            reason: "string is not valid UTF-8".into(),
        })
    }

    /// Consume `len` bytes without looking at them.
    pub fn skip(&mut self, len: usize) -> ArchiveResult<()> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn tell(&self) -> usize {
        self.offset
    }

    pub fn seek(&mut self, offset: usize) -> ArchiveResult<()> {
        if offset > self.buffer.len() {
            return Err(ArchiveError::SeekFailed {
                offset,
                len: self.buffer.len(),
            });
        }
        self.offset = offset;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.buffer.len()
    }
}
