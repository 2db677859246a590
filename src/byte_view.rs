//! Bounds-checked, endian-aware reads over a borrowed byte slice.
//!
//! Every read takes an absolute offset into the view and fails with
//! [`ExifError::Truncated`] instead of indexing past the end, so parsers built
//! on top never touch memory outside the buffer they were given.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::exif::ExifError;

/// Byte order of multi-byte fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// A read-only window onto bytes that refuses out-of-range reads.
#[derive(Copy, Clone, Debug)]
pub struct ByteView<'a> {
    bytes: &'a [u8],
    endian: Endian,
}

impl<'a> ByteView<'a> {
    pub fn new(bytes: &'a [u8], endian: Endian) -> Self {
        Self { bytes, endian }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Returns a copy of this view that decodes with `endian`.
    pub fn with_endian(self, endian: Endian) -> Self {
        Self { endian, ..self }
    }

    /// Returns `len` bytes starting at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], ExifError> {
        let end = offset.checked_add(len).ok_or(ExifError::Truncated {
            offset,
            needed: len,
            available: self.bytes.len(),
        })?;
        self.bytes.get(offset..end).ok_or(ExifError::Truncated {
            offset,
            needed: len,
            available: self.bytes.len(),
        })
    }

    /// Returns a sub-view covering `offset..offset + len`.
    pub fn sub_view(&self, offset: usize, len: usize) -> Result<ByteView<'a>, ExifError> {
        Ok(ByteView::new(self.bytes(offset, len)?, self.endian))
    }

    /// Returns a sub-view from `offset` to the end of this view.
    pub fn tail(&self, offset: usize) -> Result<ByteView<'a>, ExifError> {
        let len = self.bytes.len().checked_sub(offset).ok_or(ExifError::Truncated {
            offset,
            needed: 0,
            available: self.bytes.len(),
        })?;
        self.sub_view(offset, len)
    }

    pub fn u8_at(&self, offset: usize) -> Result<u8, ExifError> {
        Ok(self.bytes(offset, 1)?[0])
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16, ExifError> {
        let raw = self.bytes(offset, 2)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_u16(raw),
            Endian::Big => BigEndian::read_u16(raw),
        })
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32, ExifError> {
        let raw = self.bytes(offset, 4)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_u32(raw),
            Endian::Big => BigEndian::read_u32(raw),
        })
    }
}
