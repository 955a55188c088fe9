//! Bounds-checked view over the assembled ROM image.
//!
//! All table and instruction reads go through this type so that a wrong
//! table address surfaces as a [`DriverError::RomOutOfRange`] with the
//! offending offset instead of a panic.

use crate::error::{DriverError, Result};

/// Immutable ROM byte view shared by every driver in one decode pass.
#[derive(Debug, Clone, Copy)]
pub struct DriverContext<'a> {
    rom: &'a [u8],
}

impl<'a> DriverContext<'a> {
    /// Wrap a ROM image.
    pub fn new(rom: &'a [u8]) -> Self {
        Self { rom }
    }

    /// ROM image size in bytes.
    pub fn len(&self) -> usize {
        self.rom.len()
    }

    /// Whether the image is empty.
    pub fn is_empty(&self) -> bool {
        self.rom.is_empty()
    }

    /// Read one byte.
    pub fn byte(&self, offset: usize) -> Result<u8> {
        self.rom
            .get(offset)
            .copied()
            .ok_or(DriverError::RomOutOfRange {
                offset,
                len: 1,
                size: self.rom.len(),
            })
    }

    /// Read a slice of `len` bytes.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        self.rom
            .get(offset..offset + len)
            .ok_or(DriverError::RomOutOfRange {
                offset,
                len,
                size: self.rom.len(),
            })
    }

    /// Read a little-endian u16 (ponpoko's Z80 pointers).
    pub fn u16_le(&self, offset: usize) -> Result<u16> {
        let bytes = self.slice(offset, 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a big-endian u16 (6809 pointers everywhere else).
    pub fn u16_be(&self, offset: usize) -> Result<u16> {
        let bytes = self.slice(offset, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Read a big-endian unsigned value of 1..=4 bytes, as used by the
    /// note lookup tables (stride 3 or 4).
    pub fn be_value(&self, offset: usize, len: usize) -> Result<u32> {
        debug_assert!((1..=4).contains(&len));
        let bytes = self.slice(offset, len)?;
        let mut value = 0u32;
        for &b in bytes {
            value = (value << 8) | u32::from(b);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endian_reads() {
        let rom = [0x12, 0x34, 0x56];
        let ctx = DriverContext::new(&rom);
        assert_eq!(ctx.u16_le(0).unwrap(), 0x3412);
        assert_eq!(ctx.u16_be(0).unwrap(), 0x1234);
        assert_eq!(ctx.be_value(0, 3).unwrap(), 0x123456);
    }

    #[test]
    fn out_of_range_reads_are_reported_with_offset() {
        let rom = [0u8; 4];
        let ctx = DriverContext::new(&rom);
        let err = ctx.u16_be(3).unwrap_err();
        assert_eq!(
            err,
            DriverError::RomOutOfRange {
                offset: 3,
                len: 2,
                size: 4
            }
        );
    }
}
