//! VGM file header (version 1.71).
//!
//! The header is a fixed 0x100-byte block of little-endian fields. Only
//! the fields this encoder populates have setters; everything else stays
//! zero, which VGM defines as absent.

use crate::chip::HeaderParam;

/// Fixed header size for VGM 1.71 files.
pub const HEADER_SIZE: usize = 0x100;

const IDENT: &[u8; 4] = b"Vgm ";
const VERSION: u32 = 0x171;

const OFS_EOF: usize = 0x04;
const OFS_VERSION: usize = 0x08;
const OFS_GD3: usize = 0x14;
const OFS_TOTAL_SAMPLES: usize = 0x18;
const OFS_LOOP: usize = 0x1C;
const OFS_LOOP_SAMPLES: usize = 0x20;
const OFS_DATA: usize = 0x34;

/// A VGM 1.71 header under construction.
pub struct Header {
    data: [u8; HEADER_SIZE],
}

impl Header {
    /// Create a header with the identity, version and data offset set.
    pub fn new() -> Self {
        let mut header = Self {
            data: [0; HEADER_SIZE],
        };
        header.data[..4].copy_from_slice(IDENT);
        header.put_u32(OFS_VERSION, VERSION);
        header.put_u32(OFS_DATA, (HEADER_SIZE - OFS_DATA) as u32);
        header
    }

    fn put_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Set the GD3 tag position from its absolute file offset.
    pub fn set_gd3_offset(&mut self, file_offset: usize) {
        self.put_u32(OFS_GD3, (file_offset - OFS_GD3) as u32);
    }

    /// Set the end-of-file position from the total file length.
    pub fn set_eof_offset(&mut self, file_length: usize) {
        self.put_u32(OFS_EOF, (file_length - OFS_EOF) as u32);
    }

    /// Set the total sample count (at 44100 Hz).
    pub fn set_total_samples(&mut self, samples: u32) {
        self.put_u32(OFS_TOTAL_SAMPLES, samples);
    }

    /// Set the loop point, given as a byte offset into the data stream
    /// (past the header), and the loop length in samples.
    pub fn set_loop(&mut self, data_offset: usize, samples: u32) {
        self.put_u32(OFS_LOOP, (data_offset + HEADER_SIZE - OFS_LOOP) as u32);
        self.put_u32(OFS_LOOP_SAMPLES, samples);
    }

    /// Patch chip clock parameters into their header slots.
    pub fn apply_params(&mut self, params: &[HeaderParam]) {
        for (offset, bytes) in params {
            self.data[*offset..*offset + bytes.len()].copy_from_slice(bytes);
        }
    }

    /// The finished header bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}
