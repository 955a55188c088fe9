//! Namco C140 PCM chip.
//!
//! 24-voice 8-bit sample chip, the C352's predecessor. Register writes
//! use VGM command 0xD4 with a big-endian address and an 8-bit value;
//! keying is immediate, with no latch to flush. Stereo volume is written
//! as two registers, attenuated to stay within the chip's mixing
//! headroom.

use super::{HeaderParam, SoundChip};

/// 49.152 MHz master clock / 384 / 6.
const CLOCK_RATE: u32 = 21_333;

/// VGM header offsets for the C140 chip type and clock.
const HDR_CHIP_TYPE: usize = 0x96;
const HDR_CLOCK: usize = 0xA8;

/// Data-block type tag for C140 sample ROM.
const DATA_BLOCK_TYPE: u8 = 0x8D;

/// Volume attenuation applied to both stereo sides.
const VOLUME_GAIN: f64 = 0.25;

const KEY_ON: u8 = 0xD0;
const KEY_OFF: u8 = 0x00;

/// Per-voice register offsets.
mod reg {
    pub const VOLUME_RIGHT: u16 = 0;
    pub const VOLUME_LEFT: u16 = 1;
    pub const FREQUENCY_HI: u16 = 2;
    pub const FREQUENCY_LO: u16 = 3;
    pub const BANK: u16 = 4;
    pub const KEY: u16 = 5;
    pub const START_HI: u16 = 6;
    pub const START_LO: u16 = 7;
    pub const END_HI: u16 = 8;
    pub const END_LO: u16 = 9;
    pub const LOOP_HI: u16 = 10;
    pub const LOOP_LO: u16 = 11;
}

/// The C140 at its arcade clock.
pub struct C140 {
    clock_rate: f64,
}

impl C140 {
    /// Create a C140 at the standard arcade clocking.
    pub fn new() -> Self {
        Self {
            clock_rate: f64::from(CLOCK_RATE),
        }
    }

    fn write(out: &mut Vec<u8>, address: u16, value: u8) {
        out.push(0xD4);
        out.extend_from_slice(&address.to_be_bytes());
        out.push(value);
    }

    fn voice_write(out: &mut Vec<u8>, voice: u8, offset: u16, value: u8) {
        Self::write(out, (u16::from(voice) << 4) | offset, value);
    }
}

impl Default for C140 {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundChip for C140 {
    fn clock_rate(&self) -> f64 {
        self.clock_rate
    }

    fn divider_shift(&self) -> u32 {
        20
    }

    fn header_params(&self) -> Vec<HeaderParam> {
        vec![
            (HDR_CHIP_TYPE, vec![0]),
            (HDR_CLOCK, CLOCK_RATE.to_le_bytes().to_vec()),
        ]
    }

    fn data_block(&self, samples: &[u8]) -> Vec<u8> {
        let mut out = vec![0x67, 0x66, DATA_BLOCK_TYPE];
        out.extend_from_slice(&(samples.len() as u32 + 8).to_le_bytes());
        out.extend_from_slice(&(samples.len() as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(samples);
        out
    }

    fn key_on(&self, out: &mut Vec<u8>, voice: u8) {
        Self::voice_write(out, voice, reg::KEY, KEY_ON);
    }

    fn key_off(&self, out: &mut Vec<u8>, voice: u8) {
        Self::voice_write(out, voice, reg::KEY, KEY_OFF);
    }

    fn set_volume(&self, out: &mut Vec<u8>, voice: u8, volume: u8) {
        let level = (f64::from(volume) * VOLUME_GAIN).round() as u8;
        Self::voice_write(out, voice, reg::VOLUME_RIGHT, level);
        Self::voice_write(out, voice, reg::VOLUME_LEFT, level);
    }

    fn set_wave(&self, out: &mut Vec<u8>, voice: u8, start: u16, end: u16) {
        Self::voice_write(out, voice, reg::BANK, 0);
        Self::voice_write(out, voice, reg::START_HI, (start >> 8) as u8);
        Self::voice_write(out, voice, reg::START_LO, (start & 0xFF) as u8);
        Self::voice_write(out, voice, reg::END_HI, (end >> 8) as u8);
        Self::voice_write(out, voice, reg::END_LO, (end & 0xFF) as u8);
        Self::voice_write(out, voice, reg::LOOP_HI, (start >> 8) as u8);
        Self::voice_write(out, voice, reg::LOOP_LO, (start & 0xFF) as u8);
    }

    fn set_frequency(&self, out: &mut Vec<u8>, voice: u8, hz: f64) {
        let divider = self.divider(hz).min(0xFFFF) as u16;
        Self::voice_write(out, voice, reg::FREQUENCY_HI, (divider >> 8) as u8);
        Self::voice_write(out, voice, reg::FREQUENCY_LO, (divider & 0xFF) as u8);
    }

    fn flush_keys(&self, _out: &mut Vec<u8>) {
        // Key writes take effect immediately on this chip.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_is_attenuated_per_side() {
        let chip = C140::new();
        let mut out = Vec::new();
        chip.set_volume(&mut out, 2, 0xF0);
        // 240 * 0.25 = 60, right then left.
        assert_eq!(out, vec![0xD4, 0x00, 0x20, 60, 0xD4, 0x00, 0x21, 60]);
    }

    #[test]
    fn keying_is_immediate() {
        let chip = C140::new();
        let mut out = Vec::new();
        chip.key_on(&mut out, 0);
        chip.flush_keys(&mut out);
        assert_eq!(out, vec![0xD4, 0x00, 0x05, 0xD0]);
    }
}
