//! Namco C352 PCM chip.
//!
//! 32-voice 8-bit sample chip. Register writes use VGM command 0xE1 with
//! big-endian address and value; key-on/key-off are latched in the voice
//! flag register and committed with a write to the execute register.

use bitflags::bitflags;

use super::{HeaderParam, SoundChip};

const CLOCK_FREQ: u32 = 24_576_000;
const CLOCK_DIV: u32 = 288;

/// VGM header offsets for the C352 clock divider and clock.
const HDR_CLOCK_DIV: usize = 0xD6;
const HDR_CLOCK: usize = 0xDC;

/// Data-block type tag for C352 sample ROM.
const DATA_BLOCK_TYPE: u8 = 0x92;

/// Execute register: commits latched key-on/key-off flags.
const EXEC_ADDR: u16 = 0x0202;
const EXEC_VALUE: u16 = 0x0020;

bitflags! {
    /// Voice flag register bits.
    struct VoiceFlags: u16 {
        /// Latch a key-on.
        const KEYON = 0x4000;
        /// Latch a key-off.
        const KEYOFF = 0x2000;
        /// Bypass the output filter.
        const NO_FILTER = 0x0004;
        /// Loop the sample forward.
        const LOOP = 0x0002;
    }
}

/// Per-voice register offsets.
mod reg {
    pub const VOLUME: u16 = 0;
    pub const FREQUENCY: u16 = 2;
    pub const FLAGS: u16 = 3;
    pub const BANK: u16 = 4;
    pub const START: u16 = 5;
    pub const END: u16 = 6;
    pub const LOOP: u16 = 7;
}

/// The C352 at its arcade clock (24.576 MHz / 288).
pub struct C352 {
    clock_rate: f64,
}

impl C352 {
    /// Create a C352 at the standard arcade clocking.
    pub fn new() -> Self {
        Self {
            clock_rate: f64::from(CLOCK_FREQ) / f64::from(CLOCK_DIV),
        }
    }

    fn write(out: &mut Vec<u8>, address: u16, value: u16) {
        out.push(0xE1);
        out.extend_from_slice(&address.to_be_bytes());
        out.extend_from_slice(&value.to_be_bytes());
    }

    fn voice_write(out: &mut Vec<u8>, voice: u8, offset: u16, value: u16) {
        Self::write(out, (u16::from(voice) << 4) | offset, value);
    }
}

impl Default for C352 {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundChip for C352 {
    fn clock_rate(&self) -> f64 {
        self.clock_rate
    }

    fn divider_shift(&self) -> u32 {
        // 16-bit divider plus the 32-sample wave length.
        21
    }

    fn header_params(&self) -> Vec<HeaderParam> {
        vec![
            (HDR_CLOCK_DIV, vec![(CLOCK_DIV >> 2) as u8]),
            (HDR_CLOCK, CLOCK_FREQ.to_le_bytes().to_vec()),
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
        let flags = VoiceFlags::KEYON | VoiceFlags::NO_FILTER | VoiceFlags::LOOP;
        Self::voice_write(out, voice, reg::FLAGS, flags.bits());
    }

    fn key_off(&self, out: &mut Vec<u8>, voice: u8) {
        let flags = VoiceFlags::KEYOFF | VoiceFlags::NO_FILTER | VoiceFlags::LOOP;
        Self::voice_write(out, voice, reg::FLAGS, flags.bits());
    }

    fn set_volume(&self, out: &mut Vec<u8>, voice: u8, volume: u8) {
        let value = (u16::from(volume) << 8) | u16::from(volume);
        Self::voice_write(out, voice, reg::VOLUME, value);
    }

    fn set_wave(&self, out: &mut Vec<u8>, voice: u8, start: u16, end: u16) {
        Self::voice_write(out, voice, reg::BANK, 0);
        Self::voice_write(out, voice, reg::START, start);
        Self::voice_write(out, voice, reg::END, end);
        Self::voice_write(out, voice, reg::LOOP, start);
    }

    fn set_frequency(&self, out: &mut Vec<u8>, voice: u8, hz: f64) {
        let divider = self.divider(hz).min(0xFFFF) as u16;
        Self::voice_write(out, voice, reg::FREQUENCY, divider);
    }

    fn flush_keys(&self, out: &mut Vec<u8>) {
        Self::write(out, EXEC_ADDR, EXEC_VALUE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_writes_are_big_endian() {
        let chip = C352::new();
        let mut out = Vec::new();
        chip.set_frequency(&mut out, 1, chip.clock_rate());
        // Voice 1 register 2, divider 2^21 clamped to 0xFFFF.
        assert_eq!(out, vec![0xE1, 0x00, 0x12, 0xFF, 0xFF]);
    }

    #[test]
    fn key_on_latches_and_flush_commits() {
        let chip = C352::new();
        let mut out = Vec::new();
        chip.key_on(&mut out, 0);
        chip.flush_keys(&mut out);
        assert_eq!(
            out,
            vec![0xE1, 0x00, 0x03, 0x40, 0x06, 0xE1, 0x02, 0x02, 0x00, 0x20]
        );
    }

    #[test]
    fn header_params_carry_the_clock() {
        let chip = C352::new();
        let params = chip.header_params();
        assert_eq!(params[0], (0xD6, vec![72]));
        assert_eq!(params[1].0, 0xDC);
        assert_eq!(params[1].1, 24_576_000u32.to_le_bytes().to_vec());
    }
}
