//! Target sample-playback chips.
//!
//! The encoder is generic over the chip whose register writes end up in
//! the VGM command stream. Both supported chips are Namco PCM parts that
//! play the WSG wavetable as looped 8-bit samples: the C352 (System 11 /
//! ND-1 era) and the C140 (System 2 / 21). Each chip knows its VGM
//! command encoding, header parameter slots and data-block tag.

mod c140;
mod c352;

pub use c140::C140;
pub use c352::C352;

/// One chip-parameter patch for the VGM header: offset and raw bytes.
pub type HeaderParam = (usize, Vec<u8>);

/// A sample-playback chip targeted by the encoder.
///
/// All register-write methods append VGM commands to `out`. Key-on and
/// key-off may be latched by the hardware; [`SoundChip::flush_keys`]
/// commits them where the chip requires it and is a no-op otherwise.
pub trait SoundChip {
    /// Per-voice sample rate the frequency divider is relative to, in Hz.
    fn clock_rate(&self) -> f64;

    /// Power of two the frequency divider is scaled by.
    fn divider_shift(&self) -> u32;

    /// Header patches placing the chip's clock in the VGM header.
    fn header_params(&self) -> Vec<HeaderParam>;

    /// Wrap raw signed 8-bit sample data in the chip's VGM data block.
    fn data_block(&self, samples: &[u8]) -> Vec<u8>;

    /// Key the voice's current sample on.
    fn key_on(&self, out: &mut Vec<u8>, voice: u8);

    /// Release the voice.
    fn key_off(&self, out: &mut Vec<u8>, voice: u8);

    /// Set the voice's volume, 8-bit range, both stereo sides.
    fn set_volume(&self, out: &mut Vec<u8>, voice: u8, volume: u8);

    /// Point the voice at a sample window in the data block.
    fn set_wave(&self, out: &mut Vec<u8>, voice: u8, start: u16, end: u16);

    /// Set the voice frequency, clamping dividers past 16 bits.
    fn set_frequency(&self, out: &mut Vec<u8>, voice: u8, hz: f64);

    /// Commit latched key-on/key-off writes, where the chip has a latch.
    fn flush_keys(&self, out: &mut Vec<u8>);

    /// The frequency divider `hz` maps to, unclamped.
    fn divider(&self, hz: f64) -> u64 {
        (hz * f64::from(1u32 << self.divider_shift()) / self.clock_rate()).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divider_scales_with_the_shift() {
        let c352 = C352::new();
        // One divider step per clock-rate fraction.
        let one = c352.clock_rate() / f64::from(1u32 << c352.divider_shift());
        assert_eq!(c352.divider(one), 1);
        assert_eq!(c352.divider(one * 1000.0), 1000);
    }
}
