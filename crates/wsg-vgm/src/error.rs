//! Error types for VGM encoding.

use thiserror::Error;

/// Result type for encoder operations.
pub type Result<T> = std::result::Result<T, VgmError>;

/// Errors raised while encoding a decoded song into a VGM stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VgmError {
    /// A note was keyed but no wavetable event ever supplied sample data,
    /// so the data block cannot be built.
    #[error("song plays notes but carries no wavetable")]
    MissingWavetable,

    /// A waveform slot outside the song's wavetable was selected.
    #[error("waveform {index} selected but the wavetable has {total} sets")]
    WaveOutOfRange {
        /// Selected waveform slot.
        index: u8,
        /// Number of waveform sets in the song's wavetable.
        total: usize,
    },
}
