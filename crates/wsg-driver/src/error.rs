//! Error types for driver bytecode decoding.

use thiserror::Error;

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors raised while decoding a song out of a ROM image.
///
/// Every variant is fatal for the song being decoded: these indicate a
/// wrong table configuration or an unsupported ROM variant, and are never
/// silently swallowed. The byte offset and raw value are always included
/// so a misconfigured table address can be diagnosed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// A control byte above the note/control threshold that the dialect
    /// does not define.
    #[error("unrecognised control opcode {opcode:#04X} at ROM offset {offset:#06X}")]
    MalformedOpcode {
        /// ROM offset of the opcode byte.
        offset: usize,
        /// The offending byte.
        opcode: u8,
    },

    /// An envelope program byte outside the dialect's envelope opcode set.
    #[error("unsupported volume-envelope command {value:#04X} at ROM offset {offset:#06X}")]
    UnsupportedEnvelopeCommand {
        /// ROM offset of the envelope byte.
        offset: usize,
        /// The offending byte.
        value: u8,
    },

    /// The game name maps to no known driver family and no explicit
    /// family was configured.
    #[error("no driver family known for game {name:?}")]
    UnknownGame {
        /// The configured game name.
        name: String,
    },

    /// Requested song index is not present in the game's song table.
    #[error("song {index} out of range (game has {total} songs)")]
    SongIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Total songs the configuration declares.
        total: usize,
    },

    /// A table or instruction read fell outside the ROM image. Same fatal
    /// class as a malformed opcode: the table configuration is wrong.
    #[error("ROM read of {len} byte(s) at {offset:#06X} outside image of {size:#06X} bytes")]
    RomOutOfRange {
        /// Offset of the attempted read.
        offset: usize,
        /// Bytes requested.
        len: usize,
        /// ROM image size.
        size: usize,
    },
}
