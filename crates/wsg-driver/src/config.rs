//! Per-game and per-song configuration records.
//!
//! These mirror the JSON metadata shipped next to the ROM sets: one record
//! per game naming the driver family and the ROM table addresses, plus
//! optional per-song overrides (title, loop point, decode ceiling).
//!
//! Addresses are stored in JSON as `"0x1234"` strings or plain integers;
//! both forms deserialize into `usize`.

use serde::{Deserialize, Deserializer};

use crate::drivers::DriverKind;

/// Default decode ceiling: two minutes of 60 Hz frames.
pub const DEFAULT_MAX_TICKS: u64 = 60 * 60 * 2;

fn hex_usize<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(usize),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => {
            let trimmed = s.trim();
            let (digits, radix) = match trimmed.strip_prefix("0x").or(trimmed.strip_prefix("0X")) {
                Some(hex) => (hex, 16),
                None => (trimmed, 10),
            };
            usize::from_str_radix(digits, radix).map_err(serde::de::Error::custom)
        }
    }
}

/// One ROM region inside the game's zipped ROM set.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RomFile {
    /// Load offset inside the assembled 64 KiB image.
    #[serde(deserialize_with = "hex_usize")]
    pub offset: usize,
    /// File name inside the archive.
    pub filename: String,
}

/// Per-game driver configuration: family, song count and the resolved ROM
/// table base addresses the driver needs.
///
/// Field names follow the on-disk JSON records. Unused tables default to
/// zero; each driver family reads only the tables it needs.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GameConfig {
    /// MAME-style short name, e.g. `"grobda"`.
    pub game_name: String,
    /// Driver family; defaults from the game name when omitted.
    #[serde(default)]
    pub driver: Option<DriverKind>,
    /// Number of songs in the song index table.
    #[serde(default)]
    pub songs_total: usize,
    /// Song index table address.
    #[serde(default, deserialize_with = "hex_usize")]
    pub songs_table: usize,
    /// Note (pitch register) lookup table address.
    #[serde(default, deserialize_with = "hex_usize")]
    pub notes_table: usize,
    /// Volume-envelope pointer table address.
    #[serde(default, deserialize_with = "hex_usize")]
    pub volenv_table: usize,
    /// Number of volume envelopes in the table.
    #[serde(default)]
    pub volenv_total: usize,
    /// Pointer block holding table addresses (skykid family).
    #[serde(default, deserialize_with = "hex_usize")]
    pub data_address: usize,
    /// Per-song/track waveform table address.
    #[serde(default, deserialize_with = "hex_usize")]
    pub waves_table: usize,
    /// Song offset/track-count table address (superpacm/phozon families).
    #[serde(default, deserialize_with = "hex_usize")]
    pub song_offsets: usize,
    /// Per-track note-tuning table address.
    #[serde(default, deserialize_with = "hex_usize")]
    pub note_tuning: usize,
    /// ADSR decay length table address.
    #[serde(default, deserialize_with = "hex_usize")]
    pub decay: usize,
    /// ADSR sustain length table address.
    #[serde(default, deserialize_with = "hex_usize")]
    pub sustain: usize,
    /// ADSR attack length table address.
    #[serde(default, deserialize_with = "hex_usize")]
    pub attack: usize,
    /// ADSR attack envelope pointer table address.
    #[serde(default, deserialize_with = "hex_usize")]
    pub attack_env: usize,
    /// Per-song duration multiplier table address.
    #[serde(default, deserialize_with = "hex_usize")]
    pub dur_multiplier: usize,
    /// Archive file name of the ROM set.
    #[serde(default)]
    pub rom_filename: String,
    /// ROM regions to assemble into the 64 KiB image.
    #[serde(default)]
    pub rom_files: Vec<RomFile>,
    /// Separate waveform ROM inside the archive, when the wavetable is not
    /// embedded in program ROM.
    #[serde(default)]
    pub wavetable_filename: Option<String>,
}

impl GameConfig {
    /// Resolve the driver family, falling back to the game-name mapping.
    pub fn driver_kind(&self) -> Option<DriverKind> {
        self.driver.or_else(|| DriverKind::for_game(&self.game_name))
    }
}

/// Optional per-song overrides.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SongConfig {
    /// Track title for the metadata block.
    #[serde(default)]
    pub song_title: String,
    /// Composer override.
    #[serde(default)]
    pub author: Option<String>,
    /// Whether the song loops.
    #[serde(default, rename = "loop")]
    pub looped: bool,
    /// Tick the song loops back to.
    #[serde(default)]
    pub loop_offset: u64,
    /// Decode ceiling override in ticks.
    #[serde(default)]
    pub loop_end: Option<u64>,
}
