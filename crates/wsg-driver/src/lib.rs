//! Namco arcade sound-driver decoder
//!
//! This crate decodes the music bytecode of the early-80s Namco arcade
//! sound drivers (Ponpoko through the Sky Kid generation) out of
//! assembled program-ROM images into a small, game-agnostic stream of
//! timestamped events: notes with raw pitch-register codes, volume
//! levels, waveform selections and the song's wavetable.
//!
//! Seven driver families are supported, selected by the game's MAME
//! short name or an explicit configuration entry. The event stream is
//! deliberately free of anything game specific so a downstream consumer
//! (such as a VGM encoder) never needs to know which driver produced it.
//!
//! # Quick Start
//!
//! ```no_run
//! use wsg_driver::{decode, GameConfig, DEFAULT_MAX_TICKS};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg: GameConfig = serde_json::from_str(r#"{
//!     "game_name": "grobda",
//!     "songs_total": 27,
//!     "songs_table": "0xE144",
//!     "notes_table": "0xE0A0",
//!     "volenv_table": "0xE1B0",
//!     "dur_multiplier": "0xE0F0"
//! }"#)?;
//! let rom = std::fs::read("grobda.bin")?;
//! let song = decode(&cfg, &rom, None, 0, DEFAULT_MAX_TICKS)?;
//! println!("{} voices", song.tracks.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Internal modules - not part of public API
mod vm;

// Public modules
pub mod config;
pub mod context;
pub mod drivers;
pub mod error;
pub mod event;
pub mod merge;

// Re-export public API (explicit, no star exports)
pub use config::{GameConfig, RomFile, SongConfig, DEFAULT_MAX_TICKS};
pub use context::DriverContext;
pub use drivers::{decode, DriverKind, VBLANK_HZ, WSG3_SAMPLE_RATE, WSG_SAMPLE_RATE};
pub use error::{DriverError, Result};
pub use event::{Event, Song, TimedEvent, Track};
pub use merge::{timestamp_max, TickWalker};
