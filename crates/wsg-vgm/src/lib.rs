//! VGM sound-log encoder for decoded WSG songs
//!
//! Takes the game-agnostic event stream produced by `wsg-driver` and
//! writes a complete VGM 1.71 file: header, one sample data block
//! holding the song's waveforms as looped 8-bit PCM, the timed register
//! command stream for the target chip, and a trailing GD3 metadata tag.
//!
//! Two target chips are supported, both Namco sample players that fit
//! the WSG's looped-wavetable model: the C352 (the default) and the
//! C140.
//!
//! # Quick Start
//!
//! ```no_run
//! use wsg_vgm::{encode, C352, EncodeOptions, Gd3};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let song = wsg_driver::Song::default();
//! let gd3 = Gd3 {
//!     track_name: "Main Theme".into(),
//!     ..Gd3::default()
//! };
//! let vgm = encode(&C352::new(), &song, &gd3, &EncodeOptions::default())?;
//! std::fs::write("01 Main Theme.vgm", vgm)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Public modules
pub mod chip;
pub mod encoder;
pub mod error;
pub mod gd3;
pub mod header;

// Re-export public API (explicit, no star exports)
pub use chip::{SoundChip, C140, C352};
pub use encoder::{encode, EncodeOptions};
pub use error::{Result, VgmError};
pub use gd3::Gd3;
pub use header::{Header, HEADER_SIZE};
