//! Driver family front-ends.
//!
//! Each module decodes one sound-driver family out of an assembled ROM
//! image into the shared [`Track`](crate::event::Track) event vocabulary.
//! The four bytecode families (grobda, mappy, todruaga, skykid) configure
//! the generic interpreter in [`crate::vm`]; the other three (ponpoko,
//! superpacm, phozon) have simpler formats with their own readers.

pub mod grobda;
pub mod mappy;
pub mod phozon;
pub mod ponpoko;
pub mod skykid;
pub mod superpacm;
pub mod todruaga;

use serde::Deserialize;

use crate::config::GameConfig;
use crate::context::DriverContext;
use crate::error::{DriverError, Result};
use crate::event::{Event, Song, Track};

/// Native sample rate of the 8-voice custom sound generator, in Hz.
pub const WSG_SAMPLE_RATE: u32 = 24_000;

/// Sample rate of the original 3-voice Z80-driven generator, in Hz.
pub const WSG3_SAMPLE_RATE: u32 = 96_000;

/// Vertical-blank tick rate shared by all supported boards:
/// 18.432 MHz pixel clock / 3, over 384 x 264 dots.
pub const VBLANK_HZ: f64 = 18_432_000.0 / 3.0 / (384.0 * 264.0);

/// The supported sound-driver families, named for their best-known game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// 3-voice Z80 driver with direct register events.
    Ponpoko,
    /// 8-voice driver with table-driven ADSR envelopes.
    #[serde(rename = "superpacm")]
    SuperPacMan,
    /// Note-list driver without volume envelopes.
    Phozon,
    /// Bytecode driver with envelope programs and conditional jumps.
    Grobda,
    /// Pattern-sequenced bytecode driver.
    Mappy,
    /// Bytecode driver with extracted envelopes and volume-ignore mode.
    Todruaga,
    /// Bytecode driver with track linking, pitch bends and wave shifts.
    Skykid,
}

impl DriverKind {
    /// Map a MAME-style game short name onto its driver family.
    pub fn for_game(name: &str) -> Option<Self> {
        match name {
            "ponpoko" => Some(Self::Ponpoko),
            "superpacm" | "pacnpal" => Some(Self::SuperPacMan),
            "phozon" => Some(Self::Phozon),
            "grobda" | "liblrabl" => Some(Self::Grobda),
            "mappy" => Some(Self::Mappy),
            "todruaga" | "digdug2" | "motos" | "toypop" => Some(Self::Todruaga),
            "skykid" | "drgnbstr" | "metrocrs" | "pacland" | "baraduke" => Some(Self::Skykid),
            _ => None,
        }
    }
}

/// Decode one song out of a ROM image into its event tracks.
///
/// `wavetable` is the pre-shaped waveform ROM for the games that store it
/// in a separate chip; the skykid family ignores it and unpacks its
/// wavetable from program ROM. `max_ticks` bounds the decode for songs
/// that loop forever in hardware.
pub fn decode(
    cfg: &GameConfig,
    rom: &[u8],
    wavetable: Option<&[Vec<u8>]>,
    song_nr: usize,
    max_ticks: u64,
) -> Result<Song> {
    if song_nr >= cfg.songs_total {
        return Err(DriverError::SongIndexOutOfRange {
            index: song_nr,
            total: cfg.songs_total,
        });
    }
    let kind = cfg
        .driver_kind()
        .ok_or_else(|| DriverError::UnknownGame {
            name: cfg.game_name.clone(),
        })?;

    let ctx = DriverContext::new(rom);
    let wavetable = wavetable.unwrap_or(&[]);
    let tracks = match kind {
        DriverKind::Ponpoko => ponpoko::read(cfg, ctx, wavetable, song_nr)?,
        DriverKind::SuperPacMan => superpacm::read(cfg, ctx, wavetable, song_nr)?,
        DriverKind::Phozon => phozon::read(cfg, ctx, wavetable, song_nr)?,
        DriverKind::Grobda => grobda::read(cfg, ctx, wavetable, song_nr, max_ticks)?,
        DriverKind::Mappy => mappy::read(cfg, ctx, wavetable, song_nr, max_ticks)?,
        DriverKind::Todruaga => todruaga::read(cfg, ctx, wavetable, song_nr, max_ticks)?,
        DriverKind::Skykid => skykid::read(cfg, ctx, song_nr, max_ticks)?,
    };
    Ok(Song::from_tracks(tracks))
}

/// Drop events past `max_tick` and clamp the last surviving note so the
/// song ends when its shortest voice does. `slack` is the number of extra
/// ticks the final note is allowed to ring.
pub(crate) fn truncate_at(track: &mut Track, max_tick: u64, slack: u32) {
    while track
        .events
        .last()
        .map_or(false, |timed| timed.tick > max_tick)
    {
        track.events.pop();
    }
    for timed in track.events.iter_mut().rev() {
        if let Event::Note { duration, .. } = &mut timed.event {
            let limit = (max_tick - timed.tick).min(u64::from(u32::MAX)) as u32;
            *duration = (*duration).min(limit.saturating_add(slack));
            break;
        }
    }
}
