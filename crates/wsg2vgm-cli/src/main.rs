//! Command-line converter from Namco WSG ROM sets to VGM sound logs.
//!
//! Given a game's short name and a song number, the tool:
//! - resolves the game's driver configuration from `games_info.json`,
//! - assembles the 64 KiB program ROM image from the zipped ROM set,
//! - decodes the song's bytecode into per-voice event tracks,
//! - encodes the tracks as a VGM 1.71 register log for the C352 (or
//!   C140) with a GD3 tag built from the per-game metadata record,
//! - writes the result gzip-compressed as `NN Title.vgz`.

mod args;
mod metadata;
mod romset;

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use flate2::write::GzEncoder;
use flate2::Compression;
use wsg_driver::{decode, DEFAULT_MAX_TICKS};
use wsg_vgm::{encode, EncodeOptions, Gd3, C140, C352};

use crate::args::{Args, ChipKind};
use crate::metadata::{GameRecord, GamesInfo};

fn main() -> Result<()> {
    let args = Args::parse();

    let games_info = GamesInfo::load(&args.config_dir)?;
    let mut cfg = games_info
        .find(&args.game)
        .ok_or_else(|| anyhow!("no game {:?} in games_info.json", args.game))?
        .clone();

    let record = GameRecord::load(&args.config_dir, &args.game)?;
    if let Some(rom_info) = record.rom_info {
        cfg = rom_info;
    }

    let rom = romset::assemble_rom(&games_info.rom_path, &cfg)?;
    let wavetable = romset::load_wavetable(&games_info.rom_path, &cfg)?;

    let song_cfg = record.songs.get(args.song_nr).cloned().unwrap_or_default();
    let max_ticks = song_cfg.loop_end.unwrap_or(DEFAULT_MAX_TICKS);

    let mut song = decode(&cfg, &rom, wavetable.as_deref(), args.song_nr, max_ticks)
        .with_context(|| format!("decoding {} song {}", args.game, args.song_nr))?;
    song.looped = song_cfg.looped;
    song.loop_tick = song_cfg.loop_offset;

    let gd3 = Gd3 {
        track_name: song_cfg.song_title.clone(),
        game_name: record.game_info.game_title,
        system_name: record.game_info.platform,
        author: song_cfg.author.unwrap_or(record.game_info.author),
        date: record.game_info.date,
        vgm_author: record.game_info.vgm_author,
        notes: record.game_info.notes,
    };

    let options = EncodeOptions {
        solo: args.solo.clone(),
    };
    let vgm = match args.chip {
        ChipKind::C352 => encode(&C352::new(), &song, &gd3, &options)?,
        ChipKind::C140 => encode(&C140::new(), &song, &gd3, &options)?,
    };

    let path = args
        .output
        .unwrap_or_else(|| output_name(args.song_nr, &gd3.track_name));
    let file =
        File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let mut gz = GzEncoder::new(file, Compression::default());
    gz.write_all(&vgm)?;
    gz.finish()
        .with_context(|| format!("writing {}", path.display()))?;

    println!("wrote {}", path.display());
    Ok(())
}

/// Default output file name. Colons are not portable in file names, so
/// titles like "Round Start: Act 1" become "Round Start - Act 1.vgz".
fn output_name(song_nr: usize, title: &str) -> PathBuf {
    PathBuf::from(format!("{:02} {}.vgz", song_nr, title.replace(':', " -")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_is_numbered_and_sanitized() {
        assert_eq!(
            output_name(3, "Round Start: Act 1"),
            PathBuf::from("03 Round Start - Act 1.vgz")
        );
    }
}
