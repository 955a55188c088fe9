//! Command-line argument definitions for the converter.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Target chip for the register command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChipKind {
    /// Namco C352 sample player (the default).
    C352,
    /// Namco C140 sample player.
    C140,
}

/// Convert Namco WSG sound data from arcade ROM sets into VGM sound logs.
#[derive(Debug, Parser)]
#[command(name = "wsg2vgm", version, about)]
pub struct Args {
    /// MAME-style game short name, e.g. "grobda"
    pub game: String,

    /// Song number inside the game's song table
    pub song_nr: usize,

    /// Solo these voices, muting all others
    #[arg(short, long, num_args = 1.., value_name = "VOICE")]
    pub solo: Option<Vec<usize>>,

    /// Target chip for the register log
    #[arg(long, value_enum, default_value = "c352")]
    pub chip: ChipKind,

    /// Directory holding games_info.json and the per-game records
    #[arg(long, default_value = "json", value_name = "DIR")]
    pub config_dir: PathBuf,

    /// Output file; defaults to "NN Title.vgz" in the working directory
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}
