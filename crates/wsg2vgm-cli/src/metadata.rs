//! JSON metadata records shipped next to the ROM sets.
//!
//! `games_info.json` holds the shared ROM path and one driver
//! configuration per game. An optional `<game>.json` adds release
//! metadata for the GD3 tag, per-song titles and loop points, and may
//! override the ROM configuration outright (for games whose tables were
//! mapped from a different ROM revision).

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use wsg_driver::{GameConfig, SongConfig};

/// The `games_info.json` catalogue.
#[derive(Debug, Deserialize)]
pub struct GamesInfo {
    /// Directory the ROM set archives live in.
    #[serde(default)]
    pub rom_path: String,
    /// Driver configuration per game.
    pub games: Vec<GameConfig>,
}

impl GamesInfo {
    /// Load the catalogue from `games_info.json` in `config_dir`.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join("games_info.json");
        let file =
            File::open(&path).with_context(|| format!("opening {}", path.display()))?;
        serde_json::from_reader(file).with_context(|| format!("parsing {}", path.display()))
    }

    /// Look up a game by its MAME-style short name.
    pub fn find(&self, name: &str) -> Option<&GameConfig> {
        self.games.iter().find(|game| game.game_name == name)
    }
}

/// Release metadata for the GD3 tag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameInfo {
    /// Original composer.
    #[serde(default)]
    pub author: String,
    /// Full game title.
    #[serde(default)]
    pub game_title: String,
    /// Arcade system name.
    #[serde(default)]
    pub platform: String,
    /// Who produced the VGM conversion.
    #[serde(default)]
    pub vgm_author: String,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
    /// Release date.
    #[serde(default)]
    pub date: String,
}

/// The per-game `<game>.json` record.
#[derive(Debug, Default, Deserialize)]
pub struct GameRecord {
    /// GD3 release metadata.
    #[serde(default)]
    pub game_info: GameInfo,
    /// Full driver configuration override.
    #[serde(default)]
    pub rom_info: Option<GameConfig>,
    /// Per-song titles and loop settings, indexed by song number.
    #[serde(default)]
    pub songs: Vec<SongConfig>,
}

impl GameRecord {
    /// Load `<game>.json` from `config_dir`. A missing file is not an
    /// error; songs then convert with empty metadata and default loop
    /// settings.
    pub fn load(config_dir: &Path, game_name: &str) -> Result<Self> {
        let path = config_dir.join(format!("{game_name}.json"));
        match File::open(&path) {
            Ok(file) => serde_json::from_reader(file)
                .with_context(|| format!("parsing {}", path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => {
                Err(err).with_context(|| format!("opening {}", path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_resolves_games_by_name() {
        let json = r#"{
            "rom_path": "roms/",
            "games": [
                {
                    "game_name": "grobda",
                    "songs_total": 27,
                    "rom_filename": "grobda.zip",
                    "rom_files": [
                        {"offset": "0xA000", "filename": "gr1-3.1d"}
                    ]
                }
            ]
        }"#;
        let info: GamesInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.rom_path, "roms/");
        let game = info.find("grobda").unwrap();
        assert_eq!(game.rom_files[0].offset, 0xA000);
        assert!(info.find("mappy").is_none());
    }

    #[test]
    fn game_record_fields_are_optional() {
        let json = r#"{
            "game_info": {"game_title": "Grobda", "author": "Composer"},
            "songs": [
                {"song_title": "Credit", "loop": false},
                {"song_title": "Main BGM", "loop": true, "loop_offset": 64}
            ]
        }"#;
        let record: GameRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.game_info.game_title, "Grobda");
        assert!(record.rom_info.is_none());
        assert!(record.songs[1].looped);
        assert_eq!(record.songs[1].loop_offset, 64);
    }
}
