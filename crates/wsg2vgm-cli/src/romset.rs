//! ROM image assembly from zipped MAME ROM sets.
//!
//! Program ROMs are scattered chips mapped at fixed addresses; the
//! drivers address them through one flat 64 KiB image, so each archive
//! member is copied to its load offset and the gaps stay zero. Games
//! with a separate waveform ROM get it reshaped into 32-point rows.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use anyhow::{ensure, Context, Result};
use wsg_driver::GameConfig;
use zip::ZipArchive;

/// Size of the assembled program ROM image.
pub const ROM_IMAGE_SIZE: usize = 1 << 16;

/// Sample points per waveform row.
const WAVE_ROW_LEN: usize = 32;

fn open_archive(rom_path: &str, cfg: &GameConfig) -> Result<ZipArchive<File>> {
    let path = Path::new(rom_path).join(&cfg.rom_filename);
    let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    ZipArchive::new(file).with_context(|| format!("reading {}", path.display()))
}

fn read_member<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut member = archive
        .by_name(name)
        .with_context(|| format!("no member {name:?} in the ROM set"))?;
    let mut data = Vec::new();
    member
        .read_to_end(&mut data)
        .with_context(|| format!("reading member {name:?}"))?;
    Ok(data)
}

fn assemble_from<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    cfg: &GameConfig,
) -> Result<Vec<u8>> {
    let mut image = vec![0u8; ROM_IMAGE_SIZE];
    for rom_file in &cfg.rom_files {
        let data = read_member(archive, &rom_file.filename)?;
        let end = rom_file.offset + data.len();
        ensure!(
            end <= image.len(),
            "member {:?} at 0x{:04X} overruns the 64 KiB image",
            rom_file.filename,
            rom_file.offset
        );
        image[rom_file.offset..end].copy_from_slice(&data);
    }
    Ok(image)
}

/// Assemble the game's 64 KiB program ROM image from its archive.
pub fn assemble_rom(rom_path: &str, cfg: &GameConfig) -> Result<Vec<u8>> {
    let mut archive = open_archive(rom_path, cfg)?;
    assemble_from(&mut archive, cfg)
}

/// Load the separate waveform ROM, when the game has one, as rows of
/// 32 sample points.
pub fn load_wavetable(rom_path: &str, cfg: &GameConfig) -> Result<Option<Vec<Vec<u8>>>> {
    let Some(name) = &cfg.wavetable_filename else {
        return Ok(None);
    };
    let mut archive = open_archive(rom_path, cfg)?;
    let data = read_member(&mut archive, name)?;
    ensure!(
        data.len() % WAVE_ROW_LEN == 0,
        "waveform ROM {:?} is not a multiple of {} bytes",
        name,
        WAVE_ROW_LEN
    );
    Ok(Some(
        data.chunks(WAVE_ROW_LEN).map(<[u8]>::to_vec).collect(),
    ))
}
