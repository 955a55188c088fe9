//! Full pipeline check: decode a hand-built ROM image and verify the
//! encoded VGM container's structure.

use wsg_driver::{decode, GameConfig};
use wsg_vgm::{encode, EncodeOptions, Gd3, SoundChip, C352, HEADER_SIZE};

/// A minimal one-track song in the grobda bytecode layout: a three-tick
/// note, a two-tick rest, end of track.
fn rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x300];
    // song table -> header list at 0x0010
    rom[0x01] = 0x10;
    // one track header: events at 0x0100, tuning 0, terminator
    rom[0x10] = 0x01;
    rom[0x13] = 0x11;
    // note pointer table at 0x20 -> note table at 0x0030
    rom[0x21] = 0x30;
    // note table entry 1: 0x020000
    rom[0x33] = 0x02;
    // envelope pointer table at 0x40 -> program at 0x0050: level 8, sustain
    rom[0x41] = 0x50;
    rom[0x50] = 0x08;
    rom[0x51] = 0x10;
    // duration multiplier 1
    rom[0x60] = 1;
    // track: wave 3 / envelope 0, note, rest, end
    rom[0x100] = 0x30;
    rom[0x102] = 0x14;
    rom[0x103] = 3;
    rom[0x104] = 0xC0;
    rom[0x105] = 2;
    rom[0x106] = 0xF0;
    rom
}

fn config() -> GameConfig {
    serde_json::from_str(
        r#"{
            "game_name": "grobda",
            "songs_total": 1,
            "songs_table": 0,
            "notes_table": "0x20",
            "volenv_table": "0x40",
            "dur_multiplier": "0x60"
        }"#,
    )
    .unwrap()
}

fn u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

#[test]
fn decoded_song_encodes_to_a_well_formed_container() {
    let rom = rom();
    let wavetable: Vec<Vec<u8>> = (0..8).map(|n| vec![n as u8; 32]).collect();
    let song = decode(&config(), &rom, Some(&wavetable), 0, 7200).unwrap();
    assert_eq!(song.tracks.len(), 1);

    let gd3 = Gd3 {
        track_name: "Test Tone".into(),
        ..Gd3::default()
    };
    let vgm = encode(&C352::new(), &song, &gd3, &EncodeOptions::default()).unwrap();

    // Header: ident, version, and the data block right behind it.
    assert_eq!(&vgm[..4], b"Vgm ");
    assert_eq!(u32_at(&vgm, 0x08), 0x171);
    assert_eq!(&vgm[HEADER_SIZE..HEADER_SIZE + 3], &[0x67, 0x66, 0x92]);

    // Self-relative offsets resolve to the GD3 tag and the file end.
    let gd3_pos = u32_at(&vgm, 0x14) as usize + 0x14;
    assert_eq!(&vgm[gd3_pos..gd3_pos + 4], b"Gd3 ");
    assert_eq!(u32_at(&vgm, 0x04) as usize + 0x04, vgm.len());

    // Five ticks of waits at ~60.6 Hz on the 44100 Hz sample clock.
    let total = u32_at(&vgm, 0x18);
    assert!((3630..=3650).contains(&total), "total samples {total}");

    // The command stream ends just before the tag.
    assert_eq!(vgm[gd3_pos - 1], 0x66);

    // The title made it into the tag as UTF-16LE.
    assert_eq!(&vgm[gd3_pos + 12..gd3_pos + 16], &[b'T', 0, b'e', 0]);
}

#[test]
fn decoding_and_encoding_are_deterministic() {
    let rom = rom();
    let wavetable: Vec<Vec<u8>> = (0..8).map(|n| vec![n as u8; 32]).collect();

    let first = decode(&config(), &rom, Some(&wavetable), 0, 7200).unwrap();
    let second = decode(&config(), &rom, Some(&wavetable), 0, 7200).unwrap();
    assert_eq!(first, second);

    let chip = C352::new();
    let gd3 = Gd3::default();
    let options = EncodeOptions::default();
    let vgm_a = encode(&chip, &first, &gd3, &options).unwrap();
    let vgm_b = encode(&chip, &first, &gd3, &options).unwrap();
    assert_eq!(vgm_a, vgm_b);
}

#[test]
fn soloing_an_absent_voice_silences_the_song() {
    let rom = rom();
    let wavetable: Vec<Vec<u8>> = (0..8).map(|n| vec![n as u8; 32]).collect();
    let song = decode(&config(), &rom, Some(&wavetable), 0, 7200).unwrap();

    let options = EncodeOptions {
        solo: Some(vec![7]),
    };
    let chip = C352::new();
    let vgm = encode(&chip, &song, &Gd3::default(), &options).unwrap();

    let mut key_on = Vec::new();
    chip.key_on(&mut key_on, 0);
    assert!(!vgm.windows(key_on.len()).any(|w| w == key_on.as_slice()));
}
