//! The 8-voice driver with table-driven ADSR envelopes (Super Pac-Man,
//! Pac & Pal).
//!
//! Tracks are note/duration pairs; volume comes from a fixed
//! attack-sustain-decay shape configured per track: an attack table read
//! one level per tick, a sustain phase held at level 0xC, and a linear
//! decay of one level per tick. Pitches come from a per-track note table
//! selected by a tuning byte, 4 bytes per entry big-endian, with the low
//! opcode nibble as an octave divider.

use crate::config::GameConfig;
use crate::context::DriverContext;
use crate::error::Result;
use crate::event::{Event, Track};

use super::{VBLANK_HZ, WSG_SAMPLE_RATE};

const END_OF_TRACK: u8 = 0xFF;
const SUSTAIN_LEVEL: u8 = 0xC;

pub(crate) fn read(
    cfg: &GameConfig,
    ctx: DriverContext<'_>,
    wavetable: &[Vec<u8>],
    song_nr: usize,
) -> Result<Vec<Track>> {
    let song_off = usize::from(ctx.byte(cfg.song_offsets + song_nr * 4)?);
    let nr_tracks = usize::from(ctx.byte(cfg.song_offsets + song_nr * 4 + 2)?);

    let mut tracks = Vec::with_capacity(nr_tracks);
    for num in 0..nr_tracks {
        let track_off = song_off + num;
        let mut addr = usize::from(ctx.u16_be(cfg.songs_table + track_off * 2)?);

        let scale_nr = usize::from(ctx.byte(cfg.note_tuning + track_off)?);
        let note_table = usize::from(ctx.u16_be(cfg.notes_table + scale_nr * 2)?);
        let wave_nr = ctx.byte(cfg.waves_table + track_off)? >> 4;
        let sustain_len = u32::from(ctx.byte(cfg.sustain + track_off)?);
        let decay_len = u32::from(ctx.byte(cfg.decay + track_off)?);
        let attack_nr = ctx.byte(cfg.attack + track_off)?;
        let attack_table = usize::from(ctx.u16_be(cfg.attack_env + usize::from(attack_nr) * 2)?);
        let attack_len = u32::from(attack_nr) << 2;

        let mut track = Track::new();
        if num == 0 {
            track.push(
                0,
                Event::Wavetable {
                    samples: wavetable.to_vec(),
                },
            );
            track.push(
                0,
                Event::SampleRate {
                    hz: WSG_SAMPLE_RATE,
                },
            );
            track.push(0, Event::FrameRate { hz: VBLANK_HZ });
        }
        track.push(0, Event::RegisterSize { bits: 20 });
        track.push(0, Event::Wave { index: wave_nr });

        let mut tick = 0u64;
        let mut pitch = 0u32;
        let mut duration = 0u32;
        let mut volume = 0u8;
        let mut prev_volume = 0u8;
        let mut attack_cnt = 0u32;
        let mut sustain_cnt = 0u32;
        let mut decay_cnt = 0u32;

        loop {
            if duration == 0 {
                let opcode = ctx.byte(addr)?;
                if opcode == END_OF_TRACK {
                    break;
                }
                let entry = note_table + usize::from(opcode >> 4) * 4;
                pitch = ctx.be_value(entry, 4)? >> (opcode & 0x0F);
                duration = u32::from(ctx.byte(addr + 1)?);
                volume = SUSTAIN_LEVEL;
                track.push(tick, Event::Note { pitch, duration });
                addr += 2;
                attack_cnt = 0;
                sustain_cnt = 0;
                decay_cnt = 0;
            } else {
                if attack_cnt < attack_len {
                    attack_cnt += 1;
                    volume = ctx.byte(attack_table + attack_cnt as usize)?;
                } else if sustain_cnt < sustain_len {
                    if sustain_cnt == 0 {
                        volume = SUSTAIN_LEVEL;
                    }
                    sustain_cnt += 1;
                } else if decay_cnt < decay_len {
                    decay_cnt += 1;
                    volume = volume.saturating_sub(1);
                }

                let level = if pitch == 0 { 0 } else { volume };
                if prev_volume != level {
                    track.push(tick, Event::Volume { level });
                    prev_volume = level;
                }

                duration -= 1;
                tick += 1;
            }
        }

        tracks.push(track);
    }

    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x200];
        // song offset table at 0x00: song 0 -> track offset 0, 1 track
        rom[0x02] = 1;
        // track pointer table at 0x10
        rom[0x10] = 0x01;
        rom[0x11] = 0x00; // track 0 data at 0x0100
        // tuning table at 0x20 selects scale 0
        // note pointer table at 0x30 -> note table at 0x0040
        rom[0x31] = 0x40;
        // note table entry 1: 0x00012000
        rom[0x44] = 0x00;
        rom[0x45] = 0x01;
        rom[0x46] = 0x20;
        rom[0x47] = 0x00;
        // wave table at 0x50
        rom[0x50] = 0x30; // wave 3
        // ADSR tables: sustain at 0x60, decay at 0x68, attack at 0x70
        rom[0x60] = 2;
        rom[0x68] = 3;
        rom[0x70] = 0; // no attack table
        // track data: note index 1, divider 1, duration 6, end
        rom[0x100] = 0x11;
        rom[0x101] = 6;
        rom[0x102] = 0xFF;
        rom
    }

    fn config() -> GameConfig {
        serde_json::from_str(
            r#"{
                "game_name": "superpacm",
                "songs_total": 1,
                "song_offsets": 0,
                "songs_table": "0x10",
                "note_tuning": "0x20",
                "notes_table": "0x30",
                "waves_table": "0x50",
                "sustain": "0x60",
                "decay": "0x68",
                "attack": "0x70",
                "attack_env": "0x78"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn adsr_shape_produces_sustain_then_decay() {
        let rom = rom();
        let wavetable = vec![vec![0u8; 32]; 8];
        let tracks = read(&config(), DriverContext::new(&rom), &wavetable, 0).unwrap();
        assert_eq!(tracks.len(), 1);
        let track = &tracks[0];

        // Note keyed with the divider applied: 0x12000 >> 1.
        assert!(track.events.iter().any(|e| e.event
            == Event::Note {
                pitch: 0x9000,
                duration: 6,
            }));

        // No attack, so the first level change is the sustain level, and
        // the decay then steps down one per tick.
        let volumes: Vec<u8> = track
            .events
            .iter()
            .filter_map(|e| match e.event {
                Event::Volume { level } => Some(level),
                _ => None,
            })
            .collect();
        assert_eq!(volumes, vec![0xC, 0xB, 0xA, 0x9]);
    }
}
