//! The bytecode driver used by Grobda and Libble Rabble.
//!
//! Tracks start with a two-byte wave/envelope header, then interleave
//! note opcodes with 0xF0-0xF7 control opcodes (jumps, repeats, wave and
//! envelope changes). Volume comes from per-tick envelope programs with
//! sustain, duration-dependent fade, loop and slide commands. A high
//! note nibble of 0xC is a rest.

use crate::config::GameConfig;
use crate::context::DriverContext;
use crate::error::Result;
use crate::event::{Event, Track};
use crate::vm::{
    ControlOp, Dialect, DurationScale, EnvelopeOp, RestMode, RestPolicy, SharedState, TrackVm,
};

use super::{VBLANK_HZ, WSG_SAMPLE_RATE};

const END_OF_HEADERS: u8 = 0x11;

fn classify_control(opcode: u8) -> Option<ControlOp> {
    match opcode {
        0xF0 => Some(ControlOp::End),
        0xF1 => Some(ControlOp::SetWave),
        0xF2 => Some(ControlOp::SelectEnvelope),
        0xF3 => Some(ControlOp::RepeatFallthrough { slot: 0 }),
        0xF4 => Some(ControlOp::IgnoreRepeatJump),
        0xF5 => Some(ControlOp::JumpOnNth { slot: 1 }),
        0xF6 => Some(ControlOp::JumpOnNth { slot: 2 }),
        0xF7 => Some(ControlOp::Jump),
        _ => None,
    }
}

fn classify_envelope(value: u8) -> Option<EnvelopeOp> {
    match value {
        0x00..=0x0F => Some(EnvelopeOp::Level(value)),
        0x10 => Some(EnvelopeOp::Sustain),
        0x12 => Some(EnvelopeOp::FadeClamp { offset: 1 }),
        0x14 => Some(EnvelopeOp::ResetLoop),
        0x16 => Some(EnvelopeOp::Slide),
        _ => None,
    }
}

const DIALECT: Dialect = Dialect {
    control_threshold: 0xF0,
    note_stride: 3,
    rest: RestPolicy::Equals(0xC),
    emit_zero_pitch: true,
    mask_duration: false,
    restore_wave_on_note: false,
    reset_env_index_on_select: false,
    envelope_substitute: None,
    rest_mode: RestMode::RunEnvelope,
    classify_control,
    classify_envelope,
};

pub(crate) fn read(
    cfg: &GameConfig,
    ctx: DriverContext<'_>,
    wavetable: &[Vec<u8>],
    song_nr: usize,
    max_ticks: u64,
) -> Result<Vec<Track>> {
    let mut track_addr = usize::from(ctx.u16_be(cfg.songs_table + song_nr * 2)?);
    let multiplier = u32::from(ctx.byte(cfg.dur_multiplier + song_nr)?);

    // Track headers: event pointer plus a note-table selector
    // (-12/0/+12 cent tunings).
    let mut starts = Vec::new();
    while ctx.byte(track_addr)? != END_OF_HEADERS {
        let event_addr = usize::from(ctx.u16_be(track_addr)?);
        let tuning = usize::from(ctx.byte(track_addr + 2)?);
        let note_table = usize::from(ctx.u16_be(cfg.notes_table + tuning * 2)?);
        starts.push((event_addr, note_table));
        track_addr += 3;
    }

    let mut shared = SharedState::default();
    let mut tracks = Vec::with_capacity(starts.len());
    for (num, &(start, note_table)) in starts.iter().enumerate() {
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
        track.push(0, Event::Volume { level: 0x0F });

        // Two-byte data header: waveform and envelope id.
        let wave = ctx.byte(start)? >> 4;
        let envelope = ctx.byte(start + 1)?;
        track.push(0, Event::Wave { index: wave });
        track.push(
            0,
            Event::VolumeCommand {
                envelope,
                envelope_bytes: Vec::new(),
            },
        );

        let mut vm = TrackVm::new(ctx, &DIALECT, start + 2);
        vm.note_table = note_table;
        vm.env_table = cfg.volenv_table;
        vm.scale = DurationScale::Fixed(multiplier);
        vm.max_tick = max_ticks;
        vm.preset_wave(wave);
        vm.preset_envelope(envelope)?;
        vm.run(&mut track, &mut shared)?;

        tracks.push(track);
    }

    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x300];
        // song table at 0x00 -> header list at 0x0010
        rom[0x01] = 0x10;
        // one track header: events at 0x0100, tuning 0
        rom[0x10] = 0x01;
        rom[0x11] = 0x00;
        rom[0x12] = 0;
        rom[0x13] = END_OF_HEADERS;
        // note pointer table at 0x20 -> note table at 0x0030
        rom[0x21] = 0x30;
        // note table entry 1: 0x020000
        rom[0x33] = 0x02;
        // envelope pointer table at 0x40 -> program at 0x0050
        rom[0x41] = 0x50;
        // envelope: level 8, then sustain
        rom[0x50] = 0x08;
        rom[0x51] = 0x10;
        // duration multiplier table at 0x60
        rom[0x60] = 1;
        // track data at 0x100: header wave 3 / envelope 0,
        // note index 1 divider 4 for 3 ticks, rest for 2, end
        rom[0x100] = 0x30;
        rom[0x101] = 0x00;
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

    #[test]
    fn notes_rests_and_envelope_levels() {
        let rom = rom();
        let wavetable = vec![vec![0u8; 32]; 8];
        let tracks = read(&config(), DriverContext::new(&rom), &wavetable, 0, 7200).unwrap();
        assert_eq!(tracks.len(), 1);
        let track = &tracks[0];

        // Note with the octave divider applied, then an explicit rest.
        assert!(track.events.iter().any(|e| e.tick == 0
            && e.event
                == Event::Note {
                    pitch: 0x20000 >> 4,
                    duration: 3,
                }));
        assert!(track.events.iter().any(|e| e.tick == 3
            && e.event
                == Event::Note {
                    pitch: 0,
                    duration: 2,
                }));

        // The envelope sets level 8 on the first tick and sustains; the
        // rest does not mute it in this family.
        let volumes: Vec<(u64, u8)> = track
            .events
            .iter()
            .filter_map(|e| match e.event {
                Event::Volume { level } => Some((e.tick, level)),
                _ => None,
            })
            .collect();
        assert_eq!(volumes, vec![(0, 0x0F), (0, 8)]);
    }
}
