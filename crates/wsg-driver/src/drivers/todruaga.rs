//! The bytecode driver used by Tower of Druaga, Dig Dug II, Motos and
//! Toy Pop.
//!
//! Close to the grobda machine but with its own opcode layout, a
//! volume-ignore mode for sound effects layered over music, and a
//! per-track duration multiplier opcode. The raw envelope programs are
//! extracted up front and attached to the envelope-select events so a
//! consumer can re-run them. Out-of-range envelope ids are substituted
//! with a known-good one, matching the hardware driver's table wrap.

use crate::config::GameConfig;
use crate::context::DriverContext;
use crate::error::Result;
use crate::event::{Event, Track};
use crate::vm::{
    ControlOp, Dialect, DurationScale, EnvelopeOp, RestMode, RestPolicy, SharedState, TrackVm,
};

use super::{truncate_at, VBLANK_HZ, WSG_SAMPLE_RATE};

const END_OF_HEADERS: u8 = 0xE0;
const SUBSTITUTE_ENVELOPE: u8 = 0x0E;

/// Envelope program bytes that terminate the linear scan during
/// extraction (every program ends on one of these).
const ENVELOPE_TERMINATORS: [u8; 4] = [0x10, 0x12, 0x13, 0x14];

fn classify_control(opcode: u8) -> Option<ControlOp> {
    match opcode {
        0xF0 => Some(ControlOp::SetWave),
        0xF1 => Some(ControlOp::SelectEnvelope),
        0xF2 => Some(ControlOp::SetDurationMultiplier),
        0xF3 => Some(ControlOp::End),
        0xF4 => Some(ControlOp::RepeatJump {
            slot: 0,
            reset: true,
        }),
        0xF5 => Some(ControlOp::JumpOnNth { slot: 1 }),
        0xF6 => Some(ControlOp::Jump),
        0xF7 => Some(ControlOp::ClearVolumeIgnore),
        _ => None,
    }
}

fn classify_envelope(value: u8) -> Option<EnvelopeOp> {
    match value {
        0x00..=0x0F => Some(EnvelopeOp::Level(value)),
        0x10 => Some(EnvelopeOp::Sustain),
        0x11 => Some(EnvelopeOp::Slide),
        0x12 => Some(EnvelopeOp::FadeClamp { offset: 1 }),
        0x13 => Some(EnvelopeOp::ResetLoop),
        0x14 => Some(EnvelopeOp::VolumeIgnore),
        _ => None,
    }
}

pub(crate) fn read(
    cfg: &GameConfig,
    ctx: DriverContext<'_>,
    wavetable: &[Vec<u8>],
    song_nr: usize,
    max_ticks: u64,
) -> Result<Vec<Track>> {
    let dialect = Dialect {
        control_threshold: 0xF0,
        note_stride: 3,
        rest: RestPolicy::None,
        emit_zero_pitch: false,
        mask_duration: false,
        restore_wave_on_note: false,
        reset_env_index_on_select: true,
        envelope_substitute: Some((cfg.volenv_total, SUBSTITUTE_ENVELOPE)),
        rest_mode: RestMode::MuteAfterEnvelope,
        classify_control,
        classify_envelope,
    };

    // Extract the raw envelope programs so they travel with the
    // envelope-select events.
    let mut envelopes = Vec::with_capacity(cfg.volenv_total);
    for num in 0..cfg.volenv_total {
        let start = usize::from(ctx.u16_be(cfg.volenv_table + num * 2)?);
        let mut end = start;
        while !ENVELOPE_TERMINATORS.contains(&ctx.byte(end)?) {
            end += 1;
        }
        envelopes.push(ctx.slice(start, end - start + 1)?.to_vec());
    }

    // Track headers: event pointer plus a note-table selector
    // (-12/0/+12 cent tunings).
    let mut track_addr = usize::from(ctx.u16_be(cfg.songs_table + song_nr * 2)?);
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
    let mut end_tick = max_ticks;
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

        let mut vm = TrackVm::new(ctx, &dialect, start);
        vm.note_table = note_table;
        vm.env_table = cfg.volenv_table;
        vm.envelope_programs = Some(&envelopes);
        vm.scale = DurationScale::Fixed(1);
        vm.max_tick = end_tick;
        vm.run(&mut track, &mut shared)?;

        // Any voice finishing first terminates the song.
        end_tick = end_tick.min(vm.timestamp);
        tracks.push(track);
    }

    for track in &mut tracks {
        truncate_at(track, end_tick, 0);
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
        // note table entry 1: 0x010000; entry 2 stays zero (a rest)
        rom[0x33] = 0x01;
        // envelope pointer table at 0x40, two envelopes at 0x50 / 0x53
        rom[0x41] = 0x50;
        rom[0x43] = 0x53;
        // envelope 0: 7, 5, sustain; envelope 1: volume-ignore
        rom[0x50] = 0x07;
        rom[0x51] = 0x05;
        rom[0x52] = 0x10;
        rom[0x53] = 0x14;
        rom[0x54] = 0x03;
        // track: wave, envelope 0, note, zero-pitch note, end
        rom[0x100] = 0xF0;
        rom[0x101] = 0x40;
        rom[0x102] = 0xF1;
        rom[0x103] = 0x00;
        rom[0x104] = 0x10;
        rom[0x105] = 3;
        rom[0x106] = 0x20;
        rom[0x107] = 2;
        rom[0x108] = 0xF3;
        rom
    }

    fn config() -> GameConfig {
        serde_json::from_str(
            r#"{
                "game_name": "todruaga",
                "songs_total": 1,
                "songs_table": 0,
                "notes_table": "0x20",
                "volenv_table": "0x40",
                "volenv_total": 2
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn envelopes_are_extracted_and_attached() {
        let rom = rom();
        let wavetable = vec![vec![0u8; 32]; 8];
        let tracks = read(&config(), DriverContext::new(&rom), &wavetable, 0, 7200).unwrap();
        let track = &tracks[0];

        let command = track
            .events
            .iter()
            .find_map(|e| match &e.event {
                Event::VolumeCommand {
                    envelope,
                    envelope_bytes,
                } => Some((*envelope, envelope_bytes.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(command, (0, vec![0x07, 0x05, 0x10]));
    }

    #[test]
    fn zero_pitch_notes_are_muted_and_not_emitted() {
        let rom = rom();
        let wavetable = vec![vec![0u8; 32]; 8];
        let tracks = read(&config(), DriverContext::new(&rom), &wavetable, 0, 7200).unwrap();
        let track = &tracks[0];

        let notes: Vec<(u64, u32, u32)> = track
            .events
            .iter()
            .filter_map(|e| match e.event {
                Event::Note { pitch, duration } => Some((e.tick, pitch, duration)),
                _ => None,
            })
            .collect();
        // Only the sounding note appears; the zero-pitch one is silence.
        assert_eq!(notes, vec![(0, 0x10000, 3)]);

        let volumes: Vec<(u64, u8)> = track
            .events
            .iter()
            .filter_map(|e| match e.event {
                Event::Volume { level } => Some((e.tick, level)),
                _ => None,
            })
            .collect();
        // 7 then 5 from the envelope, then muted during the rest.
        assert_eq!(volumes, vec![(0, 7), (1, 5), (3, 0)]);
    }
}
