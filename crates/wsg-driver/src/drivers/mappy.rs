//! The pattern-sequenced bytecode driver used by Mappy.
//!
//! A song is a list of patterns; each pattern is a list of per-voice
//! chunks (event pointer plus a note-table selector). Voices keep their
//! own running tick across patterns, and a voice first appearing in a
//! later pattern starts at the latest tick reached so far. Within a
//! chunk the bytecode is the common note/control machine with a
//! four-command envelope set of its own.

use crate::config::GameConfig;
use crate::context::DriverContext;
use crate::error::Result;
use crate::event::{Event, Track};
use crate::vm::{
    ControlOp, Dialect, DurationScale, EnvelopeOp, RestMode, RestPolicy, SharedState, TrackVm,
};

use super::{VBLANK_HZ, WSG_SAMPLE_RATE};

const END_OF_LIST: u8 = 0x11;

fn classify_control(opcode: u8) -> Option<ControlOp> {
    match opcode {
        0xF0 => Some(ControlOp::SetNoteTable),
        0xF1 => Some(ControlOp::SetWave),
        0xF2 => Some(ControlOp::SelectEnvelope),
        0xF3 => Some(ControlOp::End),
        _ => None,
    }
}

fn classify_envelope(value: u8) -> Option<EnvelopeOp> {
    match value {
        0x00..=0x0F => Some(EnvelopeOp::Level(value)),
        0x10 => Some(EnvelopeOp::Sustain),
        0x20 => Some(EnvelopeOp::RestartNoTick),
        0x30 => Some(EnvelopeOp::FadeClamp { offset: 0 }),
        0x40 => Some(EnvelopeOp::FadeAfterCount),
        0x50 => Some(EnvelopeOp::Slide),
        _ => None,
    }
}

const DIALECT: Dialect = Dialect {
    control_threshold: 0xF0,
    note_stride: 4,
    rest: RestPolicy::None,
    emit_zero_pitch: true,
    mask_duration: false,
    restore_wave_on_note: false,
    reset_env_index_on_select: false,
    envelope_substitute: None,
    rest_mode: RestMode::MuteAfterEnvelope,
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
    let mut pattern_addr = usize::from(ctx.u16_be(cfg.songs_table + song_nr * 2)?);
    let multiplier = u32::from(ctx.byte(cfg.dur_multiplier + song_nr)?);

    let mut shared = SharedState::default();
    let mut tracks: Vec<Track> = Vec::new();
    let mut ticks: Vec<u64> = Vec::new();

    while ctx.byte(pattern_addr)? != END_OF_LIST {
        let mut entry_addr = usize::from(ctx.u16_be(pattern_addr)?);
        pattern_addr += 2;

        // A voice joining in this pattern starts where the furthest
        // voice currently is.
        let pattern_tick = ticks.iter().copied().max().unwrap_or(0);

        let mut voice = 0usize;
        while ctx.byte(entry_addr)? != END_OF_LIST {
            let start = usize::from(ctx.u16_be(entry_addr)?);
            let tuning = usize::from(ctx.byte(entry_addr + 2)?);
            let note_table = usize::from(ctx.u16_be(cfg.notes_table + tuning * 2)?);

            let mut chunk = Track::new();
            if tracks.is_empty() {
                chunk.push(
                    0,
                    Event::Wavetable {
                        samples: wavetable.to_vec(),
                    },
                );
                chunk.push(
                    0,
                    Event::SampleRate {
                        hz: WSG_SAMPLE_RATE,
                    },
                );
                chunk.push(0, Event::FrameRate { hz: VBLANK_HZ });
            }
            if tracks.len() <= voice {
                ticks.push(pattern_tick);
                chunk.push(0, Event::RegisterSize { bits: 20 });
            }

            // Two-byte chunk header: waveform and envelope id.
            let tick = ticks[voice];
            let wave = ctx.byte(start)? >> 4;
            let envelope = ctx.byte(start + 1)?;
            chunk.push(tick, Event::Wave { index: wave });
            chunk.push(
                tick,
                Event::VolumeCommand {
                    envelope,
                    envelope_bytes: Vec::new(),
                },
            );

            let mut vm = TrackVm::new(ctx, &DIALECT, start + 2);
            vm.timestamp = tick;
            vm.note_table = note_table;
            vm.env_table = cfg.volenv_table;
            vm.retune_table = cfg.notes_table;
            vm.scale = DurationScale::Fixed(multiplier);
            vm.max_tick = max_ticks;
            vm.preset_wave(wave);
            vm.preset_envelope(envelope)?;
            vm.run(&mut chunk, &mut shared)?;
            ticks[voice] = vm.timestamp;

            if tracks.len() <= voice {
                tracks.push(chunk);
            } else {
                tracks[voice].events.extend(chunk.events);
            }

            entry_addr += 3;
            voice += 1;
        }
    }

    Ok(tracks)
}
