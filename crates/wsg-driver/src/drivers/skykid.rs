//! The bytecode driver used by Sky Kid, Dragon Buster, Metro-Cross,
//! Pac-Land and Baraduke.
//!
//! The most capable family: all table addresses come from a pointer
//! block in program ROM, the wavetable is packed nibbles in program ROM
//! rather than a separate chip, per-track headers carry fine tuning and
//! transposition, a master track can retime every voice through a shared
//! duration-multiplier timeline and seed dependent voices' start ticks,
//! and envelope programs can bend the running note's pitch or shift its
//! waveform mid-note.

use crate::config::GameConfig;
use crate::context::DriverContext;
use crate::error::Result;
use crate::event::{Event, Track};
use crate::vm::{
    ControlOp, Dialect, DurationScale, EnvelopeOp, RestMode, RestPolicy, SharedState, TrackVm,
};

use super::{VBLANK_HZ, WSG_SAMPLE_RATE};

const END_OF_HEADERS: u8 = 0x11;

/// Pointer-block layout, relative to `data_address`.
const WAVETABLE_PTR: usize = 0;
const SONGS_PTR: usize = 4;
const VOLUMES_PTR: usize = 6;
const DUR_MULTIPLIER_PTR: usize = 14;

fn classify_control(opcode: u8) -> Option<ControlOp> {
    match opcode {
        0xE0 => Some(ControlOp::End),
        0xE1 => Some(ControlOp::SetWave),
        0xE3 => Some(ControlOp::SelectEnvelope),
        0xE4 => Some(ControlOp::AddEnvelope),
        0xE5 => Some(ControlOp::RepeatJump {
            slot: 0,
            reset: true,
        }),
        0xE7 => Some(ControlOp::RepeatJump {
            slot: 1,
            reset: false,
        }),
        0xE8 => Some(ControlOp::JumpOnNth { slot: 2 }),
        0xE9 => Some(ControlOp::Jump),
        0xEA => Some(ControlOp::NoiseOn),
        0xEB => Some(ControlOp::NoiseOff),
        0xEF => Some(ControlOp::TrackControl),
        0xF0 => Some(ControlOp::LinkTracks),
        0xF1 => Some(ControlOp::AddDurationMultiplier),
        0xF2 => Some(ControlOp::ResetDurationMultiplier),
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
        0x1C => Some(EnvelopeOp::WaveShift),
        0x1E => Some(EnvelopeOp::PitchBend),
        _ => None,
    }
}

const DIALECT: Dialect = Dialect {
    control_threshold: 0xE0,
    note_stride: 3,
    rest: RestPolicy::AtLeast(0xC),
    emit_zero_pitch: true,
    mask_duration: true,
    restore_wave_on_note: true,
    reset_env_index_on_select: false,
    envelope_substitute: None,
    rest_mode: RestMode::MuteSkipEnvelope,
    classify_control,
    classify_envelope,
};

/// Unpack the 16x32 wavetable from its packed-nibble form in program ROM.
fn unpack_wavetable(ctx: DriverContext<'_>, addr: usize) -> Result<Vec<Vec<u8>>> {
    let mut sets = Vec::with_capacity(16);
    for n in 0..16 {
        let packed = ctx.slice(addr + n * 16, 16)?;
        let mut set = Vec::with_capacity(32);
        for &byte in packed {
            set.push(byte >> 4);
            set.push(byte & 0x0F);
        }
        sets.push(set);
    }
    Ok(sets)
}

struct TrackHeader {
    start: usize,
    fine_tune: u32,
    transpose: u32,
    wave: u8,
    track_control: u8,
    envelope: u8,
}

pub(crate) fn read(
    cfg: &GameConfig,
    ctx: DriverContext<'_>,
    song_nr: usize,
    max_ticks: u64,
) -> Result<Vec<Track>> {
    let wavetable_addr = usize::from(ctx.u16_be(cfg.data_address + WAVETABLE_PTR)?);
    let songs_table = usize::from(ctx.u16_be(cfg.data_address + SONGS_PTR)?);
    let volenv_table = usize::from(ctx.u16_be(cfg.data_address + VOLUMES_PTR)?);
    let dur_multiplier = usize::from(ctx.u16_be(cfg.data_address + DUR_MULTIPLIER_PTR)?);

    let wavetable = unpack_wavetable(ctx, wavetable_addr)?;
    let multiplier_base = u32::from(ctx.byte(dur_multiplier + song_nr)?);

    // Baraduke's headers carry one extra byte.
    let header_len = if cfg.game_name == "baraduke" { 7 } else { 6 };

    // Track headers: event pointer, oscillator number, fine-tune and
    // transpose nibbles, wave and link-control nibbles, envelope id.
    let mut track_addr = usize::from(ctx.u16_be(songs_table + song_nr * 2)?);
    let mut headers = Vec::new();
    while ctx.byte(track_addr)? != END_OF_HEADERS {
        let pitch_info = ctx.byte(track_addr + 3)?;
        let wave_info = ctx.byte(track_addr + 4)?;
        headers.push(TrackHeader {
            start: usize::from(ctx.u16_be(track_addr)?),
            fine_tune: u32::from(pitch_info >> 4),
            transpose: u32::from(pitch_info & 0x0F),
            wave: wave_info >> 4,
            track_control: wave_info & 0x0F,
            envelope: ctx.byte(track_addr + 5)?,
        });
        track_addr += header_len;
    }

    let mut shared = SharedState {
        timeline: vec![(0, multiplier_base)],
        skiptime: vec![0; headers.len()],
    };

    let mut tracks = Vec::with_capacity(headers.len());
    let mut end_tick = max_ticks;
    for (num, header) in headers.iter().enumerate() {
        let mut track = Track::new();
        track.push(
            0,
            Event::VolumeCommand {
                envelope: header.envelope,
                envelope_bytes: Vec::new(),
            },
        );
        if num == 0 {
            track.push(
                0,
                Event::Wavetable {
                    samples: wavetable.clone(),
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
        track.push(0, Event::Wave { index: header.wave });

        let mut vm = TrackVm::new(ctx, &DIALECT, header.start);
        vm.timestamp = shared.skiptime[num];
        vm.note_table = cfg.notes_table;
        vm.env_table = volenv_table;
        vm.fine_tune = header.fine_tune;
        vm.transpose = header.transpose;
        vm.scale = DurationScale::Timeline {
            base: multiplier_base,
        };
        vm.max_tick = end_tick;
        vm.track_index = num;
        vm.track_control = header.track_control;
        vm.preset_wave(header.wave);
        vm.preset_envelope(header.envelope)?;
        vm.set_prev_volume(None);
        vm.run(&mut track, &mut shared)?;

        end_tick = end_tick.min(vm.timestamp);
        tracks.push(track);
    }

    Ok(tracks)
}
