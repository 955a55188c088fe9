//! Generic track interpreter for the note/control bytecode families.
//!
//! The grobda, mappy, todruaga and skykid driver families all run the same
//! machine: while a duration countdown is live, a per-tick envelope
//! sub-machine drives volume; when it hits zero, one instruction is
//! fetched, either a note (below the control threshold) or a control
//! opcode.
//! What differs per game is the opcode dialect: which byte means what,
//! the note-table stride, and a handful of behavioral quirks. Those are
//! captured in [`Dialect`] so there is exactly one interpreter instead of
//! one hand-written copy per game.
//!
//! The ponpoko, superpacm and phozon formats are structurally different
//! (direct register events, ADSR tables, plain note lists) and have their
//! own small readers in their family modules.

use crate::context::DriverContext;
use crate::error::{DriverError, Result};
use crate::event::{Event, Track};

/// Control opcode meanings, closed over every dialect in the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlOp {
    /// End of track.
    End,
    /// Select waveform from the operand's high nibble.
    SetWave,
    /// Select a volume-envelope program by operand id.
    SelectEnvelope,
    /// Add the operand to the current envelope id, modulo 16 (skykid).
    AddEnvelope,
    /// Replace the track's duration multiplier with the operand.
    SetDurationMultiplier,
    /// Add the operand to the shared duration-multiplier timeline (skykid).
    AddDurationMultiplier,
    /// Reset the shared duration-multiplier timeline to its base value.
    ResetDurationMultiplier,
    /// Unconditional jump to the big-endian address operand.
    Jump,
    /// Jump while a counter has not reached the operand ("repeat N times").
    RepeatJump {
        /// Counter slot, so independent repeat ops do not interfere.
        slot: usize,
        /// Whether the counter resets once the loop falls through.
        reset: bool,
    },
    /// Fall through once a counter reaches the operand, else jump (grobda).
    RepeatFallthrough {
        /// Counter slot.
        slot: usize,
    },
    /// Jump only on the Nth pass, resetting the counter on the jump.
    JumpOnNth {
        /// Counter slot.
        slot: usize,
    },
    /// Disarm subsequent `RepeatFallthrough` checks (grobda).
    IgnoreRepeatJump,
    /// Re-point the note lookup table by operand index (mappy retune).
    SetNoteTable,
    /// Clear the volume-ignore flag (todruaga).
    ClearVolumeIgnore,
    /// Noise mode on. Observed behavior terminates the track decode.
    NoiseOn,
    /// Noise mode off; no effect on the event stream.
    NoiseOff,
    /// Toggle the track-link control value (skykid).
    TrackControl,
    /// Seed dependent tracks' start tick from the current tick (skykid).
    LinkTracks,
}

impl ControlOp {
    /// Instruction length in bytes, for sequential advance.
    fn len(self) -> usize {
        match self {
            ControlOp::End => 1,
            ControlOp::SetWave
            | ControlOp::SelectEnvelope
            | ControlOp::AddEnvelope
            | ControlOp::SetDurationMultiplier
            | ControlOp::AddDurationMultiplier
            | ControlOp::IgnoreRepeatJump
            | ControlOp::SetNoteTable
            | ControlOp::TrackControl => 2,
            ControlOp::ResetDurationMultiplier
            | ControlOp::ClearVolumeIgnore
            | ControlOp::NoiseOn
            | ControlOp::NoiseOff
            | ControlOp::LinkTracks => 1,
            // Jump-family ops manage the instruction pointer themselves.
            ControlOp::Jump
            | ControlOp::RepeatJump { .. }
            | ControlOp::RepeatFallthrough { .. }
            | ControlOp::JumpOnNth { .. } => 0,
        }
    }
}

/// Envelope sub-machine opcode meanings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnvelopeOp {
    /// Direct level (the byte itself, < 0x10).
    Level(u8),
    /// Hold the current level.
    Sustain,
    /// Fade proportional to the remaining duration: when the level would
    /// outlast the note, clamp it to `remaining - offset`.
    FadeClamp {
        /// 1 for the grobda/todruaga/skykid code 0x12, 0 for mappy 0x30.
        offset: u8,
    },
    /// Restart the program and read the first byte as a direct level.
    ResetLoop,
    /// Restart the program and re-decode without consuming the tick (mappy).
    RestartNoTick,
    /// Slide one step toward the target level in the next program byte.
    Slide,
    /// Mute once an effect counter exceeds the remaining duration (mappy).
    FadeAfterCount,
    /// Set the volume-ignore flag and take a literal level (todruaga).
    VolumeIgnore,
    /// Pitch-bend effect: split the active note (skykid, pre-envelope).
    PitchBend,
    /// Shift the active waveform by the operand's high nibble (skykid).
    WaveShift,
}

/// Rest (zero-pitch) interaction with the envelope machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RestMode {
    /// Envelope runs normally during rests (grobda).
    RunEnvelope,
    /// Envelope runs, then the level is forced to zero (mappy, todruaga).
    MuteAfterEnvelope,
    /// Envelope bytes are not consumed at all; level is zero (skykid).
    MuteSkipEnvelope,
}

/// Which note-index nibbles decode as rests instead of table lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RestPolicy {
    /// Every high nibble indexes the note table.
    None,
    /// Exactly this nibble is a rest (grobda's 0xC).
    Equals(u8),
    /// This nibble and above are rests (skykid's 0xC..).
    AtLeast(u8),
}

/// Per-family interpreter configuration.
pub(crate) struct Dialect {
    /// First byte value treated as a control opcode.
    pub control_threshold: u8,
    /// Note table entry width in bytes (3 or 4), big-endian.
    pub note_stride: usize,
    /// Rest decoding for note opcodes.
    pub rest: RestPolicy,
    /// Whether zero-pitch notes are still appended as events.
    pub emit_zero_pitch: bool,
    /// Mask note durations to 8 bits after the multiplier (skykid).
    pub mask_duration: bool,
    /// Re-emit the instrument waveform before a note when an envelope
    /// wave-shift moved it (skykid).
    pub restore_wave_on_note: bool,
    /// Reset the envelope read pointer when an envelope is selected,
    /// not just at the next note (todruaga).
    pub reset_env_index_on_select: bool,
    /// Envelope ids past this count substitute the given id (todruaga).
    pub envelope_substitute: Option<(usize, u8)>,
    /// Rest interaction with the envelope machine.
    pub rest_mode: RestMode,
    /// Control opcode classification.
    pub classify_control: fn(u8) -> Option<ControlOp>,
    /// Envelope opcode classification (bytes >= 0x10).
    pub classify_envelope: fn(u8) -> Option<EnvelopeOp>,
}

/// Duration scaling source for note durations.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DurationScale {
    /// Fixed multiplier (possibly rewritten by `SetDurationMultiplier`).
    Fixed(u32),
    /// Shared time-ordered `(tick, multiplier)` list with a reset base.
    Timeline {
        /// Value `ResetDurationMultiplier` restores.
        base: u32,
    },
}

/// Cross-track state the skykid family threads between voices.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedState {
    /// Time-ordered duration multipliers appended by the master track.
    pub timeline: Vec<(u64, u32)>,
    /// Start ticks seeded into dependent tracks by `LinkTracks`.
    pub skiptime: Vec<u64>,
}

impl SharedState {
    fn multiplier_at(&self, tick: u64) -> u32 {
        let mut factor = 1;
        for &(from, value) in &self.timeline {
            if from <= tick {
                factor = value;
            } else {
                break;
            }
        }
        factor
    }
}

/// One voice's interpreter state for a single decode pass.
pub(crate) struct TrackVm<'a> {
    ctx: DriverContext<'a>,
    dialect: &'a Dialect,

    /// Instruction pointer into ROM.
    pub ip: usize,
    /// Current tick.
    pub timestamp: u64,
    /// Decode ceiling; ticks beyond it stop the track.
    pub max_tick: u64,

    /// Resolved note table address for this track.
    pub note_table: usize,
    /// Volume-envelope pointer table base.
    pub env_table: usize,
    /// Fine-tune applied as `pitch += fine_tune * (pitch >> 8)` (skykid).
    pub fine_tune: u32,
    /// Note-index transpose added to the high nibble (skykid).
    pub transpose: u32,
    /// Duration scaling for note durations.
    pub scale: DurationScale,
    /// Envelope programs to attach to `VolumeCommand` events, when the
    /// family extracts them.
    pub envelope_programs: Option<&'a [Vec<u8>]>,
    /// Pointer-table base used by `SetNoteTable` retunes.
    pub retune_table: usize,
    /// This voice's index, for `LinkTracks`.
    pub track_index: usize,
    /// Track-link control value from the track header (skykid).
    pub track_control: u8,

    duration: u32,
    env_id: u8,
    env_start: usize,
    env_index: usize,
    counters: [u32; 3],
    ignore_jump: bool,
    vol_ignore: bool,
    volume: u8,
    prev_volume: Option<u8>,
    current_pitch: u32,
    base_wave: u8,
    current_wave: u8,
    fx_counter: u32,
    active_note: Option<usize>,
}

enum Flow {
    Continue,
    End,
}

impl<'a> TrackVm<'a> {
    /// Create an interpreter positioned at `ip`, with the previously
    /// emitted volume primed so the first change-only comparison matches
    /// the family's behavior (`Some(0)` everywhere but skykid).
    pub fn new(ctx: DriverContext<'a>, dialect: &'a Dialect, ip: usize) -> Self {
        Self {
            ctx,
            dialect,
            ip,
            timestamp: 0,
            max_tick: u64::MAX,
            note_table: 0,
            env_table: 0,
            fine_tune: 0,
            transpose: 0,
            scale: DurationScale::Fixed(1),
            envelope_programs: None,
            retune_table: 0,
            track_index: 0,
            track_control: 0,
            duration: 0,
            env_id: 0,
            env_start: 0,
            env_index: 0,
            counters: [0; 3],
            ignore_jump: false,
            vol_ignore: false,
            volume: 0,
            prev_volume: Some(0),
            current_pitch: 0,
            base_wave: 0,
            current_wave: 0,
            fx_counter: 0,
            active_note: None,
        }
    }

    /// Prime the previously emitted volume (skykid starts unset so the
    /// first envelope level always emits).
    pub fn set_prev_volume(&mut self, prev: Option<u8>) {
        self.prev_volume = prev;
    }

    /// Select an envelope program without emitting an event (track-header
    /// defaults resolved by the family module).
    pub fn preset_envelope(&mut self, id: u8) -> Result<()> {
        self.env_id = id;
        self.env_start = self.envelope_address(id)?;
        self.env_index = self.env_start;
        Ok(())
    }

    /// Set the instrument waveform without emitting an event.
    pub fn preset_wave(&mut self, wave: u8) {
        self.base_wave = wave;
        self.current_wave = wave;
    }

    fn envelope_address(&self, id: u8) -> Result<usize> {
        Ok(usize::from(
            self.ctx.u16_be(self.env_table + usize::from(id) * 2)?,
        ))
    }

    /// Run the decode loop until the end-of-track opcode or the tick
    /// ceiling is reached.
    pub fn run(&mut self, track: &mut Track, shared: &mut SharedState) -> Result<()> {
        loop {
            if self.duration == 0 {
                let opcode = self.ctx.byte(self.ip)?;
                if opcode >= self.dialect.control_threshold {
                    match (self.dialect.classify_control)(opcode) {
                        Some(ControlOp::End) => break,
                        Some(op) => match self.exec_control(op, track, shared)? {
                            Flow::Continue => {}
                            Flow::End => break,
                        },
                        None => {
                            return Err(DriverError::MalformedOpcode {
                                offset: self.ip,
                                opcode,
                            });
                        }
                    }
                } else {
                    self.fetch_note(opcode, track, shared)?;
                }
            } else {
                self.envelope_tick(track)?;
                if self.timestamp > self.max_tick {
                    break;
                }
            }
        }
        Ok(())
    }

    fn fetch_note(&mut self, opcode: u8, track: &mut Track, shared: &SharedState) -> Result<()> {
        if self.dialect.restore_wave_on_note && self.current_wave != self.base_wave {
            self.current_wave = self.base_wave;
            track.push(
                self.timestamp,
                Event::Wave {
                    index: self.current_wave,
                },
            );
        }

        let index = u32::from(opcode >> 4);
        let is_rest = match self.dialect.rest {
            RestPolicy::None => false,
            RestPolicy::Equals(nibble) => index == u32::from(nibble),
            RestPolicy::AtLeast(nibble) => index >= u32::from(nibble),
        };

        let pitch = if is_rest {
            0
        } else {
            let entry = self.note_table
                + (index + self.transpose) as usize * self.dialect.note_stride;
            let mut value = self.ctx.be_value(entry, self.dialect.note_stride)?;
            value += self.fine_tune * (value >> 8);
            value >> (opcode & 0x0F)
        };

        let factor = match self.scale {
            DurationScale::Fixed(f) => f,
            DurationScale::Timeline { .. } => shared.multiplier_at(self.timestamp),
        };
        let mut duration = u32::from(self.ctx.byte(self.ip + 1)?) * factor;
        if self.dialect.mask_duration {
            duration &= 0xFF;
        }

        if pitch != 0 || self.dialect.emit_zero_pitch {
            track.push(self.timestamp, Event::Note { pitch, duration });
            self.active_note = Some(track.events.len() - 1);
        }

        self.current_pitch = pitch;
        self.duration = duration;
        self.fx_counter = 0;
        if !self.vol_ignore {
            self.env_index = self.env_start;
        }
        self.ip += 2;
        Ok(())
    }

    fn exec_control(
        &mut self,
        op: ControlOp,
        track: &mut Track,
        shared: &mut SharedState,
    ) -> Result<Flow> {
        match op {
            ControlOp::End => return Ok(Flow::End),
            ControlOp::SetWave => {
                let wave = self.ctx.byte(self.ip + 1)? >> 4;
                self.base_wave = wave;
                self.current_wave = wave;
                track.push(self.timestamp, Event::Wave { index: wave });
            }
            ControlOp::SelectEnvelope => {
                let id = self.ctx.byte(self.ip + 1)?;
                self.select_envelope(id, track)?;
            }
            ControlOp::AddEnvelope => {
                let id = self.env_id.wrapping_add(self.ctx.byte(self.ip + 1)?) & 0x0F;
                self.select_envelope(id, track)?;
            }
            ControlOp::SetDurationMultiplier => {
                let factor = u32::from(self.ctx.byte(self.ip + 1)?);
                self.scale = DurationScale::Fixed(factor);
                track.push(self.timestamp, Event::DurationMultiplier { factor });
            }
            ControlOp::AddDurationMultiplier => {
                let base = shared.timeline.last().map_or(1, |&(_, f)| f);
                let factor = base + u32::from(self.ctx.byte(self.ip + 1)?);
                shared.timeline.push((self.timestamp, factor));
                track.push(self.timestamp, Event::DurationMultiplier { factor });
            }
            ControlOp::ResetDurationMultiplier => {
                if let DurationScale::Timeline { base } = self.scale {
                    shared.timeline.push((self.timestamp, base));
                    track.push(self.timestamp, Event::DurationMultiplier { factor: base });
                }
            }
            ControlOp::Jump => {
                self.ip = usize::from(self.ctx.u16_be(self.ip + 1)?);
                return Ok(Flow::Continue);
            }
            ControlOp::RepeatJump { slot, reset } => {
                self.counters[slot] += 1;
                if u32::from(self.ctx.byte(self.ip + 1)?) > self.counters[slot] {
                    self.ip = usize::from(self.ctx.u16_be(self.ip + 2)?);
                } else {
                    if reset {
                        self.counters[slot] = 0;
                    }
                    self.ip += 4;
                }
                return Ok(Flow::Continue);
            }
            ControlOp::RepeatFallthrough { slot } => {
                self.counters[slot] += 1;
                if u32::from(self.ctx.byte(self.ip + 1)?) <= self.counters[slot]
                    || self.ignore_jump
                {
                    self.counters[slot] = 0;
                    self.ip += 4;
                } else {
                    self.ip = usize::from(self.ctx.u16_be(self.ip + 2)?);
                }
                return Ok(Flow::Continue);
            }
            ControlOp::JumpOnNth { slot } => {
                self.counters[slot] += 1;
                if u32::from(self.ctx.byte(self.ip + 1)?) == self.counters[slot] {
                    self.ip = usize::from(self.ctx.u16_be(self.ip + 2)?);
                    self.counters[slot] = 0;
                } else {
                    self.ip += 4;
                }
                return Ok(Flow::Continue);
            }
            ControlOp::IgnoreRepeatJump => {
                self.ignore_jump = true;
            }
            ControlOp::SetNoteTable => {
                let index = usize::from(self.ctx.byte(self.ip + 1)?);
                self.note_table = usize::from(self.ctx.u16_be(self.retune_table + index * 2)?);
            }
            ControlOp::ClearVolumeIgnore => {
                self.vol_ignore = false;
            }
            ControlOp::NoiseOn => return Ok(Flow::End),
            ControlOp::NoiseOff => {}
            ControlOp::TrackControl => {
                if self.track_control != 0 {
                    self.track_control = 0;
                } else {
                    self.track_control = self.ctx.byte(self.ip + 1)?;
                }
            }
            ControlOp::LinkTracks => {
                for offset in 0..usize::from(self.track_control) {
                    let target = self.track_index + 1 + offset;
                    if target < shared.skiptime.len() {
                        shared.skiptime[target] = self.timestamp;
                    }
                }
            }
        }
        self.ip += op.len();
        Ok(Flow::Continue)
    }

    fn select_envelope(&mut self, id: u8, track: &mut Track) -> Result<()> {
        let id = match self.dialect.envelope_substitute {
            Some((max, substitute)) if usize::from(id) > max => substitute,
            _ => id,
        };
        self.env_id = id;
        self.env_start = self.envelope_address(id)?;
        if self.dialect.reset_env_index_on_select {
            self.env_index = self.env_start;
            self.vol_ignore = false;
        }
        let envelope_bytes = self
            .envelope_programs
            .and_then(|programs| programs.get(usize::from(id)))
            .cloned()
            .unwrap_or_default();
        track.push(
            self.timestamp,
            Event::VolumeCommand {
                envelope: id,
                envelope_bytes,
            },
        );
        Ok(())
    }

    fn envelope_tick(&mut self, track: &mut Track) -> Result<()> {
        // Pre-envelope effect bytes consume program bytes but no ticks.
        loop {
            let value = self.ctx.byte(self.env_index)?;
            match (self.dialect.classify_envelope)(value) {
                Some(EnvelopeOp::PitchBend) => self.apply_pitch_bend(track)?,
                Some(EnvelopeOp::WaveShift) => {
                    self.current_wave =
                        (self.current_wave + (self.ctx.byte(self.env_index + 1)? >> 4)) & 0x0F;
                    track.push(
                        self.timestamp,
                        Event::Wave {
                            index: self.current_wave,
                        },
                    );
                    self.env_index += 2;
                }
                _ => break,
            }
        }

        let resting = self.current_pitch == 0;
        if resting && self.dialect.rest_mode == RestMode::MuteSkipEnvelope {
            self.volume = 0;
        } else {
            self.envelope_step()?;
            if resting && self.dialect.rest_mode == RestMode::MuteAfterEnvelope {
                self.volume = 0;
            }
        }

        if self.prev_volume != Some(self.volume) {
            track.push(self.timestamp, Event::Volume { level: self.volume });
            self.prev_volume = Some(self.volume);
        }

        self.timestamp += 1;
        self.duration -= 1;
        Ok(())
    }

    fn envelope_step(&mut self) -> Result<()> {
        loop {
            let value = self.ctx.byte(self.env_index)?;
            let op = (self.dialect.classify_envelope)(value).ok_or(
                DriverError::UnsupportedEnvelopeCommand {
                    offset: self.env_index,
                    value,
                },
            )?;
            match op {
                EnvelopeOp::Level(level) => {
                    self.volume = level;
                    self.env_index += 1;
                }
                EnvelopeOp::Sustain => {}
                EnvelopeOp::FadeClamp { offset } => {
                    if u32::from(self.volume) >= self.duration {
                        self.volume = (self.duration - u32::from(offset)) as u8;
                    }
                }
                EnvelopeOp::ResetLoop => {
                    self.env_index = self.env_start;
                    self.volume = self.ctx.byte(self.env_index)?;
                    self.env_index += 1;
                }
                EnvelopeOp::RestartNoTick => {
                    self.env_index = self.env_start;
                    continue;
                }
                EnvelopeOp::Slide => {
                    let target = self.ctx.byte(self.env_index + 1)?;
                    if self.volume > target {
                        self.volume -= 1;
                    } else {
                        self.volume = target;
                        self.env_index += 2;
                    }
                }
                EnvelopeOp::FadeAfterCount => {
                    self.fx_counter += 1;
                    if self.fx_counter > self.duration {
                        self.volume = 0;
                    }
                }
                EnvelopeOp::VolumeIgnore => {
                    self.vol_ignore = true;
                    self.volume = self.ctx.byte(self.env_index + 1)?;
                    self.env_index += 2;
                }
                // Pre-envelope effects are consumed before this step.
                EnvelopeOp::PitchBend | EnvelopeOp::WaveShift => unreachable!(),
            }
            return Ok(());
        }
    }

    fn apply_pitch_bend(&mut self, track: &mut Track) -> Result<()> {
        let rate = self.ctx.byte(self.env_index + 1)? as i8;
        let mut pitch = self.current_pitch;
        for _ in 0..rate.unsigned_abs() {
            if rate > 0 {
                pitch += pitch >> 8;
            } else {
                pitch -= pitch >> 8;
            }
        }
        self.current_pitch = pitch;

        if let Some(index) = self.active_note {
            let elapsed = (self.timestamp - track.events[index].tick) as u32;
            let mut remaining = None;
            if let Event::Note { duration, .. } = &mut track.events[index].event {
                remaining = Some(duration.saturating_sub(elapsed));
                *duration = elapsed;
            }
            if let Some(duration) = remaining {
                track.push(self.timestamp, Event::Note { pitch, duration });
                self.active_note = Some(track.events.len() - 1);
            }
        }
        self.env_index += 2;
        Ok(())
    }
}
