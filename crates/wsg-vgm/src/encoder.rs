//! Tick-walk encoder from decoded songs to complete VGM files.
//!
//! The encoder walks every voice in lock-step on the song's frame clock
//! and turns the events into chip register writes, separated by VGM wait
//! commands. Frame delays carry a fractional accumulator so the 44100 Hz
//! sample clock never drifts against the fractional vblank rate.
//!
//! Waveforms become looped 8-bit samples in one chip data block. Each
//! distinct (down-sampling, waveform) pair used by the song gets one
//! deduplicated sample window; notes whose frequency divider would
//! overflow 16 bits are halved in rate as often as needed and play a
//! correspondingly decimated copy of their waveform.

use wsg_driver::{Event, Song, TickWalker};

use crate::chip::SoundChip;
use crate::error::{Result, VgmError};
use crate::gd3::Gd3;
use crate::header::{Header, HEADER_SIZE};

const END_OF_SOUND: u8 = 0x66;
const WAIT_CMD: u8 = 0x61;
const MAX_WAIT: u64 = 0xFFFF;

/// Points per waveform set before any decimation.
const WAVE_POINTS: u16 = 32;

/// Encoder options independent of the decoded song.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Solo these voices: every other voice is muted. `None` plays all.
    pub solo: Option<Vec<usize>>,
}

/// Deduplicated table of sample windows in the data block.
///
/// An instrument id is `(order << 4) | waveform`: the waveform slot in
/// the low nibble and the down-sampling order in the high one. A window
/// holds `32 >> order` points.
#[derive(Default)]
struct InstrumentTable {
    ids: Vec<u8>,
    /// Window boundaries; entry `i` starts at `offsets[i]` and ends at
    /// `offsets[i + 1] - 1`.
    offsets: Vec<u16>,
}

impl InstrumentTable {
    fn new() -> Self {
        Self {
            ids: Vec::new(),
            offsets: vec![0],
        }
    }

    /// Index of `id`, registering a new window for it if unseen.
    fn ensure(&mut self, id: u8) -> usize {
        if let Some(slot) = self.ids.iter().position(|&known| known == id) {
            return slot;
        }
        let order = id >> 4;
        self.ids.push(id);
        let last = *self.offsets.last().unwrap_or(&0);
        self.offsets.push(last + (WAVE_POINTS >> order));
        self.ids.len() - 1
    }

    fn window(&self, slot: usize) -> (u16, u16) {
        (self.offsets[slot], self.offsets[slot + 1] - 1)
    }

    /// Build the raw signed sample data, decimating each waveform by its
    /// window's down-sampling order.
    fn sample_data(&self, wavetable: &[Vec<u8>]) -> Result<Vec<u8>> {
        if !self.ids.is_empty() && wavetable.is_empty() {
            return Err(VgmError::MissingWavetable);
        }
        let mut data = Vec::new();
        for &id in &self.ids {
            let set = wavetable
                .get(usize::from(id & 0x0F))
                .ok_or(VgmError::WaveOutOfRange {
                    index: id & 0x0F,
                    total: wavetable.len(),
                })?;
            let stride = 1usize << (id >> 4);
            for &point in set.iter().step_by(stride) {
                // Unsigned nibble to signed 8-bit PCM.
                data.push((point << 4).wrapping_sub(128));
            }
        }
        Ok(data)
    }
}

struct VoiceState {
    /// Tick at which the running note must be released.
    note_off: Option<u64>,
    /// Pitch accumulator width, set by the decoder per voice.
    register_size: u32,
    /// Instrument id the voice currently points at.
    instrument: Option<u8>,
    muted: bool,
}

/// Append a wait, splitting at the 16-bit command limit. A zero wait
/// still emits one command, keeping one wait per frame.
fn push_wait(out: &mut Vec<u8>, mut samples: u64) {
    while samples > MAX_WAIT {
        out.push(WAIT_CMD);
        out.extend_from_slice(&(MAX_WAIT as u16).to_le_bytes());
        samples -= MAX_WAIT;
    }
    out.push(WAIT_CMD);
    out.extend_from_slice(&(samples as u16).to_le_bytes());
}

fn bit_length(value: u64) -> u32 {
    64 - value.leading_zeros()
}

/// Encode a decoded song into a complete VGM file.
pub fn encode<C: SoundChip>(
    chip: &C,
    song: &Song,
    gd3: &Gd3,
    options: &EncodeOptions,
) -> Result<Vec<u8>> {
    let mut voices: Vec<VoiceState> = (0..song.tracks.len())
        .map(|nr| VoiceState {
            note_off: None,
            register_size: 0,
            instrument: None,
            muted: options
                .solo
                .as_ref()
                .map_or(false, |solo| !solo.contains(&nr)),
        })
        .collect();

    let mut table = InstrumentTable::new();
    let mut wavetable: Vec<Vec<u8>> = Vec::new();
    let mut sample_rate = f64::from(wsg_driver::WSG_SAMPLE_RATE);
    let mut frame_delay = 44_100.0 / wsg_driver::VBLANK_HZ;
    let mut frame_dt = 0.0_f64;
    let mut total_samples: u64 = 0;
    let mut loop_offset_bytes = 0usize;

    let mut body = Vec::new();
    let walker = TickWalker::new(&song.tracks);
    let total_ticks = walker.len();

    for (tick, rows) in walker {
        let at_loop_point = song.looped && song.loop_tick == tick;
        if at_loop_point {
            loop_offset_bytes = body.len();
        }
        let tick_start = body.len();

        for (nr, events) in rows.iter().enumerate() {
            let voice = nr as u8;
            // Release everything at the loop point so the loop starts
            // from silence, and release notes ending this tick.
            if at_loop_point {
                chip.key_off(&mut body, voice);
            }
            if voices[nr].note_off == Some(tick) {
                chip.key_off(&mut body, voice);
            }

            for timed in *events {
                let state = &mut voices[nr];
                match &timed.event {
                    Event::Note { pitch, duration } if !state.muted && *pitch != 0 => {
                        let hz = f64::from(*pitch) * sample_rate
                            / (1u64 << state.register_size) as f64;

                        // Halve the rate until the divider fits 16 bits,
                        // playing a decimated waveform to compensate.
                        let order = bit_length(chip.divider(hz)).saturating_sub(16) as u8;
                        let hz = hz / f64::from(1u32 << order);

                        let base = state.instrument.map_or(0x0F, |id| id & 0x0F);
                        let id = (order << 4) | base;
                        let slot = table.ensure(id);
                        if state.instrument != Some(id) {
                            state.instrument = Some(id);
                            let (start, end) = table.window(slot);
                            chip.set_wave(&mut body, voice, start, end);
                        }
                        chip.set_frequency(&mut body, voice, hz);
                        chip.key_on(&mut body, voice);
                        state.note_off = Some(timed.tick + u64::from(*duration));
                    }
                    Event::Note { .. } => {}
                    Event::Wave { index } if !state.muted => {
                        let slot = table.ensure(*index);
                        if state.instrument != Some(*index) {
                            state.instrument = Some(*index);
                            let (start, end) = table.window(slot);
                            chip.set_wave(&mut body, voice, start, end);
                        }
                    }
                    Event::Wave { .. } => {}
                    Event::Volume { level } if !state.muted => {
                        chip.set_volume(&mut body, voice, *level << 4);
                    }
                    Event::Volume { .. } => {}
                    Event::SampleRate { hz } => sample_rate = f64::from(*hz),
                    Event::FrameRate { hz } => frame_delay = 44_100.0 / hz,
                    Event::RegisterSize { bits } => state.register_size = u32::from(*bits),
                    Event::Wavetable { samples } => wavetable = samples.clone(),
                    Event::VolumeCommand { .. } | Event::DurationMultiplier { .. } => {}
                }
            }
        }

        frame_dt += frame_delay;
        if body.len() != tick_start {
            chip.flush_keys(&mut body);
        }
        let wait = frame_dt.round() as u64;
        push_wait(&mut body, wait);
        total_samples += wait;
        frame_dt -= frame_dt.round();

        // Release anything still ringing on the final frame.
        if tick + 1 == total_ticks {
            for (nr, state) in voices.iter().enumerate() {
                if state.note_off.map_or(false, |off| off >= tick) {
                    chip.key_off(&mut body, nr as u8);
                }
            }
            chip.flush_keys(&mut body);
        }
    }
    body.push(END_OF_SOUND);

    let data_block = chip.data_block(&table.sample_data(&wavetable)?);
    let gd3_bytes = gd3.to_bytes();

    let mut header = Header::new();
    header.apply_params(&chip.header_params());
    header.set_total_samples(total_samples as u32);
    header.set_gd3_offset(HEADER_SIZE + data_block.len() + body.len());
    header.set_eof_offset(HEADER_SIZE + data_block.len() + body.len() + gd3_bytes.len());
    if song.looped {
        header.set_loop(data_block.len() + loop_offset_bytes, total_samples as u32);
    }

    let mut out = Vec::with_capacity(HEADER_SIZE + data_block.len() + body.len() + gd3_bytes.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&data_block);
    out.extend_from_slice(&body);
    out.extend_from_slice(&gd3_bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::C352;
    use wsg_driver::Track;

    fn wavetable() -> Vec<Vec<u8>> {
        (0..8).map(|n| vec![n as u8; 32]).collect()
    }

    fn basic_song(duration: u32) -> Song {
        let mut track = Track::new();
        track.push(
            0,
            Event::Wavetable {
                samples: wavetable(),
            },
        );
        track.push(0, Event::SampleRate { hz: 24_000 });
        track.push(0, Event::FrameRate { hz: 60.0 });
        track.push(0, Event::RegisterSize { bits: 20 });
        track.push(0, Event::Wave { index: 2 });
        track.push(0, Event::Volume { level: 0x8 });
        track.push(
            0,
            Event::Note {
                pitch: 0x4000,
                duration,
            },
        );
        Song::from_tracks(vec![track])
    }

    fn commands(vgm: &[u8]) -> &[u8] {
        // Skip header and the single data block.
        let block_len =
            u32::from_le_bytes(vgm[HEADER_SIZE + 3..HEADER_SIZE + 7].try_into().unwrap()) as usize;
        &vgm[HEADER_SIZE + 7 + block_len..]
    }

    #[test]
    fn sixty_hertz_frames_are_735_samples() {
        let chip = C352::new();
        let vgm = encode(&chip, &basic_song(2), &Gd3::default(), &Default::default()).unwrap();

        let body = commands(&vgm);
        let waits: Vec<u16> = body
            .windows(3)
            .filter(|w| w[0] == WAIT_CMD)
            .map(|w| u16::from_le_bytes([w[1], w[2]]))
            .collect();
        assert_eq!(waits, vec![735, 735]);

        // Total samples covers both frames.
        let total = u32::from_le_bytes(vgm[0x18..0x1C].try_into().unwrap());
        assert_eq!(total, 1470);
        assert_eq!(*body.last().unwrap(), END_OF_SOUND);
    }

    #[test]
    fn note_emits_wave_window_frequency_and_key_on() {
        let chip = C352::new();
        let vgm = encode(&chip, &basic_song(1), &Gd3::default(), &Default::default()).unwrap();
        let body = commands(&vgm);

        // Wave window for instrument 2 occupies points 0..=31.
        let mut expected = Vec::new();
        chip.set_wave(&mut expected, 0, 0, 31);
        assert!(body
            .windows(expected.len())
            .any(|w| w == expected.as_slice()));

        let mut key_on = Vec::new();
        chip.key_on(&mut key_on, 0);
        assert!(body.windows(key_on.len()).any(|w| w == key_on.as_slice()));

        // Key-off fires on the tick after the 1-tick note; the walk ends
        // there, so it is the final-frame release.
        let mut key_off = Vec::new();
        chip.key_off(&mut key_off, 0);
        assert!(body.windows(key_off.len()).any(|w| w == key_off.as_slice()));
    }

    #[test]
    fn data_block_holds_signed_samples() {
        let chip = C352::new();
        let vgm = encode(&chip, &basic_song(1), &Gd3::default(), &Default::default()).unwrap();

        // Block header: 0x67 0x66 0x92, then sizes, then 32 points of
        // waveform 2: (2 << 4) - 128 = -96.
        let block = &vgm[HEADER_SIZE..];
        assert_eq!(&block[..3], &[0x67, 0x66, 0x92]);
        let data_len = u32::from_le_bytes(block[7..11].try_into().unwrap());
        assert_eq!(data_len, 32);
        assert_eq!(block[15], (-96i8) as u8);
    }

    #[test]
    fn high_notes_are_downsampled_into_a_shorter_window() {
        let chip = C352::new();
        let mut track = Track::new();
        track.push(
            0,
            Event::Wavetable {
                samples: wavetable(),
            },
        );
        track.push(0, Event::SampleRate { hz: 24_000 });
        track.push(0, Event::FrameRate { hz: 60.0 });
        track.push(0, Event::RegisterSize { bits: 20 });
        track.push(0, Event::Wave { index: 1 });
        // 4500 Hz: the divider needs 17 bits, so the rate halves once.
        track.push(
            0,
            Event::Note {
                pitch: 0x30000,
                duration: 1,
            },
        );
        let song = Song::from_tracks(vec![track]);
        let vgm = encode(&chip, &song, &Gd3::default(), &Default::default()).unwrap();

        // Two windows: the full waveform (32 points) for the Wave event
        // and a decimated copy (16 points) for the note.
        let block = &vgm[HEADER_SIZE..];
        let data_len = u32::from_le_bytes(block[7..11].try_into().unwrap());
        assert_eq!(data_len, 32 + 16);

        let body = commands(&vgm);
        let mut decimated_window = Vec::new();
        chip.set_wave(&mut decimated_window, 0, 32, 47);
        assert!(body
            .windows(decimated_window.len())
            .any(|w| w == decimated_window.as_slice()));

        // The emitted divider fits 16 bits and is the naive divider
        // halved once, within rounding.
        let naive = chip.divider(4500.0);
        let emitted = chip.divider(2250.0);
        assert!(naive > 0xFFFF);
        assert!(emitted <= 0xFFFF);
        assert!((naive as i64 - (emitted << 1) as i64).abs() <= 1);
        let mut freq_cmd = Vec::new();
        chip.set_frequency(&mut freq_cmd, 0, 2250.0);
        assert!(body.windows(freq_cmd.len()).any(|w| w == freq_cmd.as_slice()));
    }

    #[test]
    fn loop_point_is_recorded_and_keys_off() {
        let chip = C352::new();
        let mut song = basic_song(4);
        if let Some(track) = song.tracks.first_mut() {
            track.push(
                2,
                Event::Note {
                    pitch: 0x2000,
                    duration: 2,
                },
            );
        }
        song.looped = true;
        song.loop_tick = 2;
        let vgm = encode(&chip, &song, &Gd3::default(), &Default::default()).unwrap();

        // The first two frames: wave window, volume, the opening note,
        // flush, then one 735-sample wait per frame (the second frame is
        // empty). The loop offset must land exactly past them.
        let mut prefix = Vec::new();
        chip.set_wave(&mut prefix, 0, 0, 31);
        chip.set_volume(&mut prefix, 0, 0x80);
        chip.set_frequency(&mut prefix, 0, 375.0);
        chip.key_on(&mut prefix, 0);
        chip.flush_keys(&mut prefix);
        prefix.extend([WAIT_CMD, 0xDF, 0x02]);
        prefix.extend([WAIT_CMD, 0xDF, 0x02]);

        let block_len = u32::from_le_bytes(
            vgm[HEADER_SIZE + 3..HEADER_SIZE + 7].try_into().unwrap(),
        ) as usize;
        let data_total = 7 + block_len;
        assert_eq!(&vgm[HEADER_SIZE + data_total..][..prefix.len()], prefix);

        let loop_field = u32::from_le_bytes(vgm[0x1C..0x20].try_into().unwrap());
        assert_eq!(
            loop_field as usize,
            data_total + prefix.len() + HEADER_SIZE - 0x1C
        );

        // The loop target opens with the release of every voice.
        let mut key_off = Vec::new();
        chip.key_off(&mut key_off, 0);
        assert_eq!(
            &vgm[HEADER_SIZE + data_total + prefix.len()..][..key_off.len()],
            key_off
        );

        let loop_samples = u32::from_le_bytes(vgm[0x20..0x24].try_into().unwrap());
        let total = u32::from_le_bytes(vgm[0x18..0x1C].try_into().unwrap());
        assert_eq!(loop_samples, total);
    }

    #[test]
    fn voices_sharing_a_waveform_share_one_window() {
        let chip = C352::new();
        let mut song = basic_song(2);
        let mut second = Track::new();
        second.push(0, Event::RegisterSize { bits: 20 });
        second.push(0, Event::Wave { index: 2 });
        second.push(0, Event::Volume { level: 0x8 });
        second.push(
            0,
            Event::Note {
                pitch: 0x4000,
                duration: 2,
            },
        );
        song.tracks.push(second);
        let vgm = encode(&chip, &song, &Gd3::default(), &Default::default()).unwrap();

        // One deduplicated window of 32 points, not two.
        let block = &vgm[HEADER_SIZE..];
        let data_len = u32::from_le_bytes(block[7..11].try_into().unwrap());
        assert_eq!(data_len, 32);

        // Both voices point at the same window bounds.
        let body = commands(&vgm);
        for voice in 0..2 {
            let mut window = Vec::new();
            chip.set_wave(&mut window, voice, 0, 31);
            assert!(body.windows(window.len()).any(|w| w == window.as_slice()));
        }
    }

    #[test]
    fn muted_voices_stay_silent() {
        let chip = C352::new();
        let song = basic_song(2);
        let options = EncodeOptions {
            solo: Some(vec![5]),
        };
        let vgm = encode(&chip, &song, &Gd3::default(), &options).unwrap();
        let body = commands(&vgm);

        let mut key_on = Vec::new();
        chip.key_on(&mut key_on, 0);
        assert!(!body.windows(key_on.len()).any(|w| w == key_on.as_slice()));
    }

    #[test]
    fn long_waits_are_chained() {
        let mut out = Vec::new();
        push_wait(&mut out, 0x1_0000);
        assert_eq!(out, vec![0x61, 0xFF, 0xFF, 0x61, 0x01, 0x00]);
    }

    #[test]
    fn missing_wavetable_is_an_error() {
        let chip = C352::new();
        let mut track = Track::new();
        track.push(0, Event::RegisterSize { bits: 20 });
        track.push(0, Event::Wave { index: 0 });
        track.push(
            0,
            Event::Note {
                pitch: 0x1000,
                duration: 1,
            },
        );
        let song = Song::from_tracks(vec![track]);
        let err = encode(&chip, &song, &Gd3::default(), &Default::default()).unwrap_err();
        assert_eq!(err, VgmError::MissingWavetable);
    }
}
