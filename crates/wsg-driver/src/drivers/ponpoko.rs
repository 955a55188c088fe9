//! The 3-voice Z80 driver used by Ponpoko.
//!
//! The oldest format of the lot: no note tables, no envelopes. Each track
//! is a flat list of fixed-size events carrying a duration in vblank
//! ticks, a volume level and the frequency register value as unpacked
//! little-endian nibbles. Voice 0 has a 20-bit accumulator (6 bytes per
//! event), voices 1 and 2 have 16 bits (5 bytes). Waveforms are fixed per
//! track for the whole song, from a separate 3-byte table.

use crate::config::GameConfig;
use crate::context::DriverContext;
use crate::error::Result;
use crate::event::{Event, Track};

use super::{VBLANK_HZ, WSG3_SAMPLE_RATE};

const EVENT_LENGTH: [usize; 3] = [6, 5, 5];
const END_OF_TRACK: u8 = 0xFF;

pub(crate) fn read(
    cfg: &GameConfig,
    ctx: DriverContext<'_>,
    wavetable: &[Vec<u8>],
    song_nr: usize,
) -> Result<Vec<Track>> {
    let song_addr = usize::from(ctx.u16_le(cfg.songs_table + song_nr * 2)?);
    let wave_addr = usize::from(ctx.u16_le(cfg.waves_table + song_nr * 2)?);

    let mut tracks = Vec::with_capacity(3);
    for voice in 0..3 {
        let mut track = Track::new();
        let mut addr = usize::from(ctx.u16_le(song_addr + voice * 2)?);

        if voice == 0 {
            track.push(
                0,
                Event::Wavetable {
                    samples: wavetable.to_vec(),
                },
            );
            track.push(
                0,
                Event::SampleRate {
                    hz: WSG3_SAMPLE_RATE,
                },
            );
            track.push(0, Event::FrameRate { hz: VBLANK_HZ });
            track.push(0, Event::RegisterSize { bits: 20 });
        } else {
            track.push(0, Event::RegisterSize { bits: 16 });
        }
        track.push(
            0,
            Event::Wave {
                index: ctx.byte(wave_addr + voice)?,
            },
        );

        let mut tick = 0u64;
        let mut volume = None;
        loop {
            let duration = ctx.byte(addr)?;
            if duration == END_OF_TRACK {
                break;
            }

            let level = ctx.byte(addr + 1)?;
            if volume != Some(level) {
                volume = Some(level);
                track.push(tick, Event::Volume { level });
            }

            // Frequency register as unpacked nibbles, least significant first.
            let mut pitch = 0u32;
            for n in 2..EVENT_LENGTH[voice] {
                pitch += u32::from(ctx.byte(addr + n)?) << ((n - 2) * 4);
            }
            track.push(
                tick,
                Event::Note {
                    pitch,
                    duration: u32::from(duration),
                },
            );

            tick += u64::from(duration);
            addr += EVENT_LENGTH[voice];
        }

        tracks.push(track);
    }

    Ok(tracks)
}
