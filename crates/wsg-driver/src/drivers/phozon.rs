//! The note-list driver used by Phozon.
//!
//! The simplest 8-voice format: tracks are bare note/duration pairs with
//! no volume envelopes at all; every voice plays at full level. Any voice
//! reaching its end terminates the song, so after decoding, all tracks
//! are cut at the earliest end and the final note is allowed one extra
//! tick to ring out.

use crate::config::GameConfig;
use crate::context::DriverContext;
use crate::error::Result;
use crate::event::{Event, Track};

use super::{truncate_at, VBLANK_HZ, WSG_SAMPLE_RATE};

const END_OF_TRACK: u8 = 0xFF;
const TRACK_LEVEL: u8 = 0x0F;

pub(crate) fn read(
    cfg: &GameConfig,
    ctx: DriverContext<'_>,
    wavetable: &[Vec<u8>],
    song_nr: usize,
) -> Result<Vec<Track>> {
    let track_offset = usize::from(ctx.byte(cfg.song_offsets + song_nr * 4)?);
    let nr_tracks = usize::from(ctx.byte(cfg.song_offsets + song_nr * 4 + 2)?);

    let mut tracks = Vec::with_capacity(nr_tracks);
    let mut end_tick = u64::MAX;

    for num in 0..nr_tracks {
        let mut addr = usize::from(ctx.u16_be(cfg.songs_table + (track_offset + num) * 2)?);
        let wave_nr = ctx.byte(cfg.waves_table + track_offset + num)? >> 4;

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
        track.push(0, Event::Volume { level: TRACK_LEVEL });

        let mut tick = 0u64;
        loop {
            let opcode = ctx.byte(addr)?;
            if opcode == END_OF_TRACK {
                break;
            }
            let entry = cfg.notes_table + usize::from(opcode >> 4) * 4;
            let pitch = ctx.be_value(entry, 4)? >> (opcode & 0x0F);
            let duration = u32::from(ctx.byte(addr + 1)?);
            track.push(tick, Event::Note { pitch, duration });
            tick += u64::from(duration);
            addr += 2;
        }

        end_tick = end_tick.min(tick);
        tracks.push(track);
    }

    for track in &mut tracks {
        truncate_at(track, end_tick, 1);
    }

    Ok(tracks)
}
