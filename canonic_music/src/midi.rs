// MIDI output from a finished canon.
//
// Converts the playback schedule into a Standard MIDI File (SMF Format 1):
// track 0 carries the tempo, then one track per voice on its own channel.
// One beat is one quarter note; rhythms are halves, thirds and quarters of
// a beat, all of which divide 480 ticks exactly.
//
// Uses the `midly` crate for MIDI writing. Encoding is in memory; the CLI
// writes the bytes to disk.

use crate::canon::Canon;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use num_rational::Rational64;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

/// Choir aahs (General MIDI program 53, zero-based 52).
const PROGRAM: u8 = 52;

const VELOCITY: u8 = 80;

const VOICE_NAMES: [&str; 4] = ["Voice 1", "Voice 2", "Voice 3", "Voice 4"];

/// Encode `canon` as an SMF byte buffer at `tempo_bpm` quarter notes per
/// minute.
pub fn encode(canon: &Canon, tempo_bpm: u16) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let smf = canon_to_smf(canon, tempo_bpm);
    let mut buf = Vec::new();
    smf.write(&mut buf)?;
    Ok(buf)
}

/// Convert a beat position to ticks, rounding to the nearest tick.
fn ticks(beats: Rational64) -> u32 {
    let scaled = beats * Rational64::from_integer(i64::from(TICKS_PER_QUARTER));
    u32::try_from(scaled.round().to_integer()).unwrap_or(0)
}

fn canon_to_smf(canon: &Canon, tempo_bpm: u16) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo track
    let tempo_microseconds = 60_000_000 / u32::from(tempo_bpm.max(1));
    smf.tracks.push(vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ]);

    for (voice, &name) in VOICE_NAMES.iter().enumerate().take(canon.voices) {
        let channel = u4::new(voice as u8);
        let mut track: Track<'static> = vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
            },
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::ProgramChange {
                        program: u7::new(PROGRAM),
                    },
                },
            },
        ];

        let mut last_event_tick: u32 = 0;
        for event in canon.voice_schedule(voice) {
            let on = ticks(event.start);
            let off = ticks(event.end());
            let key = u7::new(event.pitch);
            track.push(TrackEvent {
                delta: u28::new(on.saturating_sub(last_event_tick)),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn {
                        key,
                        vel: u7::new(VELOCITY),
                    },
                },
            });
            track.push(TrackEvent {
                delta: u28::new(off.saturating_sub(on)),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff {
                        key,
                        vel: u7::new(0),
                    },
                },
            });
            last_event_tick = off;
        }

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
    }

    smf
}
