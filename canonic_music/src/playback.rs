// Playback schedule: the canon as timed notes per voice.
//
// Every voice plays the same melody. Voice `v` starts
// `beats_per_bar * bars_per_cycle * v` beats after the first, so the
// schedule is the melody's (duration, pitch) pairs laid end to end and
// shifted by that offset. Times are exact rationals in beats; the MIDI
// encoder converts them to ticks.

use crate::canon::Canon;
use crate::key::Pitch;
use num_rational::Rational64;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub voice: usize,
    /// Onset in beats from the start of the piece.
    pub start: Rational64,
    /// Length in beats.
    pub duration: Rational64,
    pub pitch: Pitch,
}

impl NoteEvent {
    pub fn end(&self) -> Rational64 {
        self.start + self.duration
    }
}

impl Canon {
    /// Beats before `voice` enters.
    pub fn voice_offset(&self, voice: usize) -> Rational64 {
        Rational64::from_integer((self.beats_per_bar * self.bars_per_cycle * voice) as i64)
    }

    /// The melody as played by one voice.
    pub fn voice_schedule(&self, voice: usize) -> Vec<NoteEvent> {
        let mut at = self.voice_offset(voice);
        let mut events = Vec::new();
        for beat in self.beats() {
            for (&duration, &pitch) in beat.rhythm.iter().zip(&beat.notes) {
                events.push(NoteEvent {
                    voice,
                    start: at,
                    duration,
                    pitch,
                });
                at += duration;
            }
        }
        events
    }

    /// All voices merged, ordered by onset (then voice).
    pub fn schedule(&self) -> Vec<NoteEvent> {
        let mut events: Vec<NoteEvent> =
            (0..self.voices).flat_map(|v| self.voice_schedule(v)).collect();
        events.sort_by(|a, b| a.start.cmp(&b.start).then(a.voice.cmp(&b.voice)));
        events
    }

    /// Length of the whole piece in beats, until the last voice finishes.
    pub fn duration(&self) -> Rational64 {
        let melody = Rational64::from_integer(self.beats().count() as i64);
        self.voice_offset(self.voices.saturating_sub(1)) + melody
    }
}
