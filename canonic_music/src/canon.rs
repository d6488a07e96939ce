// The finished canon and the top-level generation pipeline.
//
// `Canon::generate` runs config -> context -> layout -> skeleton ->
// elaboration and packages the result. A `Canon` holds a single melody
// (bars of beats); the voices are that melody entering
// `bars_per_cycle` bars apart, which playback.rs and midi.rs expand.

use crate::config::{CanonForm, Config};
use crate::context::Context;
use crate::elaborate;
use crate::error::CanonError;
use crate::key::{ChordSymbol, Key, Pitch};
use crate::layout::CellLayout;
use crate::skeleton;
use canonic_prng::CanonRng;
use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One beat of the melody: its skeleton root plus the notes it is split
/// into. `rhythm[i]` is the length of `notes[i]` as a fraction of the beat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beat {
    pub root: Pitch,
    pub rhythm: Vec<Rational64>,
    pub notes: Vec<Pitch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canon {
    pub form: CanonForm,
    pub key: Key,
    pub beats_per_bar: usize,
    pub voices: usize,
    /// Bars between successive voice entries.
    pub bars_per_cycle: usize,
    /// One chord per beat, repeating under the melody.
    pub chord_progression: Vec<ChordSymbol>,
    pub bars: Vec<Vec<Beat>>,
}

impl Canon {
    /// Validate `config` and solve both passes. All randomness comes from
    /// `rng`, so a fixed seed reproduces the same canon.
    pub fn generate(config: &Config, rng: &mut CanonRng) -> Result<Canon, CanonError> {
        let ctx = Context::new(config, rng)?;
        let layout = CellLayout::for_context(&ctx);
        let skeleton = skeleton::solve(&ctx, &layout, rng)?;
        let beats = elaborate::elaborate(&ctx, &layout, &skeleton, rng)?;

        Ok(Canon {
            form: config.form,
            key: config.key,
            beats_per_bar: config.beats_per_bar,
            voices: config.voices,
            bars_per_cycle: config.bars_per_chord_cycle,
            chord_progression: ctx.progression.chords().to_vec(),
            bars: beats
                .chunks(config.beats_per_bar)
                .map(<[Beat]>::to_vec)
                .collect(),
        })
    }

    /// Every beat of the melody in order.
    pub fn beats(&self) -> impl Iterator<Item = &Beat> {
        self.bars.iter().flatten()
    }

    /// Root of every beat, in order.
    pub fn roots(&self) -> Vec<Pitch> {
        self.beats().map(|b| b.root).collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable rendering: a header line, the progression, and one
    /// line per bar with the notes of each beat.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Canon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} canon in {}, {} beats per bar, {} bars, {} voice(s) entering {} bar(s) apart",
            self.form,
            self.key,
            self.beats_per_bar,
            self.bars.len(),
            self.voices,
            self.bars_per_cycle
        )?;
        let chords: Vec<String> = self.chord_progression.iter().map(ToString::to_string).collect();
        writeln!(f, "progression: {}", chords.join(" "))?;
        for (i, bar) in self.bars.iter().enumerate() {
            let beats: Vec<String> = bar
                .iter()
                .map(|beat| {
                    let names: Vec<String> = beat.notes.iter().map(|&p| pitch_name(p)).collect();
                    names.join(" ")
                })
                .collect();
            writeln!(f, "bar {:>2} | {}", i + 1, beats.join(" | "))?;
        }
        Ok(())
    }
}

pub fn pitch_class_name(pc: u8) -> &'static str {
    match pc % 12 {
        0 => "C",
        1 => "C#",
        2 => "D",
        3 => "Eb",
        4 => "E",
        5 => "F",
        6 => "F#",
        7 => "G",
        8 => "Ab",
        9 => "A",
        10 => "Bb",
        _ => "B",
    }
}

/// Note name with octave, middle C = C4.
pub fn pitch_name(pitch: Pitch) -> String {
    format!("{}{}", pitch_class_name(pitch), i16::from(pitch) / 12 - 1)
}
