// Chord progressions.
//
// A progression assigns one chord symbol to every beat of a whole number of
// bars and repeats for the length of the melody: the chord under bar `b`,
// beat `j` is the progression's entry for bar `b % bars()`.
//
// When the config supplies no progression, one is generated that is one
// chord cycle long. Rounds get random chords closing on a V-I cadence.
// Crab canons and palindromes are heard backwards as well as forwards, so
// their progression opens I-V (the cadence read in reverse) and its second
// half mirrors the first.

use crate::config::{CanonForm, Config};
use crate::error::CanonError;
use crate::key::ChordSymbol;
use canonic_prng::CanonRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    chords: Vec<ChordSymbol>,
    beats_per_bar: usize,
}

impl Progression {
    /// Wrap an explicit chord list. The list must fill whole bars.
    pub fn new(chords: Vec<ChordSymbol>, beats_per_bar: usize) -> Result<Self, CanonError> {
        if beats_per_bar == 0 || chords.is_empty() || chords.len() % beats_per_bar != 0 {
            return Err(CanonError::ProgressionLength {
                len: chords.len(),
                beats_per_bar,
            });
        }
        Ok(Progression {
            chords,
            beats_per_bar,
        })
    }

    /// Use the config's progression, or generate one for its form.
    pub fn for_config(config: &Config, rng: &mut CanonRng) -> Result<Self, CanonError> {
        match &config.chord_progression {
            Some(chords) => {
                let progression = Progression::new(chords.clone(), config.beats_per_bar)?;
                if config.form.is_mirrored() && !progression.is_palindromic() {
                    return Err(CanonError::AsymmetricProgression(config.form));
                }
                Ok(progression)
            }
            None => Ok(generate(
                config.form,
                config.beats_per_bar,
                config.bars_per_chord_cycle,
                rng,
            )),
        }
    }

    pub fn chords(&self) -> &[ChordSymbol] {
        &self.chords
    }

    /// Number of bars before the progression repeats.
    pub fn bars(&self) -> usize {
        self.chords.len() / self.beats_per_bar
    }

    /// The chord under `beat` of melody bar `bar`.
    pub fn chord(&self, bar: usize, beat: usize) -> ChordSymbol {
        self.chords[(bar % self.bars()) * self.beats_per_bar + beat % self.beats_per_bar]
    }

    pub fn is_palindromic(&self) -> bool {
        self.chords.iter().eq(self.chords.iter().rev())
    }
}

/// Generate a progression `bars` bars long for `form`.
pub fn generate(
    form: CanonForm,
    beats_per_bar: usize,
    bars: usize,
    rng: &mut CanonRng,
) -> Progression {
    let len = (beats_per_bar * bars).max(2);
    let random_chord = |rng: &mut CanonRng| {
        ChordSymbol::ALL[rng.range_usize(0, ChordSymbol::ALL.len())]
    };

    let mut chords = Vec::with_capacity(len);
    match form {
        CanonForm::Round => {
            for _ in 0..len - 2 {
                chords.push(random_chord(rng));
            }
            chords.push(ChordSymbol::Dominant);
            chords.push(ChordSymbol::Tonic);
        }
        CanonForm::Crab | CanonForm::Palindrome => {
            let half = (len - 1) / 2;
            chords.push(ChordSymbol::Tonic);
            chords.push(ChordSymbol::Dominant);
            for _ in 2..=half {
                chords.push(random_chord(rng));
            }
            for i in half + 1..len {
                chords.push(chords[len - 1 - i]);
            }
        }
    }
    log::debug!(
        "generated {form} progression: {}",
        chords.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
    );

    Progression {
        chords,
        beats_per_bar: beats_per_bar.max(1),
    }
}
