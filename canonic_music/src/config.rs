// Generation settings.
//
// `Config` is the plain parameter block a canon is generated from. Every
// field has a default, so a JSON file only needs the settings it changes.
// `validate` checks the whole block eagerly; nothing in the solvers
// re-checks configuration mid-search.

use crate::error::{CanonError, SolvePass};
use crate::key::{ChordSymbol, Key, Pitch, concrete_scale};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the voices of the canon relate to the melody they share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonForm {
    /// Voices enter one after another with the same melody.
    Round,
    /// Free segments alternate with their retrogrades.
    Crab,
    /// The whole melody reads the same backwards.
    Palindrome,
}

impl CanonForm {
    /// True for forms whose melody contains mirrored material.
    pub fn is_mirrored(self) -> bool {
        !matches!(self, CanonForm::Round)
    }
}

impl fmt::Display for CanonForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CanonForm::Round => "round",
            CanonForm::Crab => "crab",
            CanonForm::Palindrome => "palindrome",
        })
    }
}

impl FromStr for CanonForm {
    type Err = CanonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "round" => Ok(CanonForm::Round),
            "crab" => Ok(CanonForm::Crab),
            "palindrome" => Ok(CanonForm::Palindrome),
            _ => Err(CanonError::InvalidForm(s.to_string())),
        }
    }
}

/// Resource limits for the two solver passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    /// Skeletons collected before one is picked at random.
    pub skeleton_pool: usize,
    /// Elaborations collected before one is picked at random.
    pub elaboration_pool: usize,
    /// Goal evaluations allowed per pass.
    pub max_steps: u64,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            skeleton_pool: 100,
            elaboration_pool: 1,
            max_steps: 2_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub key: Key,
    /// Lowest pitch any note may use (inclusive).
    pub low: Pitch,
    /// Highest pitch any note may use (inclusive).
    pub high: Pitch,
    pub beats_per_bar: usize,
    pub bars: usize,
    pub voices: usize,
    /// Length of the chord cycle in bars, which is also how many bars apart
    /// successive voices enter.
    pub bars_per_chord_cycle: usize,
    /// Largest leap in semitones between consecutive root notes.
    pub max_jump: u8,
    /// Chance of splitting a beat into 1, 2, 3 or 4 notes.
    pub probabilities: [f64; 4],
    pub form: CanonForm,
    /// One chord per beat. Generated when absent.
    pub chord_progression: Option<Vec<ChordSymbol>>,
    pub search: SearchLimits,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            key: Key::c_major(),
            low: 48,
            high: 84,
            beats_per_bar: 4,
            bars: 8,
            voices: 2,
            bars_per_chord_cycle: 1,
            max_jump: 6,
            probabilities: [0.5, 0.25, 0.15, 0.1],
            form: CanonForm::Round,
            chord_progression: None,
            search: SearchLimits::default(),
        }
    }
}

impl Config {
    /// Parse a (possibly partial) JSON config. Missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Config, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Number of beats in the melody.
    pub fn total_beats(&self) -> usize {
        self.bars * self.beats_per_bar
    }

    /// Check every setting before any solving begins.
    pub fn validate(&self) -> Result<(), CanonError> {
        if !matches!(self.beats_per_bar, 3 | 4) {
            return Err(CanonError::BeatsPerBar(self.beats_per_bar));
        }
        if !(2..=50).contains(&self.bars) {
            return Err(CanonError::BarCount(self.bars));
        }
        if !(1..=4).contains(&self.voices) {
            return Err(CanonError::VoiceCount(self.voices));
        }
        if !(1..=4).contains(&self.bars_per_chord_cycle) {
            return Err(CanonError::ChordCycle(self.bars_per_chord_cycle));
        }
        if self.max_jump == 0 {
            return Err(CanonError::MaxJump(self.max_jump));
        }

        let sum: f64 = self.probabilities.iter().sum();
        if self.probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) || (sum - 1.0).abs() > 1e-9
        {
            return Err(CanonError::Probabilities(self.probabilities));
        }

        if self.low > self.high || self.high > 127 {
            return Err(CanonError::PitchRange {
                low: self.low,
                high: self.high,
            });
        }
        if concrete_scale(&self.key, self.low, self.high).is_empty() {
            return Err(CanonError::EmptyScale {
                low: self.low,
                high: self.high,
            });
        }

        if self.search.skeleton_pool == 0 {
            return Err(CanonError::SearchPool(SolvePass::Skeleton));
        }
        if self.search.elaboration_pool == 0 {
            return Err(CanonError::SearchPool(SolvePass::Elaboration));
        }

        if let Some(progression) = &self.chord_progression {
            if progression.is_empty() || progression.len() % self.beats_per_bar != 0 {
                return Err(CanonError::ProgressionLength {
                    len: progression.len(),
                    beats_per_bar: self.beats_per_bar,
                });
            }
            if self.form.is_mirrored() && !progression.iter().eq(progression.iter().rev()) {
                return Err(CanonError::AsymmetricProgression(self.form));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Mode;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_shape() {
        let bad = |f: fn(&mut Config)| {
            let mut c = Config::default();
            f(&mut c);
            c.validate().unwrap_err()
        };
        assert_eq!(bad(|c| c.beats_per_bar = 5), CanonError::BeatsPerBar(5));
        assert_eq!(bad(|c| c.bars = 1), CanonError::BarCount(1));
        assert_eq!(bad(|c| c.voices = 0), CanonError::VoiceCount(0));
        assert_eq!(bad(|c| c.bars_per_chord_cycle = 5), CanonError::ChordCycle(5));
        assert_eq!(bad(|c| c.max_jump = 0), CanonError::MaxJump(0));
        assert!(matches!(
            bad(|c| c.probabilities = [0.5, 0.5, 0.5, 0.0]),
            CanonError::Probabilities(_)
        ));
        assert!(matches!(
            bad(|c| c.probabilities = [1.5, -0.5, 0.0, 0.0]),
            CanonError::Probabilities(_)
        ));
        assert_eq!(
            bad(|c| {
                c.low = 70;
                c.high = 60;
            }),
            CanonError::PitchRange { low: 70, high: 60 }
        );
        assert_eq!(
            bad(|c| {
                c.low = 61;
                c.high = 61;
            }),
            CanonError::EmptyScale { low: 61, high: 61 }
        );
        assert_eq!(
            bad(|c| c.search.skeleton_pool = 0),
            CanonError::SearchPool(SolvePass::Skeleton)
        );
        assert_eq!(
            bad(|c| c.search.elaboration_pool = 0),
            CanonError::SearchPool(SolvePass::Elaboration)
        );
    }

    #[test]
    fn progression_must_fill_whole_bars() {
        let config = Config {
            chord_progression: Some(vec![ChordSymbol::Tonic, ChordSymbol::Dominant]),
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(CanonError::ProgressionLength {
                len: 2,
                beats_per_bar: 4
            })
        );
    }

    #[test]
    fn mirrored_forms_need_symmetric_progressions() {
        use ChordSymbol::*;
        let lopsided = Config {
            form: CanonForm::Palindrome,
            chord_progression: Some(vec![Tonic, Subdominant, Dominant, Tonic]),
            ..Config::default()
        };
        assert_eq!(
            lopsided.validate(),
            Err(CanonError::AsymmetricProgression(CanonForm::Palindrome))
        );

        let symmetric = Config {
            form: CanonForm::Crab,
            chord_progression: Some(vec![Tonic, Dominant, Dominant, Tonic]),
            ..Config::default()
        };
        assert_eq!(symmetric.validate(), Ok(()));

        let round = Config {
            chord_progression: Some(vec![Tonic, Subdominant, Dominant, Tonic]),
            ..Config::default()
        };
        assert_eq!(round.validate(), Ok(()));
    }

    #[test]
    fn form_parsing() {
        assert_eq!("Crab".parse::<CanonForm>(), Ok(CanonForm::Crab));
        assert_eq!(
            "fugue".parse::<CanonForm>(),
            Err(CanonError::InvalidForm("fugue".into()))
        );
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = Config::from_json(
            r#"{
                "key": { "tonic": 9, "mode": "minor" },
                "form": "palindrome",
                "bars": 5,
                "chord_progression": ["I", "V", "V", "I"]
            }"#,
        )
        .unwrap();
        assert_eq!(config.key, Key::new(9, Mode::Minor));
        assert_eq!(config.form, CanonForm::Palindrome);
        assert_eq!(config.bars, 5);
        assert_eq!(config.voices, 2);
        assert_eq!(config.search, SearchLimits::default());
        assert_eq!(
            config.chord_progression.as_deref(),
            Some(&[ChordSymbol::Tonic, ChordSymbol::Dominant, ChordSymbol::Dominant, ChordSymbol::Tonic][..])
        );
    }

    #[test]
    fn json_rejects_unknown_chords_and_forms() {
        assert!(Config::from_json(r#"{ "chord_progression": ["I", "ii", "V", "I"] }"#).is_err());
        assert!(Config::from_json(r#"{ "form": "fugue" }"#).is_err());
    }

    #[test]
    fn json_roundtrip() {
        let config = Config {
            form: CanonForm::Crab,
            voices: 3,
            ..Config::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(Config::from_json(&text).unwrap(), config);
    }
}
