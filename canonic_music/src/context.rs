// Immutable inputs shared by both solver passes.
//
// Built once per generation from a validated config: the concrete scale and
// the chord progression are derived here and never change afterwards. The
// solvers borrow a `Context` rather than reaching for any global state.

use crate::config::Config;
use crate::error::CanonError;
use crate::key::{Pitch, Scale, chord_pitches, concrete_scale};
use crate::progression::Progression;
use canonic_prng::CanonRng;

#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub scale: Scale,
    pub progression: Progression,
}

impl Context {
    /// Validate `config` and derive the scale and progression. Draws from
    /// `rng` only when the progression has to be generated.
    pub fn new(config: &Config, rng: &mut CanonRng) -> Result<Self, CanonError> {
        config.validate()?;
        let scale = concrete_scale(&config.key, config.low, config.high);
        let progression = Progression::for_config(config, rng)?;
        log::debug!(
            "context: {} pitches in {}..={}, progression of {} bar(s)",
            scale.len(),
            config.low,
            config.high,
            progression.bars()
        );
        Ok(Context {
            config: config.clone(),
            scale,
            progression,
        })
    }

    pub fn beats_per_bar(&self) -> usize {
        self.config.beats_per_bar
    }

    pub fn total_beats(&self) -> usize {
        self.config.total_beats()
    }

    /// Scale pitches of the chord under melody cell `cell`.
    pub fn chord_pitches_at(&self, cell: usize) -> Vec<Pitch> {
        let bpb = self.beats_per_bar();
        let chord = self.progression.chord(cell / bpb, cell % bpb);
        chord_pitches(chord, &self.config.key, &self.scale)
    }

    /// Every scale pitch with the tonic's pitch class.
    pub fn tonics(&self) -> Vec<Pitch> {
        self.scale.tonics(&self.config.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ChordSymbol;

    #[test]
    fn derives_scale_and_progression() {
        let config = Config {
            chord_progression: Some(vec![
                ChordSymbol::Tonic,
                ChordSymbol::Subdominant,
                ChordSymbol::Dominant,
                ChordSymbol::Tonic,
            ]),
            ..Config::default()
        };
        let ctx = Context::new(&config, &mut CanonRng::new(0)).unwrap();
        assert_eq!(ctx.scale.len(), 22);
        assert_eq!(ctx.tonics(), vec![48, 60, 72, 84]);
        // Cell 6 is bar 1, beat 2: the dominant.
        assert!(ctx.chord_pitches_at(6).contains(&67));
        assert!(!ctx.chord_pitches_at(6).contains(&60));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = Config {
            voices: 7,
            ..Config::default()
        };
        assert_eq!(
            Context::new(&config, &mut CanonRng::new(0)).unwrap_err(),
            CanonError::VoiceCount(7)
        );
    }
}
