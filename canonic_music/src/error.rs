// Errors surfaced to callers of the canon generator.
//
// Local unification failures never reach this type; they only prune search
// branches. What does reach it is either a configuration problem, caught by
// `Config::validate` (or, for voices forced into unison, by the cell layout)
// before any solving starts, or a solver pass that came back with an empty
// pool.

use crate::config::CanonForm;
use std::fmt;
use thiserror::Error;

/// Which solver pass failed to produce an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolvePass {
    Skeleton,
    Elaboration,
}

impl fmt::Display for SolvePass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolvePass::Skeleton => f.write_str("root-note skeleton"),
            SolvePass::Elaboration => f.write_str("melodic elaboration"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CanonError {
    #[error(
        "no {pass} satisfies these settings; try widening the pitch range, \
         increasing the maximum jump, or reducing the number of voices"
    )]
    Unsatisfiable { pass: SolvePass },

    #[error("unknown chord symbol: {0} (expected I, IV, V or VI)")]
    UnknownChordSymbol(String),

    #[error("invalid canon form: {0} (expected round, crab or palindrome)")]
    InvalidForm(String),

    #[error("beats per bar must be 3 or 4, not {0}")]
    BeatsPerBar(usize),

    #[error("number of bars must be between 2 and 50, not {0}")]
    BarCount(usize),

    #[error("there must be 1, 2, 3 or 4 voices, not {0}")]
    VoiceCount(usize),

    #[error("bars per chord cycle must be between 1 and 4, not {0}")]
    ChordCycle(usize),

    #[error("maximum jump must be at least one semitone, not {0}")]
    MaxJump(u8),

    #[error("subdivision probabilities must be non-negative and sum to 1, got {0:?}")]
    Probabilities([f64; 4]),

    #[error("pitch range {low}..={high} is empty or outside 0..=127")]
    PitchRange { low: u8, high: u8 },

    #[error("no pitch of the key lies within {low}..={high}")]
    EmptyScale { low: u8, high: u8 },

    #[error("chord progression has {len} chords, which is not a whole number of {beats_per_bar}-beat bars")]
    ProgressionLength { len: usize, beats_per_bar: usize },

    #[error("chord progression must read the same backwards for a {0} canon")]
    AsymmetricProgression(CanonForm),

    #[error("the {0} pool must hold at least one solution")]
    SearchPool(SolvePass),

    #[error(
        "beats {first} and {second} sound together in two voices but mirror the \
         same note; change the number of bars, beats per bar or voices"
    )]
    VoicesInUnison { first: usize, second: usize },
}
