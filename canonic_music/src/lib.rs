// Canonic Music Generator
//
// Generates canons (rounds, crab canons and palindromes) by solving two
// constraint problems with the canonic_logic relational engine. The first
// pass picks a root note for every beat; the second splits beats into
// rhythms and fills in walking notes between roots, keeping voices that
// sound together off each other's pitches.
//
// Architecture:
// - config.rs: Generation settings, defaults, JSON loading, validation
// - error.rs: `CanonError`, the single error type surfaced to callers
// - key.rs: Keys, modes, concrete scales, chord symbols and chord tones
// - progression.rs: Explicit or generated chord progressions
// - context.rs: Immutable scale + progression shared by both passes
// - layout.rs: Cell ownership per form (free vs mirrored) and constraint wiring
// - skeleton.rs: Root-note skeleton solve (first pass)
// - elaborate.rs: Rhythm subdivision and walking-note solve (second pass)
// - canon.rs: The finished `Canon`, the generation pipeline, text summary
// - playback.rs: Per-voice timed note schedule
// - midi.rs: Standard MIDI File output
//
// The generator is deterministic given a seed, supporting reproducible output.

pub mod canon;
pub mod config;
pub mod context;
pub mod elaborate;
pub mod error;
pub mod key;
pub mod layout;
pub mod midi;
pub mod playback;
pub mod progression;
pub mod skeleton;
