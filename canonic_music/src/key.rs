// Keys, concrete scales and chord membership.
//
// A canon is written in a major or (natural) minor key. Before solving, the
// key and the configured pitch range are turned into a concrete `Scale`: the
// ascending list of every in-key MIDI pitch inside the range. Both solver
// passes draw pitches only from this list.
//
// Chord symbols are the four triads the generator harmonises with (I, IV, V,
// VI). `chord_pitches` filters the scale down to a chord's tones; thirds,
// sixths and sevenths follow the mode.

use crate::error::CanonError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// MIDI pitch number.
pub type Pitch = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// C D E F G A B
    Major,
    /// A B C D E F G (natural minor)
    Minor,
}

impl Mode {
    /// Semitone intervals from the tonic to each scale degree.
    pub fn intervals(self) -> [u8; 7] {
        match self {
            Mode::Major => [0, 2, 4, 5, 7, 9, 11],
            Mode::Minor => [0, 2, 3, 5, 7, 8, 10],
        }
    }

    fn third(self) -> u8 {
        self.intervals()[2]
    }

    fn sixth(self) -> u8 {
        self.intervals()[5]
    }

    fn seventh(self) -> u8 {
        self.intervals()[6]
    }
}

/// A tonic pitch class plus a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    /// Pitch class of the tonic (0 = C, 2 = D, ...).
    pub tonic: u8,
    pub mode: Mode,
}

impl Key {
    pub fn new(tonic: u8, mode: Mode) -> Self {
        Key {
            tonic: tonic % 12,
            mode,
        }
    }

    pub fn c_major() -> Self {
        Key::new(0, Mode::Major)
    }

    /// Pitch class of `pitch` relative to the tonic (0-11).
    fn degree_class(&self, pitch: Pitch) -> u8 {
        (pitch % 12 + 12 - self.tonic) % 12
    }

    /// Check if a MIDI pitch belongs to this key.
    pub fn contains(&self, pitch: Pitch) -> bool {
        self.mode.intervals().contains(&self.degree_class(pitch))
    }

    /// True if `pitch` has the tonic's pitch class.
    pub fn is_tonic(&self, pitch: Pitch) -> bool {
        pitch % 12 == self.tonic
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = crate::canon::pitch_class_name(self.tonic);
        match self.mode {
            Mode::Major => write!(f, "{name} major"),
            Mode::Minor => write!(f, "{name} minor"),
        }
    }
}

/// Ascending, duplicate-free in-key pitches inside a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scale(Vec<Pitch>);

impl Scale {
    pub fn pitches(&self) -> &[Pitch] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of `pitch` in the scale, if present.
    pub fn index_of(&self, pitch: Pitch) -> Option<usize> {
        self.0.binary_search(&pitch).ok()
    }

    /// Index of `pitch`, or of the closest scale pitch (lower on ties).
    pub fn nearest_index(&self, pitch: Pitch) -> Option<usize> {
        if self.0.is_empty() {
            return None;
        }
        match self.0.binary_search(&pitch) {
            Ok(i) => Some(i),
            Err(0) => Some(0),
            Err(i) if i == self.0.len() => Some(i - 1),
            Err(i) => {
                let below = pitch - self.0[i - 1];
                let above = self.0[i] - pitch;
                Some(if above < below { i } else { i - 1 })
            }
        }
    }

    /// All scale pitches with the key's tonic pitch class.
    pub fn tonics(&self, key: &Key) -> Vec<Pitch> {
        self.0.iter().copied().filter(|&p| key.is_tonic(p)).collect()
    }
}

/// Every pitch of `key` within `low..=high`, ascending.
///
/// The range is first widened to the enclosing tonics, the scale is laid out
/// octave by octave from the lower tonic, and the result is trimmed back to
/// the requested window.
pub fn concrete_scale(key: &Key, low: Pitch, high: Pitch) -> Scale {
    let low = i32::from(low);
    let high = i32::from(high);
    let tonic = i32::from(key.tonic);

    let mut min_tonic = tonic + 12 * (low / 12);
    while min_tonic > low {
        min_tonic -= 12;
    }
    let mut max_tonic = min_tonic;
    while max_tonic < high {
        max_tonic += 12;
    }

    let octaves = (max_tonic - min_tonic) / 12;
    let mut pitches = Vec::new();
    for octave in 0..=octaves {
        for &interval in &key.mode.intervals() {
            let p = min_tonic + octave * 12 + i32::from(interval);
            if (low..=high).contains(&p) {
                if let Ok(p) = Pitch::try_from(p) {
                    pitches.push(p);
                }
            }
        }
    }
    Scale(pitches)
}

/// The four triads available to chord progressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChordSymbol {
    #[serde(rename = "I")]
    Tonic,
    #[serde(rename = "IV")]
    Subdominant,
    #[serde(rename = "V")]
    Dominant,
    #[serde(rename = "VI")]
    Submediant,
}

impl ChordSymbol {
    pub const ALL: [ChordSymbol; 4] = [
        ChordSymbol::Tonic,
        ChordSymbol::Subdominant,
        ChordSymbol::Dominant,
        ChordSymbol::Submediant,
    ];

    /// Semitone offsets of the chord tones above the key's tonic.
    pub fn intervals(self, mode: Mode) -> [u8; 3] {
        match self {
            ChordSymbol::Tonic => [0, mode.third(), 7],
            ChordSymbol::Subdominant => [5, mode.sixth(), 0],
            ChordSymbol::Dominant => [7, mode.seventh(), 2],
            ChordSymbol::Submediant => [mode.sixth(), 0, mode.third()],
        }
    }
}

impl fmt::Display for ChordSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChordSymbol::Tonic => "I",
            ChordSymbol::Subdominant => "IV",
            ChordSymbol::Dominant => "V",
            ChordSymbol::Submediant => "VI",
        })
    }
}

impl FromStr for ChordSymbol {
    type Err = CanonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "I" => Ok(ChordSymbol::Tonic),
            "IV" => Ok(ChordSymbol::Subdominant),
            "V" => Ok(ChordSymbol::Dominant),
            "VI" => Ok(ChordSymbol::Submediant),
            other => Err(CanonError::UnknownChordSymbol(other.to_string())),
        }
    }
}

/// The pitches of `scale` that belong to `chord` in `key`.
pub fn chord_pitches(chord: ChordSymbol, key: &Key, scale: &Scale) -> Vec<Pitch> {
    let tones = chord.intervals(key.mode);
    scale
        .pitches()
        .iter()
        .copied()
        .filter(|&p| tones.contains(&key.degree_class(p)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_major_over_three_octaves() {
        let scale = concrete_scale(&Key::c_major(), 48, 84);
        assert_eq!(scale.pitches().first(), Some(&48));
        assert_eq!(scale.pitches().last(), Some(&84));
        assert_eq!(scale.len(), 22);
        assert_eq!(scale.tonics(&Key::c_major()), vec![48, 60, 72, 84]);
    }

    #[test]
    fn scale_trims_to_window_between_tonics() {
        // D major between E4 and C#5: E F# G A B C#
        let scale = concrete_scale(&Key::new(2, Mode::Major), 64, 73);
        assert_eq!(scale.pitches(), &[64, 66, 67, 69, 71, 73]);
    }

    #[test]
    fn scale_invariants_hold_for_every_key() {
        for tonic in 0..12 {
            for mode in [Mode::Major, Mode::Minor] {
                let key = Key::new(tonic, mode);
                for (low, high) in [(0u8, 127u8), (40, 61), (55, 56), (60, 60)] {
                    let scale = concrete_scale(&key, low, high);
                    let p = scale.pitches();
                    assert!(p.windows(2).all(|w| w[0] < w[1]), "{key} not ascending");
                    assert!(p.iter().all(|&x| key.contains(x)), "{key} has foreign pitch");
                    assert!(p.iter().all(|&x| (low..=high).contains(&x)));
                    let expected = (low..=high).filter(|&x| key.contains(x)).count();
                    assert_eq!(p.len(), expected, "{key} {low}..={high} missed pitches");
                }
            }
        }
    }

    #[test]
    fn minor_key_membership() {
        let a_minor = Key::new(9, Mode::Minor);
        assert!(a_minor.contains(60)); // C
        assert!(a_minor.contains(67)); // G
        assert!(!a_minor.contains(68)); // G#
    }

    #[test]
    fn chord_tones_in_c_major() {
        let key = Key::c_major();
        let scale = concrete_scale(&key, 60, 72);
        assert_eq!(chord_pitches(ChordSymbol::Tonic, &key, &scale), vec![60, 64, 67, 72]);
        assert_eq!(chord_pitches(ChordSymbol::Subdominant, &key, &scale), vec![60, 65, 69, 72]);
        assert_eq!(chord_pitches(ChordSymbol::Dominant, &key, &scale), vec![62, 67, 71]);
        assert_eq!(chord_pitches(ChordSymbol::Submediant, &key, &scale), vec![60, 64, 69, 72]);
    }

    #[test]
    fn chord_tones_follow_minor_mode() {
        let key = Key::new(9, Mode::Minor); // A minor
        let scale = concrete_scale(&key, 57, 69);
        // i = A C E, v = E G B, VI = F A C
        assert_eq!(chord_pitches(ChordSymbol::Tonic, &key, &scale), vec![57, 60, 64, 69]);
        assert_eq!(chord_pitches(ChordSymbol::Dominant, &key, &scale), vec![59, 64, 67]);
        assert_eq!(chord_pitches(ChordSymbol::Submediant, &key, &scale), vec![57, 60, 65, 69]);
    }

    #[test]
    fn chord_symbol_parsing() {
        assert_eq!("IV".parse::<ChordSymbol>(), Ok(ChordSymbol::Subdominant));
        assert_eq!(
            "ii".parse::<ChordSymbol>(),
            Err(CanonError::UnknownChordSymbol("ii".into()))
        );
        for chord in ChordSymbol::ALL {
            assert_eq!(chord.to_string().parse::<ChordSymbol>(), Ok(chord));
        }
    }

    #[test]
    fn nearest_index_rounds_to_closest() {
        let scale = concrete_scale(&Key::c_major(), 60, 72);
        assert_eq!(scale.nearest_index(62), Some(1));
        assert_eq!(scale.nearest_index(61), Some(0)); // tie goes low
        assert_eq!(scale.nearest_index(70), Some(5));
        assert_eq!(scale.nearest_index(71), Some(6));
        assert_eq!(scale.nearest_index(10), Some(0));
        assert_eq!(scale.nearest_index(100), Some(7));
    }
}
