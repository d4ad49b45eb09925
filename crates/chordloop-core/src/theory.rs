//! Chord theory: chord-type dictionary and chord symbol lookup

use serde::{Deserialize, Serialize};

use crate::pitch::{PitchClass, PitchToken};

// ============================================================================
// Chord Spec
// ============================================================================

/// Everything needed to spell a chord: chord name, root note and octave
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordSpec {
    /// Chord type name or alias (`minor`, `maj7`) or a full symbol (`Dm7`)
    pub chord_name: String,
    /// Root pitch class, e.g. `G` or `C#`
    pub root_note: String,
    pub octave: i8,
}

impl Default for ChordSpec {
    fn default() -> Self {
        Self {
            chord_name: "minor".to_string(),
            root_note: "G".to_string(),
            octave: 2,
        }
    }
}

impl ChordSpec {
    pub fn new(chord_name: impl Into<String>, root_note: impl Into<String>, octave: i8) -> Self {
        Self {
            chord_name: chord_name.into(),
            root_note: root_note.into(),
            octave,
        }
    }

    /// Root note at the spec's octave, `None` if the root does not parse
    pub fn tonic(&self) -> Option<PitchToken> {
        let class: PitchClass = self.root_note.parse().ok()?;
        Some(class.at_octave(self.octave))
    }

    /// Same root and octave with a different chord name
    pub fn with_chord(&self, chord_name: &str) -> Self {
        Self {
            chord_name: chord_name.to_string(),
            ..self.clone()
        }
    }
}

// ============================================================================
// Dictionary seam
// ============================================================================

/// Source of chord tones. `None` means the chord name is not known.
pub trait ChordDictionary: Send + Sync {
    /// Spell the chord named `chord` on `tonic`. Symbols that carry their own
    /// root (`Dm7`) use that root at the tonic's octave.
    fn chord_tones(&self, chord: &str, tonic: PitchToken) -> Option<Vec<PitchToken>>;

    /// Canonical names of every known chord type
    fn chord_names(&self) -> Vec<String>;
}

// ============================================================================
// Intervals
// ============================================================================

/// Interval as letter steps and semitones, parsed from `3m`, `5P`, `11A`...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub steps: u8,
    pub semitones: i32,
}

impl Interval {
    pub fn parse(s: &str) -> Option<Self> {
        let split = s.find(|c: char| !c.is_ascii_digit())?;
        let number: u8 = s[..split].parse().ok()?;
        if number == 0 {
            return None;
        }
        let quality = &s[split..];
        let simple = ((number - 1) % 7) as usize;
        let octaves = ((number - 1) / 7) as i32;
        let perfect_kind = matches!(simple, 0 | 3 | 4);
        let base = [0, 2, 4, 5, 7, 9, 11][simple];

        let alter = match (quality, perfect_kind) {
            ("P", true) | ("M", false) => 0,
            ("m", false) => -1,
            ("A", _) => 1,
            ("d", true) => -1,
            ("d", false) => -2,
            _ => return None,
        };

        Some(Self {
            steps: number - 1,
            semitones: base + alter + 12 * octaves,
        })
    }
}

// ============================================================================
// Chord Types
// ============================================================================

/// A chord type: canonical name, aliases and intervals from the root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordType {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Space separated intervals, e.g. `"1P 3m 5P 7m"`
    pub intervals: &'static str,
}

impl ChordType {
    pub fn intervals(&self) -> impl Iterator<Item = Interval> + '_ {
        self.intervals.split_whitespace().filter_map(Interval::parse)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.contains(&name)
    }

    pub fn spell(&self, tonic: PitchToken) -> Vec<PitchToken> {
        self.intervals()
            .map(|iv| tonic.transpose(iv.steps, iv.semitones))
            .collect()
    }
}

macro_rules! chord {
    ($intervals:expr, $name:expr, [$($alias:expr),* $(,)?]) => {
        ChordType { name: $name, aliases: &[$($alias),*], intervals: $intervals }
    };
}

pub const CHORD_TYPES: &[ChordType] = &[
    // Major family
    chord!("1P 3M 5P", "major", ["M", "maj", "^"]),
    chord!("1P 3M 5P 7M", "major seventh", ["maj7", "ma7", "M7", "Maj7", "^7"]),
    chord!("1P 3M 5P 7M 9M", "major ninth", ["maj9", "M9", "^9"]),
    chord!("1P 3M 5P 7M 9M 13M", "major thirteenth", ["maj13", "M13", "^13"]),
    chord!("1P 3M 5P 6M", "sixth", ["6", "add6", "M6"]),
    chord!("1P 3M 5P 6M 9M", "sixth added ninth", ["6add9", "6/9", "69", "M69"]),
    chord!("1P 3M 5P 7M 11A", "major seventh sharp eleventh", ["maj7#11", "M7#11", "^7#11"]),
    chord!("1P 3M 5P 9M", "added ninth", ["add9", "add2"]),
    // Minor family
    chord!("1P 3m 5P", "minor", ["m", "min", "-"]),
    chord!("1P 3m 5P 7m", "minor seventh", ["m7", "min7", "mi7", "-7"]),
    chord!("1P 3m 5P 7M", "minor/major seventh", ["mMaj7", "mM7", "m/maj7", "-^7"]),
    chord!("1P 3m 5P 6M", "minor sixth", ["m6", "-6"]),
    chord!("1P 3m 5P 7m 9M", "minor ninth", ["m9", "-9"]),
    chord!("1P 3m 5P 7m 9M 11P", "minor eleventh", ["m11", "-11"]),
    chord!("1P 3m 5P 7m 9M 13M", "minor thirteenth", ["m13", "-13"]),
    chord!("1P 3m 5P 9M", "minor added ninth", ["madd9", "m(add9)"]),
    // Diminished / augmented
    chord!("1P 3m 5d", "diminished", ["dim", "o"]),
    chord!("1P 3m 5d 7d", "diminished seventh", ["dim7", "o7"]),
    chord!("1P 3m 5d 7m", "half-diminished", ["m7b5", "h7", "h"]),
    chord!("1P 3M 5A", "augmented", ["aug", "+", "+5"]),
    chord!("1P 3M 5A 7m", "augmented seventh", ["7#5", "+7", "7aug", "aug7"]),
    // Dominant family
    chord!("1P 3M 5P 7m", "dominant seventh", ["7", "dom"]),
    chord!("1P 3M 5P 7m 9M", "dominant ninth", ["9"]),
    chord!("1P 3M 5P 7m 9M 13M", "dominant thirteenth", ["13"]),
    chord!("1P 3M 5P 7m 11A", "lydian dominant seventh", ["7#11", "7#4"]),
    chord!("1P 3M 5P 7m 9m", "dominant flat ninth", ["7b9"]),
    chord!("1P 3M 5P 7m 9A", "dominant sharp ninth", ["7#9"]),
    // Suspended and open
    chord!("1P 5P", "fifth", ["5"]),
    chord!("1P 4P 5P", "suspended fourth", ["sus4", "sus"]),
    chord!("1P 2M 5P", "suspended second", ["sus2"]),
    chord!("1P 4P 5P 7m", "suspended fourth seventh", ["7sus4", "7sus"]),
];

/// Built-in chord dictionary backed by [`CHORD_TYPES`]
#[derive(Debug, Clone)]
pub struct ChordTable {
    types: Vec<ChordType>,
}

impl Default for ChordTable {
    fn default() -> Self {
        Self {
            types: CHORD_TYPES.to_vec(),
        }
    }
}

impl ChordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from custom chord types
    pub fn with_types(types: Vec<ChordType>) -> Self {
        Self { types }
    }

    /// Find a chord type by canonical name or alias
    pub fn find(&self, name: &str) -> Option<&ChordType> {
        self.types.iter().find(|t| t.matches(name))
    }

    /// Resolve a chord name or symbol into an optional own root plus chord type.
    ///
    /// Whole-name matches win (`minor`, `maj7`, `dim`). Otherwise a leading
    /// note name is split off (`F#dim` -> `F#` + `dim`); a bare root means major.
    pub fn resolve(&self, symbol: &str) -> Option<(Option<PitchClass>, &ChordType)> {
        let symbol = symbol.trim();
        if let Some(chord_type) = self.find(symbol) {
            return Some((None, chord_type));
        }
        let (root, rest) = PitchClass::split_prefix(symbol)?;
        let chord_type = if rest.is_empty() {
            self.find("major")?
        } else {
            self.find(rest)?
        };
        Some((Some(root), chord_type))
    }
}

impl ChordDictionary for ChordTable {
    fn chord_tones(&self, chord: &str, tonic: PitchToken) -> Option<Vec<PitchToken>> {
        let (own_root, chord_type) = self.resolve(chord)?;
        let tonic = own_root.map_or(tonic, |root| root.at_octave(tonic.octave));
        Some(chord_type.spell(tonic))
    }

    fn chord_names(&self) -> Vec<String> {
        self.types.iter().map(|t| t.name.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tones: &[PitchToken]) -> Vec<String> {
        tones.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_interval_parse() {
        assert_eq!(Interval::parse("1P"), Some(Interval { steps: 0, semitones: 0 }));
        assert_eq!(Interval::parse("3m"), Some(Interval { steps: 2, semitones: 3 }));
        assert_eq!(Interval::parse("5d"), Some(Interval { steps: 4, semitones: 6 }));
        assert_eq!(Interval::parse("7d"), Some(Interval { steps: 6, semitones: 9 }));
        assert_eq!(Interval::parse("11A"), Some(Interval { steps: 10, semitones: 18 }));
        assert_eq!(Interval::parse("13M"), Some(Interval { steps: 12, semitones: 21 }));
        assert_eq!(Interval::parse("3P"), None);
        assert_eq!(Interval::parse("5M"), None);
        assert_eq!(Interval::parse("0P"), None);
        assert_eq!(Interval::parse("P"), None);
    }

    #[test]
    fn test_builtin_intervals_all_parse() {
        for chord_type in CHORD_TYPES {
            let count = chord_type.intervals.split_whitespace().count();
            assert_eq!(chord_type.intervals().count(), count, "{}", chord_type.name);
        }
    }

    #[test]
    fn test_chord_tones_by_type_name() {
        let table = ChordTable::new();
        let c4: PitchToken = "C4".parse().unwrap();
        let tones = table.chord_tones("maj7", c4).unwrap();
        assert_eq!(names(&tones), vec!["C4", "E4", "G4", "B4"]);

        let g2: PitchToken = "G2".parse().unwrap();
        let tones = table.chord_tones("minor", g2).unwrap();
        assert_eq!(names(&tones), vec!["G2", "Bb2", "D3"]);
    }

    #[test]
    fn test_chord_tones_symbol_with_own_root() {
        let table = ChordTable::new();
        let g3: PitchToken = "G3".parse().unwrap();

        let tones = table.chord_tones("Dm7", g3).unwrap();
        assert_eq!(names(&tones), vec!["D3", "F3", "A3", "C4"]);

        let tones = table.chord_tones("F#dim", g3).unwrap();
        assert_eq!(names(&tones), vec!["F#3", "A3", "C4"]);

        let tones = table.chord_tones("Am13", g3).unwrap();
        assert_eq!(names(&tones), vec!["A3", "C4", "E4", "G4", "B4", "F#5"]);

        let tones = table.chord_tones("E", g3).unwrap();
        assert_eq!(names(&tones), vec!["E3", "G#3", "B3"]);
    }

    #[test]
    fn test_unknown_chord_is_none() {
        let table = ChordTable::new();
        let c4: PitchToken = "C4".parse().unwrap();
        assert!(table.chord_tones("not-a-real-chord", c4).is_none());
        assert!(table.chord_tones("Cnope", c4).is_none());
        assert!(table.chord_tones("", c4).is_none());
    }

    #[test]
    fn test_chord_names_are_canonical() {
        let names = ChordTable::new().chord_names();
        assert_eq!(names.len(), CHORD_TYPES.len());
        assert!(names.contains(&"major seventh".to_string()));
        assert!(!names.contains(&"maj7".to_string()));
    }

    #[test]
    fn test_spec_tonic() {
        let spec = ChordSpec::new("maj7", "C#", 3);
        assert_eq!(spec.tonic().unwrap().to_string(), "C#3");
        assert!(ChordSpec::new("maj7", "X", 3).tonic().is_none());
    }
}
