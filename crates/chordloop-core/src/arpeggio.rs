//! Arpeggio modes and pitch sequence building

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChordloopError, Result};
use crate::pitch::PitchToken;
use crate::theory::{ChordDictionary, ChordSpec};

/// How many copies of the chord are concatenated before shuffling
pub const SHUFFLE_COPIES: usize = 3;

/// How many times each (tone, predecessor) pair is emitted in repeat mode
pub const REPEAT_COUNT: usize = 3;

/// Arpeggio slider values
pub const ARPS: [&str; 4] = ["up", "down", "shuffle", "repeat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArpMode {
    #[default]
    Up,
    Down,
    Shuffle,
    Repeat,
}

impl ArpMode {
    pub const ALL: [ArpMode; 4] = [ArpMode::Up, ArpMode::Down, ArpMode::Shuffle, ArpMode::Repeat];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Shuffle => "shuffle",
            Self::Repeat => "repeat",
        }
    }
}

impl fmt::Display for ArpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArpMode {
    type Err = ChordloopError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s.trim())
            .ok_or_else(|| ChordloopError::invalid_param("arp", s))
    }
}

/// Chord tones for a spec, empty when the chord name or root is not recognised
pub fn chord_tones(dict: &dyn ChordDictionary, spec: &ChordSpec) -> Vec<PitchToken> {
    let Some(tonic) = spec.tonic() else {
        debug!(root = %spec.root_note, "Unparsable root note, using empty sequence");
        return Vec::new();
    };
    dict.chord_tones(&spec.chord_name, tonic).unwrap_or_else(|| {
        debug!(chord = %spec.chord_name, "Unknown chord, using empty sequence");
        Vec::new()
    })
}

/// Build the playback sequence for a chord spec and arpeggio mode.
///
/// Shuffle draws from a fresh random source; use
/// [`build_sequence_with_rng`] for a reproducible order.
pub fn build_sequence(dict: &dyn ChordDictionary, spec: &ChordSpec, mode: ArpMode) -> Vec<PitchToken> {
    build_sequence_with_rng(dict, spec, mode, &mut fastrand::Rng::new())
}

pub fn build_sequence_with_rng(
    dict: &dyn ChordDictionary,
    spec: &ChordSpec,
    mode: ArpMode,
    rng: &mut fastrand::Rng,
) -> Vec<PitchToken> {
    let mut tones = chord_tones(dict, spec);
    match mode {
        ArpMode::Up => tones,
        ArpMode::Down => {
            tones.reverse();
            tones
        }
        ArpMode::Shuffle => shuffle(&tones, rng),
        ArpMode::Repeat => repeat(&tones, REPEAT_COUNT),
    }
}

/// Concatenate [`SHUFFLE_COPIES`] copies, then Durstenfeld-shuffle the result
pub fn shuffle<T: Clone>(tones: &[T], rng: &mut fastrand::Rng) -> Vec<T> {
    let mut sequence: Vec<T> = Vec::with_capacity(tones.len() * SHUFFLE_COPIES);
    for _ in 0..SHUFFLE_COPIES {
        sequence.extend_from_slice(tones);
    }
    for i in (1..sequence.len()).rev() {
        let j = rng.usize(..=i);
        sequence.swap(i, j);
    }
    sequence
}

/// Pair every tone with its cyclic predecessor and emit each pair `count` times
pub fn repeat<T: Clone>(tones: &[T], count: usize) -> Vec<T> {
    let n = tones.len();
    let mut sequence = Vec::with_capacity(n * count * 2);
    for (i, tone) in tones.iter().enumerate() {
        let previous = &tones[(i + n - 1) % n];
        for _ in 0..count {
            sequence.push(tone.clone());
            sequence.push(previous.clone());
        }
    }
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::ChordTable;

    fn spec(chord: &str) -> ChordSpec {
        ChordSpec::new(chord, "C", 4)
    }

    fn sorted(mut v: Vec<PitchToken>) -> Vec<String> {
        v.sort_by_key(|p| (p.midi(), p.to_string()));
        v.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_up_is_dictionary_order() {
        let table = ChordTable::new();
        let s = spec("maj7");
        let expected = table.chord_tones("maj7", s.tonic().unwrap()).unwrap();
        assert_eq!(build_sequence(&table, &s, ArpMode::Up), expected);
    }

    #[test]
    fn test_down_is_reversed_up() {
        let table = ChordTable::new();
        for chord in ["maj7", "minor", "m13", "Dm7", "sus2"] {
            let s = spec(chord);
            let mut up = build_sequence(&table, &s, ArpMode::Up);
            up.reverse();
            assert_eq!(build_sequence(&table, &s, ArpMode::Down), up, "{chord}");
        }
    }

    #[test]
    fn test_shuffle_is_tripled_permutation() {
        let table = ChordTable::new();
        let s = spec("m9");
        let up = build_sequence(&table, &s, ArpMode::Up);
        let tripled: Vec<PitchToken> = up.iter().chain(&up).chain(&up).copied().collect();

        for _ in 0..20 {
            let shuffled = build_sequence(&table, &s, ArpMode::Shuffle);
            assert_eq!(shuffled.len(), 3 * up.len());
            assert_eq!(sorted(shuffled), sorted(tripled.clone()));
        }
    }

    #[test]
    fn test_shuffle_seeded_is_reproducible() {
        let table = ChordTable::new();
        let s = spec("maj9");
        let a = build_sequence_with_rng(&table, &s, ArpMode::Shuffle, &mut fastrand::Rng::with_seed(7));
        let b = build_sequence_with_rng(&table, &s, ArpMode::Shuffle, &mut fastrand::Rng::with_seed(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_repeat_pairs_with_predecessor() {
        let out = repeat(&['A', 'B', 'C', 'D'], 3);
        let expected: Vec<char> = "ADADADBABABACBCBCBDCDCDC".chars().collect();
        assert_eq!(out, expected);
        assert_eq!(out.len(), 4 * 3 * 2);
    }

    #[test]
    fn test_repeat_mode_length() {
        let table = ChordTable::new();
        let s = spec("dominant seventh");
        let up = build_sequence(&table, &s, ArpMode::Up);
        let rep = build_sequence(&table, &s, ArpMode::Repeat);
        assert_eq!(rep.len(), up.len() * REPEAT_COUNT * 2);
        assert_eq!(rep[0], up[0]);
        assert_eq!(rep[1], up[up.len() - 1]);
    }

    #[test]
    fn test_single_tone_and_empty() {
        assert_eq!(repeat(&[1], 2), vec![1, 1, 1, 1]);
        assert!(repeat::<u8>(&[], 3).is_empty());
        let mut rng = fastrand::Rng::with_seed(1);
        assert!(shuffle::<u8>(&[], &mut rng).is_empty());
    }

    #[test]
    fn test_unknown_chord_degrades_to_empty() {
        let table = ChordTable::new();
        let s = spec("not-a-real-chord");
        for mode in ArpMode::ALL {
            assert!(build_sequence(&table, &s, mode).is_empty());
        }
        let bad_root = ChordSpec::new("maj7", "Q", 4);
        assert!(build_sequence(&table, &bad_root, ArpMode::Up).is_empty());
    }

    #[test]
    fn test_arp_mode_names() {
        for (mode, name) in ArpMode::ALL.iter().zip(ARPS) {
            assert_eq!(mode.name(), name);
            assert_eq!(name.parse::<ArpMode>().unwrap(), *mode);
        }
        assert!("sideways".parse::<ArpMode>().is_err());
    }
}
