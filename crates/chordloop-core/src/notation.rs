//! Musical notation time (`4n`, `2m`, `8t`) and tick conversion

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChordloopError, Result};

/// Transport ticks
pub type Ticks = u64;

/// Ticks per quarter note
pub const PPQ: Ticks = 192;

/// Beats per measure (the transport runs in 4/4)
pub const BEATS_PER_MEASURE: Ticks = 4;

pub const TICKS_PER_MEASURE: Ticks = PPQ * BEATS_PER_MEASURE;

/// Tempo slider values, slowest to fastest
pub const TEMPOS: [&str; 22] = [
    "64m", "32m", "16m", "12m", "8m", "6m", "5m", "4m", "3m", "2m", "1m", "2n", "3n", "4n", "6n",
    "8n", "12n", "16n", "24n", "32n", "64n", "128n",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotationUnit {
    /// Whole measures
    Measure,
    /// Note value: `4n` is a quarter, `3n` a half-note triplet
    Note,
    /// Triplet of a note value: `8t` is two thirds of `8n`
    Triplet,
}

impl NotationUnit {
    fn suffix(self) -> char {
        match self {
            Self::Measure => 'm',
            Self::Note => 'n',
            Self::Triplet => 't',
        }
    }
}

/// A symbolic duration such as `4n` or `2m`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NotationTime {
    value: u32,
    unit: NotationUnit,
}

impl NotationTime {
    pub fn measures(value: u32) -> Self {
        Self { value, unit: NotationUnit::Measure }
    }

    pub fn note(value: u32) -> Self {
        Self { value, unit: NotationUnit::Note }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn unit(&self) -> NotationUnit {
        self.unit
    }

    /// Length in transport ticks. A zero note value (`0n`) has no length.
    pub fn ticks(&self) -> Ticks {
        let value = self.value as Ticks;
        match self.unit {
            NotationUnit::Measure => value * TICKS_PER_MEASURE,
            NotationUnit::Note => TICKS_PER_MEASURE.checked_div(value).unwrap_or(0),
            NotationUnit::Triplet => (TICKS_PER_MEASURE * 2).checked_div(value * 3).unwrap_or(0),
        }
    }

    /// True for `0m`: fine as an offset, unusable as a step or period
    pub fn is_zero(&self) -> bool {
        self.ticks() == 0
    }

    /// Length in seconds at the given tempo
    pub fn seconds(&self, bpm: f64) -> f64 {
        ticks_to_seconds(self.ticks(), bpm)
    }
}

impl Default for NotationTime {
    fn default() -> Self {
        Self::measures(0)
    }
}

pub fn ticks_to_seconds(ticks: Ticks, bpm: f64) -> f64 {
    ticks as f64 / PPQ as f64 * 60.0 / bpm
}

impl fmt::Display for NotationTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

impl FromStr for NotationTime {
    type Err = ChordloopError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || ChordloopError::InvalidNotation(s.to_string());
        let suffix = s.chars().last().ok_or_else(invalid)?;
        let unit = match suffix {
            'm' => NotationUnit::Measure,
            'n' => NotationUnit::Note,
            't' => NotationUnit::Triplet,
            _ => return Err(invalid()),
        };
        let value: u32 = s[..s.len() - 1].parse().map_err(|_| invalid())?;

        // Note values must divide the measure evenly; measures may be zero (an offset)
        let exact = match unit {
            NotationUnit::Measure => true,
            NotationUnit::Note => value > 0 && TICKS_PER_MEASURE % value as Ticks == 0,
            NotationUnit::Triplet => value > 0 && (TICKS_PER_MEASURE * 2) % (value as Ticks * 3) == 0,
        };
        if !exact {
            return Err(invalid());
        }
        Ok(Self { value, unit })
    }
}

impl TryFrom<String> for NotationTime {
    type Error = ChordloopError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<NotationTime> for String {
    fn from(t: NotationTime) -> Self {
        t.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticks(s: &str) -> Ticks {
        s.parse::<NotationTime>().unwrap().ticks()
    }

    #[test]
    fn test_ticks() {
        assert_eq!(ticks("1m"), 768);
        assert_eq!(ticks("32m"), 768 * 32);
        assert_eq!(ticks("4n"), 192);
        assert_eq!(ticks("3n"), 256);
        assert_eq!(ticks("12n"), 64);
        assert_eq!(ticks("128n"), 6);
        assert_eq!(ticks("8t"), 64);
        assert_eq!(ticks("0m"), 0);
    }

    #[test]
    fn test_zero_lengths() {
        assert!("0m".parse::<NotationTime>().unwrap().is_zero());
        assert!(NotationTime::note(0).is_zero());
        assert_eq!(NotationTime { value: 0, unit: NotationUnit::Triplet }.ticks(), 0);
        assert!(!NotationTime::note(4).is_zero());
        assert!(!NotationTime::measures(1).is_zero());
    }

    #[test]
    fn test_all_tempos_parse() {
        for tempo in TEMPOS {
            let t: NotationTime = tempo.parse().unwrap();
            assert!(t.ticks() > 0, "{tempo}");
            assert_eq!(t.to_string(), tempo);
        }
    }

    #[test]
    fn test_invalid_notation() {
        assert!("".parse::<NotationTime>().is_err());
        assert!("4".parse::<NotationTime>().is_err());
        assert!("4x".parse::<NotationTime>().is_err());
        assert!("0n".parse::<NotationTime>().is_err());
        assert!("5n".parse::<NotationTime>().is_err());
        assert!("-1m".parse::<NotationTime>().is_err());
    }

    #[test]
    fn test_seconds_at_tempo() {
        let quarter: NotationTime = "4n".parse().unwrap();
        assert!((quarter.seconds(120.0) - 0.5).abs() < 1e-9);
        let bar: NotationTime = "1m".parse().unwrap();
        assert!((bar.seconds(60.0) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_serde_as_string() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            tempo: NotationTime,
        }
        let holder: Holder = toml::from_str("tempo = \"2m\"").unwrap();
        assert_eq!(holder.tempo, NotationTime::measures(2));
        assert!(toml::from_str::<Holder>("tempo = \"7q\"").is_err());
    }
}
