//! Spelled pitches (letter, accidental, octave)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChordloopError, Result};

/// Natural note letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    pub const ALL: [Letter; 7] = [
        Letter::C,
        Letter::D,
        Letter::E,
        Letter::F,
        Letter::G,
        Letter::A,
        Letter::B,
    ];

    /// Position in the C-based letter cycle (C = 0, B = 6)
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 7]
    }

    /// Semitones above C for the natural note
    pub fn chroma(self) -> i32 {
        match self {
            Self::C => 0,
            Self::D => 2,
            Self::E => 4,
            Self::F => 5,
            Self::G => 7,
            Self::A => 9,
            Self::B => 11,
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(Self::C),
            'D' => Some(Self::D),
            'E' => Some(Self::E),
            'F' => Some(Self::F),
            'G' => Some(Self::G),
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            Self::C => 'C',
            Self::D => 'D',
            Self::E => 'E',
            Self::F => 'F',
            Self::G => 'G',
            Self::A => 'A',
            Self::B => 'B',
        }
    }
}

/// A note name without octave, e.g. `C#` or `Eb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PitchClass {
    pub letter: Letter,
    /// Positive = sharps, negative = flats
    pub accidental: i8,
}

impl PitchClass {
    pub fn new(letter: Letter, accidental: i8) -> Self {
        Self { letter, accidental }
    }

    /// Semitone class in 0..12
    pub fn chroma(&self) -> i32 {
        (self.letter.chroma() + self.accidental as i32).rem_euclid(12)
    }

    pub fn at_octave(self, octave: i8) -> PitchToken {
        PitchToken { class: self, octave }
    }

    /// Parse a leading note name, returning it with the unparsed rest.
    /// Only an uppercase letter starts a note name here, so chord suffixes
    /// like `dim` or `aug` are never mistaken for a tonic.
    pub(crate) fn split_prefix(s: &str) -> Option<(Self, &str)> {
        let mut chars = s.char_indices();
        let (_, first) = chars.next()?;
        if !first.is_ascii_uppercase() {
            return None;
        }
        let letter = Letter::from_char(first)?;
        let (accidental, consumed) = parse_accidentals(&s[1..]);
        Some((Self::new(letter, accidental), &s[1 + consumed..]))
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter.as_char())?;
        let symbol = if self.accidental > 0 { '#' } else { 'b' };
        for _ in 0..self.accidental.unsigned_abs() {
            write!(f, "{symbol}")?;
        }
        Ok(())
    }
}

impl FromStr for PitchClass {
    type Err = ChordloopError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let mut chars = s.chars();
        let letter = chars
            .next()
            .and_then(Letter::from_char)
            .ok_or_else(|| ChordloopError::InvalidPitch(s.to_string()))?;
        let (accidental, consumed) = parse_accidentals(&s[1..]);
        if consumed != s.len() - 1 {
            return Err(ChordloopError::InvalidPitch(s.to_string()));
        }
        Ok(Self::new(letter, accidental))
    }
}

/// Count leading `#` or `b` characters. Returns (accidental, bytes consumed).
fn parse_accidentals(s: &str) -> (i8, usize) {
    let sharps = s.bytes().take_while(|&b| b == b'#').count();
    if sharps > 0 {
        return (sharps.min(i8::MAX as usize) as i8, sharps);
    }
    let flats = s.bytes().take_while(|&b| b == b'b').count();
    (-(flats.min(i8::MAX as usize) as i8), flats)
}

/// A concrete pitch: note name plus octave (`C#4`, `Eb3`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PitchToken {
    pub class: PitchClass,
    pub octave: i8,
}

impl PitchToken {
    pub fn new(letter: Letter, accidental: i8, octave: i8) -> Self {
        Self {
            class: PitchClass::new(letter, accidental),
            octave,
        }
    }

    pub fn letter(&self) -> Letter {
        self.class.letter
    }

    pub fn accidental(&self) -> i8 {
        self.class.accidental
    }

    /// MIDI note number (C4 = 60). Not clamped; spelled extremes may leave 0..=127.
    pub fn midi(&self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.class.letter.chroma() + self.class.accidental as i32
    }

    /// Equal-tempered frequency in Hz (A4 = 440)
    pub fn frequency(&self) -> f64 {
        440.0 * 2f64.powf((self.midi() as f64 - 69.0) / 12.0)
    }

    /// Move up by a number of letter steps and semitones, keeping the spelling
    /// consistent with the letter distance (C + minor third = Eb, not D#).
    pub fn transpose(&self, letter_steps: u8, semitones: i32) -> PitchToken {
        let raw_index = self.class.letter.index() + letter_steps as usize;
        let octave = self.octave as i32 + (raw_index / 7) as i32;
        let letter = Letter::from_index(raw_index);
        let natural = (octave + 1) * 12 + letter.chroma();
        let target = self.midi() + semitones;
        PitchToken {
            class: PitchClass::new(letter, (target - natural) as i8),
            octave: octave as i8,
        }
    }
}

impl fmt::Display for PitchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.class, self.octave)
    }
}

impl FromStr for PitchToken {
    type Err = ChordloopError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || ChordloopError::InvalidPitch(s.to_string());
        let letter = s.chars().next().and_then(Letter::from_char).ok_or_else(invalid)?;
        let (accidental, consumed) = parse_accidentals(&s[1..]);
        let octave: i8 = s[1 + consumed..].parse().map_err(|_| invalid())?;
        Ok(Self::new(letter, accidental, octave))
    }
}
