//! Chord progression with a monotonically advancing cursor

use serde::{Deserialize, Serialize};

/// The progression the ambient preset cycles through
pub const DEFAULT_PROGRESSION: [&str; 8] = ["Em7", "Am13", "D7", "G7", "C7", "F#dim", "B7", "Em13"];

/// Ordered chord names plus a cursor advanced once per progression tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    chords: Vec<String>,
    #[serde(skip)]
    cursor: u64,
}

impl Default for Progression {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESSION.iter().map(|c| c.to_string()).collect())
    }
}

impl Progression {
    pub fn new(chords: Vec<String>) -> Self {
        Self { chords, cursor: 0 }
    }

    pub fn chords(&self) -> &[String] {
        &self.chords
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    /// Number of ticks taken so far
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Chord the next tick will use (`chords[cursor % len]`)
    pub fn current(&self) -> Option<&str> {
        if self.chords.is_empty() {
            return None;
        }
        let idx = (self.cursor % self.chords.len() as u64) as usize;
        Some(&self.chords[idx])
    }

    /// Take the current chord and move the cursor forward.
    /// An empty progression never advances.
    pub fn advance(&mut self) -> Option<String> {
        let chord = self.current()?.to_string();
        self.cursor += 1;
        Some(chord)
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_chords() -> Progression {
        Progression::new(vec!["Dm7".to_string(), "Em7".to_string()])
    }

    #[test]
    fn test_cycles_through_chords() {
        let mut p = two_chords();
        assert_eq!(p.advance().as_deref(), Some("Dm7"));
        assert_eq!(p.advance().as_deref(), Some("Em7"));
        assert_eq!(p.cursor(), 2);
        assert_eq!(p.advance().as_deref(), Some("Dm7"));
        assert_eq!(p.cursor(), 3);
    }

    #[test]
    fn test_empty_progression_stays_put() {
        let mut p = Progression::new(Vec::new());
        assert!(p.current().is_none());
        assert!(p.advance().is_none());
        assert_eq!(p.cursor(), 0);
    }

    #[test]
    fn test_reset() {
        let mut p = two_chords();
        p.advance();
        p.advance();
        p.advance();
        p.reset();
        assert_eq!(p.cursor(), 0);
        assert_eq!(p.current(), Some("Dm7"));
    }

    #[test]
    fn test_default_progression() {
        let p = Progression::default();
        assert_eq!(p.len(), 8);
        assert_eq!(p.current(), Some("Em7"));
    }
}
