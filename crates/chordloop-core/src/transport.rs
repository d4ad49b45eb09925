//! Transport state and sample/tick conversion

use serde::{Deserialize, Serialize};

use crate::notation::{Ticks, BEATS_PER_MEASURE, PPQ};

/// Transport playback state. There is no paused state: stop tears the
/// session down and the next play starts from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportState {
    #[default]
    Stopped,
    Running,
}

/// Transport position and tempo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transport {
    pub state: TransportState,
    /// Current position in samples
    pub position_samples: u64,
    /// Sample rate for time conversion
    pub sample_rate: u32,
    /// Tempo in BPM
    pub bpm: f64,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            state: TransportState::Stopped,
            position_samples: 0,
            sample_rate: 44100,
            bpm: 120.0,
        }
    }
}

impl Transport {
    pub fn new(sample_rate: u32, bpm: f64) -> Self {
        Self {
            sample_rate,
            bpm,
            ..Default::default()
        }
    }

    pub fn play(&mut self) {
        self.state = TransportState::Running;
        self.position_samples = 0;
    }

    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.position_samples = 0;
    }

    pub fn is_running(&self) -> bool {
        self.state == TransportState::Running
    }

    /// Position in seconds
    pub fn position_secs(&self) -> f64 {
        self.position_samples as f64 / self.sample_rate as f64
    }

    /// Samples per tick at current tempo
    pub fn samples_per_tick(&self) -> f64 {
        self.sample_rate as f64 * 60.0 / (self.bpm * PPQ as f64)
    }

    /// Sample index at which a tick falls
    pub fn tick_to_sample(&self, tick: Ticks) -> u64 {
        (tick as f64 * self.sample_rate as f64 * 60.0 / (self.bpm * PPQ as f64)).round() as u64
    }

    /// Current position in whole ticks
    pub fn position_ticks(&self) -> Ticks {
        (self.position_samples as f64 / self.samples_per_tick()) as Ticks
    }

    /// Exclusive tick bound for the next `frames` samples: every tick below
    /// it lands on a sample before the end of the block
    pub fn ticks_before(&self, frames: u64) -> Ticks {
        let end = self.position_samples + frames;
        (end as f64 * self.bpm * PPQ as f64 / (self.sample_rate as f64 * 60.0)).ceil() as Ticks
    }

    /// Advance position by given samples
    pub fn advance(&mut self, samples: u64) {
        self.position_samples += samples;
    }

    /// Format position as bars:beats:sixteenths
    pub fn format_position(&self) -> String {
        let ticks = self.position_ticks();
        let sixteenth = PPQ / 4;
        let bars = ticks / (PPQ * BEATS_PER_MEASURE);
        let beats = (ticks / PPQ) % BEATS_PER_MEASURE;
        let sixteenths = (ticks / sixteenth) % 4;
        format!("{bars}:{beats}:{sixteenths}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_per_tick() {
        let t = Transport::new(48000, 120.0);
        // One quarter at 120 BPM is half a second
        assert!((t.samples_per_tick() * PPQ as f64 - 24000.0).abs() < 1e-6);
        assert_eq!(t.tick_to_sample(PPQ), 24000);
    }

    #[test]
    fn test_ticks_before() {
        let mut t = Transport::new(48000, 120.0);
        // 125 samples per tick
        assert_eq!(t.ticks_before(0), 0);
        assert_eq!(t.ticks_before(1), 1);
        assert_eq!(t.ticks_before(125), 1);
        assert_eq!(t.ticks_before(126), 2);
        t.advance(250);
        assert_eq!(t.ticks_before(1), 3);
    }

    #[test]
    fn test_play_stop_resets_position() {
        let mut t = Transport::default();
        t.play();
        t.advance(1000);
        assert!(t.is_running());
        t.stop();
        assert_eq!(t.position_samples, 0);
        assert!(!t.is_running());
    }

    #[test]
    fn test_format_position() {
        let mut t = Transport::new(48000, 120.0);
        t.advance(t.tick_to_sample(PPQ * 5 + PPQ / 2));
        assert_eq!(t.format_position(), "1:1:2");
    }
}
