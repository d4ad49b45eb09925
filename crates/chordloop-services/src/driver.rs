//! Progression driver: a loop that moves every voice to the next chord

use chordloop_core::{ChordDictionary, NotationTime, Progression};
use tracing::{debug, info};

use crate::clock::{ScheduleId, Scheduler};
use crate::registry::VoiceRegistry;

/// Result of one progression tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Cursor after the tick
    pub cursor: u64,
    pub chord: String,
    pub voices_updated: usize,
}

#[derive(Debug)]
pub struct ProgressionDriver {
    progression: Progression,
    interval: NotationTime,
    loop_id: ScheduleId,
}

impl ProgressionDriver {
    /// Rewind the progression and schedule its loop from tick zero
    pub fn start(mut progression: Progression, interval: NotationTime, scheduler: &mut dyn Scheduler) -> Self {
        progression.reset();
        let loop_id = scheduler.schedule_loop(interval.ticks(), 0);
        info!(chords = progression.len(), %interval, "Progression started");
        Self {
            progression,
            interval,
            loop_id,
        }
    }

    pub fn loop_id(&self) -> ScheduleId {
        self.loop_id
    }

    pub fn owns(&self, id: ScheduleId) -> bool {
        self.loop_id == id
    }

    pub fn interval(&self) -> NotationTime {
        self.interval
    }

    pub fn cursor(&self) -> u64 {
        self.progression.cursor()
    }

    pub fn progression(&self) -> &Progression {
        &self.progression
    }

    /// Chord handed out by the most recent tick
    pub fn last_chord(&self) -> Option<&str> {
        let cursor = self.progression.cursor().checked_sub(1)?;
        let chords = self.progression.chords();
        chords.get((cursor % chords.len() as u64) as usize).map(String::as_str)
    }

    /// Push the current chord to every registered voice and advance.
    /// Voices removed during the tick are skipped.
    pub fn tick(
        &mut self,
        registry: &mut VoiceRegistry,
        scheduler: &mut dyn Scheduler,
        dict: &dyn ChordDictionary,
    ) -> Option<TickReport> {
        let chord = self.progression.advance()?;
        let mut voices_updated = 0;
        for id in registry.ids() {
            let Some(voice) = registry.get_mut(id) else {
                continue;
            };
            if voice.follow_chord(&chord, scheduler, dict) {
                voices_updated += 1;
            }
        }
        debug!(%chord, cursor = self.progression.cursor(), voices_updated, "Progression tick");
        Some(TickReport {
            cursor: self.progression.cursor(),
            chord,
            voices_updated,
        })
    }

    /// Dispose the loop. Returns the progression for reuse.
    pub fn stop(self, scheduler: &mut dyn Scheduler) -> Progression {
        scheduler.dispose(self.loop_id);
        info!(cursor = self.progression.cursor(), "Progression stopped");
        self.progression
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_engine::SynthId;
    use crate::clock::SequenceClock;
    use crate::voice::{Voice, VoiceId};
    use chordloop_core::{ChordTable, VoiceSettings};

    fn progression(chords: &[&str]) -> Progression {
        Progression::new(chords.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn test_tick_pushes_chord_to_voices() {
        let table = ChordTable::new();
        let mut clock = SequenceClock::new();
        let mut registry = VoiceRegistry::new();
        let settings = VoiceSettings {
            octave: 3,
            ..VoiceSettings::default()
        };
        registry.add(Voice::new(VoiceId(1), SynthId(1), settings));
        let seq = registry.get_mut(VoiceId(1)).unwrap().schedule(&mut clock, &table);

        let mut driver = ProgressionDriver::start(progression(&["Dm7", "Em7"]), NotationTime::measures(1), &mut clock);
        let report = driver.tick(&mut registry, &mut clock, &table).unwrap();
        assert_eq!(report.chord, "Dm7");
        assert_eq!(report.cursor, 1);
        assert_eq!(report.voices_updated, 1);
        assert_eq!(driver.last_chord(), Some("Dm7"));

        let events: Vec<String> = clock.events(seq).unwrap().iter().map(|p| p.to_string()).collect();
        assert_eq!(events, ["D3", "F3", "A3", "C4"]);

        let report = driver.tick(&mut registry, &mut clock, &table).unwrap();
        assert_eq!(report.chord, "Em7");
        assert_eq!(report.cursor, 2);
    }

    #[test]
    fn test_empty_progression_never_ticks() {
        let table = ChordTable::new();
        let mut clock = SequenceClock::new();
        let mut registry = VoiceRegistry::new();
        let mut driver = ProgressionDriver::start(Progression::new(Vec::new()), NotationTime::measures(1), &mut clock);
        assert_eq!(driver.tick(&mut registry, &mut clock, &table), None);
        assert_eq!(driver.cursor(), 0);
        assert_eq!(driver.last_chord(), None);
    }

    #[test]
    fn test_stop_disposes_loop() {
        let mut clock = SequenceClock::new();
        let driver = ProgressionDriver::start(progression(&["C"]), NotationTime::measures(2), &mut clock);
        let id = driver.loop_id();
        assert!(clock.is_active(id));
        driver.stop(&mut clock);
        assert!(!clock.is_active(id));
    }
}
