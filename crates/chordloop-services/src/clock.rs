//! Tick-based scheduler for repeating note sequences and loop callbacks

use std::collections::BTreeMap;
use std::fmt;

use chordloop_core::notation::Ticks;
use chordloop_core::PitchToken;
use tracing::trace;

use crate::audio_engine::SynthId;

/// Handle to a scheduled sequence or loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduleId(u64);

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sched#{}", self.0)
    }
}

/// Repeating schedules on a shared tick timeline.
///
/// A schedule whose start is already behind `now` is aligned to the first
/// point on its `start + k * interval` grid that is not behind `now`.
/// Intervals below one tick are clamped to one.
pub trait Scheduler {
    fn now(&self) -> Ticks;
    /// Fire `events[step % len]` on `target` every `interval` ticks
    fn schedule_sequence(
        &mut self,
        target: SynthId,
        events: Vec<PitchToken>,
        interval: Ticks,
        start: Ticks,
    ) -> ScheduleId;
    fn schedule_loop(&mut self, interval: Ticks, start: Ticks) -> ScheduleId;
    /// Replace a sequence's events without touching its step counter
    fn set_events(&mut self, id: ScheduleId, events: Vec<PitchToken>) -> bool;
    /// Returns false when the schedule was already gone
    fn dispose(&mut self, id: ScheduleId) -> bool;
    fn is_active(&self, id: ScheduleId) -> bool;
    fn active_count(&self) -> usize;
}

/// One due callback popped from the clock
#[derive(Debug, Clone, PartialEq)]
pub enum Firing {
    Loop {
        id: ScheduleId,
        time: Ticks,
    },
    Note {
        id: ScheduleId,
        target: SynthId,
        pitch: PitchToken,
        time: Ticks,
        /// Length of the step that produced the note
        duration: Ticks,
    },
}

impl Firing {
    pub fn time(&self) -> Ticks {
        match self {
            Self::Loop { time, .. } | Self::Note { time, .. } => *time,
        }
    }
}

#[derive(Debug)]
enum Pattern {
    Loop,
    Sequence { target: SynthId, events: Vec<PitchToken> },
}

impl Pattern {
    // loops sort ahead of notes at equal times
    fn rank(&self) -> u8 {
        match self {
            Self::Loop => 0,
            Self::Sequence { .. } => 1,
        }
    }
}

#[derive(Debug)]
struct Entry {
    pattern: Pattern,
    interval: Ticks,
    next: Ticks,
    step: u64,
}

/// In-process [`Scheduler`] polled by the session
#[derive(Debug, Default)]
pub struct SequenceClock {
    entries: BTreeMap<ScheduleId, Entry>,
    now: Ticks,
    next_id: u64,
}

impl SequenceClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop the earliest firing strictly before `until`.
    ///
    /// Sequences with no events advance their step silently. When nothing
    /// is due the clock moves to `until` and `None` is returned.
    pub fn next_due(&mut self, until: Ticks) -> Option<Firing> {
        loop {
            let Some(id) = self.earliest_before(until) else {
                self.now = self.now.max(until);
                return None;
            };
            let entry = self.entries.get_mut(&id)?;
            let time = entry.next;
            let step = entry.step;
            entry.next += entry.interval;
            entry.step += 1;
            self.now = self.now.max(time);

            match &entry.pattern {
                Pattern::Loop => return Some(Firing::Loop { id, time }),
                Pattern::Sequence { target, events } => {
                    if events.is_empty() {
                        trace!(%id, time, "Empty sequence step");
                        continue;
                    }
                    let pitch = events[(step % events.len() as u64) as usize];
                    return Some(Firing::Note {
                        id,
                        target: *target,
                        pitch,
                        time,
                        duration: entry.interval,
                    });
                }
            }
        }
    }

    /// Drop every schedule and rewind to tick zero
    pub fn reset(&mut self) {
        self.entries.clear();
        self.now = 0;
    }

    /// Tick of the next firing of one schedule
    pub fn next_fire(&self, id: ScheduleId) -> Option<Ticks> {
        self.entries.get(&id).map(|e| e.next)
    }

    pub fn interval(&self, id: ScheduleId) -> Option<Ticks> {
        self.entries.get(&id).map(|e| e.interval)
    }

    pub fn events(&self, id: ScheduleId) -> Option<&[PitchToken]> {
        match &self.entries.get(&id)?.pattern {
            Pattern::Sequence { events, .. } => Some(events),
            Pattern::Loop => None,
        }
    }

    fn earliest_before(&self, until: Ticks) -> Option<ScheduleId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.next < until)
            .min_by_key(|(id, e)| (e.next, e.pattern.rank(), **id))
            .map(|(id, _)| *id)
    }

    fn insert(&mut self, pattern: Pattern, interval: Ticks, start: Ticks) -> ScheduleId {
        self.next_id += 1;
        let id = ScheduleId(self.next_id);
        let interval = interval.max(1);
        let next = first_fire(start, interval, self.now);
        trace!(%id, interval, next, "Scheduled");
        self.entries.insert(
            id,
            Entry {
                pattern,
                interval,
                next,
                step: 0,
            },
        );
        id
    }
}

fn first_fire(start: Ticks, interval: Ticks, now: Ticks) -> Ticks {
    if start >= now {
        return start;
    }
    start + (now - start).div_ceil(interval) * interval
}

impl Scheduler for SequenceClock {
    fn now(&self) -> Ticks {
        self.now
    }

    fn schedule_sequence(
        &mut self,
        target: SynthId,
        events: Vec<PitchToken>,
        interval: Ticks,
        start: Ticks,
    ) -> ScheduleId {
        self.insert(Pattern::Sequence { target, events }, interval, start)
    }

    fn schedule_loop(&mut self, interval: Ticks, start: Ticks) -> ScheduleId {
        self.insert(Pattern::Loop, interval, start)
    }

    fn set_events(&mut self, id: ScheduleId, events: Vec<PitchToken>) -> bool {
        match self.entries.get_mut(&id).map(|e| &mut e.pattern) {
            Some(Pattern::Sequence { events: current, .. }) => {
                *current = events;
                true
            }
            _ => false,
        }
    }

    fn dispose(&mut self, id: ScheduleId) -> bool {
        self.entries.remove(&id).is_some()
    }

    fn is_active(&self, id: ScheduleId) -> bool {
        self.entries.contains_key(&id)
    }

    fn active_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pitches(names: &[&str]) -> Vec<PitchToken> {
        names.iter().map(|n| n.parse().unwrap()).collect()
    }

    fn drain(clock: &mut SequenceClock, until: Ticks) -> Vec<Firing> {
        std::iter::from_fn(|| clock.next_due(until)).collect()
    }

    #[test]
    fn test_sequence_cycles_events() {
        let mut clock = SequenceClock::new();
        let id = clock.schedule_sequence(SynthId(1), pitches(&["C4", "E4", "G4"]), 10, 0);
        let fired: Vec<String> = drain(&mut clock, 50)
            .into_iter()
            .map(|f| match f {
                Firing::Note { pitch, .. } => pitch.to_string(),
                Firing::Loop { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(fired, ["C4", "E4", "G4", "C4", "E4"]);
        assert_eq!(clock.now(), 50);
        assert_eq!(clock.next_fire(id), Some(50));
    }

    #[test]
    fn test_until_is_exclusive() {
        let mut clock = SequenceClock::new();
        clock.schedule_loop(10, 0);
        assert_eq!(drain(&mut clock, 10).len(), 1);
        assert_eq!(drain(&mut clock, 11).len(), 1);
        assert_eq!(drain(&mut clock, 11).len(), 0);
    }

    #[test]
    fn test_loops_fire_before_notes_at_same_time() {
        let mut clock = SequenceClock::new();
        let seq = clock.schedule_sequence(SynthId(1), pitches(&["C4"]), 10, 0);
        let lp = clock.schedule_loop(10, 0);
        let fired = drain(&mut clock, 1);
        assert_eq!(fired.len(), 2);
        assert!(matches!(fired[0], Firing::Loop { id, .. } if id == lp));
        assert!(matches!(fired[1], Firing::Note { id, .. } if id == seq));
    }

    #[test]
    fn test_equal_times_fire_in_creation_order() {
        let mut clock = SequenceClock::new();
        let a = clock.schedule_sequence(SynthId(1), pitches(&["C4"]), 5, 0);
        let b = clock.schedule_sequence(SynthId(2), pitches(&["D4"]), 5, 0);
        let ids: Vec<ScheduleId> = drain(&mut clock, 1)
            .into_iter()
            .map(|f| match f {
                Firing::Note { id, .. } | Firing::Loop { id, .. } => id,
            })
            .collect();
        assert_eq!(ids, [a, b]);
    }

    #[test]
    fn test_late_start_aligns_to_grid() {
        let mut clock = SequenceClock::new();
        drain(&mut clock, 25);
        let id = clock.schedule_sequence(SynthId(1), pitches(&["C4"]), 10, 3);
        assert_eq!(clock.next_fire(id), Some(33));
        let on_grid = clock.schedule_loop(5, 25);
        assert_eq!(clock.next_fire(on_grid), Some(25));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let mut clock = SequenceClock::new();
        let id = clock.schedule_loop(0, 0);
        assert_eq!(clock.interval(id), Some(1));
        assert_eq!(drain(&mut clock, 3).len(), 3);
    }

    #[test]
    fn test_empty_events_advance_silently() {
        let mut clock = SequenceClock::new();
        let id = clock.schedule_sequence(SynthId(1), Vec::new(), 10, 0);
        assert!(drain(&mut clock, 30).is_empty());

        // step kept counting while silent
        assert!(clock.set_events(id, pitches(&["C4", "E4", "G4", "B4"])));
        let fired = drain(&mut clock, 31);
        assert!(matches!(&fired[..], [Firing::Note { pitch, time: 30, .. }] if pitch.to_string() == "B4"));
    }

    #[test]
    fn test_dispose_and_set_events() {
        let mut clock = SequenceClock::new();
        let seq = clock.schedule_sequence(SynthId(1), pitches(&["C4"]), 10, 0);
        let lp = clock.schedule_loop(10, 0);
        assert_eq!(clock.active_count(), 2);
        assert!(!clock.set_events(lp, pitches(&["C4"])));
        assert!(clock.dispose(seq));
        assert!(!clock.dispose(seq));
        assert!(!clock.is_active(seq));
        assert!(!clock.set_events(seq, pitches(&["D4"])));
        assert_eq!(clock.active_count(), 1);
    }

    #[test]
    fn test_reset_rewinds() {
        let mut clock = SequenceClock::new();
        clock.schedule_loop(10, 0);
        drain(&mut clock, 100);
        clock.reset();
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.active_count(), 0);
    }
}
