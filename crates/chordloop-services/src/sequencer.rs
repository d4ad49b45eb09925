//! Per-voice ownership of exactly one live schedule

use chordloop_core::notation::Ticks;
use chordloop_core::PitchToken;
use tracing::debug;

use crate::audio_engine::SynthId;
use crate::clock::{ScheduleId, Scheduler};

/// Lifecycle of a voice's schedule handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencerState {
    #[default]
    Disposed,
    Active(ScheduleId),
}

/// Everything needed to (re)create a voice's schedule
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceSpec {
    pub target: SynthId,
    pub events: Vec<PitchToken>,
    pub interval: Ticks,
    pub start: Ticks,
}

/// Holds at most one schedule handle for a voice. Every path that replaces
/// the handle disposes the old one first.
#[derive(Debug, Default)]
pub struct VoiceSequencer {
    state: SequencerState,
    generation: u32,
}

impl VoiceSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn handle(&self) -> Option<ScheduleId> {
        match self.state {
            SequencerState::Active(id) => Some(id),
            SequencerState::Disposed => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle().is_some()
    }

    /// Number of schedules this sequencer has created
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn create(&mut self, scheduler: &mut dyn Scheduler, spec: SequenceSpec) -> ScheduleId {
        self.dispose(scheduler);
        let id = scheduler.schedule_sequence(spec.target, spec.events, spec.interval, spec.start);
        self.state = SequencerState::Active(id);
        self.generation += 1;
        id
    }

    /// Push new events into the live schedule. Phase and step are kept.
    pub fn update_events(&self, scheduler: &mut dyn Scheduler, events: Vec<PitchToken>) -> bool {
        match self.state {
            SequencerState::Active(id) => scheduler.set_events(id, events),
            SequencerState::Disposed => false,
        }
    }

    /// Dispose the current schedule, then create its replacement
    pub fn reschedule(&mut self, scheduler: &mut dyn Scheduler, spec: SequenceSpec) -> ScheduleId {
        let old = self.handle();
        let id = self.create(scheduler, spec);
        debug!(?old, new = %id, "Rescheduled sequence");
        id
    }

    /// Safe to call any number of times
    pub fn dispose(&mut self, scheduler: &mut dyn Scheduler) -> bool {
        match std::mem::take(&mut self.state) {
            SequencerState::Active(id) => scheduler.dispose(id),
            SequencerState::Disposed => false,
        }
    }
}
