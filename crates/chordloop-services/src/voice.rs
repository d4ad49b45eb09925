//! A voice: one synth, its settings, and its sequencer

use std::fmt;

use chordloop_core::{build_sequence, ArpMode, ChordDictionary, ChordSpec, NotationTime, ParamChange, ParamRoute, PitchToken, VoiceSettings};
use tracing::debug;

use crate::audio_engine::SynthId;
use crate::clock::{ScheduleId, Scheduler};
use crate::sequencer::{SequenceSpec, VoiceSequencer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

#[derive(Debug)]
pub struct Voice {
    id: VoiceId,
    synth: SynthId,
    settings: VoiceSettings,
    /// Chord pushed by the progression; cleared when the user picks a chord
    progression_chord: Option<String>,
    sequencer: VoiceSequencer,
}

impl Voice {
    pub fn new(id: VoiceId, synth: SynthId, settings: VoiceSettings) -> Self {
        Self {
            id,
            synth,
            settings,
            progression_chord: None,
            sequencer: VoiceSequencer::new(),
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn synth(&self) -> SynthId {
        self.synth
    }

    pub fn settings(&self) -> &VoiceSettings {
        &self.settings
    }

    pub fn sequencer(&self) -> &VoiceSequencer {
        &self.sequencer
    }

    pub fn progression_chord(&self) -> Option<&str> {
        self.progression_chord.as_deref()
    }

    /// Chord spec the voice currently plays
    pub fn chord_spec(&self) -> ChordSpec {
        let spec = self.settings.chord_spec();
        match &self.progression_chord {
            Some(chord) => spec.with_chord(chord),
            None => spec,
        }
    }

    pub fn build_events(&self, dict: &dyn ChordDictionary) -> Vec<PitchToken> {
        build_sequence(dict, &self.chord_spec(), self.settings.arp)
    }

    fn sequence_spec(&self, dict: &dyn ChordDictionary) -> SequenceSpec {
        SequenceSpec {
            target: self.synth,
            events: self.build_events(dict),
            interval: self.settings.tempo.ticks(),
            start: self.settings.start.ticks(),
        }
    }

    /// Create the voice's schedule, replacing any live one
    pub fn schedule(&mut self, scheduler: &mut dyn Scheduler, dict: &dyn ChordDictionary) -> ScheduleId {
        let spec = self.sequence_spec(dict);
        self.sequencer.create(scheduler, spec)
    }

    /// Rebuild events from the current settings and push them in place
    pub fn retune(&mut self, scheduler: &mut dyn Scheduler, dict: &dyn ChordDictionary) -> bool {
        let events = self.build_events(dict);
        self.sequencer.update_events(scheduler, events)
    }

    /// Switch to a progression chord
    pub fn follow_chord(&mut self, chord: &str, scheduler: &mut dyn Scheduler, dict: &dyn ChordDictionary) -> bool {
        self.progression_chord = Some(chord.to_string());
        self.retune(scheduler, dict)
    }

    pub fn retempo(
        &mut self,
        tempo: NotationTime,
        scheduler: &mut dyn Scheduler,
        dict: &dyn ChordDictionary,
    ) -> Option<ScheduleId> {
        self.settings.tempo = tempo;
        self.reschedule(scheduler, dict)
    }

    pub fn change_arpeggio(
        &mut self,
        arp: ArpMode,
        scheduler: &mut dyn Scheduler,
        dict: &dyn ChordDictionary,
    ) -> Option<ScheduleId> {
        self.settings.arp = arp;
        self.reschedule(scheduler, dict)
    }

    // Disposed voices only store the new settings; the next play picks them up
    fn reschedule(&mut self, scheduler: &mut dyn Scheduler, dict: &dyn ChordDictionary) -> Option<ScheduleId> {
        if !self.sequencer.is_active() {
            return None;
        }
        let spec = self.sequence_spec(dict);
        Some(self.sequencer.reschedule(scheduler, spec))
    }

    /// Store a change and take its update path. Synth-side effects are the
    /// caller's job.
    pub fn apply(&mut self, change: &ParamChange, scheduler: &mut dyn Scheduler, dict: &dyn ChordDictionary) -> ParamRoute {
        match change {
            ParamChange::Tempo(tempo) => {
                self.retempo(*tempo, scheduler, dict);
            }
            ParamChange::Arp(arp) => {
                self.change_arpeggio(*arp, scheduler, dict);
            }
            _ => {
                if matches!(change, ParamChange::Chord(_)) {
                    self.progression_chord = None;
                }
                self.settings.apply(change);
                match change.route() {
                    ParamRoute::Retune => {
                        self.retune(scheduler, dict);
                    }
                    ParamRoute::Reschedule => {
                        self.reschedule(scheduler, dict);
                    }
                    ParamRoute::Synth => {}
                }
            }
        }
        debug!(voice = %self.id, %change, "Applied change");
        change.route()
    }

    pub fn dispose(&mut self, scheduler: &mut dyn Scheduler) -> bool {
        self.sequencer.dispose(scheduler)
    }
}
