//! Engine that records what it is asked to play without producing sound

use std::collections::BTreeMap;

use chordloop_core::{PitchToken, SynthParamChange, SynthParams};

use crate::audio_engine::{AudioEngine, SynthId};

/// One recorded trigger-attack-release call
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRecord {
    pub synth: SynthId,
    pub pitch: PitchToken,
    pub duration: f64,
    pub time: f64,
}

/// Silent engine used for dry runs and tests
#[derive(Debug, Default)]
pub struct RecordingEngine {
    synths: BTreeMap<SynthId, SynthParams>,
    next_id: u64,
    triggers: Vec<TriggerRecord>,
    releases: usize,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triggers(&self) -> &[TriggerRecord] {
        &self.triggers
    }

    /// Recorded triggers for one synth
    pub fn triggers_for(&self, synth: SynthId) -> impl Iterator<Item = &TriggerRecord> + '_ {
        self.triggers.iter().filter(move |t| t.synth == synth)
    }

    pub fn take_triggers(&mut self) -> Vec<TriggerRecord> {
        std::mem::take(&mut self.triggers)
    }

    pub fn params(&self, synth: SynthId) -> Option<&SynthParams> {
        self.synths.get(&synth)
    }

    pub fn live_synths(&self) -> usize {
        self.synths.len()
    }

    /// Number of release-all calls received
    pub fn releases(&self) -> usize {
        self.releases
    }
}

impl AudioEngine for RecordingEngine {
    fn create_synth(&mut self, params: &SynthParams) -> SynthId {
        self.next_id += 1;
        let id = SynthId(self.next_id);
        self.synths.insert(id, params.clone());
        id
    }

    fn dispose_synth(&mut self, id: SynthId) -> bool {
        self.synths.remove(&id).is_some()
    }

    fn is_synth_alive(&self, id: SynthId) -> bool {
        self.synths.contains_key(&id)
    }

    fn set_synth_param(&mut self, id: SynthId, change: &SynthParamChange) -> bool {
        match self.synths.get_mut(&id) {
            Some(params) => {
                params.apply(change);
                true
            }
            None => false,
        }
    }

    fn trigger_attack_release(&mut self, id: SynthId, pitch: PitchToken, duration: f64, time: f64) {
        self.triggers.push(TriggerRecord { synth: id, pitch, duration, time });
    }

    fn release_all(&mut self) {
        self.releases += 1;
    }
}
