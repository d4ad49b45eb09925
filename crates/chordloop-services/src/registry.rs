//! Ordered set of live voices

use tracing::debug;

use crate::clock::Scheduler;
use crate::voice::{Voice, VoiceId};

#[derive(Debug, Default)]
pub struct VoiceRegistry {
    voices: Vec<Voice>,
}

impl VoiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, voice: Voice) {
        self.voices.push(voice);
    }

    /// Dispose the voice's schedule, then drop it from the registry.
    /// Unknown ids return `None`.
    pub fn remove(&mut self, id: VoiceId, scheduler: &mut dyn Scheduler) -> Option<Voice> {
        let pos = self.voices.iter().position(|v| v.id() == id)?;
        self.voices[pos].dispose(scheduler);
        let voice = self.voices.remove(pos);
        debug!(voice = %id, remaining = self.voices.len(), "Removed voice");
        Some(voice)
    }

    pub fn get(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.iter().find(|v| v.id() == id)
    }

    pub fn get_mut(&mut self, id: VoiceId) -> Option<&mut Voice> {
        self.voices.iter_mut().find(|v| v.id() == id)
    }

    pub fn contains(&self, id: VoiceId) -> bool {
        self.get(id).is_some()
    }

    /// Snapshot of ids in insertion order
    pub fn ids(&self) -> Vec<VoiceId> {
        self.voices.iter().map(Voice::id).collect()
    }

    pub fn for_each(&self, mut f: impl FnMut(&Voice)) {
        self.voices.iter().for_each(|v| f(v));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.voices.iter_mut()
    }

    /// Dispose every voice's schedule, keeping the voices. Returns how many
    /// schedules were live.
    pub fn dispose_all(&mut self, scheduler: &mut dyn Scheduler) -> usize {
        self.voices
            .iter_mut()
            .map(|v| v.dispose(scheduler))
            .filter(|&live| live)
            .count()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}
