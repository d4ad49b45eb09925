//! Synthesis engine seam and the built-in native engine

use std::collections::BTreeMap;
use std::fmt;

use chordloop_core::{PitchToken, SynthParamChange, SynthParams};
use tracing::{debug, trace};

use crate::audio_effects::native_instruments::{MonoSynth, MAX_BLOCK_SIZE};
use crate::audio_effects::EffectChain;

/// Handle to one synth voice inside an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SynthId(pub u64);

impl fmt::Display for SynthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "synth#{}", self.0)
    }
}

/// What the sequencer needs from a synthesis engine.
///
/// Times are seconds since session start; durations are seconds.
pub trait AudioEngine: Send {
    fn create_synth(&mut self, params: &SynthParams) -> SynthId;
    /// Returns false if the synth was already gone
    fn dispose_synth(&mut self, id: SynthId) -> bool;
    fn is_synth_alive(&self, id: SynthId) -> bool;
    fn set_synth_param(&mut self, id: SynthId, change: &SynthParamChange) -> bool;
    fn trigger_attack_release(&mut self, id: SynthId, pitch: PitchToken, duration: f64, time: f64);

    fn set_bpm(&mut self, _bpm: f64) {}
    fn set_sample_rate(&mut self, _sample_rate: u32) {}
    fn set_reverb(&mut self, _room_size: f32) {}
    /// Silence everything that is sounding or queued
    fn release_all(&mut self) {}
}

/// Engine rendering monophonic native synths through a master effect chain
pub struct NativeEngine {
    synths: BTreeMap<SynthId, MonoSynth>,
    next_id: u64,
    sample_rate: u32,
    bpm: f64,
    master: EffectChain,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl NativeEngine {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            synths: BTreeMap::new(),
            next_id: 1,
            sample_rate,
            bpm: 120.0,
            master: EffectChain::master(sample_rate as f32, 120.0),
            left: Vec::new(),
            right: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn master(&self) -> &EffectChain {
        &self.master
    }

    pub fn master_mut(&mut self) -> &mut EffectChain {
        &mut self.master
    }

    pub fn synth(&self, id: SynthId) -> Option<&MonoSynth> {
        self.synths.get(&id)
    }

    pub fn synth_count(&self) -> usize {
        self.synths.len()
    }

    /// Render one block into an interleaved buffer. `block_start` is the
    /// absolute sample index of the first frame.
    pub fn render(&mut self, out: &mut [f32], channels: usize, block_start: u64) {
        let channels = channels.max(1);
        let mut start = block_start;
        // synths render at most MAX_BLOCK_SIZE frames per call
        for chunk in out.chunks_mut(MAX_BLOCK_SIZE * channels) {
            self.render_chunk(chunk, channels, start);
            start += (chunk.len() / channels) as u64;
        }
    }

    fn render_chunk(&mut self, out: &mut [f32], channels: usize, block_start: u64) {
        let frames = out.len() / channels;

        self.left.clear();
        self.left.resize(frames, 0.0);
        self.right.clear();
        self.right.resize(frames, 0.0);

        for synth in self.synths.values_mut() {
            let (l, r) = synth.process(frames, block_start);
            for i in 0..frames {
                self.left[i] += l[i];
                self.right[i] += r[i];
            }
        }

        self.master.process(&mut self.left, &mut self.right);

        for (i, frame) in out.chunks_mut(channels).enumerate().take(frames) {
            let (l, r) = (self.left[i], self.right[i]);
            match frame {
                [mono] => *mono = (l + r) * 0.5,
                [left, right, rest @ ..] => {
                    *left = l;
                    *right = r;
                    rest.fill((l + r) * 0.5);
                }
                [] => {}
            }
        }
    }
}

impl AudioEngine for NativeEngine {
    fn create_synth(&mut self, params: &SynthParams) -> SynthId {
        let id = SynthId(self.next_id);
        self.next_id += 1;
        let mut synth = MonoSynth::new(params.clone(), self.sample_rate as f32);
        synth.set_bpm(self.bpm);
        self.synths.insert(id, synth);
        debug!(%id, oscillator = %params.oscillator_type(), "Created synth");
        id
    }

    fn dispose_synth(&mut self, id: SynthId) -> bool {
        self.synths.remove(&id).is_some()
    }

    fn is_synth_alive(&self, id: SynthId) -> bool {
        self.synths.contains_key(&id)
    }

    fn set_synth_param(&mut self, id: SynthId, change: &SynthParamChange) -> bool {
        let Some(synth) = self.synths.get_mut(&id) else {
            return false;
        };
        synth.set_param(change);
        true
    }

    fn trigger_attack_release(&mut self, id: SynthId, pitch: PitchToken, duration: f64, time: f64) {
        let Some(synth) = self.synths.get_mut(&id) else {
            return;
        };
        let sr = self.sample_rate as f64;
        let start = (time.max(0.0) * sr).round() as u64;
        let length = (duration.max(0.0) * sr).round() as u64;
        trace!(%id, %pitch, start, length, "Queued note");
        synth.queue_note(start, pitch.frequency(), length);
    }

    fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm;
        for synth in self.synths.values_mut() {
            synth.set_bpm(bpm);
        }
        self.master.set_bpm(bpm);
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == self.sample_rate {
            return;
        }
        self.sample_rate = sample_rate;
        for synth in self.synths.values_mut() {
            synth.set_sample_rate(sample_rate as f32);
        }
        self.master.set_sample_rate(sample_rate as f32);
        debug!(sample_rate, "Engine sample rate changed");
    }

    fn set_reverb(&mut self, room_size: f32) {
        self.master.set_param("Reverb", "room_size", room_size);
    }

    fn release_all(&mut self) {
        for synth in self.synths.values_mut() {
            synth.all_notes_off();
        }
    }
}
