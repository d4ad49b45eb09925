//! Monophonic synth voice (oscillator, plucked string, membrane or noise)
//! with ADSR and autopanner

use std::collections::VecDeque;
use std::f64::consts::{FRAC_PI_2, TAU};

use chordloop_core::{OscillatorKind, SynthKind, SynthParamChange, SynthParams, Wave};
use fundsp::hacker::db_amp;

/// Detune of the outer "fat" oscillators, in cents
const FAT_SPREAD_CENTS: f64 = 12.0;
const FM_HARMONICITY: f64 = 2.0;
const FM_INDEX: f64 = 1.5;
const AM_HARMONICITY: f64 = 1.5;
/// Feedback gain of the plucked string loop
const PLUCK_RESONANCE: f64 = 0.995;
/// Octaves above the note where the membrane sweep starts
const MEMBRANE_OCTAVES: f64 = 4.0;
/// Time constant of the membrane pitch fall, in seconds
const MEMBRANE_PITCH_DECAY: f64 = 0.05;
const BROWN_LEAK: f64 = 0.02;
/// Autopanner sweep depth around centre, 0..0.5
const PAN_DEPTH: f64 = 0.4;
/// Longest block `process` renders in one call
pub const MAX_BLOCK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone, Copy)]
struct PendingNote {
    start: u64,
    freq: f64,
    length: u64,
}

/// One synth per voice; a new note retriggers from the current level
pub struct MonoSynth {
    params: SynthParams,
    sample_rate: f32,
    bpm: f64,
    gain: f32,

    pending: VecDeque<PendingNote>,
    freq: f64,
    phases: [f64; 3],
    mod_phase: f64,
    pan_phase: f64,
    /// Seconds since the last note-on
    note_age: f64,
    string: Vec<f64>,
    string_pos: usize,
    brown: f64,

    stage: Stage,
    level: f64,
    release_step: f64,
    gate_remaining: u64,

    output_left: Vec<f32>,
    output_right: Vec<f32>,
}

impl std::fmt::Debug for MonoSynth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonoSynth")
            .field("kind", &self.params.kind)
            .field("oscillator", &self.params.oscillator_type())
            .field("sample_rate", &self.sample_rate)
            .field("stage", &self.stage)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl MonoSynth {
    pub fn new(params: SynthParams, sample_rate: f32) -> Self {
        let gain = db_amp(params.volume_db) as f32;
        Self {
            params,
            sample_rate,
            bpm: 120.0,
            gain,
            pending: VecDeque::new(),
            freq: 0.0,
            phases: [0.0; 3],
            mod_phase: 0.0,
            pan_phase: 0.0,
            note_age: 0.0,
            string: Vec::new(),
            string_pos: 0,
            brown: 0.0,
            stage: Stage::Idle,
            level: 0.0,
            release_step: 0.0,
            gate_remaining: 0,
            output_left: vec![0.0; MAX_BLOCK_SIZE],
            output_right: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    pub fn params(&self) -> &SynthParams {
        &self.params
    }

    /// True while a note sounds or waits to start
    pub fn is_sounding(&self) -> bool {
        self.stage != Stage::Idle || !self.pending.is_empty()
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm;
    }

    pub fn set_param(&mut self, change: &SynthParamChange) {
        self.params.apply(change);
        if let SynthParamChange::Volume(db) = change {
            self.gain = db_amp(*db) as f32;
        }
    }

    /// Queue a note at an absolute sample index
    pub fn queue_note(&mut self, start: u64, freq: f64, length: u64) {
        let at = self.pending.partition_point(|n| n.start <= start);
        self.pending.insert(at, PendingNote { start, freq, length });
    }

    pub fn all_notes_off(&mut self) {
        self.pending.clear();
        self.stage = Stage::Idle;
        self.level = 0.0;
        self.gate_remaining = 0;
    }

    /// Render `num_frames` starting at absolute sample `block_start`
    pub fn process(&mut self, num_frames: usize, block_start: u64) -> (&[f32], &[f32]) {
        let frames = num_frames.min(MAX_BLOCK_SIZE);
        self.output_left[..frames].fill(0.0);
        self.output_right[..frames].fill(0.0);

        if !self.is_sounding() {
            self.advance_pan(frames);
            return (&self.output_left[..frames], &self.output_right[..frames]);
        }

        let dt = 1.0 / self.sample_rate as f64;
        for frame_idx in 0..frames {
            let now = block_start + frame_idx as u64;
            while let Some(note) = self.pending.front().copied() {
                if note.start > now {
                    break;
                }
                self.pending.pop_front();
                self.note_on(note.freq, note.length);
            }

            let env = self.tick_envelope(dt);
            let sample = if self.stage == Stage::Idle {
                0.0
            } else {
                self.tick_source(dt) * env
            };

            let pan = 0.5 + PAN_DEPTH * (self.pan_phase * TAU).sin();
            self.pan_phase = (self.pan_phase + dt / self.pan_period()).fract();
            let out = sample as f32 * self.gain;
            self.output_left[frame_idx] = out * (pan * FRAC_PI_2).cos() as f32;
            self.output_right[frame_idx] = out * (pan * FRAC_PI_2).sin() as f32;
        }

        (&self.output_left[..frames], &self.output_right[..frames])
    }

    fn pan_period(&self) -> f64 {
        self.params.pan_duration.seconds(self.bpm).max(0.01)
    }

    // keep the sweep moving while silent
    fn advance_pan(&mut self, frames: usize) {
        let elapsed = frames as f64 / self.sample_rate as f64;
        self.pan_phase = (self.pan_phase + elapsed / self.pan_period()).fract();
    }

    fn note_on(&mut self, freq: f64, length: u64) {
        self.freq = freq;
        if self.stage == Stage::Idle {
            self.phases = [0.0; 3];
            self.mod_phase = 0.0;
        }
        self.stage = Stage::Attack;
        self.gate_remaining = length.max(1);
        self.note_age = 0.0;
        if self.params.kind == SynthKind::Pluck {
            self.excite_string(freq);
        }
    }

    // fill one period of the string with a noise burst
    fn excite_string(&mut self, freq: f64) {
        let len = ((self.sample_rate as f64 / freq.max(1.0)).round() as usize).max(2);
        self.string.clear();
        self.string.extend((0..len).map(|_| fastrand::f64() * 2.0 - 1.0));
        self.string_pos = 0;
    }

    fn tick_envelope(&mut self, dt: f64) -> f64 {
        let env = self.params.envelope;
        if self.gate_remaining > 0 {
            self.gate_remaining -= 1;
            if self.gate_remaining == 0 && self.stage != Stage::Idle {
                self.stage = Stage::Release;
                self.release_step = self.level * dt / (env.release as f64).max(dt);
            }
        }

        let sustain = env.sustain as f64;
        match self.stage {
            Stage::Idle => self.level = 0.0,
            Stage::Attack => {
                self.level += dt / (env.attack as f64).max(dt);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                }
            }
            Stage::Decay => {
                self.level -= (1.0 - sustain) * dt / (env.decay as f64).max(dt);
                if self.level <= sustain {
                    self.level = sustain;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => self.level = sustain,
            Stage::Release => {
                self.level -= self.release_step;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                }
            }
        }
        self.level
    }

    fn tick_source(&mut self, dt: f64) -> f64 {
        let sample = match self.params.kind {
            SynthKind::Mono => self.tick_oscillator(dt),
            SynthKind::Pluck => self.tick_string(),
            SynthKind::Membrane => self.tick_membrane(dt),
            SynthKind::Noise => self.tick_brown(),
        };
        self.note_age += dt;
        sample
    }

    fn tick_string(&mut self) -> f64 {
        let len = self.string.len();
        if len < 2 {
            return 0.0;
        }
        let current = self.string[self.string_pos];
        let next = self.string[(self.string_pos + 1) % len];
        self.string[self.string_pos] = (current + next) * 0.5 * PLUCK_RESONANCE;
        self.string_pos = (self.string_pos + 1) % len;
        current
    }

    fn tick_membrane(&mut self, dt: f64) -> f64 {
        let sweep = MEMBRANE_OCTAVES * (-self.note_age / MEMBRANE_PITCH_DECAY).exp();
        let freq = self.freq * 2f64.powf(sweep);
        let s = (self.phases[0] * TAU).sin();
        self.phases[0] = (self.phases[0] + freq * dt).fract();
        s
    }

    fn tick_brown(&mut self) -> f64 {
        let white = fastrand::f64() * 2.0 - 1.0;
        self.brown = (self.brown + BROWN_LEAK * white) / (1.0 + BROWN_LEAK);
        (self.brown * 3.5).clamp(-1.0, 1.0)
    }

    fn tick_oscillator(&mut self, dt: f64) -> f64 {
        let wave = self.params.wave;
        let partials = self.params.partial;
        match self.params.oscillator {
            OscillatorKind::Basic => {
                let s = waveform(wave, partials, self.phases[0]);
                self.phases[0] = (self.phases[0] + self.freq * dt).fract();
                s
            }
            OscillatorKind::Fat => {
                let mut sum = 0.0;
                for (i, cents) in [0.0, -FAT_SPREAD_CENTS, FAT_SPREAD_CENTS].into_iter().enumerate() {
                    let freq = self.freq * 2f64.powf(cents / 1200.0);
                    sum += waveform(wave, partials, self.phases[i]);
                    self.phases[i] = (self.phases[i] + freq * dt).fract();
                }
                sum / 3.0
            }
            OscillatorKind::Fm => {
                let modulator = (self.mod_phase * TAU).sin() * FM_INDEX / TAU;
                let s = waveform(wave, partials, (self.phases[0] + modulator).rem_euclid(1.0));
                self.phases[0] = (self.phases[0] + self.freq * dt).fract();
                self.mod_phase = (self.mod_phase + self.freq * FM_HARMONICITY * dt).fract();
                s
            }
            OscillatorKind::Am => {
                let modulator = 0.5 + 0.5 * (self.mod_phase * TAU).sin();
                let s = waveform(wave, partials, self.phases[0]) * modulator;
                self.phases[0] = (self.phases[0] + self.freq * dt).fract();
                self.mod_phase = (self.mod_phase + self.freq * AM_HARMONICITY * dt).fract();
                s
            }
        }
    }
}

/// One sample of `wave` at `phase` (0..1). `partials > 0` builds the wave
/// from that many harmonics instead of the ideal shape.
fn waveform(wave: Wave, partials: u8, phase: f64) -> f64 {
    if partials == 0 {
        return match wave {
            Wave::Sine => (phase * TAU).sin(),
            Wave::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Wave::Sawtooth => 2.0 * phase - 1.0,
            Wave::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        };
    }

    let mut sum = 0.0;
    let mut norm = 0.0;
    for n in 1..=partials as u32 {
        let k = n as f64;
        let (harmonic, amp) = match wave {
            Wave::Sine => (k, 1.0 / k),
            Wave::Square => (2.0 * k - 1.0, 1.0 / (2.0 * k - 1.0)),
            Wave::Sawtooth => (k, 1.0 / k),
            Wave::Triangle => {
                let h = 2.0 * k - 1.0;
                let sign = if n % 2 == 0 { -1.0 } else { 1.0 };
                (h, sign / (h * h))
            }
        };
        sum += amp * (phase * harmonic * TAU).sin();
        norm += f64::abs(amp);
    }
    sum / norm
}
