//! Native stereo effects for the master bus

use std::f64::consts::TAU;
use std::fmt;

use chordloop_core::NotationTime;
use fundsp::hacker::*;

use super::{AudioEffect, EffectParam};

/// Output trim
#[derive(Debug)]
pub struct GainEffect {
    gain_db: f32,
    gain_linear: f32,
    bypassed: bool,
}

impl GainEffect {
    pub fn new(gain_db: f32) -> Self {
        Self {
            gain_db,
            gain_linear: db_amp(gain_db) as f32,
            bypassed: false,
        }
    }
}

impl AudioEffect for GainEffect {
    fn name(&self) -> &str { "Gain" }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for sample in left.iter_mut().chain(right.iter_mut()) {
            *sample *= self.gain_linear;
        }
    }

    fn set_param(&mut self, name: &str, value: f32) {
        if name != "gain" {
            return;
        }
        self.gain_db = value;
        self.gain_linear = db_amp(value) as f32;
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![EffectParam::new("gain", self.gain_db, -60.0, 24.0, "dB")]
    }

    fn set_bypass(&mut self, bypass: bool) { self.bypassed = bypass; }
    fn is_bypassed(&self) -> bool { self.bypassed }
}

/// Soft-clipping waveshaper
#[derive(Debug)]
pub struct DistortionEffect {
    amount: f32,
    mix: f32,
    bypassed: bool,
}

impl DistortionEffect {
    pub fn new(amount: f32, mix: f32) -> Self {
        Self {
            amount: amount.clamp(0.0, 1.0),
            mix: mix.clamp(0.0, 1.0),
            bypassed: false,
        }
    }

    fn shape(&self, x: f32) -> f32 {
        let drive = 1.0 + self.amount * 20.0;
        (x * drive).tanh() / drive.tanh()
    }
}

impl AudioEffect for DistortionEffect {
    fn name(&self) -> &str { "Distortion" }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for sample in left.iter_mut().chain(right.iter_mut()) {
            let wet = self.shape(*sample);
            *sample = *sample * (1.0 - self.mix) + wet * self.mix;
        }
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "amount" => self.amount = value.clamp(0.0, 1.0),
            "mix" => self.mix = value.clamp(0.0, 1.0),
            _ => {}
        }
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![
            EffectParam::new("amount", self.amount, 0.0, 1.0, ""),
            EffectParam::new("mix", self.mix, 0.0, 1.0, ""),
        ]
    }

    fn set_bypass(&mut self, bypass: bool) { self.bypassed = bypass; }
    fn is_bypassed(&self) -> bool { self.bypassed }
}

/// Stereo feedback delay. When built with [`DelayEffect::synced`] the delay
/// time follows the session tempo.
pub struct DelayEffect {
    delay_ms: f32,
    sync: Option<NotationTime>,
    feedback: f32,
    mix: f32,
    buffers: [Vec<f32>; 2],
    write_pos: usize,
    sample_rate: f32,
    max_delay_ms: f32,
    bypassed: bool,
}

impl DelayEffect {
    pub fn new(delay_ms: f32, feedback: f32, mix: f32, sample_rate: f32) -> Self {
        let max_delay_ms = 2000.0;
        let max_samples = (max_delay_ms * sample_rate / 1000.0) as usize;
        Self {
            delay_ms: delay_ms.clamp(1.0, max_delay_ms),
            sync: None,
            feedback: feedback.clamp(0.0, 0.95),
            mix: mix.clamp(0.0, 1.0),
            buffers: [vec![0.0; max_samples], vec![0.0; max_samples]],
            write_pos: 0,
            sample_rate,
            max_delay_ms,
            bypassed: false,
        }
    }

    pub fn synced(time: NotationTime, feedback: f32, mix: f32, sample_rate: f32, bpm: f64) -> Self {
        let mut delay = Self::new(1.0, feedback, mix, sample_rate);
        delay.sync = Some(time);
        delay.set_bpm(bpm);
        delay
    }
}

impl fmt::Debug for DelayEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayEffect")
            .field("delay_ms", &self.delay_ms)
            .field("sync", &self.sync)
            .field("feedback", &self.feedback)
            .field("mix", &self.mix)
            .field("bypassed", &self.bypassed)
            .finish()
    }
}

impl AudioEffect for DelayEffect {
    fn name(&self) -> &str { "Delay" }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let len = self.buffers[0].len();
        if len < 2 {
            return;
        }
        let delay_samples = (self.delay_ms * self.sample_rate / 1000.0) as usize;
        let delay_samples = delay_samples.clamp(1, len - 1);

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let read_pos = (self.write_pos + len - delay_samples) % len;
            for (sample, buffer) in [l, r].into_iter().zip(self.buffers.iter_mut()) {
                let delayed = buffer[read_pos];
                buffer[self.write_pos] = *sample + delayed * self.feedback;
                *sample = *sample * (1.0 - self.mix) + delayed * self.mix;
            }
            self.write_pos = (self.write_pos + 1) % len;
        }
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "delay" => {
                self.sync = None;
                self.delay_ms = value.clamp(1.0, self.max_delay_ms);
            }
            "feedback" => self.feedback = value.clamp(0.0, 0.95),
            "mix" => self.mix = value.clamp(0.0, 1.0),
            _ => {}
        }
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![
            EffectParam::new("delay", self.delay_ms, 1.0, self.max_delay_ms, "ms"),
            EffectParam::new("feedback", self.feedback, 0.0, 0.95, ""),
            EffectParam::new("mix", self.mix, 0.0, 1.0, ""),
        ]
    }

    fn set_bypass(&mut self, bypass: bool) { self.bypassed = bypass; }
    fn is_bypassed(&self) -> bool { self.bypassed }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        if (sample_rate - self.sample_rate).abs() < 1.0 {
            return;
        }
        self.sample_rate = sample_rate;
        let max_samples = (self.max_delay_ms * sample_rate / 1000.0) as usize;
        self.buffers = [vec![0.0; max_samples], vec![0.0; max_samples]];
        self.write_pos = 0;
    }

    fn set_bpm(&mut self, bpm: f64) {
        if let Some(time) = self.sync {
            let ms = (time.seconds(bpm) * 1000.0) as f32;
            self.delay_ms = ms.clamp(1.0, self.max_delay_ms);
        }
    }
}

/// Schroeder-style reverb: four feedback delay lines per channel, the right
/// channel slightly longer for width
pub struct ReverbEffect {
    room_size: f32,
    damping: f32,
    mix: f32,
    delays: [Vec<Vec<f32>>; 2],
    positions: [Vec<usize>; 2],
    sample_rate: f32,
    bypassed: bool,
}

const STEREO_SPREAD: f32 = 1.037;

impl ReverbEffect {
    pub fn new(room_size: f32, damping: f32, mix: f32, sample_rate: f32) -> Self {
        let mut effect = Self {
            room_size: room_size.clamp(0.0, 1.0),
            damping: damping.clamp(0.0, 1.0),
            mix: mix.clamp(0.0, 1.0),
            delays: [Vec::new(), Vec::new()],
            positions: [Vec::new(), Vec::new()],
            sample_rate,
            bypassed: false,
        };
        effect.rebuild_delays();
        effect
    }

    fn rebuild_delays(&mut self) {
        let base_delay = self.room_size * 50.0 + 10.0;
        for (channel, spread) in [1.0, STEREO_SPREAD].into_iter().enumerate() {
            self.delays[channel] = [1.0, 1.13, 1.27, 1.41]
                .iter()
                .map(|&ratio| {
                    let samples = (base_delay * ratio * spread * self.sample_rate / 1000.0) as usize;
                    vec![0.0; Ord::max(samples, 1)]
                })
                .collect();
            self.positions[channel] = vec![0; self.delays[channel].len()];
        }
    }
}

impl fmt::Debug for ReverbEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReverbEffect")
            .field("room_size", &self.room_size)
            .field("damping", &self.damping)
            .field("mix", &self.mix)
            .field("bypassed", &self.bypassed)
            .finish()
    }
}

impl AudioEffect for ReverbEffect {
    fn name(&self) -> &str { "Reverb" }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let feedback = 0.7 * (1.0 - self.damping * 0.4);

        for (channel, samples) in [left, right].into_iter().enumerate() {
            let delays = &mut self.delays[channel];
            let positions = &mut self.positions[channel];
            for sample in samples.iter_mut() {
                let dry = *sample;
                let mut wet = 0.0;
                for (delay_buf, pos) in delays.iter_mut().zip(positions.iter_mut()) {
                    let delayed = delay_buf[*pos];
                    wet += delayed;
                    delay_buf[*pos] = dry + delayed * feedback;
                    *pos = (*pos + 1) % delay_buf.len();
                }
                wet /= delays.len() as f32;
                *sample = dry * (1.0 - self.mix) + wet * self.mix;
            }
        }
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "room_size" => {
                self.room_size = value.clamp(0.0, 1.0);
                self.rebuild_delays();
            }
            "damping" => self.damping = value.clamp(0.0, 1.0),
            "mix" => self.mix = value.clamp(0.0, 1.0),
            _ => {}
        }
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![
            EffectParam::new("room_size", self.room_size, 0.0, 1.0, ""),
            EffectParam::new("damping", self.damping, 0.0, 1.0, ""),
            EffectParam::new("mix", self.mix, 0.0, 1.0, ""),
        ]
    }

    fn set_bypass(&mut self, bypass: bool) { self.bypassed = bypass; }
    fn is_bypassed(&self) -> bool { self.bypassed }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        if (sample_rate - self.sample_rate).abs() < 1.0 {
            return;
        }
        self.sample_rate = sample_rate;
        self.rebuild_delays();
    }
}

// cutoff is retuned once per this many samples
const FILTER_UPDATE_INTERVAL: usize = 32;

/// Low-pass filter swept by a slow sine LFO
pub struct AutoFilterEffect {
    rate_hz: f32,
    base_hz: f32,
    octaves: f32,
    lfo_phase: f64,
    countdown: usize,
    filters: [An<FixedSvf<f64, LowpassMode<f64>>>; 2],
    sample_rate: f32,
    bypassed: bool,
}

impl AutoFilterEffect {
    pub fn new(rate_hz: f32, base_hz: f32, octaves: f32, sample_rate: f32) -> Self {
        let mut filters = [lowpass_hz(base_hz, 0.707), lowpass_hz(base_hz, 0.707)];
        for filter in &mut filters {
            filter.set_sample_rate(sample_rate as f64);
        }
        Self {
            rate_hz,
            base_hz,
            octaves,
            lfo_phase: 0.0,
            countdown: 0,
            filters,
            sample_rate,
            bypassed: false,
        }
    }

    fn cutoff(&self) -> f32 {
        let lfo = 0.5 + 0.5 * (self.lfo_phase * TAU).sin() as f32;
        let nyquist = self.sample_rate * 0.45;
        (self.base_hz * 2f32.powf(lfo * self.octaves)).min(nyquist)
    }
}

impl fmt::Debug for AutoFilterEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoFilterEffect")
            .field("rate_hz", &self.rate_hz)
            .field("base_hz", &self.base_hz)
            .field("octaves", &self.octaves)
            .field("bypassed", &self.bypassed)
            .finish()
    }
}

impl AudioEffect for AutoFilterEffect {
    fn name(&self) -> &str { "Auto Filter" }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let step = self.rate_hz as f64 / self.sample_rate as f64;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            if self.countdown == 0 {
                let cutoff = self.cutoff();
                for filter in &mut self.filters {
                    filter.set(Setting::center(cutoff));
                }
                self.countdown = FILTER_UPDATE_INTERVAL;
            }
            self.countdown -= 1;
            self.lfo_phase = (self.lfo_phase + step).fract();

            for (sample, filter) in [l, r].into_iter().zip(self.filters.iter_mut()) {
                let output = filter.tick(&Frame::from([*sample]));
                *sample = output[0];
            }
        }
    }

    fn set_param(&mut self, name: &str, value: f32) {
        match name {
            "rate" => self.rate_hz = value.clamp(0.01, 20.0),
            "base" => self.base_hz = value.clamp(20.0, 20000.0),
            "octaves" => self.octaves = value.clamp(0.0, 6.0),
            _ => return,
        }
        self.countdown = 0;
    }

    fn get_params(&self) -> Vec<EffectParam> {
        vec![
            EffectParam::new("rate", self.rate_hz, 0.01, 20.0, "Hz"),
            EffectParam::new("base", self.base_hz, 20.0, 20000.0, "Hz"),
            EffectParam::new("octaves", self.octaves, 0.0, 6.0, ""),
        ]
    }

    fn set_bypass(&mut self, bypass: bool) { self.bypassed = bypass; }
    fn is_bypassed(&self) -> bool { self.bypassed }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for filter in &mut self.filters {
            filter.set_sample_rate(sample_rate as f64);
        }
        self.countdown = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_db() {
        let mut gain = GainEffect::new(-6.0);
        let mut left = vec![1.0f32; 4];
        let mut right = vec![1.0f32; 4];
        gain.process(&mut left, &mut right);
        assert!((left[0] - 0.501).abs() < 0.01);
        assert_eq!(left, right);
    }

    #[test]
    fn test_synced_delay_follows_tempo() {
        let mut delay = DelayEffect::synced(NotationTime::note(8), 0.3, 0.5, 44100.0, 120.0);
        assert!((delay.delay_ms - 250.0).abs() < 1e-3);
        delay.set_bpm(60.0);
        assert!((delay.delay_ms - 500.0).abs() < 1e-3);
        delay.set_param("delay", 100.0);
        delay.set_bpm(120.0);
        assert!((delay.delay_ms - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_delay_echoes_impulse() {
        let mut delay = DelayEffect::new(1.0, 0.0, 1.0, 1000.0);
        let mut left = vec![0.0f32; 4];
        let mut right = vec![0.0f32; 4];
        left[0] = 1.0;
        delay.process(&mut left, &mut right);
        assert_eq!(left, [0.0, 1.0, 0.0, 0.0]);
        assert!(right.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_distortion_is_bounded() {
        let mut dist = DistortionEffect::new(1.0, 1.0);
        let mut left = vec![10.0f32, -10.0, 0.0];
        let mut right = left.clone();
        dist.process(&mut left, &mut right);
        assert!(left.iter().all(|s| s.abs() <= 1.0 + 1e-6));
        assert_eq!(left[2], 0.0);
    }

    #[test]
    fn test_reverb_room_size_rebuilds_lines() {
        let mut reverb = ReverbEffect::new(0.0, 0.5, 0.5, 44100.0);
        let short = reverb.delays[0][0].len();
        reverb.set_param("room_size", 1.0);
        assert!(reverb.delays[0][0].len() > short);
        assert!(reverb.delays[1][0].len() > reverb.delays[0][0].len());
    }
}
