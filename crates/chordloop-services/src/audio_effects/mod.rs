//! Master effects chain and the synth voices that feed it

mod native;
pub mod native_instruments;

pub use native::{AutoFilterEffect, DelayEffect, DistortionEffect, GainEffect, ReverbEffect};
pub use native_instruments::MonoSynth;

use std::fmt::Debug;

use chordloop_core::NotationTime;

/// Stereo effect that processes a block in place
pub trait AudioEffect: Send + Debug {
    fn name(&self) -> &str;
    fn process(&mut self, left: &mut [f32], right: &mut [f32]);
    fn set_param(&mut self, name: &str, value: f32);
    fn get_params(&self) -> Vec<EffectParam>;
    fn set_bypass(&mut self, bypass: bool);
    fn is_bypassed(&self) -> bool;
    /// Update sample rate for effects that depend on it
    fn set_sample_rate(&mut self, _sample_rate: f32) {}
    /// Update tempo for tempo-synced effects
    fn set_bpm(&mut self, _bpm: f64) {}
}

#[derive(Debug, Clone)]
pub struct EffectParam {
    pub name: String,
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub unit: String,
}

impl EffectParam {
    pub fn new(name: &str, value: f32, min: f32, max: f32, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            value,
            min,
            max,
            unit: unit.to_string(),
        }
    }
}

/// Chain of audio effects processed in order
#[derive(Debug, Default)]
pub struct EffectChain {
    effects: Vec<Box<dyn AudioEffect>>,
    bypass_all: bool,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distortion, eighth-note delay, reverb, slow auto-filter, trim
    pub fn master(sample_rate: f32, bpm: f64) -> Self {
        let mut chain = Self::new();
        chain.add(Box::new(DistortionEffect::new(0.5, 0.1)));
        chain.add(Box::new(DelayEffect::synced(NotationTime::note(8), 0.5, 0.2, sample_rate, bpm)));
        chain.add(Box::new(ReverbEffect::new(0.5, 0.5, 0.3, sample_rate)));
        chain.add(Box::new(AutoFilterEffect::new(0.125, 1200.0, 2.0, sample_rate)));
        chain.add(Box::new(GainEffect::new(-6.0)));
        chain
    }

    pub fn add(&mut self, effect: Box<dyn AudioEffect>) {
        self.effects.push(effect);
    }

    pub fn remove(&mut self, index: usize) -> Option<Box<dyn AudioEffect>> {
        if index >= self.effects.len() {
            return None;
        }
        Some(self.effects.remove(index))
    }

    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        if self.bypass_all {
            return;
        }
        for effect in &mut self.effects {
            if !effect.is_bypassed() {
                effect.process(left, right);
            }
        }
    }

    /// Set a parameter on every effect with the given name
    pub fn set_param(&mut self, effect: &str, param: &str, value: f32) -> bool {
        let mut found = false;
        for e in self.effects.iter_mut().filter(|e| e.name() == effect) {
            e.set_param(param, value);
            found = true;
        }
        found
    }

    pub fn find(&self, effect: &str) -> Option<&dyn AudioEffect> {
        self.effects.iter().find(|e| e.name() == effect).map(|e| e.as_ref())
    }

    pub fn set_bypass_all(&mut self, bypass: bool) {
        self.bypass_all = bypass;
    }

    pub fn is_bypass_all(&self) -> bool {
        self.bypass_all
    }

    pub fn effects(&self) -> &[Box<dyn AudioEffect>] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        for effect in &mut self.effects {
            effect.set_sample_rate(sample_rate);
        }
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        for effect in &mut self.effects {
            effect.set_bpm(bpm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(effect: &dyn AudioEffect, name: &str) -> f32 {
        effect
            .get_params()
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.value)
            .unwrap()
    }

    #[test]
    fn test_master_chain_set_param() {
        let mut chain = EffectChain::master(44100.0, 120.0);
        assert_eq!(chain.len(), 5);
        assert!(chain.set_param("Reverb", "room_size", 0.9));
        assert_eq!(param(chain.find("Reverb").unwrap(), "room_size"), 0.9);
        assert!(!chain.set_param("Chorus", "rate", 1.0));
    }

    #[test]
    fn test_bypass_all_leaves_signal() {
        let mut chain = EffectChain::master(44100.0, 120.0);
        chain.set_bypass_all(true);
        let mut left = vec![0.5f32; 64];
        let mut right = vec![-0.5f32; 64];
        chain.process(&mut left, &mut right);
        assert!(left.iter().all(|s| *s == 0.5));
        assert!(right.iter().all(|s| *s == -0.5));
    }

    #[test]
    fn test_chain_stays_finite() {
        let mut chain = EffectChain::master(44100.0, 120.0);
        let mut left: Vec<f32> = (0..4096).map(|i| ((i as f32) * 0.05).sin()).collect();
        let mut right = left.clone();
        chain.process(&mut left, &mut right);
        assert!(left.iter().chain(right.iter()).all(|s| s.is_finite() && s.abs() < 4.0));
    }
}
