//! Voice and session settings, plus the built-in ambient preset

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::arpeggio::ArpMode;
use crate::notation::NotationTime;
use crate::params::{Envelope, OscillatorKind, ParamChange, SynthKind, SynthParams, Wave};
use crate::progression::DEFAULT_PROGRESSION;
use crate::theory::ChordSpec;

/// Everything a voice is made from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub chord: String,
    pub note: String,
    pub octave: i8,
    pub arp: ArpMode,
    /// Step length of the voice's sequence
    pub tempo: NotationTime,
    /// Offset from session start before the first step
    pub start: NotationTime,
    #[serde(flatten)]
    pub synth: SynthParams,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            chord: "minor".to_string(),
            note: "G".to_string(),
            octave: 2,
            arp: ArpMode::Up,
            tempo: NotationTime::measures(4),
            start: NotationTime::measures(0),
            synth: SynthParams::default(),
        }
    }
}

impl VoiceSettings {
    pub fn chord_spec(&self) -> ChordSpec {
        ChordSpec::new(self.chord.clone(), self.note.clone(), self.octave)
    }

    /// Store a parameter change
    pub fn apply(&mut self, change: &ParamChange) {
        match change {
            ParamChange::Chord(chord) => self.chord = chord.clone(),
            ParamChange::Note(note) => self.note = note.clone(),
            ParamChange::Octave(octave) => self.octave = *octave,
            ParamChange::Arp(arp) => self.arp = *arp,
            ParamChange::Tempo(tempo) => self.tempo = *tempo,
            ParamChange::Synth(synth) => self.synth.apply(synth),
        }
    }

    /// Replace zero step or pan lengths with the defaults
    pub fn validated(mut self) -> Self {
        if self.tempo.is_zero() {
            warn!(tempo = %self.tempo, "Zero voice tempo, using default");
            self.tempo = Self::default().tempo;
        }
        if self.synth.pan_duration.is_zero() {
            warn!(pandur = %self.synth.pan_duration, "Zero pan duration, using default");
            self.synth.pan_duration = SynthParams::default().pan_duration;
        }
        self
    }
}

/// Session-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub bpm: f64,
    pub progression: Vec<String>,
    /// Period of the progression advance; coarser than any voice tempo
    pub progression_interval: NotationTime,
    /// Master reverb room size, 0..1
    pub reverb: f32,
    pub sample_rate: u32,
}

impl SessionSettings {
    /// Replace values the transport cannot run with by the defaults
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            warn!(bpm = self.bpm, "Invalid session tempo, using default");
            self.bpm = defaults.bpm;
        }
        if self.sample_rate == 0 {
            warn!("Zero sample rate, using default");
            self.sample_rate = defaults.sample_rate;
        }
        if self.progression_interval.is_zero() {
            warn!(interval = %self.progression_interval, "Zero progression interval, using default");
            self.progression_interval = defaults.progression_interval;
        }
        self.reverb = if self.reverb.is_nan() {
            defaults.reverb
        } else {
            self.reverb.clamp(0.0, 1.0)
        };
        self
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            progression: DEFAULT_PROGRESSION.iter().map(|c| c.to_string()).collect(),
            progression_interval: NotationTime::measures(32),
            reverb: 0.5,
            sample_rate: 44100,
        }
    }
}

fn sound(kind: SynthKind, wave: Wave, oscillator: OscillatorKind, envelope: Envelope, volume_db: f32) -> SynthParams {
    SynthParams {
        kind,
        oscillator,
        wave,
        partial: 0,
        envelope,
        volume_db,
        pan_duration: NotationTime::measures(8),
    }
}

fn preset_voice(octave: i8, tempo: NotationTime, start: NotationTime, synth: SynthParams) -> VoiceSettings {
    VoiceSettings {
        chord: "Em7".to_string(),
        note: "E".to_string(),
        octave,
        arp: ArpMode::Up,
        tempo,
        start,
        synth,
    }
}

/// Eleven staggered voices over octaves 1..6: membrane and noise drums, two
/// plucks and a stack of mono leads. The slow ones start at once, the fast
/// high ones enter after 8 and 16 measures.
pub fn ambient_preset() -> Vec<VoiceSettings> {
    let m = NotationTime::measures;
    let n = NotationTime::note;
    let pluck = Envelope { attack: 0.005, decay: 0.3, sustain: 0.2, release: 2.0 };
    let drum = Envelope { attack: 0.001, decay: 0.2, sustain: 0.0, release: 0.1 };
    let pad = Envelope { attack: 1.0, decay: 1.0, sustain: 0.7, release: 1.0 };
    let lead = Envelope::default();

    use OscillatorKind::{Basic, Fat};
    use SynthKind::{Membrane, Mono, Noise, Pluck};
    vec![
        preset_voice(1, m(2), m(0), sound(Membrane, Wave::Sine, Basic, drum, -15.0)),
        preset_voice(1, m(3), m(0), sound(Noise, Wave::Sine, Basic, drum, -40.0)),
        preset_voice(4, m(1), m(0), sound(Pluck, Wave::Sine, Basic, pluck, -15.0)),
        preset_voice(2, n(2), m(0), sound(Pluck, Wave::Sine, Basic, pluck, -15.0)),
        preset_voice(6, n(12), m(16), sound(Mono, Wave::Square, Basic, pad, -30.0)),
        preset_voice(3, n(3), m(16), sound(Mono, Wave::Square, Basic, pad, -30.0)),
        preset_voice(5, n(6), m(16), sound(Mono, Wave::Square, Basic, pad, -30.0)),
        preset_voice(5, n(16), m(8), sound(Mono, Wave::Sine, Basic, lead, -24.0)),
        preset_voice(4, n(8), m(8), sound(Mono, Wave::Sawtooth, Fat, lead, -28.0)),
        preset_voice(4, m(2), m(0), sound(Mono, Wave::Triangle, Fat, pad, -30.0)),
        preset_voice(2, m(1), m(0), sound(Mono, Wave::Triangle, Fat, pad, -15.0)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SynthParamChange;

    #[test]
    fn test_voice_settings_from_toml() {
        let voice: VoiceSettings = toml::from_str(
            r#"
            chord = "maj7"
            note = "C"
            tempo = "8n"
            arp = "repeat"
            attack = 0.5
            volume = -6.0
            pandur = "2m"
            oscillator = "[]"
            synth = "pluck"
            "#,
        )
        .unwrap();
        assert_eq!(voice.chord, "maj7");
        assert_eq!(voice.octave, 2);
        assert_eq!(voice.tempo, NotationTime::note(8));
        assert_eq!(voice.arp, ArpMode::Repeat);
        assert_eq!(voice.synth.envelope.attack, 0.5);
        assert_eq!(voice.synth.envelope.release, 0.8);
        assert_eq!(voice.synth.volume_db, -6.0);
        assert_eq!(voice.synth.kind, SynthKind::Pluck);
        assert_eq!(voice.synth.pan_duration, NotationTime::measures(2));
        assert_eq!(voice.synth.oscillator, OscillatorKind::Basic);
    }

    #[test]
    fn test_apply_changes() {
        let mut voice = VoiceSettings::default();
        voice.apply(&ParamChange::Note("D".into()));
        voice.apply(&ParamChange::Tempo(NotationTime::note(16)));
        voice.apply(&ParamChange::Synth(SynthParamChange::Volume(-3.0)));
        assert_eq!(voice.chord_spec(), ChordSpec::new("minor", "D", 2));
        assert_eq!(voice.tempo, NotationTime::note(16));
        assert_eq!(voice.synth.volume_db, -3.0);
    }

    #[test]
    fn test_validated_replaces_unusable_values() {
        let session = SessionSettings {
            bpm: 0.0,
            sample_rate: 0,
            progression_interval: NotationTime::measures(0),
            reverb: 3.0,
            ..SessionSettings::default()
        }
        .validated();
        assert_eq!(session.bpm, 120.0);
        assert_eq!(session.sample_rate, 44100);
        assert_eq!(session.progression_interval, NotationTime::measures(32));
        assert_eq!(session.reverb, 1.0);

        let nan = SessionSettings { bpm: f64::NAN, ..SessionSettings::default() }.validated();
        assert_eq!(nan.bpm, 120.0);

        let voice = VoiceSettings {
            tempo: NotationTime::measures(0),
            start: NotationTime::measures(0),
            synth: SynthParams {
                pan_duration: NotationTime::measures(0),
                ..SynthParams::default()
            },
            ..VoiceSettings::default()
        }
        .validated();
        assert_eq!(voice.tempo, NotationTime::measures(4));
        assert_eq!(voice.start, NotationTime::measures(0));
        assert_eq!(voice.synth.pan_duration, NotationTime::measures(8));
    }

    #[test]
    fn test_ambient_preset_is_finer_than_progression() {
        let session = SessionSettings::default();
        let preset = ambient_preset();
        assert_eq!(preset.len(), 11);
        for kind in SynthKind::ALL {
            assert!(preset.iter().any(|v| v.synth.kind == kind), "{kind:?}");
        }
        for voice in &preset {
            assert!(voice.tempo.ticks() < session.progression_interval.ticks());
        }
    }
}
