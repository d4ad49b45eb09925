//! Synth parameters and typed parameter-change events

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::arpeggio::{ArpMode, ARPS};
use crate::error::{ChordloopError, Result};
use crate::notation::{NotationTime, TEMPOS};
use crate::pitch::PitchClass;

pub const SYNTHS: [&str; 4] = ["mono", "pluck", "membrane", "noise"];
pub const OSCILLATORS: [&str; 4] = ["[]", "fm", "am", "fat"];
pub const WAVES: [&str; 4] = ["sine", "square", "sawtooth", "triangle"];
pub const NOTES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Slider ranges for numeric parameters (name, min, max)
pub const NUMERIC_RANGES: [(&str, f32, f32); 7] = [
    ("octave", 0.0, 8.0),
    ("partial", 0.0, 32.0),
    ("volume", -50.0, 50.0),
    ("attack", 0.0, 1.0),
    ("decay", 0.0, 1.0),
    ("sustain", 0.0, 1.0),
    ("release", 0.0, 3.0),
];

pub fn numeric_range(name: &str) -> Option<(f32, f32)> {
    NUMERIC_RANGES
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|&(_, min, max)| (min, max))
}

// ============================================================================
// Synth kind
// ============================================================================

/// Sound source of a voice. Only `Mono` uses the oscillator and wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthKind {
    #[default]
    Mono,
    /// Plucked string (Karplus-Strong)
    Pluck,
    /// Sine kick with a falling pitch
    Membrane,
    /// Brown noise; the pitch is ignored
    Noise,
}

impl SynthKind {
    pub const ALL: [SynthKind; 4] = [Self::Mono, Self::Pluck, Self::Membrane, Self::Noise];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mono => "mono",
            Self::Pluck => "pluck",
            Self::Membrane => "membrane",
            Self::Noise => "noise",
        }
    }
}

impl FromStr for SynthKind {
    type Err = ChordloopError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ChordloopError::invalid_param("synth", s))
    }
}

// ============================================================================
// Oscillator
// ============================================================================

/// Oscillator modifier prefix (`[]` = plain wave)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OscillatorKind {
    #[serde(rename = "[]")]
    Basic,
    #[serde(rename = "fm")]
    Fm,
    #[serde(rename = "am")]
    Am,
    #[default]
    #[serde(rename = "fat")]
    Fat,
}

impl OscillatorKind {
    pub const ALL: [OscillatorKind; 4] = [Self::Basic, Self::Fm, Self::Am, Self::Fat];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Basic => "[]",
            Self::Fm => "fm",
            Self::Am => "am",
            Self::Fat => "fat",
        }
    }
}

impl FromStr for OscillatorKind {
    type Err = ChordloopError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ChordloopError::invalid_param("oscillator", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wave {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Wave {
    pub const ALL: [Wave; 4] = [Self::Sine, Self::Square, Self::Sawtooth, Self::Triangle];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sine => "sine",
            Self::Square => "square",
            Self::Sawtooth => "sawtooth",
            Self::Triangle => "triangle",
        }
    }
}

impl FromStr for Wave {
    type Err = ChordloopError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|w| w.name() == s)
            .ok_or_else(|| ChordloopError::invalid_param("wave", s))
    }
}

// ============================================================================
// Synth parameters
// ============================================================================

/// ADSR envelope, times in seconds and sustain as a level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack: 0.1,
            decay: 0.1,
            sustain: 0.8,
            release: 0.8,
        }
    }
}

/// Sound parameters for one voice's synth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthParams {
    #[serde(rename = "synth")]
    pub kind: SynthKind,
    pub oscillator: OscillatorKind,
    pub wave: Wave,
    /// Number of partials; 0 means the plain waveform
    pub partial: u8,
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(rename = "volume")]
    pub volume_db: f32,
    /// Auto-panner period
    #[serde(rename = "pandur")]
    pub pan_duration: NotationTime,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            kind: SynthKind::Mono,
            oscillator: OscillatorKind::Fat,
            wave: Wave::Sine,
            partial: 4,
            envelope: Envelope::default(),
            volume_db: 10.0,
            pan_duration: NotationTime::measures(8),
        }
    }
}

impl SynthParams {
    /// Oscillator type string, e.g. `fatsine4` or `square`
    pub fn oscillator_type(&self) -> String {
        let prefix = match self.oscillator {
            OscillatorKind::Basic => "",
            other => other.name(),
        };
        if self.partial == 0 {
            format!("{prefix}{}", self.wave.name())
        } else {
            format!("{prefix}{}{}", self.wave.name(), self.partial)
        }
    }

    pub fn apply(&mut self, change: &SynthParamChange) {
        match *change {
            SynthParamChange::Kind(kind) => self.kind = kind,
            SynthParamChange::Oscillator(kind) => self.oscillator = kind,
            SynthParamChange::Wave(wave) => self.wave = wave,
            SynthParamChange::Partial(n) => self.partial = n,
            SynthParamChange::Attack(v) => self.envelope.attack = v,
            SynthParamChange::Decay(v) => self.envelope.decay = v,
            SynthParamChange::Sustain(v) => self.envelope.sustain = v,
            SynthParamChange::Release(v) => self.envelope.release = v,
            SynthParamChange::Volume(db) => self.volume_db = db,
            SynthParamChange::PanDuration(t) => self.pan_duration = t,
        }
    }
}

/// A change that lands on the synth itself
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SynthParamChange {
    Kind(SynthKind),
    Oscillator(OscillatorKind),
    Wave(Wave),
    Partial(u8),
    Attack(f32),
    Decay(f32),
    Sustain(f32),
    Release(f32),
    Volume(f32),
    PanDuration(NotationTime),
}

// ============================================================================
// Parameter changes
// ============================================================================

/// A UI parameter change for one voice
#[derive(Debug, Clone, PartialEq)]
pub enum ParamChange {
    Chord(String),
    Note(String),
    Octave(i8),
    Arp(ArpMode),
    Tempo(NotationTime),
    Synth(SynthParamChange),
}

/// Which update path a change takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRoute {
    /// New events pushed into the running schedule
    Retune,
    /// Old schedule disposed, new one created
    Reschedule,
    /// Applied to the synth in place
    Synth,
}

impl ParamChange {
    pub fn route(&self) -> ParamRoute {
        match self {
            Self::Chord(_) | Self::Note(_) | Self::Octave(_) => ParamRoute::Retune,
            Self::Arp(_) | Self::Tempo(_) => ParamRoute::Reschedule,
            Self::Synth(SynthParamChange::PanDuration(_)) => ParamRoute::Reschedule,
            Self::Synth(_) => ParamRoute::Synth,
        }
    }

    /// Translate a slider event into a typed change.
    ///
    /// Catalog-backed sliders accept either the item (`"4n"`) or its index
    /// (`"13"`); numeric sliders are clamped to their range.
    pub fn from_control(name: &str, raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let change = match name {
            "chord" => {
                if raw.is_empty() {
                    return Err(ChordloopError::invalid_param(name, raw));
                }
                Self::Chord(raw.to_string())
            }
            "note" => {
                let note = lookup(raw, &NOTES).unwrap_or(raw);
                note.parse::<PitchClass>()
                    .map_err(|_| ChordloopError::invalid_param(name, raw))?;
                Self::Note(note.to_string())
            }
            "arp" => Self::Arp(lookup(raw, &ARPS).unwrap_or(raw).parse()?),
            "tempo" => Self::Tempo(duration(name, raw)?),
            "pandur" => Self::Synth(SynthParamChange::PanDuration(duration(name, raw)?)),
            "synth" => Self::Synth(SynthParamChange::Kind(lookup(raw, &SYNTHS).unwrap_or(raw).parse()?)),
            "oscillator" => Self::Synth(SynthParamChange::Oscillator(
                lookup(raw, &OSCILLATORS).unwrap_or(raw).parse()?,
            )),
            "wave" => Self::Synth(SynthParamChange::Wave(lookup(raw, &WAVES).unwrap_or(raw).parse()?)),
            "octave" => Self::Octave(numeric(name, raw)?.round() as i8),
            "partial" => Self::Synth(SynthParamChange::Partial(numeric(name, raw)?.round() as u8)),
            "volume" => Self::Synth(SynthParamChange::Volume(numeric(name, raw)?)),
            "attack" => Self::Synth(SynthParamChange::Attack(numeric(name, raw)?)),
            "decay" => Self::Synth(SynthParamChange::Decay(numeric(name, raw)?)),
            "sustain" => Self::Synth(SynthParamChange::Sustain(numeric(name, raw)?)),
            "release" => Self::Synth(SynthParamChange::Release(numeric(name, raw)?)),
            _ => return Err(ChordloopError::UnknownParam(name.to_string())),
        };
        Ok(change)
    }

    /// Reject step and pan lengths of zero
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Tempo(time) if time.is_zero() => Err(ChordloopError::invalid_param("tempo", time)),
            Self::Synth(SynthParamChange::PanDuration(time)) if time.is_zero() => {
                Err(ChordloopError::invalid_param("pandur", time))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ParamChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chord(c) => write!(f, "chord={c}"),
            Self::Note(n) => write!(f, "note={n}"),
            Self::Octave(o) => write!(f, "octave={o}"),
            Self::Arp(a) => write!(f, "arp={a}"),
            Self::Tempo(t) => write!(f, "tempo={t}"),
            Self::Synth(s) => write!(f, "{s:?}"),
        }
    }
}

/// A non-zero tempo catalog duration
fn duration(name: &str, raw: &str) -> Result<NotationTime> {
    let time: NotationTime = lookup(raw, &TEMPOS).unwrap_or(raw).parse()?;
    if time.is_zero() {
        return Err(ChordloopError::invalid_param(name, raw));
    }
    Ok(time)
}

/// Catalog item by exact value or by slider index
fn lookup<'a>(raw: &str, catalog: &[&'a str]) -> Option<&'a str> {
    if let Some(item) = catalog.iter().find(|item| **item == raw) {
        return Some(*item);
    }
    raw.parse::<usize>().ok().and_then(|idx| catalog.get(idx).copied())
}

fn numeric(name: &str, raw: &str) -> Result<f32> {
    let value: f32 = raw
        .parse()
        .map_err(|_| ChordloopError::invalid_param(name, raw))?;
    if !value.is_finite() {
        return Err(ChordloopError::invalid_param(name, raw));
    }
    let (min, max) = numeric_range(name).unwrap_or((f32::MIN, f32::MAX));
    Ok(value.clamp(min, max))
}
