//! chordloop-core: Domain types for the chordloop sequencer

pub mod arpeggio;
mod error;
pub mod notation;
pub mod params;
pub mod pitch;
pub mod progression;
pub mod settings;
pub mod theory;
mod transport;

pub use arpeggio::{build_sequence, build_sequence_with_rng, ArpMode, ARPS, REPEAT_COUNT, SHUFFLE_COPIES};
pub use error::{ChordloopError, Result};
pub use notation::{NotationTime, NotationUnit, Ticks, PPQ, TEMPOS, TICKS_PER_MEASURE};
pub use params::{
    Envelope, OscillatorKind, ParamChange, ParamRoute, SynthKind, SynthParamChange, SynthParams, Wave,
    NOTES, OSCILLATORS, SYNTHS, WAVES,
};
pub use pitch::{Letter, PitchClass, PitchToken};
pub use progression::{Progression, DEFAULT_PROGRESSION};
pub use settings::{ambient_preset, SessionSettings, VoiceSettings};
pub use theory::{ChordDictionary, ChordSpec, ChordTable, ChordType, CHORD_TYPES};
pub use transport::{Transport, TransportState};
