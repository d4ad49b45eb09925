//! chordloop-services: Scheduling, session control, synthesis and audio output

pub mod audio_effects;
pub mod audio_engine;
pub mod audio_io;
pub mod clock;
pub mod driver;
pub mod recording_engine;
pub mod registry;
pub mod render;
pub mod sequencer;
pub mod session;
pub mod voice;

pub use audio_effects::{AudioEffect, EffectChain, EffectParam, MonoSynth};
pub use audio_effects::{AutoFilterEffect, DelayEffect, DistortionEffect, GainEffect, ReverbEffect};
pub use audio_engine::{AudioEngine, NativeEngine, SynthId};
pub use audio_io::{default_device_info, AudioOutputError, LivePlayer, LiveStatus, RealtimeOutputStream};
pub use clock::{Firing, ScheduleId, Scheduler, SequenceClock};
pub use driver::{ProgressionDriver, TickReport};
pub use recording_engine::{RecordingEngine, TriggerRecord};
pub use registry::VoiceRegistry;
pub use render::{render_ticks, render_to_wav, RenderError, RenderStats};
pub use sequencer::{SequenceSpec, SequencerState, VoiceSequencer};
pub use session::{AdvanceReport, Session, SessionCommand, SessionError};
pub use voice::{Voice, VoiceId};
