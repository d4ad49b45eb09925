//! Session: owns the engine, the clock, the voices and the progression

use chordloop_core::notation::{ticks_to_seconds, Ticks};
use chordloop_core::{
    ChordDictionary, ChordTable, ChordloopError, ParamChange, ParamRoute, Progression, SessionSettings,
    Transport, VoiceSettings,
};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::audio_engine::AudioEngine;
use crate::clock::{Firing, Scheduler, SequenceClock};
use crate::driver::{ProgressionDriver, TickReport};
use crate::registry::VoiceRegistry;
use crate::voice::{Voice, VoiceId};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Voice not found: {0}")]
    UnknownVoice(VoiceId),

    #[error(transparent)]
    Param(#[from] ChordloopError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Control messages for a session owned by another thread
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Play,
    Stop,
    AddVoice(Box<VoiceSettings>),
    RemoveVoice(VoiceId),
    Apply(VoiceId, ParamChange),
    SetReverb(f32),
    SetBpm(f64),
}

/// What one call to [`Session::advance`] did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceReport {
    pub notes: usize,
    pub ticks: usize,
    /// Notes dropped because their synth was gone
    pub skipped: usize,
}

pub struct Session<E: AudioEngine> {
    engine: E,
    dict: Box<dyn ChordDictionary>,
    clock: SequenceClock,
    registry: VoiceRegistry,
    driver: Option<ProgressionDriver>,
    settings: SessionSettings,
    transport: Transport,
    next_voice_id: u64,
    clock_count: u64,
    skipped_orphans: u64,
    last_tick: Option<TickReport>,
}

impl<E: AudioEngine> Session<E> {
    pub fn new(engine: E, settings: SessionSettings) -> Self {
        Self::with_dictionary(engine, settings, Box::new(ChordTable::new()))
    }

    /// Unusable tempo, rate or interval settings fall back to the defaults
    pub fn with_dictionary(mut engine: E, settings: SessionSettings, dict: Box<dyn ChordDictionary>) -> Self {
        let settings = settings.validated();
        engine.set_sample_rate(settings.sample_rate);
        engine.set_bpm(settings.bpm);
        engine.set_reverb(settings.reverb);
        Self {
            engine,
            dict,
            clock: SequenceClock::new(),
            registry: VoiceRegistry::new(),
            driver: None,
            transport: Transport::new(settings.sample_rate, settings.bpm),
            settings,
            next_voice_id: 0,
            clock_count: 0,
            skipped_orphans: 0,
            last_tick: None,
        }
    }

    /// Start every voice's sequence and the progression from tick zero.
    /// Does nothing while already running.
    pub fn play(&mut self) {
        if self.transport.is_running() {
            return;
        }
        self.clock.reset();
        self.transport.play();
        self.last_tick = None;
        let progression = Progression::new(self.settings.progression.clone());
        self.driver = Some(ProgressionDriver::start(
            progression,
            self.settings.progression_interval,
            &mut self.clock,
        ));
        for voice in self.registry.iter_mut() {
            voice.schedule(&mut self.clock, self.dict.as_ref());
        }
        info!(voices = self.registry.len(), bpm = self.settings.bpm, "Session playing");
    }

    /// Dispose every schedule and silence the engine. Voices are kept.
    pub fn stop(&mut self) {
        if !self.transport.is_running() {
            return;
        }
        if let Some(driver) = self.driver.take() {
            driver.stop(&mut self.clock);
        }
        let disposed = self.registry.dispose_all(&mut self.clock);
        self.clock.reset();
        self.engine.release_all();
        self.transport.stop();
        info!(disposed, "Session stopped");
    }

    pub fn is_running(&self) -> bool {
        self.transport.is_running()
    }

    pub fn add_voice(&mut self, settings: VoiceSettings) -> VoiceId {
        self.next_voice_id += 1;
        let id = VoiceId(self.next_voice_id);
        let settings = settings.validated();
        let synth = self.engine.create_synth(&settings.synth);
        let mut voice = Voice::new(id, synth, settings);

        if self.transport.is_running() {
            // join the progression where it is instead of waiting a full period
            if let Some(chord) = self.driver.as_ref().and_then(|d| d.last_chord()) {
                let chord = chord.to_string();
                voice.follow_chord(&chord, &mut self.clock, self.dict.as_ref());
            }
            voice.schedule(&mut self.clock, self.dict.as_ref());
        }
        self.registry.add(voice);
        info!(voice = %id, %synth, "Added voice");
        id
    }

    /// Dispose the voice's schedule, then its synth
    pub fn remove_voice(&mut self, id: VoiceId) -> Result<Voice> {
        let voice = self
            .registry
            .remove(id, &mut self.clock)
            .ok_or(SessionError::UnknownVoice(id))?;
        self.engine.dispose_synth(voice.synth());
        info!(voice = %id, "Removed voice");
        Ok(voice)
    }

    pub fn apply(&mut self, id: VoiceId, change: ParamChange) -> Result<ParamRoute> {
        let voice = self.registry.get_mut(id).ok_or(SessionError::UnknownVoice(id))?;
        change.validate()?;
        if let ParamChange::Synth(synth_change) = &change {
            self.engine.set_synth_param(voice.synth(), synth_change);
        }
        Ok(voice.apply(&change, &mut self.clock, self.dict.as_ref()))
    }

    /// Apply a raw slider event
    pub fn apply_control(&mut self, id: VoiceId, name: &str, raw: &str) -> Result<ParamRoute> {
        let change = ParamChange::from_control(name, raw)?;
        self.apply(id, change)
    }

    pub fn set_reverb(&mut self, room_size: f32) {
        self.settings.reverb = room_size.clamp(0.0, 1.0);
        self.engine.set_reverb(self.settings.reverb);
    }

    /// Change tempo, keeping the current tick position
    pub fn set_bpm(&mut self, bpm: f64) {
        if !(bpm.is_finite() && bpm > 0.0) {
            warn!(bpm, "Ignoring invalid tempo");
            return;
        }
        self.settings.bpm = bpm;
        self.transport.bpm = bpm;
        self.transport.position_samples = self.transport.tick_to_sample(self.clock.now());
        self.engine.set_bpm(bpm);
    }

    /// Change output rate, keeping the current tick position
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == 0 || sample_rate == self.transport.sample_rate {
            return;
        }
        self.settings.sample_rate = sample_rate;
        self.transport.sample_rate = sample_rate;
        self.transport.position_samples = self.transport.tick_to_sample(self.clock.now());
        self.engine.set_sample_rate(sample_rate);
    }

    /// Run every firing strictly before `until`. Each firing completes
    /// before the next is popped.
    pub fn advance(&mut self, until: Ticks) -> AdvanceReport {
        let mut report = AdvanceReport::default();
        if !self.transport.is_running() {
            return report;
        }
        while let Some(firing) = self.clock.next_due(until) {
            match firing {
                Firing::Loop { id, time } => {
                    let Some(driver) = self.driver.as_mut() else {
                        continue;
                    };
                    if !driver.owns(id) {
                        continue;
                    }
                    self.clock_count += 1;
                    if let Some(tick) = driver.tick(&mut self.registry, &mut self.clock, self.dict.as_ref()) {
                        info!(chord = %tick.chord, time, "Progression advanced");
                        self.last_tick = Some(tick);
                        report.ticks += 1;
                    }
                }
                Firing::Note {
                    target,
                    pitch,
                    time,
                    duration,
                    ..
                } => {
                    if !self.engine.is_synth_alive(target) {
                        self.skipped_orphans += 1;
                        report.skipped += 1;
                        trace!(%target, time, "Skipped note for disposed synth");
                        continue;
                    }
                    let bpm = self.settings.bpm;
                    self.engine.trigger_attack_release(
                        target,
                        pitch,
                        ticks_to_seconds(duration, bpm),
                        ticks_to_seconds(time, bpm),
                    );
                    report.notes += 1;
                }
            }
        }
        report
    }

    /// Advance by a tick span from the current position
    pub fn advance_by(&mut self, ticks: Ticks) -> AdvanceReport {
        let until = self.clock.now() + ticks;
        self.advance(until)
    }

    pub fn execute(&mut self, command: SessionCommand) -> Result<()> {
        debug!(?command, "Session command");
        match command {
            SessionCommand::Play => self.play(),
            SessionCommand::Stop => self.stop(),
            SessionCommand::AddVoice(settings) => {
                self.add_voice(*settings);
            }
            SessionCommand::RemoveVoice(id) => {
                self.remove_voice(id)?;
            }
            SessionCommand::Apply(id, change) => {
                self.apply(id, change)?;
            }
            SessionCommand::SetReverb(room) => self.set_reverb(room),
            SessionCommand::SetBpm(bpm) => self.set_bpm(bpm),
        }
        Ok(())
    }

    pub fn now(&self) -> Ticks {
        self.clock.now()
    }

    /// Progression cursor, zero while stopped
    pub fn cursor(&self) -> u64 {
        self.driver.as_ref().map_or(0, ProgressionDriver::cursor)
    }

    /// Chord handed out by the latest progression tick
    pub fn current_chord(&self) -> Option<&str> {
        self.driver.as_ref().and_then(ProgressionDriver::last_chord)
    }

    pub fn last_tick(&self) -> Option<&TickReport> {
        self.last_tick.as_ref()
    }

    /// Progression ticks since the session was created
    pub fn clock(&self) -> u64 {
        self.clock_count
    }

    pub fn skipped_orphans(&self) -> u64 {
        self.skipped_orphans
    }

    pub fn voices(&self) -> &VoiceRegistry {
        &self.registry
    }

    pub fn voice(&self, id: VoiceId) -> Option<&Voice> {
        self.registry.get(id)
    }

    pub fn scheduler(&self) -> &SequenceClock {
        &self.clock
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    pub fn dictionary(&self) -> &dyn ChordDictionary {
        self.dict.as_ref()
    }
}
