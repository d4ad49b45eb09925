//! Realtime audio output and the live player built on it

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::audio_engine::NativeEngine;
use crate::session::{Session, SessionCommand};

#[derive(Debug, Error)]
pub enum AudioOutputError {
    #[error("No audio output devices found")]
    NoDevices,
    #[error("Failed to get default output config: {0}")]
    ConfigError(String),
    #[error("Failed to build output stream: {0}")]
    StreamError(String),
}

/// Name, sample rate and channel count of the default output device
pub fn default_device_info() -> Result<(String, u32, u16), AudioOutputError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioOutputError::NoDevices)?;

    let config = device
        .default_output_config()
        .map_err(|e| AudioOutputError::ConfigError(e.to_string()))?;

    let name = device.name().unwrap_or_default();
    Ok((name, config.sample_rate().0, config.channels()))
}

/// Output stream that pulls interleaved f32 blocks from a callback
pub struct RealtimeOutputStream {
    stop_flag: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
    _stream: cpal::Stream,
}

impl RealtimeOutputStream {
    /// The callback receives the block, the device sample rate and the
    /// channel count
    pub fn start<F>(sample_callback: F) -> Result<Self, AudioOutputError>
    where
        F: FnMut(&mut [f32], u32, u16) + Send + 'static,
    {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioOutputError::NoDevices)?;

        let supported_config = device
            .default_output_config()
            .map_err(|e| AudioOutputError::ConfigError(e.to_string()))?;

        let sample_rate = supported_config.sample_rate().0;
        let channels = supported_config.channels();

        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();

        let config: StreamConfig = supported_config.into();
        let callback = Arc::new(Mutex::new(sample_callback));

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if stop_clone.load(Ordering::SeqCst) {
                        data.fill(0.0);
                        return;
                    }
                    let Ok(mut cb) = callback.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    cb(data, sample_rate, channels);
                },
                move |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioOutputError::StreamError(e.to_string()))?;

        stream.play().map_err(|e| AudioOutputError::StreamError(e.to_string()))?;

        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels,
            "Started realtime output stream"
        );

        Ok(Self {
            stop_flag,
            sample_rate,
            channels,
            _stream: stream,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

impl Drop for RealtimeOutputStream {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

/// Snapshot of the audio thread's session, published after every block
#[derive(Debug, Default)]
pub struct LiveStatus {
    running: AtomicBool,
    clock: AtomicU64,
    cursor: AtomicU64,
    position_samples: AtomicU64,
    skipped_orphans: AtomicU64,
}

impl LiveStatus {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn clock(&self) -> u64 {
        self.clock.load(Ordering::Relaxed)
    }

    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::Relaxed)
    }

    pub fn position_samples(&self) -> u64 {
        self.position_samples.load(Ordering::Relaxed)
    }

    pub fn skipped_orphans(&self) -> u64 {
        self.skipped_orphans.load(Ordering::Relaxed)
    }

    fn publish(&self, session: &Session<NativeEngine>) {
        self.running.store(session.is_running(), Ordering::Relaxed);
        self.clock.store(session.clock(), Ordering::Relaxed);
        self.cursor.store(session.cursor(), Ordering::Relaxed);
        self.position_samples
            .store(session.transport().position_samples, Ordering::Relaxed);
        self.skipped_orphans
            .store(session.skipped_orphans(), Ordering::Relaxed);
    }
}

/// Drain queued commands into the session, then render one block
fn drive_block(
    session: &mut Session<NativeEngine>,
    commands: &Receiver<SessionCommand>,
    data: &mut [f32],
    channels: usize,
) {
    for command in commands.try_iter() {
        if let Err(e) = session.execute(command) {
            warn!(error = %e, "Session command failed");
        }
    }
    session.render_block(data, channels);
}

/// Runs a session on the audio thread. Control goes through a command
/// queue drained at the start of each block.
pub struct LivePlayer {
    commands: Sender<SessionCommand>,
    status: Arc<LiveStatus>,
    stream: RealtimeOutputStream,
}

impl LivePlayer {
    pub fn start(mut session: Session<NativeEngine>) -> Result<Self, AudioOutputError> {
        let (tx, rx) = unbounded();
        let status = Arc::new(LiveStatus::default());
        let status_cb = status.clone();

        let stream = RealtimeOutputStream::start(move |data, sample_rate, channels| {
            session.set_sample_rate(sample_rate);
            drive_block(&mut session, &rx, data, channels as usize);
            status_cb.publish(&session);
        })?;

        Ok(Self {
            commands: tx,
            status,
            stream,
        })
    }

    /// False once the audio thread has gone away
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn play(&self) -> bool {
        self.send(SessionCommand::Play)
    }

    pub fn stop(&self) -> bool {
        self.send(SessionCommand::Stop)
    }

    pub fn status(&self) -> &LiveStatus {
        &self.status
    }

    pub fn sample_rate(&self) -> u32 {
        self.stream.sample_rate()
    }

    pub fn shutdown(self) {
        self.stream.stop();
        info!(clock = self.status.clock(), "Live player shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chordloop_core::{NotationTime, SessionSettings, VoiceSettings};

    #[test]
    fn test_drive_block_applies_commands_before_rendering() {
        let settings = SessionSettings {
            sample_rate: 48000,
            progression_interval: NotationTime::measures(1),
            ..SessionSettings::default()
        };
        let mut session = Session::new(NativeEngine::new(48000), settings);
        let (tx, rx) = unbounded();
        tx.send(SessionCommand::AddVoice(Box::new(VoiceSettings::default()))).unwrap();
        tx.send(SessionCommand::Play).unwrap();

        let mut data = vec![0.0f32; 2048];
        drive_block(&mut session, &rx, &mut data, 2);
        assert!(session.is_running());
        assert_eq!(session.voices().len(), 1);
        assert_eq!(session.transport().position_samples, 1024);

        let status = LiveStatus::default();
        status.publish(&session);
        assert!(status.is_running());
        assert_eq!(status.clock(), 1);
        assert_eq!(status.cursor(), 1);
        assert_eq!(status.position_samples(), 1024);
    }
}
