//! Block rendering and offline export to WAV

use std::path::Path;

use chordloop_core::notation::Ticks;
use chordloop_core::TICKS_PER_MEASURE;
use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;
use tracing::info;

use crate::audio_engine::NativeEngine;
use crate::session::{AdvanceReport, Session};

/// Frames per block for offline rendering
pub const BLOCK_FRAMES: usize = 512;
pub const EXPORT_CHANNELS: u16 = 2;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStats {
    pub frames: u64,
    pub notes: usize,
    pub progression_ticks: usize,
    /// Peak before normalisation
    pub peak: f32,
}

impl Session<NativeEngine> {
    /// Fire everything due inside the next block, then render it
    pub fn render_block(&mut self, out: &mut [f32], channels: usize) -> AdvanceReport {
        let channels = channels.max(1);
        let frames = (out.len() / channels) as u64;
        let block_start = self.transport().position_samples;

        let report = if self.is_running() {
            let until = self.transport().ticks_before(frames);
            self.advance(until)
        } else {
            AdvanceReport::default()
        };

        self.engine_mut().render(out, channels, block_start);
        if self.is_running() {
            self.transport_mut().advance(frames);
        }
        report
    }
}

/// Play the session for `ticks` and return interleaved stereo samples
pub fn render_ticks(session: &mut Session<NativeEngine>, ticks: Ticks) -> (Vec<f32>, RenderStats) {
    session.play();
    let total_frames = session.transport().tick_to_sample(ticks);
    let channels = EXPORT_CHANNELS as usize;
    let mut samples = vec![0.0f32; total_frames as usize * channels];
    let mut stats = RenderStats {
        frames: total_frames,
        notes: 0,
        progression_ticks: 0,
        peak: 0.0,
    };

    for block in samples.chunks_mut(BLOCK_FRAMES * channels) {
        let report = session.render_block(block, channels);
        stats.notes += report.notes;
        stats.progression_ticks += report.ticks;
    }
    stats.peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    (samples, stats)
}

/// Render whole measures to a 32-bit float stereo WAV, normalised to 0.8 peak
pub fn render_to_wav(
    session: &mut Session<NativeEngine>,
    measures: u64,
    path: &Path,
) -> Result<RenderStats, RenderError> {
    let (samples, stats) = render_ticks(session, measures * TICKS_PER_MEASURE);
    let gain = if stats.peak > 0.001 { 0.8 / stats.peak } else { 1.0 };

    let spec = WavSpec {
        channels: EXPORT_CHANNELS,
        sample_rate: session.settings().sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for sample in &samples {
        writer.write_sample(sample * gain)?;
    }
    writer.finalize()?;

    info!(
        path = %path.display(),
        measures,
        frames = stats.frames,
        notes = stats.notes,
        "Rendered WAV"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chordloop_core::{NotationTime, SessionSettings, VoiceSettings};

    fn session() -> Session<NativeEngine> {
        let settings = SessionSettings {
            sample_rate: 8000,
            progression_interval: NotationTime::measures(1),
            ..SessionSettings::default()
        };
        let mut session = Session::new(NativeEngine::new(8000), settings);
        session.add_voice(VoiceSettings {
            tempo: NotationTime::note(4),
            octave: 4,
            ..VoiceSettings::default()
        });
        session
    }

    #[test]
    fn test_render_block_fires_notes_inside_block() {
        let mut session = session();
        session.play();
        // 8000 Hz at 120 BPM: one quarter is 4000 frames
        let mut block = vec![0.0f32; 4000 * 2];
        let report = session.render_block(&mut block, 2);
        assert_eq!(report.notes, 1);
        assert_eq!(report.ticks, 1);
        assert_eq!(session.transport().position_samples, 4000);
        assert!(block.iter().any(|s| s.abs() > 0.0));

        let report = session.render_block(&mut block, 2);
        assert_eq!(report.notes, 1);
    }

    #[test]
    fn test_render_block_longer_than_synth_buffer() {
        let mut session = session();
        session.play();
        let mut block = vec![0.0f32; 6000 * 2];
        let report = session.render_block(&mut block, 2);
        // ticks 0 and 192 fall inside the first 288 ticks
        assert_eq!(report.notes, 2);
        assert_eq!(session.transport().position_samples, 6000);
        assert!(block[4096 * 2..].iter().any(|s| s.abs() > 0.0));
    }

    #[test]
    fn test_zero_bpm_renders_at_default_tempo() {
        let settings = SessionSettings {
            sample_rate: 8000,
            bpm: 0.0,
            ..SessionSettings::default()
        };
        let mut session = Session::new(NativeEngine::new(8000), settings);
        let (samples, stats) = render_ticks(&mut session, TICKS_PER_MEASURE);
        assert_eq!(stats.frames, 16000);
        assert_eq!(samples.len(), 32000);
    }

    #[test]
    fn test_stopped_session_does_not_advance() {
        let mut session = session();
        let mut block = vec![0.0f32; 512];
        let report = session.render_block(&mut block, 2);
        assert_eq!(report, AdvanceReport::default());
        assert_eq!(session.transport().position_samples, 0);
    }

    #[test]
    fn test_render_to_wav_writes_expected_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let mut session = session();
        let stats = render_to_wav(&mut session, 2, &path).unwrap();
        assert_eq!(stats.frames, 32000);
        assert_eq!(stats.notes, 8);
        assert_eq!(stats.progression_ticks, 2);
        assert!(stats.peak > 0.0);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 8000);
        assert_eq!(reader.len(), 64000);
    }
}
