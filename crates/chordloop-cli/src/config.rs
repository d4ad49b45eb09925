//! Config file persistence

use std::path::{Path, PathBuf};

use anyhow::Context;
use chordloop_core::{ambient_preset, SessionSettings, VoiceSettings};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub voices: Vec<VoiceSettings>,
}

impl AppConfig {
    /// Configured voices, or the ambient preset when none are listed
    pub fn voices_or_preset(&self) -> Vec<VoiceSettings> {
        if self.voices.is_empty() {
            ambient_preset()
        } else {
            self.voices.clone()
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chordloop")
        .join("config.toml")
}

/// Load the default config file. Missing or unreadable files give defaults.
pub fn load_config() -> AppConfig {
    let path = config_path();
    let Ok(text) = std::fs::read_to_string(&path) else {
        debug!(path = %path.display(), "No config file, using defaults");
        return AppConfig::default();
    };
    toml::from_str(&text).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Ignoring unparsable config");
        AppConfig::default()
    })
}

/// Load an explicitly named config file; errors are reported
pub fn load_config_from(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(config: &AppConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let text = toml::to_string_pretty(config)?;
    std::fs::write(path, text).with_context(|| format!("writing config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chordloop_core::{ArpMode, NotationTime};

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.session.bpm = 96.0;
        config.voices.push(VoiceSettings {
            arp: ArpMode::Shuffle,
            tempo: NotationTime::note(8),
            ..VoiceSettings::default()
        });
        save_config(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[session]
bpm = 90.0
progression = ["Dm7", "G7"]

[[voices]]
chord = "m7"
note = "A"
tempo = "2n"
pandur = "4m"
volume = -3.0
"#,
        )
        .unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.session.bpm, 90.0);
        assert_eq!(config.session.progression_interval, NotationTime::measures(32));
        assert_eq!(config.voices.len(), 1);
        let voice = &config.voices[0];
        assert_eq!(voice.tempo, NotationTime::note(2));
        assert_eq!(voice.synth.pan_duration, NotationTime::measures(4));
        assert_eq!(voice.synth.volume_db, -3.0);
        assert_eq!(voice.octave, 2);
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session]\nbpm = \"fast\"\n").unwrap();
        assert!(load_config_from(&path).is_err());
        assert!(load_config_from(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_empty_voices_use_preset() {
        let config = AppConfig::default();
        assert_eq!(config.voices_or_preset(), ambient_preset());
    }
}
