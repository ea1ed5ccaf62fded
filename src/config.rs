use crate::error::ConfigError;
use crate::pattern::Pattern;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub pattern: PatternDefaults,
    pub host: HostConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name; the host's default device when unset.
    pub device: Option<String>,
}

/// Shape of newly created patterns.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PatternDefaults {
    pub tracks: usize,
    pub steps: usize,
    pub tempo: u32,
}

impl Default for PatternDefaults {
    fn default() -> Self {
        Self {
            tracks: 4,
            steps: 64,
            tempo: 125,
        }
    }
}

impl PatternDefaults {
    pub fn new_pattern(&self) -> Pattern {
        Pattern::with_shape(self.tracks, self.steps, self.tempo)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Period of the loop that drives `tick`.
    pub frame_interval_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(toml::from_str(&read_to_string(path)?)?)
    }

    /// Reads `path` if given, falling back to defaults when it is absent or
    /// unusable.
    #[must_use]
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        Self::load(path).unwrap_or_else(|err| {
            warn!("ignoring config {path:?}: {err}");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.audio.device, None);
        assert_eq!(config.host.frame_interval_ms, 16);

        let pattern = config.pattern.new_pattern();
        assert_eq!(pattern.track_count(), 4);
        assert_eq!(pattern.notes_per_track(), 64);
        assert_eq!(pattern.tempo(), 125);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forcetrack.toml");
        std::fs::write(
            &path,
            "[audio]\ndevice = \"USB Audio\"\n\n[pattern]\ntempo = 90\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.audio.device.as_deref(), Some("USB Audio"));
        assert_eq!(config.pattern.tempo, 90);
        assert_eq!(config.pattern.tracks, 4);
        assert_eq!(config.host, HostConfig::default());
    }

    #[test]
    fn test_bad_files_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[pattern\ntempo = ").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Toml(_))));
        assert!(matches!(
            Config::load(&dir.path().join("absent.toml")),
            Err(ConfigError::Io(_))
        ));
        assert_eq!(Config::load_or_default(Some(&path)), Config::default());
        assert_eq!(Config::load_or_default(None), Config::default());
    }
}
