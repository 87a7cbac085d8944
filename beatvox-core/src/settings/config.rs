use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Smallest count a sequence run accepts
pub const MIN_COUNT: u32 = 1;
/// Largest count a sequence run accepts
pub const MAX_COUNT: u32 = 32;

/// Settings read at the start of each synthesis call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackSettings {
    /// Voice id from the engine catalog; None uses the engine default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// 0.0-2.0, 1.0 is the engine's normal pitch
    #[serde(default = "default_pitch")]
    pub pitch: f32,

    /// 0.1-10.0, 1.0 is the engine's normal rate
    #[serde(default = "default_rate")]
    pub rate: f32,

    /// 0.0-1.0
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Upper bound of the spoken sequence, 1-32
    #[serde(default = "default_count")]
    pub count: u32,

    /// Language tag prefix whose voices are listed first
    #[serde(default = "default_language")]
    pub preferred_language: String,
}

fn default_pitch() -> f32 {
    1.0
}

fn default_rate() -> f32 {
    1.0
}

fn default_volume() -> f32 {
    1.0
}

fn default_count() -> u32 {
    4
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            voice: None,
            pitch: default_pitch(),
            rate: default_rate(),
            volume: default_volume(),
            count: default_count(),
            preferred_language: default_language(),
        }
    }
}

impl PlaybackSettings {
    /// Clamp pitch, rate, and volume into their usable ranges.
    /// The count is validated separately and never clamped.
    pub fn clamped(mut self) -> Self {
        self.pitch = self.pitch.clamp(0.0, 2.0);
        self.rate = self.rate.clamp(0.1, 10.0);
        self.volume = self.volume.clamp(0.0, 1.0);
        self
    }
}

/// Reject counts outside [MIN_COUNT, MAX_COUNT] before any side effect.
pub fn validate_count(count: u32) -> Result<u32, PipelineError> {
    if !(MIN_COUNT..=MAX_COUNT).contains(&count) {
        return Err(PipelineError::InvalidRange(count));
    }
    Ok(count)
}

/// Persisted tool settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub playback: PlaybackSettings,

    /// Directory artifacts are exported into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("voice")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            playback: PlaybackSettings::default(),
            output_dir: default_output_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_sliders() {
        let settings = PlaybackSettings {
            pitch: 5.0,
            rate: 0.0,
            volume: -1.0,
            ..Default::default()
        }
        .clamped();

        assert_eq!(settings.pitch, 2.0);
        assert_eq!(settings.rate, 0.1);
        assert_eq!(settings.volume, 0.0);
    }

    #[test]
    fn count_is_validated_not_clamped() {
        assert!(validate_count(0).is_err());
        assert!(validate_count(33).is_err());
        assert_eq!(validate_count(1).unwrap(), 1);
        assert_eq!(validate_count(32).unwrap(), 32);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());

        let settings: Settings = toml::from_str("[playback]\ncount = 8\n").unwrap();
        assert_eq!(settings.playback.count, 8);
        assert_eq!(settings.playback.pitch, 1.0);
    }
}
