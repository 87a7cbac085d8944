use std::fmt;

use crate::settings::PlaybackSettings;
use crate::speech::VoiceInfo;

/// One finished audio clip, tagged with its position in the spoken sequence.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceArtifact {
    pub sequence: u32,
    pub payload: Vec<u8>,
    pub filename: String,
}

impl VoiceArtifact {
    pub fn new(sequence: u32, payload: Vec<u8>) -> Self {
        Self {
            sequence,
            payload,
            filename: format!("{sequence}.wav"),
        }
    }
}

/// Settings snapshot surfaced after a completed run, in the copyable form
/// shown to the user
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsSummary {
    pub voice: String,
    pub pitch: f32,
    pub rate: f32,
    pub volume: f32,
}

impl SettingsSummary {
    pub fn new(voice: Option<&VoiceInfo>, settings: &PlaybackSettings) -> Self {
        Self {
            voice: voice
                .map(|v| v.name.clone())
                .unwrap_or_else(|| "Default".to_string()),
            pitch: settings.pitch,
            rate: settings.rate,
            volume: settings.volume,
        }
    }
}

impl fmt::Display for SettingsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Voice: {}\nPitch: {}\nRate: {}\nVolume: {}",
            self.voice, self.pitch, self.rate, self.volume
        )
    }
}
