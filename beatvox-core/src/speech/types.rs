use serde::{Deserialize, Serialize};

use crate::settings::PlaybackSettings;

/// A voice offered by the platform speech engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub id: String,
    pub name: String,
    pub language: String,
}

impl VoiceInfo {
    /// Display label in the form shown to users, e.g. "Amy (en-GB)"
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.language)
    }
}

/// Settings applied to a single utterance
#[derive(Debug, Clone)]
pub struct UtteranceSettings {
    pub voice: Option<VoiceInfo>,
    pub pitch: f32,
    pub rate: f32,
    pub volume: f32,
}

impl UtteranceSettings {
    pub fn new(voice: Option<VoiceInfo>, settings: &PlaybackSettings) -> Self {
        Self {
            voice,
            pitch: settings.pitch,
            rate: settings.rate,
            volume: settings.volume,
        }
    }
}
