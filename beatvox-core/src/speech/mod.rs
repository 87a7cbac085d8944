//! Speech synthesis capability: engine trait, catalog handling, and the
//! platform-backed implementations

pub mod catalog;
pub mod engine;
#[cfg(target_os = "linux")]
pub mod espeak;
#[cfg(not(target_os = "linux"))]
pub mod system;
pub mod types;

pub use engine::{SpeechEngine, SpeechError};
pub use types::{UtteranceSettings, VoiceInfo};

use std::sync::Arc;

/// Build the platform speech engine.
pub fn system_engine() -> Result<Arc<dyn SpeechEngine>, SpeechError> {
    #[cfg(target_os = "linux")]
    return Ok(Arc::new(espeak::EspeakSpeech::new()?));

    #[cfg(not(target_os = "linux"))]
    return Ok(Arc::new(system::SystemSpeech::new()?));
}
