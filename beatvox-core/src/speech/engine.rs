use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use super::types::{UtteranceSettings, VoiceInfo};

#[derive(Debug, Clone, Error)]
pub enum SpeechError {
    #[error("speech engine unavailable: {0}")]
    Engine(String),

    #[error("utterance failed: {0}")]
    Utterance(String),
}

/// Trait for speech synthesis engines
///
/// The voice catalog may be empty right after construction on platforms that
/// populate it asynchronously; `subscribe_voices` carries the "catalog
/// changed" notification so callers can re-read without polling.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Snapshot of the current voice catalog, in the engine's own order
    fn voices(&self) -> Vec<VoiceInfo>;

    /// Watch channel that updates whenever the catalog changes
    fn subscribe_voices(&self) -> watch::Receiver<Vec<VoiceInfo>>;

    /// Speak text once, resolving when the utterance ends.
    ///
    /// A cancelled utterance resolves Ok: cancellation stops the audio, it is
    /// not an error of the utterance itself.
    async fn speak(&self, text: &str, settings: &UtteranceSettings) -> Result<(), SpeechError>;

    /// Cancel any queued or in-flight utterances
    fn cancel_all(&self);
}
