pub mod capture;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod settings;
pub mod speech;

// Public library API - the CLI and any embedding host go through these.
pub use error::PipelineError;
pub use pipeline::{PipelineEvent, RunPhase, SamplePipeline, SettingsSummary, VoiceArtifact};
pub use settings::{PlaybackSettings, Settings, SettingsManager};
pub use speech::{SpeechEngine, SpeechError, UtteranceSettings, VoiceInfo};
