//! Voice sample pipeline and its artifacts

pub mod artifact;
pub mod session;

pub use artifact::{SettingsSummary, VoiceArtifact};
pub use session::{PipelineEvent, RunPhase, SamplePipeline};
