use thiserror::Error;

use crate::capture::CaptureError;
use crate::settings::{MAX_COUNT, MIN_COUNT};
use crate::speech::SpeechError;

/// Failures of a pipeline run. All of these are terminal for the current run
/// only; the pipeline accepts a new run immediately afterwards.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("count must be between {MIN_COUNT} and {MAX_COUNT}, got {0}")]
    InvalidRange(u32),

    #[error("audio capture permission denied")]
    PermissionDenied,

    #[error("speech synthesis failed: {0}")]
    Synthesis(#[from] SpeechError),

    #[error("audio capture failed: {0}")]
    Capture(#[from] CaptureError),
}
