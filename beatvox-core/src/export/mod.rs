//! Artifact export and the clipboard boundary

mod fs;

pub use fs::FsExporter;

use std::time::Duration;

use thiserror::Error;

use crate::pipeline::VoiceArtifact;

/// Pause between bulk saves so the host is not flooded with rapid writes
pub const SAVE_GAP: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to save {filename}: {source}")]
    Io {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy settings to clipboard: {0}")]
    ClipboardWrite(String),
}

/// File-save capability: persists one artifact under its suggested filename.
/// Saving the same artifact twice produces two identical writes.
pub trait ArtifactSink {
    fn save(&self, artifact: &VoiceArtifact) -> Result<(), ExportError>;
}

/// Clipboard capability
pub trait Clipboard {
    fn write_text(&self, text: &str) -> Result<(), ExportError>;
}

/// Save every artifact in order, pacing the saves with a fixed gap.
pub async fn save_all(
    sink: &dyn ArtifactSink,
    artifacts: &[VoiceArtifact],
) -> Result<(), ExportError> {
    for artifact in artifacts {
        sink.save(artifact)?;
        tokio::time::sleep(SAVE_GAP).await;
    }
    Ok(())
}
