use std::fs;
use std::path::PathBuf;

use crate::pipeline::VoiceArtifact;

use super::{ArtifactSink, ExportError};

/// Saves artifacts into a directory, creating it on first use
pub struct FsExporter {
    dir: PathBuf,
}

impl FsExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

impl ArtifactSink for FsExporter {
    fn save(&self, artifact: &VoiceArtifact) -> Result<(), ExportError> {
        fs::create_dir_all(&self.dir).map_err(|source| ExportError::Io {
            filename: artifact.filename.clone(),
            source,
        })?;

        let path = self.dir.join(&artifact.filename);
        fs::write(&path, &artifact.payload).map_err(|source| ExportError::Io {
            filename: artifact.filename.clone(),
            source,
        })?;

        tracing::info!(path = %path.display(), bytes = artifact.payload.len(), "artifact saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saves_under_suggested_filename() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsExporter::new(dir.path().join("voice"));
        let artifact = VoiceArtifact::new(3, vec![1, 2, 3]);

        sink.save(&artifact).unwrap();

        let written = fs::read(dir.path().join("voice").join("3.wav")).unwrap();
        assert_eq!(written, vec![1, 2, 3]);
    }

    #[test]
    fn repeated_saves_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsExporter::new(dir.path());
        let artifact = VoiceArtifact::new(1, vec![9, 9]);

        sink.save(&artifact).unwrap();
        sink.save(&artifact).unwrap();

        let written = fs::read(dir.path().join("1.wav")).unwrap();
        assert_eq!(written, vec![9, 9]);
        // The artifact itself is untouched.
        assert_eq!(artifact.payload, vec![9, 9]);
        assert_eq!(artifact.filename, "1.wav");
    }
}
