//! The voice sample pipeline: speaks a numeric sequence and optionally
//! records each spoken number into its own artifact.
//!
//! All runs are strictly sequential: item i+1 never starts before item i's
//! utterance completion (and, when recording, segment finish) has been
//! observed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capture::{CaptureError, CaptureRequest, CaptureSource, CaptureStream, TrackKind};
use crate::error::PipelineError;
use crate::settings::{validate_count, PlaybackSettings};
use crate::speech::catalog::{partition_by_language, VoiceCatalog};
use crate::speech::{SpeechEngine, UtteranceSettings, VoiceInfo};

use super::artifact::{SettingsSummary, VoiceArtifact};

/// Pause between spoken items during playback
pub const ITEM_GAP: Duration = Duration::from_millis(500);
/// Pause between recorded items
pub const RECORD_GAP: Duration = Duration::from_millis(300);
/// Delay between utterance end and segment stop, so trailing audio is kept
pub const SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Where a recording run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    RequestingPermission,
    Capturing(u32),
}

/// Coarse progress reporting for the UI
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Progress { current: u32, total: u32 },
    Completed { summary: SettingsSummary },
}

pub struct SamplePipeline {
    engine: Arc<dyn SpeechEngine>,
    capture: Box<dyn CaptureSource>,
    events: Option<mpsc::Sender<PipelineEvent>>,
    artifacts: Vec<VoiceArtifact>,
    phase: RunPhase,
}

impl SamplePipeline {
    pub fn new(engine: Arc<dyn SpeechEngine>, capture: Box<dyn CaptureSource>) -> Self {
        Self {
            engine,
            capture,
            events: None,
            artifacts: Vec::new(),
            phase: RunPhase::Idle,
        }
    }

    /// Attach a progress event channel
    pub fn with_events(mut self, events: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Artifacts accumulated by the most recent recording run. Survives a
    /// partial failure so completed items stay exportable.
    pub fn artifacts(&self) -> &[VoiceArtifact] {
        &self.artifacts
    }

    /// Selectable voices, preferred-language group first
    pub fn selectable_voices(&self, preferred: &str) -> Vec<VoiceInfo> {
        partition_by_language(&self.engine.voices(), preferred)
    }

    /// Catalog handle for hosts that want to wait for delayed population
    pub fn catalog(&self, preferred: &str) -> VoiceCatalog {
        VoiceCatalog::new(self.engine.subscribe_voices(), preferred)
    }

    /// Speak `text` once, cancelling anything already in flight.
    /// Fire-and-forget; the handle is returned for callers that want to wait.
    pub fn preview(&self, text: &str, settings: &PlaybackSettings) -> JoinHandle<()> {
        let settings = settings.clone().clamped();
        let utterance = UtteranceSettings::new(self.resolve_voice(&settings), &settings);
        let engine = self.engine.clone();
        let text = text.to_string();

        self.engine.cancel_all();
        tokio::spawn(async move {
            if let Err(e) = engine.speak(&text, &utterance).await {
                tracing::warn!(error = %e, "preview failed");
            }
        })
    }

    /// Speak 1..=count aloud, one item at a time, with a fixed pause between
    /// items. Returns the settings summary for user confirmation.
    pub async fn speak_sequence(
        &mut self,
        settings: &PlaybackSettings,
    ) -> Result<SettingsSummary, PipelineError> {
        let total = validate_count(settings.count)?;
        let settings = settings.clone().clamped();
        let voice = self.resolve_voice(&settings);
        let summary = SettingsSummary::new(voice.as_ref(), &settings);
        let utterance = UtteranceSettings::new(voice, &settings);

        self.engine.cancel_all();
        tracing::info!(total, "playback run started");

        for current in 1..=total {
            self.engine.speak(&current.to_string(), &utterance).await?;
            self.emit(PipelineEvent::Progress { current, total }).await;
            tokio::time::sleep(ITEM_GAP).await;
        }

        self.emit(PipelineEvent::Completed {
            summary: summary.clone(),
        })
        .await;
        Ok(summary)
    }

    /// Record 1..=count, one capture segment per spoken number.
    ///
    /// The capture grant is requested once, shared by every segment, and
    /// released when the run ends, whether it succeeded or not. A synthesis
    /// failure mid-run keeps the artifacts recorded so far and propagates.
    pub async fn record_sequence(
        &mut self,
        settings: &PlaybackSettings,
    ) -> Result<&[VoiceArtifact], PipelineError> {
        let total = validate_count(settings.count)?;
        let settings = settings.clone().clamped();
        let voice = self.resolve_voice(&settings);
        let summary = SettingsSummary::new(voice.as_ref(), &settings);
        let utterance = UtteranceSettings::new(voice, &settings);

        self.artifacts.clear();
        self.phase = RunPhase::RequestingPermission;
        tracing::info!(total, "recording run started");

        let request = CaptureRequest {
            audio: true,
            video: true,
        };
        let mut stream = match self.capture.request(request).await {
            Ok(stream) => stream,
            Err(CaptureError::PermissionDenied) => {
                self.phase = RunPhase::Idle;
                tracing::warn!("capture permission denied");
                return Err(PipelineError::PermissionDenied);
            }
            Err(e) => {
                self.phase = RunPhase::Idle;
                return Err(e.into());
            }
        };

        // Only the audio portion of the grant is wanted.
        stream.stop_track(TrackKind::Video);

        let mut failure = None;
        for current in 1..=total {
            self.phase = RunPhase::Capturing(current);
            match self.record_one(stream.as_mut(), current, &utterance).await {
                Ok(artifact) => {
                    self.artifacts.push(artifact);
                    self.emit(PipelineEvent::Progress { current, total }).await;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
            tokio::time::sleep(RECORD_GAP).await;
        }

        stream.release();
        self.phase = RunPhase::Idle;

        match failure {
            Some(e) => {
                tracing::warn!(error = %e, recorded = self.artifacts.len(), "recording run failed");
                Err(e)
            }
            None => {
                tracing::info!(recorded = self.artifacts.len(), "recording run complete");
                self.emit(PipelineEvent::Completed { summary }).await;
                Ok(&self.artifacts)
            }
        }
    }

    /// One capture session: segment start, utterance, settle, segment stop.
    /// Central so the settle and gap timing hold for every item.
    async fn record_one(
        &self,
        stream: &mut dyn CaptureStream,
        sequence: u32,
        utterance: &UtteranceSettings,
    ) -> Result<VoiceArtifact, PipelineError> {
        let segment = stream.begin_segment()?;

        match self.engine.speak(&sequence.to_string(), utterance).await {
            Ok(()) => {
                tokio::time::sleep(SETTLE_DELAY).await;
                let payload = segment.finish().await?;
                Ok(VoiceArtifact::new(sequence, payload))
            }
            Err(e) => {
                // Stop the segment deterministically so the run cannot hang;
                // its partial payload is discarded.
                if let Err(stop_err) = segment.finish().await {
                    tracing::debug!(error = %stop_err, "segment stop after synthesis error failed");
                }
                Err(PipelineError::Synthesis(e))
            }
        }
    }

    fn resolve_voice(&self, settings: &PlaybackSettings) -> Option<VoiceInfo> {
        let selectable = self.selectable_voices(&settings.preferred_language);
        match &settings.voice {
            Some(id) => {
                let found = selectable.into_iter().find(|v| v.id == *id);
                if found.is_none() {
                    tracing::warn!(voice = %id, "voice not in catalog, using engine default");
                }
                found
            }
            None => selectable.into_iter().next(),
        }
    }

    async fn emit(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            if events.send(event).await.is_err() {
                tracing::debug!("progress receiver dropped");
            }
        }
    }
}
