//! Integration tests for the voice sample pipeline, driven by scripted
//! speech and capture providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rstest::rstest;
use tokio::sync::{mpsc, watch};

use beatvox_core::capture::{
    CaptureError, CaptureRequest, CaptureSegment, CaptureSource, CaptureStream, TrackKind,
};
use beatvox_core::speech::{SpeechEngine, SpeechError, UtteranceSettings, VoiceInfo};
use beatvox_core::{PipelineError, PipelineEvent, PlaybackSettings, SamplePipeline};

fn voice(name: &str, language: &str) -> VoiceInfo {
    VoiceInfo {
        id: name.to_lowercase(),
        name: name.to_string(),
        language: language.to_string(),
    }
}

/// Speech engine that logs calls instead of producing audio
struct ScriptedEngine {
    voices_tx: watch::Sender<Vec<VoiceInfo>>,
    log: Mutex<Vec<String>>,
    fail_on: Mutex<Option<String>>,
}

impl ScriptedEngine {
    fn new(voices: Vec<VoiceInfo>) -> Arc<Self> {
        let (voices_tx, _) = watch::channel(voices);
        Arc::new(Self {
            voices_tx,
            log: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
        })
    }

    fn set_voices(&self, voices: Vec<VoiceInfo>) {
        let _ = self.voices_tx.send(voices);
    }

    fn fail_on(&self, text: &str) {
        *self.fail_on.lock().unwrap() = Some(text.to_string());
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn spoken(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|entry| entry.strip_prefix("speak:").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl SpeechEngine for ScriptedEngine {
    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices_tx.borrow().clone()
    }

    fn subscribe_voices(&self) -> watch::Receiver<Vec<VoiceInfo>> {
        self.voices_tx.subscribe()
    }

    async fn speak(&self, text: &str, _settings: &UtteranceSettings) -> Result<(), SpeechError> {
        self.log.lock().unwrap().push(format!("speak:{text}"));
        if self.fail_on.lock().unwrap().as_deref() == Some(text) {
            return Err(SpeechError::Utterance(format!("scripted failure on {text}")));
        }
        Ok(())
    }

    fn cancel_all(&self) {
        self.log.lock().unwrap().push("cancel".to_string());
    }
}

#[derive(Default)]
struct StreamState {
    audio_active: bool,
    video_active: bool,
    open_segments: usize,
    segments_started: u32,
}

/// Capture source with a shared, inspectable stream state
struct ScriptedCapture {
    deny: Arc<Mutex<bool>>,
    requests: Arc<AtomicUsize>,
    state: Arc<Mutex<StreamState>>,
}

struct CaptureProbe {
    deny: Arc<Mutex<bool>>,
    requests: Arc<AtomicUsize>,
    state: Arc<Mutex<StreamState>>,
}

impl ScriptedCapture {
    fn new(deny: bool) -> (Box<Self>, CaptureProbe) {
        let deny = Arc::new(Mutex::new(deny));
        let requests = Arc::new(AtomicUsize::new(0));
        let state = Arc::new(Mutex::new(StreamState::default()));
        let probe = CaptureProbe {
            deny: deny.clone(),
            requests: requests.clone(),
            state: state.clone(),
        };
        (
            Box::new(Self {
                deny,
                requests,
                state,
            }),
            probe,
        )
    }
}

impl CaptureProbe {
    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn allow(&self) {
        *self.deny.lock().unwrap() = false;
    }

    fn active_tracks(&self) -> usize {
        let state = self.state.lock().unwrap();
        usize::from(state.audio_active) + usize::from(state.video_active)
    }

    fn open_segments(&self) -> usize {
        self.state.lock().unwrap().open_segments
    }

    fn video_active(&self) -> bool {
        self.state.lock().unwrap().video_active
    }
}

struct ScriptedStream {
    state: Arc<Mutex<StreamState>>,
}

struct ScriptedSegment {
    state: Arc<Mutex<StreamState>>,
    sequence: u32,
}

#[async_trait(?Send)]
impl CaptureSource for ScriptedCapture {
    async fn request(
        &self,
        request: CaptureRequest,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if *self.deny.lock().unwrap() {
            return Err(CaptureError::PermissionDenied);
        }

        let mut state = self.state.lock().unwrap();
        *state = StreamState {
            audio_active: request.audio,
            video_active: request.video,
            ..StreamState::default()
        };

        Ok(Box::new(ScriptedStream {
            state: self.state.clone(),
        }))
    }
}

impl CaptureStream for ScriptedStream {
    fn active_tracks(&self) -> usize {
        let state = self.state.lock().unwrap();
        usize::from(state.audio_active) + usize::from(state.video_active)
    }

    fn stop_track(&mut self, kind: TrackKind) {
        let mut state = self.state.lock().unwrap();
        match kind {
            TrackKind::Audio => state.audio_active = false,
            TrackKind::Video => state.video_active = false,
        }
    }

    fn begin_segment(&mut self) -> Result<Box<dyn CaptureSegment>, CaptureError> {
        let mut state = self.state.lock().unwrap();
        if !state.audio_active {
            return Err(CaptureError::Recorder("audio track stopped".to_string()));
        }
        state.segments_started += 1;
        state.open_segments += 1;
        Ok(Box::new(ScriptedSegment {
            state: self.state.clone(),
            sequence: state.segments_started,
        }))
    }

    fn release(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.audio_active = false;
        state.video_active = false;
    }
}

#[async_trait(?Send)]
impl CaptureSegment for ScriptedSegment {
    async fn finish(self: Box<Self>) -> Result<Vec<u8>, CaptureError> {
        let mut state = self.state.lock().unwrap();
        state.open_segments -= 1;
        Ok(format!("wav-{}", self.sequence).into_bytes())
    }
}

fn pipeline_with(
    engine: &Arc<ScriptedEngine>,
    deny: bool,
) -> (SamplePipeline, CaptureProbe, mpsc::Receiver<PipelineEvent>) {
    let (capture, probe) = ScriptedCapture::new(deny);
    let (events_tx, events_rx) = mpsc::channel(64);
    let pipeline =
        SamplePipeline::new(engine.clone(), capture).with_events(events_tx);
    (pipeline, probe, events_rx)
}

fn settings_with_count(count: u32) -> PlaybackSettings {
    PlaybackSettings {
        count,
        ..Default::default()
    }
}

fn drain(events: &mut mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

#[rstest]
#[case(0)]
#[case(33)]
#[tokio::test]
async fn out_of_range_count_rejects_before_any_side_effect(#[case] count: u32) {
    let engine = ScriptedEngine::new(vec![voice("Amy", "en-US")]);
    let (mut pipeline, probe, _events) = pipeline_with(&engine, false);
    let settings = settings_with_count(count);

    let err = pipeline.speak_sequence(&settings).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRange(c) if c == count));

    let err = pipeline.record_sequence(&settings).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRange(c) if c == count));

    // No utterance, no cancel, no permission prompt.
    assert!(engine.log().is_empty());
    assert_eq!(probe.requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn speak_sequence_is_ordered_and_cancels_queued_speech() {
    let engine = ScriptedEngine::new(Vec::new());
    let (mut pipeline, _probe, mut events) = pipeline_with(&engine, false);

    let summary = pipeline
        .speak_sequence(&settings_with_count(3))
        .await
        .unwrap();

    assert_eq!(
        engine.log(),
        vec!["cancel", "speak:1", "speak:2", "speak:3"]
    );
    assert_eq!(summary.voice, "Default");

    let events = drain(&mut events);
    let progress: Vec<(u32, u32)> = events
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::Progress { current, total } => Some((*current, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    assert!(events
        .iter()
        .any(|event| matches!(event, PipelineEvent::Completed { .. })));
}

#[tokio::test(start_paused = true)]
async fn record_sequence_yields_ordered_artifacts_and_releases_the_grant() {
    let engine = ScriptedEngine::new(vec![voice("Amy", "en-US")]);
    let (mut pipeline, probe, _events) = pipeline_with(&engine, false);

    let artifacts = pipeline
        .record_sequence(&settings_with_count(5))
        .await
        .unwrap()
        .to_vec();

    let sequences: Vec<u32> = artifacts.iter().map(|a| a.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
    let filenames: Vec<&str> = artifacts.iter().map(|a| a.filename.as_str()).collect();
    assert_eq!(filenames, vec!["1.wav", "2.wav", "3.wav", "4.wav", "5.wav"]);
    for artifact in &artifacts {
        assert_eq!(
            artifact.payload,
            format!("wav-{}", artifact.sequence).into_bytes()
        );
    }

    assert_eq!(probe.requests(), 1);
    assert!(!probe.video_active(), "video track must be discarded");
    assert_eq!(probe.active_tracks(), 0, "grant must be released at run end");
    assert_eq!(probe.open_segments(), 0);
    assert_eq!(pipeline.phase(), beatvox_core::RunPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn permission_denial_is_terminal_but_pipeline_stays_usable() {
    let engine = ScriptedEngine::new(Vec::new());
    let (mut pipeline, probe, _events) = pipeline_with(&engine, true);

    let err = pipeline
        .record_sequence(&settings_with_count(2))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::PermissionDenied));
    assert!(engine.spoken().is_empty(), "denial must precede any utterance");
    assert_eq!(probe.requests(), 1);

    // No retry happened on its own; a new run succeeds immediately.
    probe.allow();
    let artifacts = pipeline
        .record_sequence(&settings_with_count(2))
        .await
        .unwrap();
    assert_eq!(artifacts.len(), 2);
    assert_eq!(probe.requests(), 2);
}

#[tokio::test(start_paused = true)]
async fn synthesis_failure_keeps_completed_artifacts_and_propagates() {
    let engine = ScriptedEngine::new(Vec::new());
    engine.fail_on("3");
    let (mut pipeline, probe, _events) = pipeline_with(&engine, false);

    let err = pipeline
        .record_sequence(&settings_with_count(5))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Synthesis(_)));

    let sequences: Vec<u32> = pipeline.artifacts().iter().map(|a| a.sequence).collect();
    assert_eq!(sequences, vec![1, 2], "prefix before the failure survives");

    // The failing item's segment still stopped, and the grant was released.
    assert_eq!(probe.open_segments(), 0);
    assert_eq!(probe.active_tracks(), 0);
    assert_eq!(engine.spoken(), vec!["1", "2", "3"]);
}

#[tokio::test(start_paused = true)]
async fn new_recording_run_discards_previous_artifacts() {
    let engine = ScriptedEngine::new(Vec::new());
    let (mut pipeline, _probe, _events) = pipeline_with(&engine, false);

    pipeline
        .record_sequence(&settings_with_count(3))
        .await
        .unwrap();
    assert_eq!(pipeline.artifacts().len(), 3);

    pipeline
        .record_sequence(&settings_with_count(2))
        .await
        .unwrap();
    let sequences: Vec<u32> = pipeline.artifacts().iter().map(|a| a.sequence).collect();
    assert_eq!(sequences, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn preview_cancels_before_speaking() {
    let engine = ScriptedEngine::new(Vec::new());
    let (pipeline, _probe, _events) = pipeline_with(&engine, false);

    pipeline
        .preview("1", &PlaybackSettings::default())
        .await
        .unwrap();

    assert_eq!(engine.log(), vec!["cancel", "speak:1"]);
}

#[tokio::test]
async fn late_catalog_population_reaches_an_existing_pipeline() {
    let engine = ScriptedEngine::new(Vec::new());
    let (pipeline, _probe, _events) = pipeline_with(&engine, false);
    assert!(pipeline.selectable_voices("en").is_empty());

    let mut catalog = pipeline.catalog("en");
    let writer = engine.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        writer.set_voices(vec![voice("Chloe", "fr-FR"), voice("Amy", "en-US")]);
    });

    let voices = catalog.wait_until_populated().await;
    let names: Vec<&str> = voices.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["Amy", "Chloe"], "preferred group listed first");

    let names: Vec<String> = pipeline
        .selectable_voices("en")
        .into_iter()
        .map(|v| v.name)
        .collect();
    assert_eq!(names, vec!["Amy", "Chloe"]);
}

#[tokio::test(start_paused = true)]
async fn summary_reports_selected_voice_or_default() {
    let engine = ScriptedEngine::new(vec![voice("Amy", "en-US"), voice("Brian", "en-GB")]);
    let (mut pipeline, _probe, _events) = pipeline_with(&engine, false);

    let mut settings = settings_with_count(1);
    settings.voice = Some("brian".to_string());
    let summary = pipeline.speak_sequence(&settings).await.unwrap();
    assert_eq!(summary.voice, "Brian");

    // Unknown ids fall back to the engine default rather than failing.
    settings.voice = Some("nobody".to_string());
    let summary = pipeline.speak_sequence(&settings).await.unwrap();
    assert_eq!(summary.voice, "Default");
}
