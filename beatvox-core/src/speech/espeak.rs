//! Speech synthesis through the espeak binary
//!
//! Native synthesizers on Linux require speech-dispatcher, which is often
//! absent; spawning espeak per utterance gives a deterministic completion
//! signal (process exit) without extra system services.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::watch;

use super::engine::{SpeechEngine, SpeechError};
use super::types::{UtteranceSettings, VoiceInfo};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct EspeakSpeech {
    program: String,
    current: Arc<Mutex<Option<Child>>>,
    voices_tx: watch::Sender<Vec<VoiceInfo>>,
}

impl EspeakSpeech {
    pub fn new() -> Result<Self, SpeechError> {
        Self::with_program("espeak")
    }

    pub fn with_program(program: impl Into<String>) -> Result<Self, SpeechError> {
        let program = program.into();

        // Probe the binary and load the catalog up front.
        let output = std::process::Command::new(&program)
            .arg("--voices")
            .output()
            .map_err(|e| SpeechError::Engine(format!("{program} not available: {e}")))?;

        let listing = String::from_utf8_lossy(&output.stdout);
        let voices = parse_voice_listing(&listing);
        let (voices_tx, _) = watch::channel(voices);

        Ok(Self {
            program,
            current: Arc::new(Mutex::new(None)),
            voices_tx,
        })
    }
}

#[async_trait]
impl SpeechEngine for EspeakSpeech {
    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices_tx.borrow().clone()
    }

    fn subscribe_voices(&self) -> watch::Receiver<Vec<VoiceInfo>> {
        self.voices_tx.subscribe()
    }

    async fn speak(&self, text: &str, settings: &UtteranceSettings) -> Result<(), SpeechError> {
        let mut command = Command::new(&self.program);
        command
            .arg("-p")
            .arg(format!("{:.0}", pitch_arg(settings.pitch)))
            .arg("-s")
            .arg(format!("{:.0}", speed_arg(settings.rate)))
            .arg("-a")
            .arg(format!("{:.0}", amplitude_arg(settings.volume)));
        if let Some(voice) = &settings.voice {
            command.arg("-v").arg(&voice.id);
        }
        command
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| SpeechError::Engine(format!("failed to launch {}: {e}", self.program)))?;

        // Last writer wins: replacing a still-running child kills it on drop.
        *self.current.lock().map_err(|_| poisoned())? = Some(child);

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            let mut slot = self.current.lock().map_err(|_| poisoned())?;
            match slot.as_mut() {
                // Cancelled; the stopped utterance still counts as ended.
                None => return Ok(()),
                Some(child) => match child.try_wait() {
                    Ok(Some(status)) => {
                        *slot = None;
                        if status.success() {
                            return Ok(());
                        }
                        return Err(SpeechError::Utterance(format!(
                            "{} exited with {status}",
                            self.program
                        )));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        *slot = None;
                        return Err(SpeechError::Utterance(e.to_string()));
                    }
                },
            }
        }
    }

    fn cancel_all(&self) {
        if let Ok(mut slot) = self.current.lock() {
            if let Some(mut child) = slot.take() {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(error = ?e, "failed to kill utterance process");
                }
            }
        }
    }
}

fn poisoned() -> SpeechError {
    SpeechError::Engine("speech engine lock poisoned".to_string())
}

/// espeak pitch is 0-99 with 50 as default; map 0.0-2.0 onto it
fn pitch_arg(pitch: f32) -> f32 {
    pitch.clamp(0.0, 2.0) / 2.0 * 99.0
}

/// espeak speed is words per minute, default 175, usable range ~80-450
fn speed_arg(rate: f32) -> f32 {
    (175.0 * rate.clamp(0.1, 10.0)).clamp(80.0, 450.0)
}

/// espeak amplitude is 0-200 with 100 as default; volume 1.0 maps to 100
fn amplitude_arg(volume: f32) -> f32 {
    volume.clamp(0.0, 1.0) * 100.0
}

/// Parse `espeak --voices` output.
///
/// Columns: Pty Language Age/Gender VoiceName File [Other Languages]
fn parse_voice_listing(listing: &str) -> Vec<VoiceInfo> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            Some(VoiceInfo {
                id: fields[3].to_string(),
                name: fields[3].to_string(),
                language: fields[1].to_string(),
            })
        })
        .collect()
}
