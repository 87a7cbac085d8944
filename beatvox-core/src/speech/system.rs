//! Native speech synthesis via the platform engine
//!
//! Resolves `speak` through utterance end/stop callbacks where the backend
//! supports them, falling back to polling `is_speaking`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};
use tts::Tts;

use super::engine::{SpeechEngine, SpeechError};
use super::types::{UtteranceSettings, VoiceInfo};

type PendingUtterance = Arc<Mutex<Option<oneshot::Sender<()>>>>;

pub struct SystemSpeech {
    tts: Mutex<Tts>,
    pending: PendingUtterance,
    voices_tx: watch::Sender<Vec<VoiceInfo>>,
    callbacks: bool,
    can_is_speaking: bool,
    can_pitch: bool,
    can_rate: bool,
    can_volume: bool,
    can_voice: bool,
}

impl SystemSpeech {
    pub fn new() -> Result<Self, SpeechError> {
        let mut tts = Tts::default().map_err(|e| SpeechError::Engine(e.to_string()))?;
        let features = tts.supported_features();

        let pending: PendingUtterance = Arc::new(Mutex::new(None));
        if features.utterance_callbacks {
            let on_end = pending.clone();
            tts.on_utterance_end(Some(Box::new(move |_| resolve_pending(&on_end))))
                .map_err(|e| SpeechError::Engine(e.to_string()))?;
            let on_stop = pending.clone();
            tts.on_utterance_stop(Some(Box::new(move |_| resolve_pending(&on_stop))))
                .map_err(|e| SpeechError::Engine(e.to_string()))?;
        }

        let initial = read_voices(&tts);
        let (voices_tx, _) = watch::channel(initial);

        Ok(Self {
            tts: Mutex::new(tts),
            pending,
            voices_tx,
            callbacks: features.utterance_callbacks,
            can_is_speaking: features.is_speaking,
            can_pitch: features.pitch,
            can_rate: features.rate,
            can_volume: features.volume,
            can_voice: features.voice,
        })
    }

    /// Re-read the backend catalog, notifying subscribers if it changed.
    /// Some backends report an empty list until their catalog warms up.
    pub fn refresh_voices(&self) {
        let Ok(tts) = self.tts.lock() else {
            return;
        };
        let current = read_voices(&tts);
        if *self.voices_tx.borrow() != current {
            let _ = self.voices_tx.send(current);
        }
    }

    fn apply_settings(&self, tts: &mut Tts, settings: &UtteranceSettings) {
        if self.can_pitch {
            let pitch = scale_about_normal(
                settings.pitch,
                (0.0, 1.0, 2.0),
                (tts.min_pitch(), tts.normal_pitch(), tts.max_pitch()),
            );
            if let Err(e) = tts.set_pitch(pitch) {
                tracing::debug!(error = ?e, "set_pitch failed");
            }
        }
        if self.can_rate {
            let rate = scale_about_normal(
                settings.rate,
                (0.1, 1.0, 10.0),
                (tts.min_rate(), tts.normal_rate(), tts.max_rate()),
            );
            if let Err(e) = tts.set_rate(rate) {
                tracing::debug!(error = ?e, "set_rate failed");
            }
        }
        if self.can_volume {
            let span = tts.max_volume() - tts.min_volume();
            let volume = tts.min_volume() + settings.volume.clamp(0.0, 1.0) * span;
            if let Err(e) = tts.set_volume(volume) {
                tracing::debug!(error = ?e, "set_volume failed");
            }
        }
        if self.can_voice {
            if let Some(voice) = &settings.voice {
                match tts.voices() {
                    Ok(native) => {
                        if let Some(found) = native.iter().find(|v| v.id() == voice.id) {
                            if let Err(e) = tts.set_voice(found) {
                                tracing::warn!(error = ?e, voice = %voice.id, "set_voice failed");
                            }
                        } else {
                            tracing::warn!(voice = %voice.id, "voice not found, using default");
                        }
                    }
                    Err(e) => tracing::debug!(error = ?e, "voice listing failed"),
                }
            }
        }
    }

    async fn wait_by_polling(&self, text: &str) -> Result<(), SpeechError> {
        if self.can_is_speaking {
            loop {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let speaking = {
                    let tts = self.tts.lock().map_err(|_| poisoned())?;
                    tts.is_speaking()
                        .map_err(|e| SpeechError::Engine(e.to_string()))?
                };
                if !speaking {
                    return Ok(());
                }
            }
        }

        // The backend reports nothing at all; rough per-character estimate.
        tokio::time::sleep(Duration::from_millis(300 + 60 * text.len() as u64)).await;
        Ok(())
    }
}

#[async_trait]
impl SpeechEngine for SystemSpeech {
    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices_tx.borrow().clone()
    }

    fn subscribe_voices(&self) -> watch::Receiver<Vec<VoiceInfo>> {
        self.voices_tx.subscribe()
    }

    async fn speak(&self, text: &str, settings: &UtteranceSettings) -> Result<(), SpeechError> {
        let completion = {
            let mut tts = self.tts.lock().map_err(|_| poisoned())?;
            self.apply_settings(&mut tts, settings);

            let completion = if self.callbacks {
                let (tx, rx) = oneshot::channel();
                *self.pending.lock().map_err(|_| poisoned())? = Some(tx);
                Some(rx)
            } else {
                None
            };

            if let Err(e) = tts.speak(text.to_string(), false) {
                if let Ok(mut slot) = self.pending.lock() {
                    slot.take();
                }
                return Err(SpeechError::Utterance(e.to_string()));
            }
            completion
        };

        match completion {
            // A dropped sender means the engine went away; treat as ended.
            Some(rx) => {
                let _ = rx.await;
                Ok(())
            }
            None => self.wait_by_polling(text).await,
        }
    }

    fn cancel_all(&self) {
        if let Ok(mut tts) = self.tts.lock() {
            if let Err(e) = tts.stop() {
                tracing::debug!(error = ?e, "stop failed");
            }
        }
        // Resolve any waiter even if the backend never reports the stop.
        resolve_pending(&self.pending);
    }
}

fn resolve_pending(pending: &PendingUtterance) {
    if let Ok(mut slot) = pending.lock() {
        if let Some(tx) = slot.take() {
            let _ = tx.send(());
        }
    }
}

fn read_voices(tts: &Tts) -> Vec<VoiceInfo> {
    match tts.voices() {
        Ok(voices) => voices
            .into_iter()
            .map(|v| VoiceInfo {
                id: v.id(),
                name: v.name(),
                language: v.language().as_str().to_string(),
            })
            .collect(),
        Err(e) => {
            tracing::debug!(error = ?e, "voice listing failed");
            Vec::new()
        }
    }
}

fn poisoned() -> SpeechError {
    SpeechError::Engine("speech engine lock poisoned".to_string())
}

/// Map a value from a (lo, mid, hi) user range onto the engine's
/// (min, normal, max) range, keeping the midpoints aligned.
fn scale_about_normal(value: f32, user: (f32, f32, f32), engine: (f32, f32, f32)) -> f32 {
    let (lo, mid, hi) = user;
    let (min, normal, max) = engine;
    let value = value.clamp(lo, hi);
    if value >= mid {
        normal + (value - mid) / (hi - mid) * (max - normal)
    } else {
        min + (value - lo) / (mid - lo) * (normal - min)
    }
}
