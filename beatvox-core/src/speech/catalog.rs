//! Voice catalog ordering and delayed-population handling
//!
//! Platforms may report an empty catalog at startup and fill it in later.
//! `VoiceCatalog` wraps the engine's watch channel so callers get an initial
//! best-effort read plus a wakeup when the list changes.

use tokio::sync::watch;

use super::types::VoiceInfo;

/// Order voices with the preferred-language group first.
///
/// Entries whose language tag starts with `prefix` come before the rest;
/// both groups keep the catalog's original relative order.
pub fn partition_by_language(voices: &[VoiceInfo], prefix: &str) -> Vec<VoiceInfo> {
    let (preferred, other): (Vec<_>, Vec<_>) = voices
        .iter()
        .cloned()
        .partition(|voice| voice.language.starts_with(prefix));

    preferred.into_iter().chain(other).collect()
}

/// Read handle over an engine's voice catalog
pub struct VoiceCatalog {
    receiver: watch::Receiver<Vec<VoiceInfo>>,
    preferred: String,
}

impl VoiceCatalog {
    pub fn new(receiver: watch::Receiver<Vec<VoiceInfo>>, preferred: impl Into<String>) -> Self {
        Self {
            receiver,
            preferred: preferred.into(),
        }
    }

    /// Current selectable list, preferred-language group first
    pub fn selectable(&self) -> Vec<VoiceInfo> {
        partition_by_language(&self.receiver.borrow(), &self.preferred)
    }

    /// Wait until the catalog is non-empty, then return the selectable list.
    ///
    /// Returns the empty list if the engine goes away before populating.
    pub async fn wait_until_populated(&mut self) -> Vec<VoiceInfo> {
        loop {
            let current = self.selectable();
            if !current.is_empty() {
                return current;
            }
            if self.receiver.changed().await.is_err() {
                return Vec::new();
            }
        }
    }
}
