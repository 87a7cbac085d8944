//! Tool configuration: playback settings and their TOML persistence

mod config;
mod manager;

pub use config::{validate_count, PlaybackSettings, Settings, MAX_COUNT, MIN_COUNT};
pub use manager::SettingsManager;
