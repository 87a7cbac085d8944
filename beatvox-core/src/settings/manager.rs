use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use super::config::Settings;

/// Persisted settings shared across the tool. Each process works on its own
/// in-memory copy; `save` writes it back for future runs.
#[derive(Clone)]
pub struct SettingsManager {
    settings_path: PathBuf,
    inner: Arc<Mutex<Settings>>,
}

impl SettingsManager {
    /// Create a settings manager at the default location
    pub fn new() -> Result<Self> {
        Self::from_path(Self::default_settings_path()?)
    }

    /// Create a settings manager from a specific path
    pub fn from_path(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {parent:?}"))?;
            }
            let contents = toml::to_string_pretty(&Settings::default())
                .context("Failed to serialize default settings")?;
            fs::write(&path, contents)
                .with_context(|| format!("Failed to write default settings to {path:?}"))?;
        }

        let loaded = Self::load_from_file_with_backup(&path)?;

        Ok(Self {
            settings_path: path,
            inner: Arc::new(Mutex::new(loaded)),
        })
    }

    /// Default settings path (~/.beatvox/settings.toml)
    fn default_settings_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".beatvox").join("settings.toml"))
    }

    /// Load settings from a TOML file, moving a corrupt file aside rather
    /// than refusing to start
    fn load_from_file_with_backup(path: &Path) -> Result<Settings> {
        if !path.exists() {
            return Ok(Settings::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {path:?}"))?;

        match toml::from_str(&contents) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                let backup_path = path.with_extension("toml.backup");
                tracing::warn!(error = %e, ?backup_path, "settings file corrupt, backing up");
                fs::rename(path, &backup_path).with_context(|| {
                    format!("Failed to backup corrupted settings to {backup_path:?}")
                })?;
                Ok(Settings::default())
            }
        }
    }

    pub fn settings(&self) -> Result<Settings> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        Ok(guard.clone())
    }

    pub fn update(&self, apply: impl FnOnce(&mut Settings)) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        apply(&mut guard);
        Ok(())
    }

    /// Write the current settings back to disk
    pub fn save(&self) -> Result<()> {
        let settings = self.settings()?;
        let contents =
            toml::to_string_pretty(&settings).context("Failed to serialize settings")?;
        fs::write(&self.settings_path, contents)
            .with_context(|| format!("Failed to write settings to {:?}", self.settings_path))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }
}
