use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use beatvox_core::SettingsManager;

mod clipboard;
mod commands;

#[derive(Parser, Debug)]
#[command(name = "beatvox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Spoken-count voice sample generator for the beatvox metronome")]
struct Args {
    /// Settings file to use instead of ~/.beatvox/settings.toml
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// List available voices, preferred-language group first
    Voices {
        /// Seconds to wait for a slow voice catalog
        #[arg(long, default_value_t = 3)]
        wait: u64,
    },

    /// Speak a short sample once with the given settings
    Preview {
        /// Text to speak
        #[arg(long, default_value = "1")]
        text: String,

        #[command(flatten)]
        playback: PlaybackArgs,
    },

    /// Speak the full 1..N sequence aloud
    Play {
        #[command(flatten)]
        playback: PlaybackArgs,

        /// Copy the settings summary to the clipboard afterwards
        #[arg(long)]
        copy: bool,
    },

    /// Record the 1..N sequence into per-number WAV files
    Record {
        #[command(flatten)]
        playback: PlaybackArgs,

        /// Output directory for the generated files
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Copy the settings summary to the clipboard afterwards
        #[arg(long)]
        copy: bool,
    },

    /// Show the persisted settings
    Settings {
        /// Copy the settings summary to the clipboard
        #[arg(long)]
        copy: bool,

        /// Persist playback overrides given on the command line
        #[arg(long)]
        save: bool,

        #[command(flatten)]
        playback: PlaybackArgs,
    },
}

/// Playback overrides shared by the speaking subcommands
#[derive(clap::Args, Debug, Clone, Default)]
pub(crate) struct PlaybackArgs {
    /// Voice id from `beatvox voices`
    #[arg(long)]
    voice: Option<String>,

    /// Pitch, 0.0-2.0
    #[arg(long)]
    pitch: Option<f32>,

    /// Rate, 0.1-10.0
    #[arg(long)]
    rate: Option<f32>,

    /// Volume, 0.0-1.0
    #[arg(long)]
    volume: Option<f32>,

    /// Upper bound of the spoken sequence, 1-32
    #[arg(long, short = 'n')]
    count: Option<u32>,

    /// Language tag prefix whose voices are preferred
    #[arg(long)]
    language: Option<String>,
}

impl PlaybackArgs {
    pub(crate) fn apply(&self, settings: &mut beatvox_core::PlaybackSettings) {
        if let Some(voice) = &self.voice {
            settings.voice = Some(voice.clone());
        }
        if let Some(pitch) = self.pitch {
            settings.pitch = pitch;
        }
        if let Some(rate) = self.rate {
            settings.rate = rate;
        }
        if let Some(volume) = self.volume {
            settings.volume = volume;
        }
        if let Some(count) = self.count {
            settings.count = count;
        }
        if let Some(language) = &self.language {
            settings.preferred_language = language.clone();
        }
    }
}

fn main() -> Result<()> {
    setup_tracing()?;

    // Capture streams are not Send on every platform; keep everything on a
    // current-thread runtime.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let local = tokio::task::LocalSet::new();
        local.run_until(async_main()).await
    })
}

async fn async_main() -> Result<()> {
    let args = Args::parse();

    tracing::info!(command = ?args.command, "beatvox startup");

    let manager = match &args.settings {
        Some(path) => SettingsManager::from_path(path.clone())?,
        None => SettingsManager::new()?,
    };

    commands::run(args.command, manager).await
}

fn setup_tracing() -> Result<()> {
    use tracing_subscriber::fmt;

    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    let trace_dir = PathBuf::from(home).join(".beatvox").join("trace");
    fs::create_dir_all(&trace_dir)?;

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(trace_dir.join("beatvox.log"))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false),
        )
        .init();

    Ok(())
}
