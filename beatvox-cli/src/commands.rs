use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use beatvox_core::capture::CaptureSource;
use beatvox_core::export::{save_all, Clipboard, FsExporter};
use beatvox_core::speech;
use beatvox_core::{
    PipelineEvent, PlaybackSettings, SamplePipeline, SettingsManager, SettingsSummary,
    VoiceArtifact,
};

use crate::clipboard::SystemClipboard;
use crate::{Command, PlaybackArgs};

pub async fn run(command: Command, manager: SettingsManager) -> Result<()> {
    match command {
        Command::Voices { wait } => voices(manager, wait).await,
        Command::Preview { text, playback } => preview(manager, text, playback).await,
        Command::Play { playback, copy } => play(manager, playback, copy).await,
        Command::Record { playback, out, copy } => record(manager, playback, out, copy).await,
        Command::Settings { copy, save, playback } => settings(manager, copy, save, playback),
    }
}

async fn voices(manager: SettingsManager, wait: u64) -> Result<()> {
    let playback = playback_settings(&manager, &PlaybackArgs::default())?;
    let (pipeline, _events) = build_pipeline()?;

    let mut listed = pipeline.selectable_voices(&playback.preferred_language);
    if listed.is_empty() {
        // The catalog can populate late on some platforms; give it a moment.
        let mut catalog = pipeline.catalog(&playback.preferred_language);
        listed = tokio::time::timeout(
            Duration::from_secs(wait),
            catalog.wait_until_populated(),
        )
        .await
        .unwrap_or_default();
    }

    if listed.is_empty() {
        println!("No voices reported by the speech engine.");
        return Ok(());
    }

    let prefix = playback.preferred_language.as_str();
    let (preferred, other): (Vec<_>, Vec<_>) = listed
        .into_iter()
        .partition(|voice| voice.language.starts_with(prefix));

    if !preferred.is_empty() {
        println!("Preferred voices ({prefix}*):");
        for voice in &preferred {
            println!("  {:<40} [{}]", voice.label(), voice.id);
        }
    }
    if !other.is_empty() {
        println!("Other voices:");
        for voice in &other {
            println!("  {:<40} [{}]", voice.label(), voice.id);
        }
    }

    Ok(())
}

async fn preview(manager: SettingsManager, text: String, playback: PlaybackArgs) -> Result<()> {
    let playback = playback_settings(&manager, &playback)?;
    let (pipeline, _events) = build_pipeline()?;

    pipeline
        .preview(&text, &playback)
        .await
        .context("preview task failed")?;
    Ok(())
}

async fn play(manager: SettingsManager, playback: PlaybackArgs, copy: bool) -> Result<()> {
    let playback = playback_settings(&manager, &playback)?;
    let (mut pipeline, events) = build_pipeline()?;

    let renderer = render_progress(events, playback.count, "Playing");
    let result = pipeline.speak_sequence(&playback).await;
    drop(pipeline);
    let _ = renderer.await;

    let summary = result?;
    println!("{summary}");
    if copy {
        copy_summary(&summary);
    }
    Ok(())
}

async fn record(
    manager: SettingsManager,
    playback: PlaybackArgs,
    out: Option<PathBuf>,
    copy: bool,
) -> Result<()> {
    let stored = manager.settings()?;
    let out_dir = out.unwrap_or(stored.output_dir);
    let playback = {
        let mut merged = stored.playback;
        playback.apply(&mut merged);
        merged
    };

    let (mut pipeline, events) = build_pipeline()?;

    let renderer = render_progress(events, playback.count, "Recording");
    let result = pipeline
        .record_sequence(&playback)
        .await
        .map(|artifacts| artifacts.to_vec());
    let recorded = pipeline.artifacts().to_vec();
    drop(pipeline);
    let summary = renderer.await.ok().flatten();

    match result {
        Ok(artifacts) => {
            println!("Recorded {} clips:", artifacts.len());
            export(&out_dir, &artifacts).await?;
            if let Some(summary) = &summary {
                println!("{summary}");
                if copy {
                    copy_summary(summary);
                }
            }
            Ok(())
        }
        Err(e) => {
            if !recorded.is_empty() {
                eprintln!(
                    "Run failed after {} of {} clips; keeping the completed ones.",
                    recorded.len(),
                    playback.count
                );
                export(&out_dir, &recorded).await?;
            }
            Err(e.into())
        }
    }
}

fn settings(
    manager: SettingsManager,
    copy: bool,
    save: bool,
    playback: PlaybackArgs,
) -> Result<()> {
    let merged = playback_settings(&manager, &playback)?;

    if save {
        manager.update(|settings| settings.playback = merged.clone())?;
        manager.save()?;
        println!("Settings saved to {}", manager.path().display());
    }

    let stored = manager.settings()?;
    let summary = SettingsSummary {
        voice: merged
            .voice
            .clone()
            .unwrap_or_else(|| "Default".to_string()),
        pitch: merged.pitch,
        rate: merged.rate,
        volume: merged.volume,
    };
    println!("{summary}");
    println!("Count: {}", merged.count);
    println!("Preferred language: {}", merged.preferred_language);
    println!("Output directory: {}", stored.output_dir.display());

    if copy {
        copy_summary(&summary);
    }
    Ok(())
}

fn playback_settings(manager: &SettingsManager, args: &PlaybackArgs) -> Result<PlaybackSettings> {
    let mut playback = manager.settings()?.playback;
    args.apply(&mut playback);
    Ok(playback)
}

fn build_pipeline() -> Result<(SamplePipeline, mpsc::Receiver<PipelineEvent>)> {
    let engine = speech::system_engine().context("failed to start speech engine")?;
    let (events_tx, events_rx) = mpsc::channel(64);
    let pipeline = SamplePipeline::new(engine, make_capture()).with_events(events_tx);
    Ok((pipeline, events_rx))
}

#[cfg(feature = "capture")]
fn make_capture() -> Box<dyn CaptureSource> {
    Box::new(beatvox_core::capture::system::SystemCapture::new())
}

#[cfg(not(feature = "capture"))]
fn make_capture() -> Box<dyn CaptureSource> {
    Box::new(UnavailableCapture)
}

#[cfg(not(feature = "capture"))]
struct UnavailableCapture;

#[cfg(not(feature = "capture"))]
#[async_trait::async_trait(?Send)]
impl CaptureSource for UnavailableCapture {
    async fn request(
        &self,
        _request: beatvox_core::capture::CaptureRequest,
    ) -> Result<Box<dyn beatvox_core::capture::CaptureStream>, beatvox_core::capture::CaptureError>
    {
        Err(beatvox_core::capture::CaptureError::Device(
            "this build has no audio capture; rebuild with --features capture".to_string(),
        ))
    }
}

/// Render progress events until the pipeline drops its sender; returns the
/// completion summary if the run finished.
fn render_progress(
    mut events: mpsc::Receiver<PipelineEvent>,
    count: u32,
    verb: &'static str,
) -> JoinHandle<Option<SettingsSummary>> {
    let bar = ProgressBar::new(u64::from(count));
    if let Ok(style) = ProgressStyle::with_template("{bar:30.cyan} {msg}") {
        bar.set_style(style);
    }

    tokio::spawn(async move {
        let mut summary = None;
        while let Some(event) = events.recv().await {
            match event {
                PipelineEvent::Progress { current, total } => {
                    bar.set_position(u64::from(current));
                    bar.set_message(format!("{verb} {current} of {total}..."));
                }
                PipelineEvent::Completed { summary: s } => summary = Some(s),
            }
        }
        bar.finish_and_clear();
        summary
    })
}

async fn export(out_dir: &Path, artifacts: &[VoiceArtifact]) -> Result<()> {
    let sink = FsExporter::new(out_dir);
    save_all(&sink, artifacts)
        .await
        .context("failed to export artifacts")?;

    for artifact in artifacts {
        println!(
            "  {:>2}  {}  ({} bytes)",
            artifact.sequence,
            out_dir.join(&artifact.filename).display(),
            artifact.payload.len()
        );
    }
    Ok(())
}

fn copy_summary(summary: &SettingsSummary) {
    match SystemClipboard.write_text(&summary.to_string()) {
        Ok(()) => println!("Settings copied to clipboard."),
        // Clipboard failure is surfaced but never fails the run.
        Err(e) => eprintln!("{e}"),
    }
}
