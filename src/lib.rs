pub mod capture;
pub mod cli;
pub mod db;
pub mod error;
pub mod frame;
pub mod handoff;
pub mod models;
pub mod motion;
pub mod pipeline;
pub mod recording;
pub mod settings;
pub mod shutdown;
mod utils;

use anyhow::{Context, Result};
use log::{info, warn};

use capture::{CaptureSource, ReplaySource, SyntheticConfig, SyntheticSource};
use cli::{Args, SourceKind};
use db::Database;
use pipeline::{record_episodes, recover_interrupted, PipelineController};
use recording::MjpegFileSink;
use settings::{RecorderSettings, SettingsStore};

pub use error::RecorderError;
pub use frame::Frame;
pub use handoff::BlockingHandoff;
pub use motion::{MotionDetector, MotionRecorderController, PreRollBuffer};
pub use recording::RecordingSession;

fn load_settings(args: &Args) -> Result<RecorderSettings> {
    let store = SettingsStore::new(args.config.clone())?;
    let mut settings = store.settings();
    settings.apply_env_overrides()?;
    args.apply_to(&mut settings);
    settings
        .validate()
        .context("invalid recorder settings")?;

    if args.save_config {
        store.update(settings.clone())?;
        info!("Saved settings to {}", args.config.display());
    }
    Ok(settings)
}

fn build_source(args: &Args) -> Result<Box<dyn CaptureSource>> {
    match args.source {
        SourceKind::Synthetic => {
            let config = SyntheticConfig {
                width: args.width,
                height: args.height,
                frames: (args.frames > 0).then_some(args.frames),
                ..SyntheticConfig::default()
            };
            Ok(Box::new(SyntheticSource::new(config)?))
        }
        SourceKind::Replay => {
            let dir = args
                .replay_dir
                .as_ref()
                .context("--replay-dir is required for the replay source")?;
            Ok(Box::new(ReplaySource::open(dir)?))
        }
    }
}

/// Runs the watch loop until the source is exhausted or Ctrl-C is pressed.
pub async fn run(args: Args) -> Result<()> {
    let settings = load_settings(&args)?;
    let sink = MjpegFileSink::new(&settings.output_dir, settings.jpeg_quality)?;

    let database = Database::new(args.catalogue_path(&settings))?;
    let recovered = recover_interrupted(&database).await?;
    if recovered > 0 {
        warn!("{recovered} episode(s) from a previous run were never finalized");
    }

    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let recorder = tokio::spawn(record_episodes(database.clone(), events_rx));

    let mut pipeline = PipelineController::new();
    pipeline.start(build_source(&args)?, sink, &settings, Some(events_tx))?;

    if let Some(token) = pipeline.shutdown_token() {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received; finishing current frame and shutting down");
                token.cancel();
            }
        });
    }

    let report = tokio::task::spawn_blocking(move || pipeline.wait())
        .await
        .context("pipeline join task failed")??;

    let stored = recorder.await.context("episode recorder task failed")?;
    info!(
        "Processed {} frames, {} episodes ({} open failures, {} write failures, {} catalogue events)",
        report.frames, report.episodes, report.open_failures, report.write_failures, stored
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn save_config_writes_effective_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("recorder.json");
        let config_arg = config.to_str().unwrap();

        let args = Args::parse_from([
            "motion-recorder",
            "--config",
            config_arg,
            "--margin",
            "7",
            "--save-config",
        ]);
        assert_eq!(load_settings(&args).unwrap().margin, 7);

        let saved = SettingsStore::new(config.clone()).unwrap().settings();
        assert_eq!(saved.margin, 7);

        // Without the flag the file is left alone.
        let args = Args::parse_from(["motion-recorder", "--config", config_arg, "--margin", "9"]);
        assert_eq!(load_settings(&args).unwrap().margin, 9);
        assert_eq!(SettingsStore::new(config).unwrap().settings().margin, 7);
    }
}
