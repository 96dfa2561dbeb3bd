pub mod controller;
pub mod loop_worker;

use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::db::Database;
use crate::models::{Episode, EpisodeStatus};
use crate::motion::EpisodeSummary;

pub use controller::PipelineController;
pub use loop_worker::{capture_loop, watch_loop, CaptureOptions, Message, WatchReport};

/// Episode boundaries reported by the watch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeEvent {
    Started(EpisodeSummary),
    Finished(EpisodeSummary),
    /// Cut short by a write failure; the artifact holds `frame_count` frames.
    Abandoned(EpisodeSummary),
}

/// Persists episode events into the catalogue until the sender side is dropped.
/// Returns how many events were stored.
pub async fn record_episodes(db: Database, mut events: UnboundedReceiver<EpisodeEvent>) -> u64 {
    let mut stored = 0;

    while let Some(event) = events.recv().await {
        let result = match &event {
            EpisodeEvent::Started(summary) => {
                let episode = Episode::from_summary(summary, EpisodeStatus::Recording, Utc::now());
                db.insert_episode(&episode).await
            }
            EpisodeEvent::Finished(summary) => {
                let stopped_at = summary.stopped_at.unwrap_or_else(Utc::now);
                db.finish_episode(&summary.id, summary.frame_count, stopped_at)
                    .await
            }
            EpisodeEvent::Abandoned(summary) => {
                let episode =
                    Episode::from_summary(summary, EpisodeStatus::Interrupted, Utc::now());
                db.save_interrupted_episode(&episode).await
            }
        };

        match result {
            Ok(()) => stored += 1,
            Err(err) => error!("Failed to record {event:?} in catalogue: {err:#}"),
        }
    }

    info!("Episode recorder finished ({stored} events stored)");
    stored
}

/// Marks episodes left open by a previous crash as interrupted.
pub async fn recover_interrupted(db: &Database) -> anyhow::Result<usize> {
    let incomplete = db.get_incomplete_episodes().await?;
    let now = Utc::now();
    for episode in &incomplete {
        warn!(
            "Recovered unfinished episode {} ({}); marking as Interrupted",
            episode.id, episode.file_name
        );
        db.mark_episode_interrupted(&episode.id, now).await?;
    }
    Ok(incomplete.len())
}
