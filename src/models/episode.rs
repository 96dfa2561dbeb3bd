use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::motion::EpisodeSummary;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EpisodeStatus {
    Recording,
    Completed,
    Interrupted,
}

impl EpisodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeStatus::Recording => "Recording",
            EpisodeStatus::Completed => "Completed",
            EpisodeStatus::Interrupted => "Interrupted",
        }
    }
}

/// Catalogue row for one recorded artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub file_name: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub status: EpisodeStatus,
    pub preroll_frames: u64,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Episode {
    pub fn from_summary(summary: &EpisodeSummary, status: EpisodeStatus, now: DateTime<Utc>) -> Self {
        Self {
            id: summary.id.clone(),
            file_name: summary.file_name.clone(),
            started_at: summary.started_at,
            stopped_at: summary.stopped_at,
            status,
            preroll_frames: summary.preroll_frames as u64,
            frame_count: summary.frame_count,
            width: summary.width,
            height: summary.height,
            created_at: now,
            updated_at: now,
        }
    }
}
