use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum RecorderStatus {
    #[default]
    Idle,
    Recording,
}

/// Recorder status plus the cooldown that keeps a recording alive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MotionState {
    pub status: RecorderStatus,
    pub cooldown: usize,
}

impl MotionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.status == RecorderStatus::Recording
    }

    pub fn reset_cooldown(&mut self, margin: usize) {
        self.cooldown = margin;
    }

    pub fn begin_recording(&mut self) {
        self.status = RecorderStatus::Recording;
    }

    /// Called once per recorded frame. Returns true when the cooldown has run
    /// out and the recording must stop; otherwise counts one frame down.
    pub fn tick(&mut self) -> bool {
        if self.cooldown == 0 {
            return true;
        }
        self.cooldown -= 1;
        false
    }

    pub fn end_recording(&mut self) {
        *self = Self::default();
    }
}

/// One motion episode, from trigger to cooldown expiry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeSummary {
    pub id: String,
    pub file_name: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub preroll_frames: usize,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// No episode in progress.
    Idle,
    /// This frame triggered a new episode.
    Started(EpisodeSummary),
    /// Recording continues with `cooldown` frames left.
    Continued { cooldown: usize },
    /// The cooldown ran out on this frame and the artifact was finalized.
    Stopped(EpisodeSummary),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSnapshot {
    pub state: MotionState,
    pub buffered: usize,
    pub frames_seen: u64,
    pub episodes: u64,
    pub dimensions: (u32, u32),
}
