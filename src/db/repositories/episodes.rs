use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{parse_datetime, parse_optional_datetime, parse_status, to_i64, to_u32, to_u64},
    Database,
};
use crate::models::{Episode, EpisodeStatus};

const EPISODE_COLUMNS: &str = "id, file_name, started_at, stopped_at, status, preroll_frames, \
                               frame_count, width, height, created_at, updated_at";

fn row_to_episode(row: &Row) -> Result<Episode> {
    let started_at: String = row.get("started_at")?;
    let stopped_at: Option<String> = row.get("stopped_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let status: String = row.get("status")?;
    let preroll_frames: i64 = row.get("preroll_frames")?;
    let frame_count: i64 = row.get("frame_count")?;
    let width: i64 = row.get("width")?;
    let height: i64 = row.get("height")?;

    Ok(Episode {
        id: row.get("id")?,
        file_name: row.get("file_name")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        stopped_at: parse_optional_datetime(stopped_at, "stopped_at")?,
        status: parse_status(&status)?,
        preroll_frames: to_u64(preroll_frames, "preroll_frames")?,
        frame_count: to_u64(frame_count, "frame_count")?,
        width: to_u32(width, "width")?,
        height: to_u32(height, "height")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    pub async fn insert_episode(&self, episode: &Episode) -> Result<()> {
        let record = episode.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO episodes (id, file_name, started_at, stopped_at, status, preroll_frames, frame_count, width, height, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.id,
                    record.file_name,
                    record.started_at.to_rfc3339(),
                    record.stopped_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.status.as_str(),
                    to_i64(record.preroll_frames)?,
                    to_i64(record.frame_count)?,
                    record.width,
                    record.height,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Records an episode cut short by a sink failure. Inserts the row if the
    /// start was never catalogued, otherwise overwrites its outcome.
    pub async fn save_interrupted_episode(&self, episode: &Episode) -> Result<()> {
        let record = episode.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO episodes (id, file_name, started_at, stopped_at, status, preroll_frames, frame_count, width, height, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(id) DO UPDATE SET
                     status = excluded.status,
                     stopped_at = excluded.stopped_at,
                     frame_count = excluded.frame_count,
                     updated_at = excluded.updated_at",
                params![
                    record.id,
                    record.file_name,
                    record.started_at.to_rfc3339(),
                    record.stopped_at.as_ref().map(|dt| dt.to_rfc3339()),
                    EpisodeStatus::Interrupted.as_str(),
                    to_i64(record.preroll_frames)?,
                    to_i64(record.frame_count)?,
                    record.width,
                    record.height,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Marks a recording as completed once its artifact has been finalized.
    pub async fn finish_episode(
        &self,
        episode_id: &str,
        frame_count: u64,
        stopped_at: DateTime<Utc>,
    ) -> Result<()> {
        let episode_id = episode_id.to_string();
        self.execute(move |conn| {
            let updated = conn.execute(
                "UPDATE episodes
                 SET status = ?1,
                     frame_count = ?2,
                     stopped_at = ?3,
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    EpisodeStatus::Completed.as_str(),
                    to_i64(frame_count)?,
                    stopped_at.to_rfc3339(),
                    episode_id,
                ],
            )?;
            if updated == 0 {
                bail!("episode {episode_id} not found");
            }
            Ok(())
        })
        .await
    }

    pub async fn mark_episode_interrupted(
        &self,
        episode_id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let episode_id = episode_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE episodes
                 SET status = ?1,
                     updated_at = ?2
                 WHERE id = ?3",
                params![
                    EpisodeStatus::Interrupted.as_str(),
                    updated_at.to_rfc3339(),
                    episode_id,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_episode(&self, episode_id: &str) -> Result<Option<Episode>> {
        let episode_id = episode_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {EPISODE_COLUMNS} FROM episodes WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt
                .query_row(params![episode_id], |row| Ok(row_to_episode(row)))
                .optional()?;
            row.transpose()
        })
        .await
    }

    /// Most recent episodes first.
    pub async fn list_episodes(&self, limit: usize) -> Result<Vec<Episode>> {
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {EPISODE_COLUMNS} FROM episodes ORDER BY started_at DESC LIMIT ?1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![to_i64(limit as u64)?], |row| {
                Ok(row_to_episode(row))
            })?;

            let mut episodes = Vec::new();
            for row in rows {
                episodes.push(row??);
            }
            Ok(episodes)
        })
        .await
    }

    /// Episodes whose recording was never finalized, e.g. after a crash.
    pub async fn get_incomplete_episodes(&self) -> Result<Vec<Episode>> {
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {EPISODE_COLUMNS} FROM episodes WHERE status = ?1 ORDER BY started_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![EpisodeStatus::Recording.as_str()], |row| {
                Ok(row_to_episode(row))
            })?;

            let mut episodes = Vec::new();
            for row in rows {
                episodes.push(row??);
            }
            Ok(episodes)
        })
        .await
    }
}
