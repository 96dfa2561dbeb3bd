use chrono::{DateTime, Local, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::error::RecorderError;
use crate::frame::Frame;

use super::sink::{ArtifactHandle, OutputSink};

/// Artifact names are the local wall-clock time the session started.
pub const ARTIFACT_TIME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

pub fn artifact_name(started_at: DateTime<Local>, extension: &str) -> String {
    format!("{}.{}", started_at.format(ARTIFACT_TIME_FORMAT), extension)
}

struct OpenSession<H> {
    id: String,
    started_at: DateTime<Utc>,
    frames: u64,
    handle: H,
}

/// Read-only view of the open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDetails {
    pub id: String,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub frames: u64,
}

/// Lifecycle of one output artifact at a time: `Closed -> Open -> Closed`.
pub struct RecordingSession<S: OutputSink> {
    sink: S,
    extension: String,
    dimensions: (u32, u32),
    open: Option<OpenSession<S::Handle>>,
}

impl<S: OutputSink> RecordingSession<S> {
    pub fn new(sink: S, extension: impl Into<String>, dimensions: (u32, u32)) -> Self {
        Self {
            sink,
            extension: extension.into(),
            dimensions,
            open: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn details(&self) -> Option<SessionDetails> {
        self.open.as_ref().map(|open| SessionDetails {
            id: open.id.clone(),
            name: open.handle.name().to_string(),
            started_at: open.started_at,
            frames: open.frames,
        })
    }

    pub fn start(&mut self) -> Result<(), RecorderError> {
        self.start_at(Local::now())
    }

    /// Opens a new artifact named after `now`.
    pub fn start_at(&mut self, now: DateTime<Local>) -> Result<(), RecorderError> {
        if let Some(open) = &self.open {
            return Err(RecorderError::SessionInUse {
                name: open.handle.name().to_string(),
            });
        }

        let name = artifact_name(now, &self.extension);
        let handle = self
            .sink
            .open(&name, self.dimensions)
            .map_err(|source| RecorderError::SessionOpenFailed {
                name: name.clone(),
                source,
            })?;

        self.open = Some(OpenSession {
            id: Uuid::new_v4().to_string(),
            started_at: now.with_timezone(&Utc),
            frames: 0,
            handle,
        });
        Ok(())
    }

    pub fn append(&mut self, frame: &Frame) -> Result<(), RecorderError> {
        let open = self.open.as_mut().ok_or(RecorderError::SessionNotOpen)?;

        self.sink
            .write_frame(&mut open.handle, frame)
            .map_err(|source| RecorderError::WriteFailed {
                name: open.handle.name().to_string(),
                source,
            })?;
        open.frames += 1;
        Ok(())
    }

    /// Finalizes the artifact. The session is closed afterwards even if the
    /// sink reports an error while finalizing.
    pub fn stop(&mut self) -> Result<(), RecorderError> {
        let Some(open) = self.open.take() else {
            return Ok(());
        };

        let name = open.handle.name().to_string();
        match self.sink.close(open.handle) {
            Ok(()) => {
                info!("Finalized {name} with {} frames", open.frames);
                Ok(())
            }
            Err(source) => {
                warn!("Finalizing {name} failed: {source:#}");
                Err(RecorderError::WriteFailed { name, source })
            }
        }
    }
}
