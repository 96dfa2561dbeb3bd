use log::{debug, info, warn};

use crate::error::{fatal, RecorderError};
use crate::frame::Frame;
use crate::recording::{OutputSink, RecordingSession};

use super::detector::MotionDetector;
use super::preroll::PreRollBuffer;
use super::state::{ControllerSnapshot, EpisodeSummary, FrameOutcome, MotionState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Pre-roll capacity and cooldown length, in frames.
    pub margin: usize,
    pub pixel_threshold: u8,
    pub area_divisor: u32,
    pub extension: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            margin: 100,
            pixel_threshold: 10,
            area_divisor: 10,
            extension: "mjpeg".into(),
        }
    }
}

/// Drives a [`RecordingSession`] from consecutive frames.
///
/// Every frame is compared with its predecessor. Motion opens a session
/// (replaying the pre-roll first) or refreshes the cooldown of the open one;
/// `margin` frames without motion close it again.
pub struct MotionRecorderController<S: OutputSink> {
    margin: usize,
    detector: MotionDetector,
    preroll: PreRollBuffer,
    session: RecordingSession<S>,
    state: MotionState,
    previous: Frame,
    dimensions: (u32, u32),
    episode: Option<EpisodeSummary>,
    /// Episode ended by a sink failure, waiting for [`take_abandoned`](Self::take_abandoned).
    abandoned: Option<EpisodeSummary>,
    frames_seen: u64,
    episodes: u64,
}

impl<S: OutputSink> MotionRecorderController<S> {
    /// Seeds the controller with the first captured frame, which fixes the
    /// frame size for the lifetime of the controller.
    ///
    /// # Panics
    ///
    /// Panics if `config.margin` is zero.
    pub fn new(first: Frame, sink: S, config: &ControllerConfig) -> Self {
        let dimensions = first.dimensions();
        let detector = MotionDetector::for_dimensions(
            dimensions.0,
            dimensions.1,
            config.pixel_threshold,
            config.area_divisor,
        );

        let mut preroll = PreRollBuffer::new(config.margin);
        preroll.push(first.clone());

        info!(
            "Watching {}x{} frames (margin {}, pixel threshold {}, area threshold {})",
            dimensions.0,
            dimensions.1,
            config.margin,
            detector.pixel_threshold(),
            detector.area_threshold()
        );

        Self {
            margin: config.margin,
            detector,
            preroll,
            session: RecordingSession::new(sink, config.extension.clone(), dimensions),
            state: MotionState::new(),
            previous: first,
            dimensions,
            episode: None,
            abandoned: None,
            frames_seen: 1,
            episodes: 0,
        }
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            state: self.state,
            buffered: self.preroll.len(),
            frames_seen: self.frames_seen,
            episodes: self.episodes,
            dimensions: self.dimensions,
        }
    }

    /// Runs one step of the state machine for a newly captured frame.
    ///
    /// `SessionOpenFailed` and `WriteFailed` abandon the current episode and
    /// leave the controller idle. The frame is still buffered and becomes the
    /// reference for the next comparison.
    ///
    /// # Panics
    ///
    /// Panics if `current` does not have the size of the seed frame.
    pub fn on_frame(&mut self, current: Frame) -> Result<FrameOutcome, RecorderError> {
        if current.dimensions() != self.dimensions {
            fatal(RecorderError::DimensionMismatch {
                expected: self.dimensions,
                actual: current.dimensions(),
            });
        }

        let outcome = self.step(&current);

        // The ring holds the frames preceding the next one, so the current
        // frame goes in only after it has been evaluated.
        self.preroll.push(current.clone());
        self.previous = current;
        self.frames_seen += 1;

        outcome
    }

    /// The episode cut short by the last `WriteFailed`, with the frames that
    /// made it into the artifact.
    pub fn take_abandoned(&mut self) -> Option<EpisodeSummary> {
        self.abandoned.take()
    }

    /// Finalizes an open recording, e.g. on shutdown.
    pub fn finish(&mut self) -> Result<Option<EpisodeSummary>, RecorderError> {
        if !self.state.is_recording() {
            return Ok(None);
        }
        info!("Shutting down mid-episode; finalizing recording");
        self.end_episode().map(Some)
    }

    fn step(&mut self, current: &Frame) -> Result<FrameOutcome, RecorderError> {
        let motion = self
            .detector
            .detect(&self.previous, current)
            .unwrap_or_else(|err| fatal(err));

        let mut started = false;
        if motion {
            self.state.reset_cooldown(self.margin);
            if !self.state.is_recording() {
                self.begin_episode(current)?;
                started = true;
            }
        }

        if !self.state.is_recording() {
            return Ok(FrameOutcome::Idle);
        }

        self.append(current)?;

        if self.state.tick() {
            return self.end_episode().map(FrameOutcome::Stopped);
        }

        if started {
            let summary = self
                .episode
                .clone()
                .unwrap_or_else(|| fatal(RecorderError::SessionNotOpen));
            return Ok(FrameOutcome::Started(summary));
        }

        Ok(FrameOutcome::Continued {
            cooldown: self.state.cooldown,
        })
    }

    fn begin_episode(&mut self, trigger: &Frame) -> Result<(), RecorderError> {
        match self.session.start() {
            Ok(()) => {}
            Err(err @ RecorderError::SessionOpenFailed { .. }) => {
                warn!("Motion at frame {} but recording could not start: {err:#}", trigger.seq());
                self.state.end_recording();
                return Err(err);
            }
            Err(err) => fatal(err),
        }

        let details = self
            .session
            .details()
            .unwrap_or_else(|| fatal(RecorderError::SessionNotOpen));
        self.state.begin_recording();
        self.episodes += 1;

        let preroll: Vec<Frame> = self.preroll.drain().cloned().collect();
        info!(
            "Motion at frame {}; recording {} with {} pre-roll frames",
            trigger.seq(),
            details.name,
            preroll.len()
        );

        self.episode = Some(EpisodeSummary {
            id: details.id,
            file_name: details.name,
            started_at: details.started_at,
            stopped_at: None,
            preroll_frames: preroll.len(),
            frame_count: 0,
            width: self.dimensions.0,
            height: self.dimensions.1,
        });

        for frame in &preroll {
            self.append(frame)?;
        }
        Ok(())
    }

    fn append(&mut self, frame: &Frame) -> Result<(), RecorderError> {
        match self.session.append(frame) {
            Ok(()) => {
                if let Some(episode) = self.episode.as_mut() {
                    episode.frame_count += 1;
                }
                Ok(())
            }
            Err(err @ RecorderError::WriteFailed { .. }) => {
                warn!("Abandoning episode after write failure: {err:#}");
                if let Err(stop_err) = self.session.stop() {
                    debug!("Finalizing abandoned artifact also failed: {stop_err:#}");
                }
                self.state.end_recording();
                self.abandoned = self.episode.take().map(|mut summary| {
                    summary.stopped_at = Some(chrono::Utc::now());
                    summary
                });
                Err(err)
            }
            Err(err) => fatal(err),
        }
    }

    fn end_episode(&mut self) -> Result<EpisodeSummary, RecorderError> {
        let stopped = self.session.stop();
        self.state.end_recording();

        let mut summary = self
            .episode
            .take()
            .unwrap_or_else(|| fatal(RecorderError::SessionNotOpen));
        let stopped_at = chrono::Utc::now();
        summary.stopped_at = Some(stopped_at);
        if let Err(err) = stopped {
            self.abandoned = Some(summary);
            return Err(err);
        }

        info!(
            "Recording {} closed: {} frames ({} pre-roll) over {}s",
            summary.file_name,
            summary.frame_count,
            summary.preroll_frames,
            (stopped_at - summary.started_at).num_seconds()
        );
        Ok(summary)
    }
}
