use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc::UnboundedSender;

use crate::capture::CaptureSource;
use crate::error::RecorderError;
use crate::frame::Frame;
use crate::handoff::BlockingHandoff;
use crate::motion::{ControllerConfig, FrameOutcome, MotionRecorderController};
use crate::recording::OutputSink;
use crate::shutdown::ShutdownSignal;

use super::EpisodeEvent;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Items travelling from the capture thread to the watch thread.
#[derive(Debug)]
pub enum Message {
    Frame(Frame),
    /// Sentinel pushed last so a parked `pop` always wakes up.
    Stop,
}

#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    pub poll_interval: Duration,
    pub backlog_warn: usize,
}

/// Totals reported by the watch loop when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchReport {
    pub frames: u64,
    pub episodes: u64,
    pub open_failures: u64,
    pub write_failures: u64,
}

/// Producer side: pulls frames from the source at the poll cadence and hands
/// them over without ever waiting on analysis or disk I/O.
pub fn capture_loop<C, Q>(
    mut source: C,
    handoff: Arc<BlockingHandoff<Message>>,
    shutdown: Q,
    options: CaptureOptions,
) where
    C: CaptureSource,
    Q: ShutdownSignal,
{
    let mut captured: u64 = 0;

    loop {
        if shutdown.should_stop() {
            log_info!("capture loop stopping after {captured} frames (shutdown requested)");
            break;
        }

        let cycle_start = Instant::now();
        match source.next_frame() {
            Ok(Some(frame)) => {
                handoff.push(Message::Frame(frame));
                captured += 1;
            }
            Ok(None) => {
                log_info!("capture source exhausted after {captured} frames");
                break;
            }
            Err(err) => {
                log_error!("frame capture failed after {captured} frames: {err:#}");
                break;
            }
        }

        let backlog = handoff.len();
        if backlog > options.backlog_warn {
            log_warn!("watch loop is falling behind: {backlog} frames queued");
        }

        let elapsed = cycle_start.elapsed();
        if elapsed < options.poll_interval {
            thread::sleep(options.poll_interval - elapsed);
        }
    }

    handoff.push(Message::Stop);
}

/// Consumer side: runs the motion state machine over every queued frame in
/// capture order until the stop sentinel arrives.
pub fn watch_loop<S>(
    handoff: Arc<BlockingHandoff<Message>>,
    sink: S,
    config: ControllerConfig,
    events: Option<UnboundedSender<EpisodeEvent>>,
) -> Result<WatchReport>
where
    S: OutputSink,
{
    let mut report = WatchReport::default();

    let first = match handoff.pop() {
        Message::Frame(frame) => frame,
        Message::Stop => {
            log_info!("watch loop stopped before the first frame");
            return Ok(report);
        }
    };
    report.frames = 1;

    let mut controller = MotionRecorderController::new(first, sink, &config);
    let emit = |event: EpisodeEvent| {
        if let Some(tx) = &events {
            if tx.send(event).is_err() {
                log_debug!("episode listener gone; dropping event");
            }
        }
    };

    loop {
        let frame = match handoff.pop() {
            Message::Frame(frame) => frame,
            Message::Stop => break,
        };
        report.frames += 1;

        match controller.on_frame(frame) {
            Ok(FrameOutcome::Started(summary)) => {
                report.episodes += 1;
                emit(EpisodeEvent::Started(summary));
            }
            Ok(FrameOutcome::Stopped(summary)) => emit(EpisodeEvent::Finished(summary)),
            Ok(FrameOutcome::Idle | FrameOutcome::Continued { .. }) => {}
            Err(err @ RecorderError::SessionOpenFailed { .. }) => {
                report.open_failures += 1;
                log_error!("skipping motion episode: {err:#}");
            }
            Err(err) => {
                report.write_failures += 1;
                log_error!("motion episode abandoned: {err:#}");
                if let Some(summary) = controller.take_abandoned() {
                    emit(EpisodeEvent::Abandoned(summary));
                }
            }
        }
    }

    match controller.finish() {
        Ok(Some(summary)) => emit(EpisodeEvent::Finished(summary)),
        Ok(None) => {}
        Err(err) => {
            report.write_failures += 1;
            log_error!("failed to finalize recording on shutdown: {err:#}");
            if let Some(summary) = controller.take_abandoned() {
                emit(EpisodeEvent::Abandoned(summary));
            }
        }
    }

    let snapshot = controller.snapshot();
    log_info!(
        "watch loop done: {} frames, {} episodes",
        snapshot.frames_seen,
        snapshot.episodes
    );
    Ok(report)
}
