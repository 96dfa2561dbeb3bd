use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::capture::CaptureSource;
use crate::handoff::BlockingHandoff;
use crate::recording::OutputSink;
use crate::settings::RecorderSettings;

use super::loop_worker::{capture_loop, watch_loop, CaptureOptions, Message, WatchReport};
use super::EpisodeEvent;

/// Owns the capture and watch threads of one running pipeline.
pub struct PipelineController {
    producer: Option<JoinHandle<()>>,
    consumer: Option<JoinHandle<Result<WatchReport>>>,
    handoff: Option<Arc<BlockingHandoff<Message>>>,
    cancel_token: Option<CancellationToken>,
}

impl PipelineController {
    pub fn new() -> Self {
        Self {
            producer: None,
            consumer: None,
            handoff: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.consumer.is_some()
    }

    pub fn start<C, S>(
        &mut self,
        source: C,
        sink: S,
        settings: &RecorderSettings,
        events: Option<UnboundedSender<EpisodeEvent>>,
    ) -> Result<()>
    where
        C: CaptureSource + 'static,
        S: OutputSink + Send + 'static,
    {
        if self.consumer.is_some() {
            bail!("pipeline already active");
        }
        settings.validate()?;

        let handoff = Arc::new(BlockingHandoff::new());
        let cancel_token = CancellationToken::new();
        let options = CaptureOptions {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            backlog_warn: settings.backlog_warn,
        };
        let config = settings.controller_config();

        let consumer = {
            let handoff = Arc::clone(&handoff);
            let token = cancel_token.clone();
            thread::Builder::new()
                .name("motion-watch".into())
                .spawn(move || {
                    // Cancels on return and on unwind, so capture never outlives the watcher.
                    let _stop_capture = token.drop_guard();
                    watch_loop(handoff, sink, config, events)
                })
                .context("failed to spawn watch thread")?
        };

        let producer = {
            let token = cancel_token.clone();
            let spawned = thread::Builder::new()
                .name("motion-capture".into())
                .spawn({
                    let handoff = Arc::clone(&handoff);
                    move || capture_loop(source, handoff, token, options)
                });
            match spawned {
                Ok(handle) => handle,
                Err(err) => {
                    // Release the watch thread before bailing out.
                    handoff.push(Message::Stop);
                    let _ = consumer.join();
                    return Err(anyhow::Error::new(err).context("failed to spawn capture thread"));
                }
            }
        };

        info!(
            "Pipeline started (margin {}, poll {}ms, output {})",
            settings.margin,
            settings.poll_interval_ms,
            settings.output_dir.display()
        );

        self.producer = Some(producer);
        self.consumer = Some(consumer);
        self.handoff = Some(handoff);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Token that ends the capture loop when cancelled, e.g. from a Ctrl-C handler.
    pub fn shutdown_token(&self) -> Option<CancellationToken> {
        self.cancel_token.clone()
    }

    /// Requests shutdown and waits for both threads to drain.
    pub fn stop(&mut self) -> Result<WatchReport> {
        if let Some(token) = &self.cancel_token {
            token.cancel();
        }
        self.wait()
    }

    /// Waits for the pipeline to end on its own, i.e. once the source runs dry
    /// or the watch thread exits.
    pub fn wait(&mut self) -> Result<WatchReport> {
        self.cancel_token = None;
        let handoff = self.handoff.take();

        let producer_result = match self.producer.take() {
            Some(producer) => producer.join(),
            None => Ok(()),
        };
        if producer_result.is_err() {
            // The capture thread died before sending its sentinel.
            if let Some(handoff) = &handoff {
                handoff.push(Message::Stop);
            }
        }

        match self.consumer.take() {
            Some(consumer) => {
                let report = consumer
                    .join()
                    .map_err(|_| anyhow!("watch thread panicked"))??;
                if producer_result.is_err() {
                    bail!("capture thread panicked");
                }
                Ok(report)
            }
            None => Ok(WatchReport::default()),
        }
    }
}

impl Default for PipelineController {
    fn default() -> Self {
        Self::new()
    }
}
