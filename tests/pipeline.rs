use std::fs;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use motion_recorder_lib::capture::{
    CaptureSource, ScriptedSource, SyntheticConfig, SyntheticSource,
};
use motion_recorder_lib::db::Database;
use motion_recorder_lib::models::EpisodeStatus;
use motion_recorder_lib::pipeline::{record_episodes, recover_interrupted, PipelineController};
use motion_recorder_lib::recording::{MemorySink, MjpegFileSink};
use motion_recorder_lib::settings::RecorderSettings;
use motion_recorder_lib::{BlockingHandoff, Frame};

fn settings(output_dir: &std::path::Path, margin: usize) -> RecorderSettings {
    RecorderSettings {
        margin,
        poll_interval_ms: 0,
        output_dir: output_dir.to_path_buf(),
        ..RecorderSettings::default()
    }
}

fn synthetic() -> SyntheticSource {
    SyntheticSource::new(SyntheticConfig {
        width: 32,
        height: 24,
        frames: Some(60),
        bursts: vec![10..15, 40..44],
        ..SyntheticConfig::default()
    })
    .unwrap()
}

#[test]
fn handoff_preserves_order_across_threads() {
    let handoff = Arc::new(BlockingHandoff::new());

    let producer = {
        let handoff = Arc::clone(&handoff);
        thread::spawn(move || {
            for value in 0..500u32 {
                handoff.push(value);
            }
        })
    };

    let received: Vec<u32> = (0..500).map(|_| handoff.pop()).collect();
    producer.join().unwrap();

    assert_eq!(received, (0..500).collect::<Vec<_>>());
    assert!(handoff.is_empty());
}

#[test]
fn scripted_frames_flow_through_both_threads() {
    let dir = tempfile::tempdir().unwrap();
    let frames = (0..12u64).map(|seq| {
        let rgb = if (5..7).contains(&seq) { [250, 250, 250] } else { [10, 10, 10] };
        Frame::filled(seq, 8, 8, rgb)
    });

    let sink = MemorySink::new();
    let mut pipeline = PipelineController::new();
    pipeline
        .start(ScriptedSource::new(frames), sink.clone(), &settings(dir.path(), 2), None)
        .unwrap();
    assert!(pipeline.is_running());

    let report = pipeline.wait().unwrap();
    assert!(!pipeline.is_running());
    assert_eq!(report.frames, 12);
    assert_eq!(report.episodes, 1);

    // Motion at 5 (dark to light) and 7 (light to dark); cooldown ends two
    // still frames later at 9.
    let artifacts = sink.artifacts();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].frames, vec![3, 4, 5, 6, 7, 8, 9]);
    assert!(artifacts[0].closed);
}

#[test]
fn stop_finalizes_open_recording() {
    let dir = tempfile::tempdir().unwrap();
    let source = SyntheticSource::new(SyntheticConfig {
        width: 16,
        height: 16,
        frames: None,
        bursts: vec![0..u64::MAX],
        ..SyntheticConfig::default()
    })
    .unwrap();

    let sink = MemorySink::new();
    let mut pipeline = PipelineController::new();
    pipeline
        .start(source, sink.clone(), &settings(dir.path(), 5), None)
        .unwrap();
    assert!(pipeline
        .start(ScriptedSource::new(Vec::new()), MemorySink::new(), &settings(dir.path(), 5), None)
        .is_err());

    while sink.artifacts().is_empty() {
        thread::yield_now();
    }
    let report = pipeline.stop().unwrap();

    assert_eq!(report.episodes, 1);
    let artifacts = sink.artifacts();
    assert_eq!(artifacts.len(), 1);
    assert!(artifacts[0].closed);
    assert!(!artifacts[0].frames.is_empty());
}

/// Live camera that delivers one frame of the wrong size, then carries on forever.
struct ResizingCamera {
    next_seq: u64,
}

impl CaptureSource for ResizingCamera {
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        let seq = self.next_seq;
        self.next_seq += 1;
        let width = if seq == 1 { 8 } else { 4 };
        Ok(Some(Frame::filled(seq, width, 4, [10, 10, 10])))
    }
}

#[test]
fn watch_thread_failure_stops_capture() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = PipelineController::new();
    pipeline
        .start(
            ResizingCamera { next_seq: 0 },
            MemorySink::new(),
            &settings(dir.path(), 3),
            None,
        )
        .unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = done_tx.send(pipeline.wait());
    });

    let result = done_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("wait() must return once the watch thread has died");
    let err = result.unwrap_err();
    assert!(err.to_string().contains("watch thread panicked"));
}

#[tokio::test(flavor = "multi_thread")]
async fn synthetic_bursts_are_written_and_catalogued() {
    let output = tempfile::tempdir().unwrap();
    let catalogue = tempfile::tempdir().unwrap();
    let settings = settings(output.path(), 3);

    let database = Database::new(catalogue.path().join("episodes.sqlite3")).unwrap();
    assert_eq!(recover_interrupted(&database).await.unwrap(), 0);

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let recorder = tokio::spawn(record_episodes(database.clone(), rx));

    let sink = MjpegFileSink::new(output.path(), settings.jpeg_quality).unwrap();
    let mut pipeline = PipelineController::new();
    pipeline.start(synthetic(), sink, &settings, Some(tx)).unwrap();

    let report = tokio::task::spawn_blocking(move || pipeline.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.frames, 60);
    assert_eq!(report.episodes, 2);
    assert_eq!(report.open_failures + report.write_failures, 0);

    // Two Started and two Finished events.
    assert_eq!(recorder.await.unwrap(), 4);

    let mut files: Vec<_> = fs::read_dir(output.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    files.sort();
    assert_eq!(files.len(), 2);
    for path in &files {
        assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("mjpeg"));
        let bytes = fs::read(path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    let episodes = database.list_episodes(10).await.unwrap();
    assert_eq!(episodes.len(), 2);
    for episode in &episodes {
        assert_eq!(episode.status, EpisodeStatus::Completed);
        assert_eq!(episode.preroll_frames, 3);
        assert_eq!((episode.width, episode.height), (32, 24));
        assert!(episode.stopped_at.is_some());
        assert!(episode.frame_count > episode.preroll_frames);
        assert!(output.path().join(&episode.file_name).exists());
    }
}
