use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use log::{debug, info};

use crate::frame::Frame;

const MAX_NAME_SUFFIX: u32 = 1000;

pub trait ArtifactHandle {
    /// Externally visible name of the artifact, e.g. its file name.
    fn name(&self) -> &str;
}

/// Destination for recorded frames.
pub trait OutputSink {
    type Handle: ArtifactHandle;

    fn open(&mut self, name: &str, dimensions: (u32, u32)) -> Result<Self::Handle>;

    fn write_frame(&mut self, handle: &mut Self::Handle, frame: &Frame) -> Result<()>;

    /// Finalizes the artifact. Must accept a handle that never received a frame.
    fn close(&mut self, handle: Self::Handle) -> Result<()>;
}

pub struct MjpegArtifact {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
    frames: u64,
}

impl MjpegArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArtifactHandle for MjpegArtifact {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Writes each episode as a Motion-JPEG stream: baseline JPEG images back to back.
pub struct MjpegFileSink {
    output_dir: PathBuf,
    quality: u8,
}

impl MjpegFileSink {
    pub fn new(output_dir: impl Into<PathBuf>, quality: u8) -> Result<Self> {
        let output_dir = output_dir.into();
        if !(1..=100).contains(&quality) {
            bail!("jpeg quality must be within 1..=100, got {quality}");
        }

        fs::create_dir_all(&output_dir).with_context(|| {
            format!("failed to create output directory {}", output_dir.display())
        })?;

        Ok(Self {
            output_dir,
            quality,
        })
    }

    /// Creates `name`, or `stem-N.ext` if that is taken. Existing files are never truncated.
    fn create_unique(&self, name: &str) -> Result<(String, PathBuf, File)> {
        let (stem, extension) = match name.rsplit_once('.') {
            Some((stem, extension)) => (stem, Some(extension)),
            None => (name, None),
        };

        for attempt in 0..MAX_NAME_SUFFIX {
            let candidate = match (attempt, extension) {
                (0, _) => name.to_string(),
                (n, Some(ext)) => format!("{stem}-{n}.{ext}"),
                (n, None) => format!("{stem}-{n}"),
            };
            let path = self.output_dir.join(&candidate);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((candidate, path, file)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(anyhow::Error::new(err)
                        .context(format!("failed to create {}", path.display())))
                }
            }
        }

        Err(anyhow!(
            "no free artifact name for {name} in {}",
            self.output_dir.display()
        ))
    }
}

impl OutputSink for MjpegFileSink {
    type Handle = MjpegArtifact;

    fn open(&mut self, name: &str, dimensions: (u32, u32)) -> Result<MjpegArtifact> {
        let (name, path, file) = self.create_unique(name)?;
        info!(
            "Opened {} ({}x{})",
            path.display(),
            dimensions.0,
            dimensions.1
        );

        Ok(MjpegArtifact {
            name,
            path,
            writer: BufWriter::new(file),
            frames: 0,
        })
    }

    fn write_frame(&mut self, handle: &mut MjpegArtifact, frame: &Frame) -> Result<()> {
        let mut encoder = JpegEncoder::new_with_quality(&mut handle.writer, self.quality);
        encoder
            .encode_image(frame.pixels())
            .with_context(|| format!("failed to encode frame {} into {}", frame.seq(), handle.name))?;
        handle.frames += 1;
        Ok(())
    }

    fn close(&mut self, handle: MjpegArtifact) -> Result<()> {
        let MjpegArtifact {
            name,
            path,
            writer,
            frames,
        } = handle;

        let file = writer
            .into_inner()
            .map_err(|err| anyhow!("failed to flush {name}: {}", err.error()))?;
        file.sync_all()
            .with_context(|| format!("failed to sync {}", path.display()))?;

        debug!("Closed {} after {frames} frames", path.display());
        Ok(())
    }
}

/// What a [`MemorySink`] received for one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryArtifact {
    pub name: String,
    pub frames: Vec<u64>,
    pub closed: bool,
}

#[derive(Debug, Default)]
struct MemoryLog {
    artifacts: Vec<MemoryArtifact>,
    fail_next_open: bool,
    fail_next_write: bool,
}

pub struct MemoryHandle {
    index: usize,
    name: String,
}

impl ArtifactHandle for MemoryHandle {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Sink that records frame sequence numbers instead of writing files.
/// Clones share the same log, so one copy can be inspected while another records.
#[derive(Clone, Default)]
pub struct MemorySink {
    log: Arc<Mutex<MemoryLog>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `open` fail, as a full disk or a missing directory would.
    pub fn fail_next_open(&self) {
        self.lock().fail_next_open = true;
    }

    /// Makes the next `write_frame` fail.
    pub fn fail_next_write(&self) {
        self.lock().fail_next_write = true;
    }

    pub fn artifacts(&self) -> Vec<MemoryArtifact> {
        self.lock().artifacts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutputSink for MemorySink {
    type Handle = MemoryHandle;

    fn open(&mut self, name: &str, _dimensions: (u32, u32)) -> Result<MemoryHandle> {
        let mut log = self.lock();
        if std::mem::take(&mut log.fail_next_open) {
            bail!("refusing to open {name}");
        }

        log.artifacts.push(MemoryArtifact {
            name: name.to_string(),
            ..MemoryArtifact::default()
        });
        Ok(MemoryHandle {
            index: log.artifacts.len() - 1,
            name: name.to_string(),
        })
    }

    fn write_frame(&mut self, handle: &mut MemoryHandle, frame: &Frame) -> Result<()> {
        let mut log = self.lock();
        if std::mem::take(&mut log.fail_next_write) {
            bail!("no space left writing frame {} to {}", frame.seq(), handle.name);
        }
        let artifact = log
            .artifacts
            .get_mut(handle.index)
            .ok_or_else(|| anyhow!("unknown artifact {}", handle.name))?;
        artifact.frames.push(frame.seq());
        Ok(())
    }

    fn close(&mut self, handle: MemoryHandle) -> Result<()> {
        let mut log = self.lock();
        let artifact = log
            .artifacts
            .get_mut(handle.index)
            .ok_or_else(|| anyhow!("unknown artifact {}", handle.name))?;
        artifact.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mjpeg_sink_writes_one_jpeg_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = MjpegFileSink::new(dir.path(), 80).unwrap();

        let mut handle = sink.open("episode.mjpeg", (8, 8)).unwrap();
        let path = handle.path().to_path_buf();
        for seq in 0..3 {
            sink.write_frame(&mut handle, &Frame::filled(seq, 8, 8, [200, 10, 10]))
                .unwrap();
        }
        sink.close(handle).unwrap();

        let bytes = fs::read(&path).unwrap();
        let starts = bytes.windows(2).filter(|w| *w == [0xFF, 0xD8]).count();
        assert_eq!(starts, 3);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn mjpeg_sink_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("clip.mjpeg"), b"keep").unwrap();
        let mut sink = MjpegFileSink::new(dir.path(), 80).unwrap();

        let handle = sink.open("clip.mjpeg", (4, 4)).unwrap();
        assert_eq!(handle.name(), "clip-1.mjpeg");
        sink.close(handle).unwrap();

        assert_eq!(fs::read(dir.path().join("clip.mjpeg")).unwrap(), b"keep");
        assert_eq!(fs::metadata(dir.path().join("clip-1.mjpeg")).unwrap().len(), 0);
    }

    #[test]
    fn mjpeg_sink_rejects_bad_quality() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MjpegFileSink::new(dir.path(), 0).is_err());
        assert!(MjpegFileSink::new(dir.path(), 101).is_err());
    }

    #[test]
    fn memory_sink_fails_once_when_asked() {
        let mut sink = MemorySink::new();
        sink.fail_next_open();

        assert!(sink.open("a", (1, 1)).is_err());
        let handle = sink.open("b", (1, 1)).unwrap();
        sink.close(handle).unwrap();

        let artifacts = sink.artifacts();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "b");
        assert!(artifacts[0].closed);
    }
}
