use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::debug;

use crate::frame::Frame;

use super::CaptureSource;

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "ppm"];

/// Replays still images from a directory in file-name order.
pub struct ReplaySource {
    pending: VecDeque<PathBuf>,
    dimensions: Option<(u32, u32)>,
    next_seq: u64,
}

impl ReplaySource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("failed to list replay directory {}", dir.display()))?
        {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            bail!("no images found in {}", dir.display());
        }
        paths.sort();
        debug!("Replaying {} images from {}", paths.len(), dir.display());

        Ok(Self {
            pending: paths.into(),
            dimensions: None,
            next_seq: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl CaptureSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };

        let pixels = image::open(&path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();

        let dimensions = pixels.dimensions();
        match self.dimensions {
            None => self.dimensions = Some(dimensions),
            Some(expected) if expected != dimensions => bail!(
                "{} is {}x{} but the replay started at {}x{}",
                path.display(),
                dimensions.0,
                dimensions.1,
                expected.0,
                expected.1
            ),
            Some(_) => {}
        }

        let frame = Frame::new(self.next_seq, pixels);
        self.next_seq += 1;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([9, 9, 9]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn replays_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 6, 4);
        write_png(dir.path(), "a.png", 6, 4);
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ReplaySource::open(dir.path()).unwrap();
        assert_eq!(source.remaining(), 2);

        let first = source.next_frame().unwrap().unwrap();
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!((first.seq(), second.seq()), (0, 1));
        assert_eq!(first.dimensions(), (6, 4));
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn size_change_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "01.png", 6, 4);
        write_png(dir.path(), "02.png", 8, 4);

        let mut source = ReplaySource::open(dir.path()).unwrap();
        source.next_frame().unwrap();
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ReplaySource::open(dir.path()).is_err());
    }
}
