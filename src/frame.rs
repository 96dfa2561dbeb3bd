use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use image::{imageops, GrayImage, Rgb, RgbImage};

struct FrameInner {
    seq: u64,
    captured_at: DateTime<Utc>,
    pixels: RgbImage,
    /// Single-intensity view, computed on first use and shared by every clone.
    luma: OnceLock<GrayImage>,
}

/// A captured 3-channel image. Immutable once built; clones share the pixel data.
#[derive(Clone)]
pub struct Frame {
    inner: Arc<FrameInner>,
}

impl Frame {
    pub fn new(seq: u64, pixels: RgbImage) -> Self {
        Self::captured_at(seq, pixels, Utc::now())
    }

    pub fn captured_at(seq: u64, pixels: RgbImage, captured_at: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(FrameInner {
                seq,
                captured_at,
                pixels,
                luma: OnceLock::new(),
            }),
        }
    }

    /// A frame where every pixel has the same colour.
    pub fn filled(seq: u64, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::new(seq, RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    pub fn seq(&self) -> u64 {
        self.inner.seq
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.inner.captured_at
    }

    pub fn width(&self) -> u32 {
        self.inner.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.inner.pixels
    }

    pub fn luma(&self) -> &GrayImage {
        self.inner
            .luma
            .get_or_init(|| imageops::grayscale(&self.inner.pixels))
    }

    /// True when both handles refer to the same captured image.
    pub fn same_capture(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("seq", &self.inner.seq)
            .field("dimensions", &self.dimensions())
            .field("captured_at", &self.inner.captured_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_pixels() {
        let frame = Frame::filled(7, 4, 3, [10, 20, 30]);
        let copy = frame.clone();

        assert!(frame.same_capture(&copy));
        assert_eq!(copy.seq(), 7);
        assert_eq!(copy.dimensions(), (4, 3));
    }

    #[test]
    fn luma_matches_dimensions() {
        let frame = Frame::filled(0, 5, 2, [255, 255, 255]);
        let luma = frame.luma();

        assert_eq!(luma.dimensions(), (5, 2));
        assert!(luma.pixels().all(|p| p.0[0] == 255));
    }
}
