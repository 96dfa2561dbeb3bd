use std::ops::Range;

use anyhow::{bail, Result};
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::frame::Frame;

use super::CaptureSource;

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    /// Stop after this many frames; `None` runs forever.
    pub frames: Option<u64>,
    /// Per-pixel sensor noise amplitude. Keep it at or below the pixel
    /// threshold or the noise alone will register as motion.
    pub noise: u8,
    /// Frame index ranges during which a bright block moves across the scene.
    pub bursts: Vec<Range<u64>>,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            frames: Some(600),
            noise: 6,
            bursts: vec![150..200, 400..420],
            seed: 0x5eed,
        }
    }
}

/// Fake camera: a noisy grey scene with a bright block during motion bursts.
pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: StdRng,
    next_index: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.width < 4 || config.height < 4 {
            bail!(
                "synthetic frames must be at least 4x4, got {}x{}",
                config.width,
                config.height
            );
        }

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            next_index: 0,
        })
    }

    fn in_burst(&self, index: u64) -> bool {
        self.config.bursts.iter().any(|burst| burst.contains(&index))
    }

    fn render(&mut self, index: u64) -> RgbImage {
        let SyntheticConfig {
            width,
            height,
            noise,
            ..
        } = self.config;

        let mut pixels = RgbImage::new(width, height);
        for pixel in pixels.pixels_mut() {
            let level = 64u8.saturating_add(self.rng.gen_range(0..=noise));
            *pixel = Rgb([level, level, level]);
        }

        if self.in_burst(index) {
            // A quarter-frame block that jumps a quarter width every frame, so
            // consecutive burst frames differ over well above a tenth of the area.
            let block_w = width / 2;
            let block_h = height / 2;
            let steps = u64::from(width / 4).max(1);
            let x0 = ((index % 3) * steps) as u32;
            let y0 = height / 4;
            for y in y0..(y0 + block_h).min(height) {
                for x in x0..(x0 + block_w).min(width) {
                    pixels.put_pixel(x, y, Rgb([240, 240, 240]));
                }
            }
        }

        pixels
    }
}

impl CaptureSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.config.frames.is_some_and(|limit| self.next_index >= limit) {
            return Ok(None);
        }

        let index = self.next_index;
        self.next_index += 1;
        let pixels = self.render(index);
        Ok(Some(Frame::new(index, pixels)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::MotionDetector;

    fn source(bursts: Vec<Range<u64>>, frames: u64) -> SyntheticSource {
        SyntheticSource::new(SyntheticConfig {
            width: 40,
            height: 20,
            frames: Some(frames),
            bursts,
            ..SyntheticConfig::default()
        })
        .unwrap()
    }

    fn collect(mut source: SyntheticSource) -> Vec<Frame> {
        std::iter::from_fn(|| source.next_frame().unwrap()).collect()
    }

    #[test]
    fn stops_after_frame_limit() {
        let frames = collect(source(vec![], 5));
        assert_eq!(frames.iter().map(Frame::seq).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn noise_alone_is_not_motion() {
        let frames = collect(source(vec![], 10));
        let detector = MotionDetector::for_dimensions(40, 20, 10, 10);
        for pair in frames.windows(2) {
            assert!(!detector.detect(&pair[0], &pair[1]).unwrap());
        }
    }

    #[test]
    fn bursts_register_as_motion() {
        let frames = collect(source(vec![3..6], 8));
        let detector = MotionDetector::for_dimensions(40, 20, 10, 10);
        let moving: Vec<u64> = frames
            .windows(2)
            .filter(|pair| detector.detect(&pair[0], &pair[1]).unwrap())
            .map(|pair| pair[1].seq())
            .collect();

        // Entering, moving within and leaving the burst all count.
        assert_eq!(moving, vec![3, 4, 5, 6]);
    }

    #[test]
    fn rejects_tiny_frames() {
        assert!(SyntheticSource::new(SyntheticConfig {
            width: 2,
            ..SyntheticConfig::default()
        })
        .is_err());
    }
}
