use crate::error::RecorderError;
use crate::frame::Frame;

/// Number of pixels whose intensity moved by more than `pixel_threshold`
/// between the two frames. Symmetric in its frame arguments.
pub fn changed_pixels(
    previous: &Frame,
    current: &Frame,
    pixel_threshold: u8,
) -> Result<u64, RecorderError> {
    if previous.dimensions() != current.dimensions() {
        return Err(RecorderError::DimensionMismatch {
            expected: previous.dimensions(),
            actual: current.dimensions(),
        });
    }

    // Binarizing to 0/255 and counting non-zero is the same as counting
    // differences above the threshold.
    let changed = previous
        .luma()
        .as_raw()
        .iter()
        .zip(current.luma().as_raw())
        .filter(|(before, after)| before.abs_diff(**after) > pixel_threshold)
        .count();

    Ok(changed as u64)
}

/// True iff more than `area_threshold` pixels changed beyond `pixel_threshold`.
pub fn detect(
    previous: &Frame,
    current: &Frame,
    pixel_threshold: u8,
    area_threshold: u64,
) -> Result<bool, RecorderError> {
    Ok(changed_pixels(previous, current, pixel_threshold)? > area_threshold)
}

/// Frame-difference detector with thresholds fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionDetector {
    pixel_threshold: u8,
    area_threshold: u64,
}

impl MotionDetector {
    pub fn new(pixel_threshold: u8, area_threshold: u64) -> Self {
        Self {
            pixel_threshold,
            area_threshold,
        }
    }

    /// `area_threshold = width * height / area_divisor`; a divisor of 10 fires
    /// when more than a tenth of the frame changed.
    pub fn for_dimensions(width: u32, height: u32, pixel_threshold: u8, area_divisor: u32) -> Self {
        let area = u64::from(width) * u64::from(height) / u64::from(area_divisor.max(1));
        Self::new(pixel_threshold, area)
    }

    pub fn pixel_threshold(&self) -> u8 {
        self.pixel_threshold
    }

    pub fn area_threshold(&self) -> u64 {
        self.area_threshold
    }

    pub fn detect(&self, previous: &Frame, current: &Frame) -> Result<bool, RecorderError> {
        detect(previous, current, self.pixel_threshold, self.area_threshold)
    }
}
