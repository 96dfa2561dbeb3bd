pub mod controller;
pub mod detector;
pub mod preroll;
pub mod state;

pub use controller::{ControllerConfig, MotionRecorderController};
pub use detector::{changed_pixels, detect, MotionDetector};
pub use preroll::PreRollBuffer;
pub use state::{ControllerSnapshot, EpisodeSummary, FrameOutcome, MotionState, RecorderStatus};
