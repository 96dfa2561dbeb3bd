pub mod replay;
pub mod synthetic;

use std::collections::VecDeque;

use anyhow::Result;

use crate::frame::Frame;

pub use replay::ReplaySource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// Anything that yields frames of a fixed size, blocking until one is ready.
pub trait CaptureSource: Send {
    /// `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

impl<T: CaptureSource + ?Sized> CaptureSource for Box<T> {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}

/// Plays back a fixed list of frames.
pub struct ScriptedSource {
    frames: VecDeque<Frame>,
}

impl ScriptedSource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl CaptureSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}
