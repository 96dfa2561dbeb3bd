pub mod session;
pub mod sink;

pub use session::{artifact_name, RecordingSession, SessionDetails};
pub use sink::{ArtifactHandle, MemoryArtifact, MemorySink, MjpegFileSink, OutputSink};
