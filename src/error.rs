use thiserror::Error;

/// Errors raised by the recording core.
///
/// `SessionOpenFailed` and `WriteFailed` come from the output sink and are the
/// only variants a caller is expected to recover from. The rest indicate a
/// broken invariant and are treated as fatal by the controller.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("recording session {name} is already open")]
    SessionInUse { name: String },

    #[error("no recording session is open")]
    SessionNotOpen,

    #[error("failed to open output artifact {name}")]
    SessionOpenFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to write output artifact {name}")]
    WriteFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("frame is {actual:?} but the session expects {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl RecorderError {
    /// True for conditions caused by the environment rather than by misuse of the core.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RecorderError::SessionOpenFailed { .. } | RecorderError::WriteFailed { .. }
        )
    }
}

/// Aborts on a broken invariant. These are programming errors, never runtime conditions.
#[track_caller]
pub(crate) fn fatal(err: RecorderError) -> ! {
    panic!("motion recorder invariant violated: {err}")
}
