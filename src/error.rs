//! Workflow error taxonomy
//!
//! Every error here is scoped to the current session: the process keeps
//! running and the user can always recover with a restart.

use thiserror::Error;

/// Errors a session transition can surface to the user.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The uploaded bytes are not a decodable image. Decode runs before
    /// recognition, so the session stays in `Uploaded`.
    #[error("unsupported image format: {reason}")]
    UnsupportedFormat { reason: String },

    /// The recognition backend failed (models unavailable, inference
    /// error). The blob is unchanged, so the same transition can be
    /// retried.
    #[error("text recognition failed: {reason}")]
    RecognitionFailed { reason: String },
}

impl WorkflowError {
    pub fn unsupported_format(reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            reason: reason.into(),
        }
    }

    pub fn recognition_failed(reason: impl Into<String>) -> Self {
        Self::RecognitionFailed {
            reason: reason.into(),
        }
    }

    /// Whether retrying the failed transition can succeed without a new
    /// upload. A broken blob stays broken; a backend hiccup may clear.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RecognitionFailed { .. })
    }
}
