use thiserror::Error;

use crate::pipeline::PipelineStage;

/// Everything that can go wrong inside a conversion session.
///
/// None of these are fatal: the session records a log entry and stays usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// Upload is not an image, is empty, or exceeds the size bound.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The recognizer errored, returned nothing, or timed out.
    #[error("recognition failed: {0}")]
    RecognitionFailure(String),

    #[error("a conversion is already in progress")]
    ConcurrentSubmission,

    #[error("history item {0} not found")]
    NotFound(String),

    #[error("no result available")]
    NoResult,

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("illegal stage transition from {from} to {to}")]
    IllegalTransition {
        from: PipelineStage,
        to: PipelineStage,
    },
}

impl ConversionError {
    pub fn timeout() -> Self {
        ConversionError::RecognitionFailure("timeout".into())
    }
}
