use automation_common::ChainError;
use automation_streams::StreamsError;
use thiserror::Error;

/// Why the debugger could not reach a verdict
#[derive(Debug, Error)]
pub enum DebugError {
    /// Bad command line arguments
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Missing or invalid operator configuration
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("data streams lookup failed: {0}")]
    Streams(StreamsError),
    #[error("failed to decode {what}: {detail}")]
    Decode { what: &'static str, detail: String },
    #[error("cancelled")]
    Cancelled,
}

impl DebugError {
    pub fn is_retryable(&self) -> bool {
        match self {
            DebugError::Chain(e) => e.is_retryable(),
            DebugError::Streams(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<StreamsError> for DebugError {
    fn from(err: StreamsError) -> Self {
        if err.is_cancelled() {
            DebugError::Cancelled
        } else {
            DebugError::Streams(err)
        }
    }
}
