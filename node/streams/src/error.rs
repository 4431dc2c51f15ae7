use automation_common::UpkeepFailureReason;
use std::fmt;
use thiserror::Error;

use crate::retry::{RetryError, Retryable};
use crate::transport::TransportError;

/// Why a single data streams HTTP call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 404 or 500: reports are not available yet
    NotReady,
    /// Connection failure or timeout
    Network,
    /// Fewer reports than requested feeds (bulk endpoint only)
    PartialContent,
    /// 400
    MalformedRequest,
    /// 401
    Unauthorized,
    /// 420: rate limited or at least one feed id is invalid
    InvalidFeed,
    /// Any other non-success status
    UnexpectedStatus(u16),
    /// Success status with a body that could not be decoded
    BadResponse,
}

impl FailureKind {
    /// Classify a non-success status code; `None` for 200
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200 => None,
            404 | 500 => Some(FailureKind::NotReady),
            400 => Some(FailureKind::MalformedRequest),
            401 => Some(FailureKind::Unauthorized),
            420 => Some(FailureKind::InvalidFeed),
            other => Some(FailureKind::UnexpectedStatus(other)),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::NotReady | FailureKind::Network | FailureKind::PartialContent
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NotReady => write!(f, "reports not ready"),
            FailureKind::Network => write!(f, "network failure"),
            FailureKind::PartialContent => write!(f, "partial content"),
            FailureKind::MalformedRequest => write!(f, "malformed request"),
            FailureKind::Unauthorized => write!(f, "unauthorized"),
            FailureKind::InvalidFeed => write!(f, "rate limited or invalid feed id"),
            FailureKind::UnexpectedStatus(status) => write!(f, "unexpected status {}", status),
            FailureKind::BadResponse => write!(f, "undecodable response"),
        }
    }
}

/// Classified failure of one HTTP call
#[derive(Debug, Clone, Error)]
#[error("{kind}: {detail}")]
pub struct RequestError {
    pub kind: FailureKind,
    pub detail: String,
}

impl RequestError {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl Retryable for RequestError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<TransportError> for RequestError {
    fn from(err: TransportError) -> Self {
        RequestError::new(FailureKind::Network, err.to_string())
    }
}

/// One failed feed of a per-feed lookup
#[derive(Debug)]
pub struct FeedFailure {
    pub index: usize,
    pub feed: String,
    pub error: StreamsError,
}

fn describe(failures: &[FeedFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("#{} {}: {}", f.index, f.feed, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of a failed lookup
#[derive(Debug, Error)]
pub enum StreamsError {
    /// Request shape rejected before any network call
    #[error("invalid streams lookup request: {0}")]
    InvalidInput(String),
    #[error("invalid StreamsLookup revert data: {0}")]
    InvalidRevertData(String),
    #[error("streams lookup cancelled")]
    Cancelled,
    #[error("streams lookup still failing after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: RequestError },
    #[error("streams lookup rejected: {0}")]
    Rejected(RequestError),
    #[error("{} of {total} feeds failed: {}", .failures.len(), describe(.failures))]
    Feeds {
        total: usize,
        failures: Vec<FeedFailure>,
        retryable: bool,
    },
}

impl StreamsError {
    /// Whether repeating the whole lookup later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamsError::Exhausted { .. } => true,
            StreamsError::Feeds { retryable, .. } => *retryable,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamsError::Cancelled)
    }

    /// Ineligibility caused by the upkeep's own revert data
    pub fn ineligibility_reason(&self) -> Option<UpkeepFailureReason> {
        match self {
            StreamsError::InvalidInput(_) | StreamsError::InvalidRevertData(_) => {
                Some(UpkeepFailureReason::InvalidRevertDataInput)
            }
            _ => None,
        }
    }
}

impl From<RetryError<RequestError>> for StreamsError {
    fn from(err: RetryError<RequestError>) -> Self {
        match err {
            RetryError::Cancelled => StreamsError::Cancelled,
            RetryError::Exhausted { attempts, last } => StreamsError::Exhausted { attempts, last },
            RetryError::Aborted(e) => StreamsError::Rejected(e),
        }
    }
}
