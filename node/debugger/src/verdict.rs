use automation_common::UpkeepId;
use ethers::types::{Address, U256};
use std::fmt;

use crate::error::DebugError;

/// One piece of evidence collected while evaluating an upkeep
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    Message(String),
    Warning(String),
    Link { label: String, url: String },
}

/// Evidence trail of a single evaluation
#[derive(Debug, Default)]
pub struct Findings {
    entries: Vec<Finding>,
}

impl Findings {
    pub fn message(&mut self, text: impl Into<String>) {
        self.entries.push(Finding::Message(text.into()));
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        self.entries.push(Finding::Warning(text.into()));
    }

    pub fn link(&mut self, label: impl Into<String>, url: Option<String>) {
        if let Some(url) = url {
            self.entries.push(Finding::Link {
                label: label.into(),
                url,
            });
        }
    }

    pub fn into_entries(self) -> Vec<Finding> {
        self.entries
    }
}

/// Why an upkeep will not perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligibility {
    DoesNotExist,
    Paused,
    Cancelled,
    InsufficientBalance { balance: U256, min_balance: U256 },
    TxNotFound,
    TxPending,
    ReceiptNotFound,
    LogNotFound { log_index: u64 },
    AlreadyPerformed,
    LogContractMismatch { expected: Address, actual: Address },
    LogDoesNotMatchFilter,
    InvalidFilterSelector(u8),
    InvalidLookupKeys { feed_param_key: String, time_param_key: String },
    StreamsAccessNotAllowed,
    InvalidRevertData(String),
    NotNeeded,
    PerformGasTooLow { perform_gas: u32, gas_used: U256 },
    SimulationFailed,
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DoesNotExist => write!(f, "upkeep does not exist on this registry"),
            Self::Paused => write!(f, "upkeep is paused"),
            Self::Cancelled => write!(f, "upkeep is cancelled"),
            Self::InsufficientBalance { balance, min_balance } => write!(
                f,
                "upkeep balance {} is below the min balance {}",
                balance, min_balance
            ),
            Self::TxNotFound => write!(f, "transaction hash no longer exists on chain"),
            Self::TxPending => write!(f, "transaction is still pending"),
            Self::ReceiptNotFound => write!(f, "transaction receipt not found"),
            Self::LogNotFound { log_index } => {
                write!(f, "log index {} not found in transaction receipt", log_index)
            }
            Self::AlreadyPerformed => write!(f, "upkeep was already performed for this trigger"),
            Self::LogContractMismatch { expected, actual } => write!(
                f,
                "log was emitted by {:?} but the upkeep listens to {:?}",
                actual, expected
            ),
            Self::LogDoesNotMatchFilter => write!(f, "log does not match the upkeep trigger config"),
            Self::InvalidFilterSelector(selector) => {
                write!(f, "upkeep trigger config has invalid filter selector {}", selector)
            }
            Self::InvalidLookupKeys { feed_param_key, time_param_key } => write!(
                f,
                "invalid StreamsLookup parameter keys {}/{}",
                feed_param_key, time_param_key
            ),
            Self::StreamsAccessNotAllowed => write!(
                f,
                "upkeep reverted with StreamsLookup but is not allowed to access data streams"
            ),
            Self::InvalidRevertData(detail) => {
                write!(f, "upkeep used invalid StreamsLookup revert data: {}", detail)
            }
            Self::NotNeeded => write!(f, "upkeep is not needed"),
            Self::PerformGasTooLow { perform_gas, gas_used } => write!(
                f,
                "simulate perform upkeep unsuccessful, perform gas {} is lower than gas used in simulation {}",
                perform_gas, gas_used
            ),
            Self::SimulationFailed => write!(f, "simulate perform upkeep unsuccessful"),
        }
    }
}

/// Terminal outcome of an evaluation
#[derive(Debug)]
pub enum Verdict {
    Eligible,
    Ineligible(Ineligibility),
    Unknown { error: DebugError, retryable: bool },
}

impl Verdict {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Verdict::Eligible)
    }

    pub fn ineligibility(&self) -> Option<&Ineligibility> {
        match self {
            Verdict::Ineligible(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&DebugError> {
        match self {
            Verdict::Unknown { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Verdict plus the evidence that led to it
#[derive(Debug)]
pub struct Report {
    pub upkeep_id: UpkeepId,
    pub verdict: Verdict,
    pub findings: Vec<Finding>,
}

impl Report {
    /// Process exit code: 0 when eligibility was determined, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self.verdict {
            Verdict::Eligible | Verdict::Ineligible(_) => 0,
            Verdict::Unknown { .. } => 1,
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.findings.iter().filter_map(|f| match f {
            Finding::Message(m) | Finding::Warning(m) => Some(m.as_str()),
            Finding::Link { .. } => None,
        })
    }
}
