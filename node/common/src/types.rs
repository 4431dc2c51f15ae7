use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ChainError;

/// Registry-assigned upkeep identifier
pub type UpkeepId = U256;

/// `maxValidBlocknumber` value of an upkeep that has not been cancelled
pub const UPKEEP_ACTIVE_MAX_VALID_BLOCK: u64 = u32::MAX as u64;

/// Trigger kind fixed at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerType {
    Conditional,
    Log,
}

impl TryFrom<u8> for TriggerType {
    type Error = ChainError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(TriggerType::Conditional),
            1 => Ok(TriggerType::Log),
            other => Err(ChainError::Decode(format!("unknown trigger type {}", other))),
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerType::Conditional => write!(f, "conditional"),
            TriggerType::Log => write!(f, "log"),
        }
    }
}

/// Log that triggered a log upkeep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogTrigger {
    pub tx_hash: H256,
    pub log_index: u64,
    pub block_number: u64,
    pub block_hash: H256,
}

impl LogTrigger {
    /// Identifier of the log: block hash, tx hash, then the decimal log index
    pub fn identifier(&self) -> Vec<u8> {
        let mut id = Vec::with_capacity(64 + 20);
        id.extend_from_slice(self.block_hash.as_bytes());
        id.extend_from_slice(self.tx_hash.as_bytes());
        id.extend_from_slice(self.log_index.to_string().as_bytes());
        id
    }
}

/// Trigger an upkeep is evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Conditional,
    Log(LogTrigger),
}

/// Dedup key of one (upkeep, trigger) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkId(pub [u8; 32]);

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Upkeep registration as stored by the registry
#[derive(Debug, Clone, Default)]
pub struct UpkeepInfo {
    pub target: Address,
    pub perform_gas: u32,
    pub check_data: Bytes,
    pub balance: U256,
    pub admin: Address,
    pub max_valid_blocknumber: u64,
    pub last_performed_block_number: u32,
    pub amount_spent: U256,
    pub paused: bool,
    pub offchain_config: Bytes,
}

impl UpkeepInfo {
    pub fn is_cancelled(&self) -> bool {
        self.max_valid_blocknumber != UPKEEP_ACTIVE_MAX_VALID_BLOCK
    }
}

/// Failure reasons reported by the registry (0..=9) and by off-chain
/// processing (32..)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpkeepFailureReason {
    #[default]
    None,
    UpkeepCancelled,
    UpkeepPaused,
    TargetCheckReverted,
    UpkeepNotNeeded,
    PerformDataExceedsLimit,
    InsufficientBalance,
    CallbackReverted,
    RevertDataExceedsLimit,
    RegistryPaused,
    StreamsAccessNotAllowed,
    TxHashNoLongerExists,
    InvalidRevertDataInput,
    SimulationFailed,
    TxHashReorged,
    Unknown(u8),
}

impl From<u8> for UpkeepFailureReason {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::None,
            1 => Self::UpkeepCancelled,
            2 => Self::UpkeepPaused,
            3 => Self::TargetCheckReverted,
            4 => Self::UpkeepNotNeeded,
            5 => Self::PerformDataExceedsLimit,
            6 => Self::InsufficientBalance,
            7 => Self::CallbackReverted,
            8 => Self::RevertDataExceedsLimit,
            9 => Self::RegistryPaused,
            32 => Self::StreamsAccessNotAllowed,
            33 => Self::TxHashNoLongerExists,
            34 => Self::InvalidRevertDataInput,
            35 => Self::SimulationFailed,
            36 => Self::TxHashReorged,
            other => Self::Unknown(other),
        }
    }
}

impl UpkeepFailureReason {
    pub fn code(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::UpkeepCancelled => 1,
            Self::UpkeepPaused => 2,
            Self::TargetCheckReverted => 3,
            Self::UpkeepNotNeeded => 4,
            Self::PerformDataExceedsLimit => 5,
            Self::InsufficientBalance => 6,
            Self::CallbackReverted => 7,
            Self::RevertDataExceedsLimit => 8,
            Self::RegistryPaused => 9,
            Self::StreamsAccessNotAllowed => 32,
            Self::TxHashNoLongerExists => 33,
            Self::InvalidRevertDataInput => 34,
            Self::SimulationFailed => 35,
            Self::TxHashReorged => 36,
            Self::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for UpkeepFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown failure reason ({})", code),
            other => write!(f, "{:?} ({})", other, other.code()),
        }
    }
}

/// Gas figures returned next to a check result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GasMetrics {
    pub gas_used: U256,
    pub gas_limit: U256,
    pub fast_gas_wei: U256,
    pub link_native: U256,
}

/// Result of `checkUpkeep` or `checkCallback`
#[derive(Debug, Clone, Default)]
pub struct CheckOutcome {
    pub upkeep_needed: bool,
    pub perform_data: Bytes,
    pub failure_reason: UpkeepFailureReason,
    pub gas: GasMetrics,
}

/// Result of `simulatePerformUpkeep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulationOutcome {
    pub success: bool,
    pub gas_used: U256,
}

/// Log filter configured for a log upkeep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogTriggerConfig {
    pub contract_address: Address,
    pub filter_selector: u8,
    pub topic0: H256,
    pub topic1: H256,
    pub topic2: H256,
    pub topic3: H256,
}

/// Off-chain privileges granted to an upkeep by the registry owner
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PrivilegeConfig {
    #[serde(rename = "mercuryEnabled", default)]
    pub streams_enabled: bool,
}

/// Inclusion status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    NotFound,
    Pending,
    Mined,
}
