use ethers::contract::ContractError;
use ethers::providers::{Middleware, ProviderError};
use thiserror::Error;

/// Failure of a chain read
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC or connection failure; the call may succeed if repeated
    #[error("rpc transport failure: {0}")]
    Transport(String),
    /// The call executed and reverted
    #[error("call reverted: {0}")]
    Revert(String),
    /// The node answered with something that could not be decoded
    #[error("failed to decode chain data: {0}")]
    Decode(String),
}

impl ChainError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainError::Transport(_))
    }
}

impl<M: Middleware> From<ContractError<M>> for ChainError {
    fn from(err: ContractError<M>) -> Self {
        if err.is_revert() {
            return ChainError::Revert(err.to_string());
        }
        match err {
            ContractError::AbiError(e) => ChainError::Decode(e.to_string()),
            ContractError::DecodingError(e) => ChainError::Decode(e.to_string()),
            ContractError::DetokenizationError(e) => ChainError::Decode(e.to_string()),
            other => ChainError::Transport(other.to_string()),
        }
    }
}

impl From<ProviderError> for ChainError {
    fn from(err: ProviderError) -> Self {
        ChainError::Transport(err.to_string())
    }
}

/// Failure while interpreting log trigger data
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("invalid filter selector {0}: only the lowest three bits may be set")]
    InvalidFilterSelector(u8),
    #[error("failed to unpack log trigger config: {0}")]
    Unpack(String),
    #[error("log is missing {0}")]
    IncompleteLog(&'static str),
}
