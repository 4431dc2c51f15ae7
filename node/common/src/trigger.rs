use ethers::abi::{decode, encode, ParamType, Token};
use ethers::types::{Bytes, Log, H256, U256};

use crate::contracts::ChainReader;
use crate::error::{ChainError, TriggerError};
use crate::types::{LogTriggerConfig, TriggerType, UpkeepId};

/// Highest filter selector: topic1, topic2 and topic3 all filtered
pub const MAX_FILTER_SELECTOR: u8 = 0b111;

/// Read the trigger type an upkeep was registered with
pub async fn classify<C: ChainReader + ?Sized>(
    chain: &C,
    id: UpkeepId,
) -> Result<TriggerType, ChainError> {
    let raw = chain.get_trigger_type(id).await?;
    TriggerType::try_from(raw)
}

/// Check a log against the filter configured for a log upkeep.
///
/// Topic 0 must always match. Bit `n` of the filter selector requires topic
/// `n + 1` to match as well.
pub fn log_matches_trigger_config(
    log: &Log,
    config: &LogTriggerConfig,
) -> Result<bool, TriggerError> {
    if config.filter_selector > MAX_FILTER_SELECTOR {
        return Err(TriggerError::InvalidFilterSelector(config.filter_selector));
    }

    if log.topics.first() != Some(&config.topic0) {
        return Ok(false);
    }

    let filtered = [config.topic1, config.topic2, config.topic3];
    for (slot, expected) in filtered.iter().enumerate() {
        if config.filter_selector & (1 << slot) == 0 {
            continue;
        }
        if log.topics.get(slot + 1) != Some(expected) {
            return Ok(false);
        }
    }

    Ok(true)
}

fn log_trigger_config_params() -> Vec<ParamType> {
    vec![ParamType::Tuple(vec![
        ParamType::Address,
        ParamType::Uint(8),
        ParamType::FixedBytes(32),
        ParamType::FixedBytes(32),
        ParamType::FixedBytes(32),
        ParamType::FixedBytes(32),
    ])]
}

/// Decode the ABI encoded `LogTriggerConfig` stored for an upkeep
pub fn unpack_log_trigger_config(data: &[u8]) -> Result<LogTriggerConfig, TriggerError> {
    let tokens =
        decode(&log_trigger_config_params(), data).map_err(|e| TriggerError::Unpack(e.to_string()))?;

    let fields = match tokens.into_iter().next() {
        Some(Token::Tuple(fields)) if fields.len() == 6 => fields,
        _ => return Err(TriggerError::Unpack("expected a 6 field tuple".into())),
    };

    let topic = |token: &Token| -> Result<H256, TriggerError> {
        match token {
            Token::FixedBytes(b) if b.len() == 32 => Ok(H256::from_slice(b)),
            other => Err(TriggerError::Unpack(format!("bad topic {:?}", other))),
        }
    };

    let contract_address = match &fields[0] {
        Token::Address(a) => *a,
        other => return Err(TriggerError::Unpack(format!("bad contract address {:?}", other))),
    };
    // Values outside u8 range are kept saturated so they fail selector validation
    let filter_selector = match &fields[1] {
        Token::Uint(v) if *v <= U256::from(u8::MAX) => v.as_u32() as u8,
        Token::Uint(_) => u8::MAX,
        other => return Err(TriggerError::Unpack(format!("bad filter selector {:?}", other))),
    };

    Ok(LogTriggerConfig {
        contract_address,
        filter_selector,
        topic0: topic(&fields[2])?,
        topic1: topic(&fields[3])?,
        topic2: topic(&fields[4])?,
        topic3: topic(&fields[5])?,
    })
}

/// ABI encode a `LogTriggerConfig`, as registered on the registry
pub fn pack_log_trigger_config(config: &LogTriggerConfig) -> Bytes {
    encode(&[Token::Tuple(vec![
        Token::Address(config.contract_address),
        Token::Uint(U256::from(config.filter_selector)),
        Token::FixedBytes(config.topic0.as_bytes().to_vec()),
        Token::FixedBytes(config.topic1.as_bytes().to_vec()),
        Token::FixedBytes(config.topic2.as_bytes().to_vec()),
        Token::FixedBytes(config.topic3.as_bytes().to_vec()),
    ])])
    .into()
}

/// Trigger payload passed to `checkUpkeep` for a log upkeep
pub fn pack_log_trigger_data(log: &Log, block_timestamp: u64) -> Result<Bytes, TriggerError> {
    let tx_hash = log.transaction_hash.ok_or(TriggerError::IncompleteLog("transaction hash"))?;
    let log_index = log.log_index.ok_or(TriggerError::IncompleteLog("log index"))?;
    let block_number = log.block_number.ok_or(TriggerError::IncompleteLog("block number"))?;
    let block_hash = log.block_hash.ok_or(TriggerError::IncompleteLog("block hash"))?;

    let topics = log
        .topics
        .iter()
        .map(|t| Token::FixedBytes(t.as_bytes().to_vec()))
        .collect();

    let payload = encode(&[Token::Tuple(vec![
        Token::Uint(U256::from(block_timestamp)),
        Token::FixedBytes(tx_hash.as_bytes().to_vec()),
        Token::Uint(log_index),
        Token::Uint(U256::from(block_number.as_u64())),
        Token::FixedBytes(block_hash.as_bytes().to_vec()),
        Token::Address(log.address),
        Token::Array(topics),
        Token::Bytes(log.data.to_vec()),
    ])]);

    Ok(payload.into())
}
