use automation_common::UpkeepId;
use ethers::abi::{decode, encode, ParamType, Token};
use ethers::types::{Bytes, U256};
use ethers::utils::id;

use crate::error::StreamsError;

pub const FEED_ID_HEX: &str = "feedIdHex";
pub const FEED_IDS: &str = "feedIDs";
pub const BLOCK_NUMBER: &str = "blockNumber";
pub const TIMESTAMP: &str = "timestamp";

const STREAMS_LOOKUP_SIGNATURE: &str = "StreamsLookup(string,string[],string,uint256,bytes)";

/// Wire version selected by the request's parameter keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupVersion {
    /// One request per feed, keyed by block number
    V02,
    /// All feeds in one request, keyed by timestamp
    V03,
}

/// Off-chain data request embedded in a StreamsLookup revert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamsLookupRequest {
    pub feed_param_key: String,
    pub feeds: Vec<String>,
    pub time_param_key: String,
    pub time: U256,
    pub extra_data: Bytes,
    pub upkeep_id: UpkeepId,
    pub block: u64,
}

impl StreamsLookupRequest {
    /// Wire version for this shape, if the key pair is one of the two valid ones
    pub fn version(&self) -> Option<LookupVersion> {
        match (self.feed_param_key.as_str(), self.time_param_key.as_str()) {
            (FEED_ID_HEX, BLOCK_NUMBER) => Some(LookupVersion::V02),
            (FEED_IDS, TIMESTAMP) => Some(LookupVersion::V03),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<LookupVersion, StreamsError> {
        if self.feeds.is_empty() {
            return Err(StreamsError::InvalidInput("no feeds requested".into()));
        }
        self.version().ok_or_else(|| {
            StreamsError::InvalidInput(format!(
                "unsupported parameter keys {}/{}",
                self.feed_param_key, self.time_param_key
            ))
        })
    }

    /// Revert data a StreamsLookup upkeep produces for this request
    pub fn encode_revert_data(&self) -> Bytes {
        let args = encode(&[
            Token::String(self.feed_param_key.clone()),
            Token::Array(self.feeds.iter().cloned().map(Token::String).collect()),
            Token::String(self.time_param_key.clone()),
            Token::Uint(self.time),
            Token::Bytes(self.extra_data.to_vec()),
        ]);
        [&streams_lookup_selector()[..], &args[..]].concat().into()
    }
}

pub fn streams_lookup_selector() -> [u8; 4] {
    id(STREAMS_LOOKUP_SIGNATURE)
}

/// Decode the StreamsLookup custom error an upkeep reverted with
pub fn decode_streams_lookup(
    revert_data: &[u8],
    upkeep_id: UpkeepId,
    block: u64,
) -> Result<StreamsLookupRequest, StreamsError> {
    if revert_data.len() < 4 || revert_data[..4] != streams_lookup_selector() {
        return Err(StreamsError::InvalidRevertData("not a StreamsLookup revert".into()));
    }

    let tokens = decode(
        &[
            ParamType::String,
            ParamType::Array(Box::new(ParamType::String)),
            ParamType::String,
            ParamType::Uint(256),
            ParamType::Bytes,
        ],
        &revert_data[4..],
    )
    .map_err(|e| StreamsError::InvalidRevertData(e.to_string()))?;

    match tokens.as_slice() {
        [Token::String(feed_param_key), Token::Array(feeds), Token::String(time_param_key), Token::Uint(time), Token::Bytes(extra_data)] =>
        {
            let feeds = feeds
                .iter()
                .map(|t| match t {
                    Token::String(feed) => Ok(feed.clone()),
                    other => Err(StreamsError::InvalidRevertData(format!("bad feed {:?}", other))),
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(StreamsLookupRequest {
                feed_param_key: feed_param_key.clone(),
                feeds,
                time_param_key: time_param_key.clone(),
                time: *time,
                extra_data: Bytes::from(extra_data.clone()),
                upkeep_id,
                block,
            })
        }
        _ => Err(StreamsError::InvalidRevertData("unexpected argument layout".into())),
    }
}
