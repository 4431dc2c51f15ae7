use automation_common::UpkeepId;
use automation_streams::{Credentials, RetryConfig};
use clap::Parser;
use ethers::types::{Address, H256, U256};
use reqwest::Url;
use std::str::FromStr;
use std::time::Duration;

use crate::error::DebugError;

#[derive(Parser, Debug, Clone)]
#[clap(name = "debugger")]
#[clap(about = "Explains why an automation upkeep is or is not eligible to perform")]
pub struct Args {
    /// Upkeep id, decimal or 0x-prefixed hex
    pub upkeep_id: String,

    /// Block to evaluate a conditional upkeep at (defaults to latest)
    #[clap(short, long)]
    pub block: Option<u64>,

    /// Transaction that emitted the triggering log
    #[clap(short, long)]
    pub tx_hash: Option<String>,

    /// Index of the triggering log within its block
    #[clap(short, long)]
    pub log_index: Option<u64>,

    #[clap(long, env = "NODE_URL")]
    pub node_url: String,

    #[clap(long, env = "KEEPER_REGISTRY_ADDRESS")]
    pub registry: String,

    #[clap(long, env = "DATA_STREAMS_ID")]
    pub streams_id: Option<String>,

    #[clap(long, env = "DATA_STREAMS_KEY", hide_env_values = true)]
    pub streams_key: Option<String>,

    #[clap(long, env = "DATA_STREAMS_LEGACY_URL")]
    pub streams_legacy_url: Option<String>,

    #[clap(long, env = "DATA_STREAMS_URL")]
    pub streams_url: Option<String>,

    /// Per request timeout for data streams calls, in seconds
    #[clap(long, default_value = "10")]
    pub lookup_timeout_secs: u64,

    /// Delay between data streams attempts, in milliseconds
    #[clap(long, default_value = "500")]
    pub lookup_retry_delay_ms: u64,

    #[clap(long, default_value = "3")]
    pub lookup_attempts: u32,
}

/// Operator configuration shared by every evaluation
#[derive(Debug, Clone)]
pub struct Config {
    pub node_url: String,
    pub registry: Address,
    pub streams: Option<Credentials>,
    pub retry: RetryConfig,
    pub lookup_timeout: Duration,
}

/// What to evaluate
#[derive(Debug, Clone, Default)]
pub struct DebugRequest {
    pub upkeep_id: UpkeepId,
    pub block: Option<u64>,
    pub tx_hash: Option<H256>,
    pub log_index: Option<u64>,
}

impl Args {
    pub fn request(&self) -> Result<DebugRequest, DebugError> {
        let tx_hash = self.tx_hash.as_deref().map(parse_tx_hash).transpose()?;
        Ok(DebugRequest {
            upkeep_id: parse_upkeep_id(&self.upkeep_id)?,
            block: self.block,
            tx_hash,
            log_index: self.log_index,
        })
    }

    pub fn config(&self) -> Result<Config, DebugError> {
        if self.node_url.trim().is_empty() {
            return Err(DebugError::Config("NODE_URL is empty".into()));
        }
        let registry = Address::from_str(self.registry.trim()).map_err(|e| {
            DebugError::Config(format!("invalid registry address {}: {}", self.registry, e))
        })?;
        if self.lookup_attempts == 0 {
            return Err(DebugError::Config("lookup attempts must be at least 1".into()));
        }

        Ok(Config {
            node_url: self.node_url.trim().to_string(),
            registry,
            streams: self.credentials()?,
            retry: RetryConfig {
                max_attempts: self.lookup_attempts,
                delay: Duration::from_millis(self.lookup_retry_delay_ms),
            },
            lookup_timeout: Duration::from_secs(self.lookup_timeout_secs),
        })
    }

    /// Data streams credentials are all or nothing
    fn credentials(&self) -> Result<Option<Credentials>, DebugError> {
        let fields = [
            ("DATA_STREAMS_ID", &self.streams_id),
            ("DATA_STREAMS_KEY", &self.streams_key),
            ("DATA_STREAMS_LEGACY_URL", &self.streams_legacy_url),
            ("DATA_STREAMS_URL", &self.streams_url),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect();

        if missing.len() == fields.len() {
            return Ok(None);
        }
        if !missing.is_empty() {
            return Err(DebugError::Config(format!(
                "incomplete data streams credentials, missing {}",
                missing.join(", ")
            )));
        }

        let value = |v: &Option<String>| v.as_deref().unwrap_or_default().trim().to_string();
        Ok(Some(Credentials {
            client_id: value(&self.streams_id),
            secret: value(&self.streams_key),
            legacy_url: parse_base_url("DATA_STREAMS_LEGACY_URL", &value(&self.streams_legacy_url))?,
            url: parse_base_url("DATA_STREAMS_URL", &value(&self.streams_url))?,
        }))
    }
}

/// Validate an http(s) base URL and strip its trailing slash
fn parse_base_url(name: &str, raw: &str) -> Result<String, DebugError> {
    let url = Url::parse(raw)
        .map_err(|e| DebugError::Config(format!("invalid {} {:?}: {}", name, raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(DebugError::Config(format!(
            "invalid {} {:?}: expected an http(s) URL",
            name, raw
        )));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

pub fn parse_upkeep_id(raw: &str) -> Result<UpkeepId, DebugError> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() => U256::from_str_radix(hex, 16).ok(),
        Some(_) => None,
        None if !raw.is_empty() => U256::from_dec_str(raw).ok(),
        None => None,
    };
    parsed.ok_or_else(|| DebugError::InvalidInput(format!("invalid upkeep id {:?}", raw)))
}

pub fn parse_tx_hash(raw: &str) -> Result<H256, DebugError> {
    let raw = raw.trim();
    let hex = raw.strip_prefix("0x").unwrap_or(raw);
    if hex.len() != 64 {
        return Err(DebugError::InvalidInput(format!("invalid transaction hash {:?}", raw)));
    }
    H256::from_str(hex)
        .map_err(|_| DebugError::InvalidInput(format!("invalid transaction hash {:?}", raw)))
}
