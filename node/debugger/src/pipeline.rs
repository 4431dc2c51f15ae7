use automation_common::crypto::upkeep_work_id;
use automation_common::links::{contract_explorer_link, transaction_explorer_link, upkeep_link};
use automation_common::trigger::{
    classify, log_matches_trigger_config, pack_log_trigger_data, unpack_log_trigger_config,
};
use automation_common::{
    ChainError, ChainReader, CheckOutcome, LogTrigger, PrivilegeConfig, Trigger, TriggerError,
    TriggerType, TxStatus, UpkeepFailureReason, UpkeepId, UpkeepInfo,
};
use automation_streams::{decode_streams_lookup, LookupVersion, StreamsClient};
use ethers::types::{Address, Bytes, Log, U256};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DebugRequest;
use crate::error::DebugError;
use crate::verdict::{Findings, Ineligibility, Report, Verdict};

/// Balance headroom over the min balance below which a warning is recorded
const LOW_BALANCE_PERCENT: u64 = 5;

/// Early exit from an evaluation
enum Halt {
    Ineligible(Ineligibility),
    Failed(DebugError),
}

impl From<DebugError> for Halt {
    fn from(err: DebugError) -> Self {
        Halt::Failed(err)
    }
}

impl From<ChainError> for Halt {
    fn from(err: ChainError) -> Self {
        Halt::Failed(DebugError::Chain(err))
    }
}

impl From<Ineligibility> for Halt {
    fn from(reason: Ineligibility) -> Self {
        Halt::Ineligible(reason)
    }
}

type Step<T> = Result<T, Halt>;

/// Check result plus the context simulation needs
struct Checked {
    outcome: CheckOutcome,
    upkeep: UpkeepInfo,
    block: u64,
}

/// Walks one upkeep through classification, checks, lookups and simulation
pub struct EligibilityPipeline<'a, C: ChainReader + ?Sized> {
    chain: &'a C,
    streams: Option<&'a StreamsClient>,
}

impl<'a, C: ChainReader + ?Sized> EligibilityPipeline<'a, C> {
    pub fn new(chain: &'a C, streams: Option<&'a StreamsClient>) -> Self {
        Self { chain, streams }
    }

    /// Evaluate one upkeep. Always returns a report; failures become `Unknown`.
    pub async fn run(&self, cancel: &CancellationToken, request: &DebugRequest) -> Report {
        let mut findings = Findings::default();
        info!(upkeep_id = %request.upkeep_id, "Evaluating upkeep");

        let verdict = match self.evaluate(cancel, request, &mut findings).await {
            Ok(()) => Verdict::Eligible,
            Err(Halt::Ineligible(reason)) => Verdict::Ineligible(reason),
            Err(Halt::Failed(error)) => {
                let retryable = error.is_retryable();
                Verdict::Unknown { error, retryable }
            }
        };
        debug!(upkeep_id = %request.upkeep_id, ?verdict, "Evaluation finished");

        Report {
            upkeep_id: request.upkeep_id,
            verdict,
            findings: findings.into_entries(),
        }
    }

    async fn evaluate(
        &self,
        cancel: &CancellationToken,
        request: &DebugRequest,
        findings: &mut Findings,
    ) -> Step<()> {
        let id = request.upkeep_id;

        let chain_id = self.read(cancel, self.chain.chain_id()).await?;
        let type_and_version = self.read(cancel, self.chain.type_and_version()).await?;
        if !is_automation_registry(&type_and_version) {
            return Err(DebugError::Config(format!(
                "registry address is not an automation registry (typeAndVersion {:?})",
                type_and_version
            ))
            .into());
        }
        findings.message(format!("registry version: {}", type_and_version));
        findings.link("upkeep", upkeep_link(chain_id, id));

        let trigger_type = self.read(cancel, classify(self.chain, id)).await?;
        findings.message(format!("upkeep trigger type: {}", trigger_type));

        let checked = match trigger_type {
            TriggerType::Conditional => {
                self.check_conditional(cancel, request, chain_id, findings).await?
            }
            TriggerType::Log => self.check_log(cancel, request, chain_id, findings).await?,
        };

        let (needed, perform_data) = self.interpret_check(cancel, id, &checked, findings).await?;
        if !needed {
            return Err(Ineligibility::NotNeeded.into());
        }

        self.simulate(cancel, id, &checked, perform_data, findings).await
    }

    async fn check_conditional(
        &self,
        cancel: &CancellationToken,
        request: &DebugRequest,
        chain_id: u64,
        findings: &mut Findings,
    ) -> Step<Checked> {
        let id = request.upkeep_id;
        if request.tx_hash.is_some() || request.log_index.is_some() {
            findings.warning("tx hash and log index are ignored for conditional upkeeps");
        }

        let block = match request.block {
            Some(block) => block,
            None => self.read(cancel, self.chain.latest_block_number()).await?,
        };
        findings.message(format!("evaluating conditional upkeep at block {}", block));

        let upkeep = self.sanity_check(cancel, id, Some(block), chain_id, findings).await?;
        let outcome = self
            .read(cancel, self.chain.check_upkeep(id, Bytes::default(), Some(block)))
            .await?;

        Ok(Checked { outcome, upkeep, block })
    }

    async fn check_log(
        &self,
        cancel: &CancellationToken,
        request: &DebugRequest,
        chain_id: u64,
        findings: &mut Findings,
    ) -> Step<Checked> {
        let id = request.upkeep_id;
        let tx_hash = request.tx_hash.ok_or_else(|| {
            DebugError::InvalidInput("log trigger upkeeps require a transaction hash".into())
        })?;
        let log_index = request.log_index.ok_or_else(|| {
            DebugError::InvalidInput("log trigger upkeeps require a log index".into())
        })?;
        if request.block.is_some() {
            findings.warning("block is ignored for log trigger upkeeps, using the log's block");
        }

        match self.read(cancel, self.chain.transaction_status(tx_hash)).await? {
            TxStatus::NotFound => return Err(Ineligibility::TxNotFound.into()),
            TxStatus::Pending => return Err(Ineligibility::TxPending.into()),
            TxStatus::Mined => {}
        }
        findings.link("transaction", transaction_explorer_link(chain_id, tx_hash));

        let receipt = self
            .read(cancel, self.chain.transaction_receipt(tx_hash))
            .await?
            .ok_or(Ineligibility::ReceiptNotFound)?;
        let log = receipt
            .logs
            .iter()
            .find(|log| log.log_index == Some(U256::from(log_index)))
            .cloned()
            .ok_or(Ineligibility::LogNotFound { log_index })?;

        let block_number = receipt
            .block_number
            .or(log.block_number)
            .ok_or_else(|| decode_error("transaction receipt", "missing block number"))?
            .as_u64();
        let block_hash = receipt
            .block_hash
            .or(log.block_hash)
            .ok_or_else(|| decode_error("transaction receipt", "missing block hash"))?;

        let trigger = Trigger::Log(LogTrigger {
            tx_hash,
            log_index,
            block_number,
            block_hash,
        });
        let work_id = upkeep_work_id(id, &trigger);
        findings.message(format!("workID computed: {}", work_id));

        if self.read(cancel, self.chain.has_dedup_key(work_id)).await? {
            return Err(Ineligibility::AlreadyPerformed.into());
        }
        findings.message("upkeep has not been performed for this log");

        self.match_trigger_config(cancel, id, &log, findings).await?;

        let timestamp = self.read(cancel, self.chain.block_timestamp(block_hash)).await?;
        let trigger_data = pack_log_trigger_data(&log, timestamp)
            .map_err(|e| decode_error("triggering log", e))?;

        let upkeep = self
            .sanity_check(cancel, id, Some(block_number), chain_id, findings)
            .await?;
        findings.message(format!("evaluating log trigger at block {}", block_number));
        let outcome = self
            .read(cancel, self.chain.check_upkeep(id, trigger_data, Some(block_number)))
            .await?;

        Ok(Checked {
            outcome,
            upkeep,
            block: block_number,
        })
    }

    async fn match_trigger_config(
        &self,
        cancel: &CancellationToken,
        id: UpkeepId,
        log: &Log,
        findings: &mut Findings,
    ) -> Step<()> {
        let raw = self.read(cancel, self.chain.get_upkeep_trigger_config(id)).await?;
        let config =
            unpack_log_trigger_config(&raw).map_err(|e| decode_error("log trigger config", e))?;

        if log.address != config.contract_address {
            return Err(Ineligibility::LogContractMismatch {
                expected: config.contract_address,
                actual: log.address,
            }
            .into());
        }

        match log_matches_trigger_config(log, &config) {
            Ok(true) => {
                findings.message("log matches the upkeep trigger config");
                Ok(())
            }
            Ok(false) => Err(Ineligibility::LogDoesNotMatchFilter.into()),
            Err(TriggerError::InvalidFilterSelector(selector)) => {
                Err(Ineligibility::InvalidFilterSelector(selector).into())
            }
            Err(e) => Err(decode_error("log trigger config", e).into()),
        }
    }

    /// Existence, paused, cancelled and balance checks
    async fn sanity_check(
        &self,
        cancel: &CancellationToken,
        id: UpkeepId,
        block: Option<u64>,
        chain_id: u64,
        findings: &mut Findings,
    ) -> Step<UpkeepInfo> {
        let upkeep = self.read(cancel, self.chain.get_upkeep(id, block)).await?;
        if upkeep.target == Address::zero() {
            return Err(Ineligibility::DoesNotExist.into());
        }
        findings.link("target contract", contract_explorer_link(chain_id, upkeep.target));

        if upkeep.paused {
            return Err(Ineligibility::Paused.into());
        }
        if upkeep.is_cancelled() {
            return Err(Ineligibility::Cancelled.into());
        }
        findings.message("upkeep is active (not paused or cancelled)");

        let min_balance = self.read(cancel, self.chain.get_min_balance(id, block)).await?;
        if upkeep.balance < min_balance {
            return Err(Ineligibility::InsufficientBalance {
                balance: upkeep.balance,
                min_balance,
            }
            .into());
        }
        findings.message("upkeep is funded above the min balance");

        let headroom = min_balance * U256::from(LOW_BALANCE_PERCENT) / U256::from(100);
        if upkeep.balance - min_balance < headroom {
            warn!(upkeep_id = %id, balance = %upkeep.balance, %min_balance, "Upkeep balance is low");
            findings.warning(format!(
                "upkeep balance is less than {}% above the min balance",
                LOW_BALANCE_PERCENT
            ));
        }

        Ok(upkeep)
    }

    /// Resolve a `StreamsLookup` revert into a callback outcome when there is one
    async fn interpret_check(
        &self,
        cancel: &CancellationToken,
        id: UpkeepId,
        checked: &Checked,
        findings: &mut Findings,
    ) -> Step<(bool, Bytes)> {
        let outcome = &checked.outcome;
        findings.message(format!(
            "checkUpkeep returned upkeepNeeded={} failureReason={}",
            outcome.upkeep_needed, outcome.failure_reason
        ));

        if outcome.failure_reason != UpkeepFailureReason::TargetCheckReverted {
            return Ok((outcome.upkeep_needed, outcome.perform_data.clone()));
        }

        let lookup = match decode_streams_lookup(&outcome.perform_data, id, checked.block) {
            Ok(lookup) => lookup,
            Err(e) => {
                debug!(upkeep_id = %id, error = %e, "Check revert is not a StreamsLookup");
                findings.message("check reverted without a StreamsLookup request");
                return Ok((false, Bytes::default()));
            }
        };
        findings.message(format!(
            "upkeep reverted with StreamsLookup: {}={:?} {}={} extraData=0x{}",
            lookup.feed_param_key,
            lookup.feeds,
            lookup.time_param_key,
            lookup.time,
            hex::encode(&lookup.extra_data)
        ));

        match lookup.version() {
            None => {
                return Err(Ineligibility::InvalidLookupKeys {
                    feed_param_key: lookup.feed_param_key.clone(),
                    time_param_key: lookup.time_param_key.clone(),
                }
                .into())
            }
            Some(LookupVersion::V02) => {
                if !self.streams_allowed(cancel, id).await? {
                    return Err(Ineligibility::StreamsAccessNotAllowed.into());
                }
                findings.message("upkeep is allowed to use data streams v0.2");
            }
            Some(LookupVersion::V03) => {}
        }

        let client = self.streams.ok_or_else(|| {
            DebugError::Config(
                "upkeep requested data streams but DATA_STREAMS_* credentials are not set".into(),
            )
        })?;

        let values = match client.fetch(cancel, &lookup).await {
            Ok(values) => values,
            Err(e) if e.ineligibility_reason() == Some(UpkeepFailureReason::InvalidRevertDataInput) => {
                return Err(Ineligibility::InvalidRevertData(e.to_string()).into())
            }
            Err(e) => return Err(DebugError::from(e).into()),
        };
        info!(upkeep_id = %id, reports = values.len(), "Data streams lookup succeeded");
        findings.message(format!("data streams returned {} reports", values.len()));

        let callback = self
            .read(
                cancel,
                self.chain
                    .check_callback(id, values, lookup.extra_data.clone(), Some(checked.block)),
            )
            .await?;
        findings.message(format!(
            "checkCallback returned upkeepNeeded={} failureReason={}",
            callback.upkeep_needed, callback.failure_reason
        ));

        Ok((callback.upkeep_needed, callback.perform_data))
    }

    async fn streams_allowed(&self, cancel: &CancellationToken, id: UpkeepId) -> Step<bool> {
        let raw = self.read(cancel, self.chain.get_upkeep_privilege_config(id)).await?;
        if raw.is_empty() {
            return Ok(false);
        }
        let config: PrivilegeConfig = serde_json::from_slice(&raw)
            .map_err(|e| decode_error("upkeep privilege config", e))?;
        Ok(config.streams_enabled)
    }

    async fn simulate(
        &self,
        cancel: &CancellationToken,
        id: UpkeepId,
        checked: &Checked,
        perform_data: Bytes,
        findings: &mut Findings,
    ) -> Step<()> {
        let simulation = self
            .read(
                cancel,
                self.chain.simulate_perform_upkeep(id, perform_data, Some(checked.block)),
            )
            .await?;

        if simulation.success {
            findings.message(format!(
                "simulated performUpkeep succeeded using {} gas",
                simulation.gas_used
            ));
            return Ok(());
        }

        let perform_gas = checked.upkeep.perform_gas;
        if U256::from(perform_gas) < simulation.gas_used {
            return Err(Ineligibility::PerformGasTooLow {
                perform_gas,
                gas_used: simulation.gas_used,
            }
            .into());
        }
        Err(Ineligibility::SimulationFailed.into())
    }

    /// Await a chain read unless the evaluation is cancelled first
    async fn read<T>(
        &self,
        cancel: &CancellationToken,
        call: impl Future<Output = Result<T, ChainError>>,
    ) -> Step<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DebugError::Cancelled.into()),
            result = call => Ok(result?),
        }
    }
}

fn is_automation_registry(type_and_version: &str) -> bool {
    type_and_version.starts_with("AutomationRegistry")
        || type_and_version.starts_with("KeeperRegistry")
}

fn decode_error(what: &'static str, detail: impl ToString) -> DebugError {
    DebugError::Decode {
        what,
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_detection() {
        assert!(is_automation_registry("AutomationRegistry 2.1.0"));
        assert!(is_automation_registry("KeeperRegistry 2.0.2"));
        assert!(!is_automation_registry("VRFCoordinatorV2 1.0.0"));
        assert!(!is_automation_registry(""));
    }
}
