use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, Provider},
    types::{Address, BlockId, BlockNumber, Bytes, TransactionReceipt, H256, U256, U64},
};
use std::sync::Arc;

use crate::error::ChainError;
use crate::types::{
    CheckOutcome, GasMetrics, SimulationOutcome, TxStatus, UpkeepFailureReason, UpkeepId,
    UpkeepInfo, WorkId,
};

mod bindings {
    use ethers::contract::abigen;

    // Generate contract bindings
    abigen!(
        AutomationRegistry,
        r#"[
            struct UpkeepInfo { address target; uint32 performGas; bytes checkData; uint96 balance; address admin; uint64 maxValidBlocknumber; uint32 lastPerformedBlockNumber; uint96 amountSpent; bool paused; bytes offchainConfig; }
            function typeAndVersion() external view returns (string)
            function getUpkeep(uint256 id) external view returns (UpkeepInfo memory upkeepInfo)
            function getMinBalance(uint256 id) external view returns (uint96)
            function getTriggerType(uint256 upkeepId) external pure returns (uint8)
            function getUpkeepTriggerConfig(uint256 upkeepId) external view returns (bytes memory)
            function getUpkeepPrivilegeConfig(uint256 upkeepId) external view returns (bytes memory)
            function hasDedupKey(bytes32 dedupKey) external view returns (bool)
            function checkUpkeep(uint256 id, bytes triggerData) external returns (bool upkeepNeeded, bytes performData, uint8 upkeepFailureReason, uint256 gasUsed, uint256 gasLimit, uint256 fastGasWei, uint256 linkNative)
            function checkCallback(uint256 id, bytes[] values, bytes extraData) external returns (bool upkeepNeeded, bytes performData, uint8 upkeepFailureReason, uint256 gasUsed)
            function simulatePerformUpkeep(uint256 id, bytes performData) external returns (bool success, uint256 gasUsed)
        ]"#
    );
}

pub use bindings::AutomationRegistry;

pub type Client = Provider<Http>;

/// Chain reads the eligibility pipeline depends on.
///
/// `block` selects the block the call is evaluated at; `None` means latest.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn chain_id(&self) -> Result<u64, ChainError>;

    async fn latest_block_number(&self) -> Result<u64, ChainError>;

    async fn type_and_version(&self) -> Result<String, ChainError>;

    async fn get_upkeep(&self, id: UpkeepId, block: Option<u64>) -> Result<UpkeepInfo, ChainError>;

    async fn get_min_balance(&self, id: UpkeepId, block: Option<u64>) -> Result<U256, ChainError>;

    /// Raw trigger type code as stored by the registry
    async fn get_trigger_type(&self, id: UpkeepId) -> Result<u8, ChainError>;

    async fn check_upkeep(
        &self,
        id: UpkeepId,
        trigger_data: Bytes,
        block: Option<u64>,
    ) -> Result<CheckOutcome, ChainError>;

    async fn check_callback(
        &self,
        id: UpkeepId,
        values: Vec<Bytes>,
        extra_data: Bytes,
        block: Option<u64>,
    ) -> Result<CheckOutcome, ChainError>;

    async fn simulate_perform_upkeep(
        &self,
        id: UpkeepId,
        perform_data: Bytes,
        block: Option<u64>,
    ) -> Result<SimulationOutcome, ChainError>;

    async fn has_dedup_key(&self, work_id: WorkId) -> Result<bool, ChainError>;

    async fn get_upkeep_trigger_config(&self, id: UpkeepId) -> Result<Bytes, ChainError>;

    async fn get_upkeep_privilege_config(&self, id: UpkeepId) -> Result<Bytes, ChainError>;

    async fn transaction_status(&self, tx_hash: H256) -> Result<TxStatus, ChainError>;

    async fn transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError>;

    async fn block_timestamp(&self, block_hash: H256) -> Result<u64, ChainError>;
}

/// `getUpkeep` output; abigen decodes struct returns as a tuple in ABI field order
pub type RawUpkeep = (Address, u32, Bytes, u128, Address, u64, u32, u128, bool, Bytes);

fn upkeep_from_raw(raw: RawUpkeep) -> UpkeepInfo {
    let (
        target,
        perform_gas,
        check_data,
        balance,
        admin,
        max_valid_blocknumber,
        last_performed_block_number,
        amount_spent,
        paused,
        offchain_config,
    ) = raw;

    UpkeepInfo {
        target,
        perform_gas,
        check_data,
        balance: U256::from(balance),
        admin,
        max_valid_blocknumber,
        last_performed_block_number,
        amount_spent: U256::from(amount_spent),
        paused,
        offchain_config,
    }
}

fn at_block(block: Option<u64>) -> BlockId {
    match block {
        Some(number) => BlockNumber::Number(U64::from(number)).into(),
        None => BlockNumber::Latest.into(),
    }
}

/// Registry client backed by a JSON-RPC node
#[derive(Clone)]
pub struct RegistryClient {
    contract: AutomationRegistry<Client>,
    client: Arc<Client>,
}

impl RegistryClient {
    pub fn new(registry_addr: Address, client: Arc<Client>) -> Self {
        let contract = AutomationRegistry::new(registry_addr, client.clone());
        Self { contract, client }
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }
}

#[async_trait]
impl ChainReader for RegistryClient {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.client.get_chainid().await?.as_u64())
    }

    async fn latest_block_number(&self) -> Result<u64, ChainError> {
        Ok(self.client.get_block_number().await?.as_u64())
    }

    async fn type_and_version(&self) -> Result<String, ChainError> {
        Ok(self.contract.type_and_version().call().await?)
    }

    async fn get_upkeep(&self, id: UpkeepId, block: Option<u64>) -> Result<UpkeepInfo, ChainError> {
        let raw: RawUpkeep = self.contract.get_upkeep(id).block(at_block(block)).call().await?;
        Ok(upkeep_from_raw(raw))
    }

    async fn get_min_balance(&self, id: UpkeepId, block: Option<u64>) -> Result<U256, ChainError> {
        let min = self.contract.get_min_balance(id).block(at_block(block)).call().await?;
        Ok(U256::from(min))
    }

    async fn get_trigger_type(&self, id: UpkeepId) -> Result<u8, ChainError> {
        Ok(self.contract.get_trigger_type(id).call().await?)
    }

    async fn check_upkeep(
        &self,
        id: UpkeepId,
        trigger_data: Bytes,
        block: Option<u64>,
    ) -> Result<CheckOutcome, ChainError> {
        let (upkeep_needed, perform_data, reason, gas_used, gas_limit, fast_gas_wei, link_native) =
            self.contract
                .check_upkeep(id, trigger_data)
                .block(at_block(block))
                .call()
                .await?;

        Ok(CheckOutcome {
            upkeep_needed,
            perform_data,
            failure_reason: UpkeepFailureReason::from(reason),
            gas: GasMetrics {
                gas_used,
                gas_limit,
                fast_gas_wei,
                link_native,
            },
        })
    }

    async fn check_callback(
        &self,
        id: UpkeepId,
        values: Vec<Bytes>,
        extra_data: Bytes,
        block: Option<u64>,
    ) -> Result<CheckOutcome, ChainError> {
        let (upkeep_needed, perform_data, reason, gas_used) = self
            .contract
            .check_callback(id, values, extra_data)
            .block(at_block(block))
            .call()
            .await?;

        Ok(CheckOutcome {
            upkeep_needed,
            perform_data,
            failure_reason: UpkeepFailureReason::from(reason),
            gas: GasMetrics {
                gas_used,
                ..GasMetrics::default()
            },
        })
    }

    async fn simulate_perform_upkeep(
        &self,
        id: UpkeepId,
        perform_data: Bytes,
        block: Option<u64>,
    ) -> Result<SimulationOutcome, ChainError> {
        let (success, gas_used) = self
            .contract
            .simulate_perform_upkeep(id, perform_data)
            .block(at_block(block))
            .call()
            .await?;

        Ok(SimulationOutcome { success, gas_used })
    }

    async fn has_dedup_key(&self, work_id: WorkId) -> Result<bool, ChainError> {
        Ok(self.contract.has_dedup_key(work_id.0).call().await?)
    }

    async fn get_upkeep_trigger_config(&self, id: UpkeepId) -> Result<Bytes, ChainError> {
        Ok(self.contract.get_upkeep_trigger_config(id).call().await?)
    }

    async fn get_upkeep_privilege_config(&self, id: UpkeepId) -> Result<Bytes, ChainError> {
        Ok(self.contract.get_upkeep_privilege_config(id).call().await?)
    }

    async fn transaction_status(&self, tx_hash: H256) -> Result<TxStatus, ChainError> {
        let status = match self.client.get_transaction(tx_hash).await? {
            None => TxStatus::NotFound,
            Some(tx) if tx.block_number.is_none() => TxStatus::Pending,
            Some(_) => TxStatus::Mined,
        };
        Ok(status)
    }

    async fn transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        Ok(self.client.get_transaction_receipt(tx_hash).await?)
    }

    async fn block_timestamp(&self, block_hash: H256) -> Result<u64, ChainError> {
        let block = self
            .client
            .get_block(block_hash)
            .await?
            .ok_or_else(|| ChainError::Decode(format!("block {:?} not found", block_hash)))?;
        Ok(block.timestamp.as_u64())
    }
}
