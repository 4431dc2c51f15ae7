use async_trait::async_trait;
use automation_common::crypto::upkeep_work_id;
use automation_common::trigger::pack_log_trigger_config;
use automation_common::{
    ChainError, ChainReader, CheckOutcome, LogTrigger, LogTriggerConfig, SimulationOutcome,
    Trigger, TxStatus, UpkeepFailureReason, UpkeepId, UpkeepInfo, WorkId,
    UPKEEP_ACTIVE_MAX_VALID_BLOCK,
};
use automation_debugger::{
    DebugError, DebugRequest, EligibilityPipeline, Finding, Ineligibility, Report, Verdict,
};
use automation_streams::request::{BLOCK_NUMBER, FEED_IDS, FEED_ID_HEX, TIMESTAMP};
use automation_streams::{
    Credentials, HttpResponse, RetryConfig, StreamsClient, StreamsLookupRequest, StreamsTransport,
    TransportError,
};
use ethers::types::{Address, Bytes, Log, TransactionReceipt, H256, U256, U64};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const LATEST_BLOCK: u64 = 1_000;
const LOG_BLOCK: u64 = 500;
const FEED_A: &str = "0x000200000000000000000000000000000000000000000000000000000000000a";
const FEED_B: &str = "0x000200000000000000000000000000000000000000000000000000000000000b";

fn upkeep_id() -> UpkeepId {
    U256::from(77u64)
}

fn tx_hash() -> H256 {
    H256::repeat_byte(0x11)
}

fn block_hash() -> H256 {
    H256::repeat_byte(0x22)
}

fn emitter() -> Address {
    Address::repeat_byte(0x33)
}

fn topic0() -> H256 {
    H256::repeat_byte(0xaa)
}

fn topic1() -> H256 {
    H256::repeat_byte(0xbb)
}

fn chain_log(index: u64, topics: Vec<H256>) -> Log {
    Log {
        address: emitter(),
        topics,
        data: Bytes::from(vec![1, 2, 3]),
        block_hash: Some(block_hash()),
        block_number: Some(U64::from(LOG_BLOCK)),
        transaction_hash: Some(tx_hash()),
        transaction_index: Some(U64::zero()),
        log_index: Some(U256::from(index)),
        ..Default::default()
    }
}

fn receipt() -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: tx_hash(),
        block_hash: Some(block_hash()),
        block_number: Some(U64::from(LOG_BLOCK)),
        logs: vec![
            chain_log(1, vec![H256::repeat_byte(0x99)]),
            chain_log(2, vec![topic0(), topic1()]),
        ],
        ..Default::default()
    }
}

fn trigger_config(filter_selector: u8, topic1: H256) -> Bytes {
    trigger_config_for(emitter(), filter_selector, topic1)
}

fn trigger_config_for(contract_address: Address, filter_selector: u8, topic1: H256) -> Bytes {
    pack_log_trigger_config(&LogTriggerConfig {
        contract_address,
        filter_selector,
        topic0: topic0(),
        topic1,
        ..Default::default()
    })
}

fn active_upkeep() -> UpkeepInfo {
    UpkeepInfo {
        target: Address::repeat_byte(0x44),
        perform_gas: 500_000,
        balance: U256::from(10_000u64),
        admin: Address::repeat_byte(0x55),
        max_valid_blocknumber: UPKEEP_ACTIVE_MAX_VALID_BLOCK,
        ..Default::default()
    }
}

fn needed(perform_data: &[u8]) -> CheckOutcome {
    CheckOutcome {
        upkeep_needed: true,
        perform_data: Bytes::from(perform_data.to_vec()),
        ..Default::default()
    }
}

fn streams_revert(feed_param_key: &str, feeds: &[&str], time_param_key: &str) -> CheckOutcome {
    let lookup = StreamsLookupRequest {
        feed_param_key: feed_param_key.into(),
        feeds: feeds.iter().map(|f| f.to_string()).collect(),
        time_param_key: time_param_key.into(),
        time: U256::from(1_700_000_000u64),
        extra_data: Bytes::from(vec![0xee]),
        upkeep_id: upkeep_id(),
        block: LATEST_BLOCK,
    };
    CheckOutcome {
        upkeep_needed: false,
        perform_data: lookup.encode_revert_data(),
        failure_reason: UpkeepFailureReason::TargetCheckReverted,
        ..Default::default()
    }
}

struct FakeChain {
    trigger_type: u8,
    type_and_version: String,
    upkeep: UpkeepInfo,
    min_balance: U256,
    check: CheckOutcome,
    callback: CheckOutcome,
    simulation: SimulationOutcome,
    dedup: bool,
    trigger_config: Bytes,
    privilege_config: Bytes,
    tx_status: TxStatus,
    receipt: Option<TransactionReceipt>,
    check_fails: bool,
    calls: Mutex<Vec<&'static str>>,
    upkeep_blocks: Mutex<Vec<Option<u64>>>,
    check_args: Mutex<Vec<(Bytes, Option<u64>)>>,
    callback_args: Mutex<Vec<(Vec<Bytes>, Bytes)>>,
    simulate_args: Mutex<Vec<Bytes>>,
    dedup_args: Mutex<Vec<WorkId>>,
}

impl FakeChain {
    fn conditional() -> Self {
        Self {
            trigger_type: 0,
            type_and_version: "AutomationRegistry 2.1.0".into(),
            upkeep: active_upkeep(),
            min_balance: U256::from(1_000u64),
            check: needed(b"perform"),
            callback: CheckOutcome::default(),
            simulation: SimulationOutcome {
                success: true,
                gas_used: U256::from(100_000u64),
            },
            dedup: false,
            trigger_config: Bytes::default(),
            privilege_config: Bytes::default(),
            tx_status: TxStatus::Mined,
            receipt: None,
            check_fails: false,
            calls: Mutex::new(Vec::new()),
            upkeep_blocks: Mutex::new(Vec::new()),
            check_args: Mutex::new(Vec::new()),
            callback_args: Mutex::new(Vec::new()),
            simulate_args: Mutex::new(Vec::new()),
            dedup_args: Mutex::new(Vec::new()),
        }
    }

    fn log() -> Self {
        Self {
            trigger_type: 1,
            trigger_config: trigger_config(0b001, topic1()),
            receipt: Some(receipt()),
            ..Self::conditional()
        }
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(1)
    }

    async fn latest_block_number(&self) -> Result<u64, ChainError> {
        self.record("latest_block_number");
        Ok(LATEST_BLOCK)
    }

    async fn type_and_version(&self) -> Result<String, ChainError> {
        Ok(self.type_and_version.clone())
    }

    async fn get_upkeep(&self, _id: UpkeepId, block: Option<u64>) -> Result<UpkeepInfo, ChainError> {
        self.record("get_upkeep");
        self.upkeep_blocks.lock().unwrap().push(block);
        Ok(self.upkeep.clone())
    }

    async fn get_min_balance(&self, _id: UpkeepId, _block: Option<u64>) -> Result<U256, ChainError> {
        self.record("get_min_balance");
        Ok(self.min_balance)
    }

    async fn get_trigger_type(&self, _id: UpkeepId) -> Result<u8, ChainError> {
        self.record("get_trigger_type");
        Ok(self.trigger_type)
    }

    async fn check_upkeep(
        &self,
        _id: UpkeepId,
        trigger_data: Bytes,
        block: Option<u64>,
    ) -> Result<CheckOutcome, ChainError> {
        self.record("check_upkeep");
        self.check_args.lock().unwrap().push((trigger_data, block));
        if self.check_fails {
            return Err(ChainError::Transport("connection reset".into()));
        }
        Ok(self.check.clone())
    }

    async fn check_callback(
        &self,
        _id: UpkeepId,
        values: Vec<Bytes>,
        extra_data: Bytes,
        _block: Option<u64>,
    ) -> Result<CheckOutcome, ChainError> {
        self.record("check_callback");
        self.callback_args.lock().unwrap().push((values, extra_data));
        Ok(self.callback.clone())
    }

    async fn simulate_perform_upkeep(
        &self,
        _id: UpkeepId,
        perform_data: Bytes,
        _block: Option<u64>,
    ) -> Result<SimulationOutcome, ChainError> {
        self.record("simulate_perform_upkeep");
        self.simulate_args.lock().unwrap().push(perform_data);
        Ok(self.simulation)
    }

    async fn has_dedup_key(&self, work_id: WorkId) -> Result<bool, ChainError> {
        self.record("has_dedup_key");
        self.dedup_args.lock().unwrap().push(work_id);
        Ok(self.dedup)
    }

    async fn get_upkeep_trigger_config(&self, _id: UpkeepId) -> Result<Bytes, ChainError> {
        self.record("get_upkeep_trigger_config");
        Ok(self.trigger_config.clone())
    }

    async fn get_upkeep_privilege_config(&self, _id: UpkeepId) -> Result<Bytes, ChainError> {
        self.record("get_upkeep_privilege_config");
        Ok(self.privilege_config.clone())
    }

    async fn transaction_status(&self, _tx_hash: H256) -> Result<TxStatus, ChainError> {
        self.record("transaction_status");
        Ok(self.tx_status)
    }

    async fn transaction_receipt(
        &self,
        _tx_hash: H256,
    ) -> Result<Option<TransactionReceipt>, ChainError> {
        self.record("transaction_receipt");
        Ok(self.receipt.clone())
    }

    async fn block_timestamp(&self, _block_hash: H256) -> Result<u64, ChainError> {
        self.record("block_timestamp");
        Ok(1_700_000_000)
    }
}

type Responder = Box<dyn Fn(&str) -> HttpResponse + Send + Sync>;

struct FakeTransport {
    respond: Responder,
    urls: Mutex<Vec<String>>,
}

impl FakeTransport {
    fn new(respond: impl Fn(&str) -> HttpResponse + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            urls: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.urls.lock().unwrap().len()
    }
}

#[async_trait]
impl StreamsTransport for FakeTransport {
    async fn get(
        &self,
        url: &str,
        _headers: &[(&'static str, String)],
    ) -> Result<HttpResponse, TransportError> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok((self.respond)(url))
    }
}

fn ok_json(value: serde_json::Value) -> HttpResponse {
    HttpResponse {
        status: 200,
        body: value.to_string().into_bytes(),
    }
}

fn bulk_response(_url: &str) -> HttpResponse {
    ok_json(json!({
        "reports": [
            { "feedID": FEED_B, "validFromTimestamp": 1, "observationsTimestamp": 1, "fullReport": "0x0b0b" },
            { "feedID": FEED_A, "validFromTimestamp": 1, "observationsTimestamp": 1, "fullReport": "0x0a0a" },
        ]
    }))
}

fn legacy_response(url: &str) -> HttpResponse {
    let blob = if url.contains(FEED_A) { "0x0a0a" } else { "0x0b0b" };
    ok_json(json!({ "chainlinkBlob": blob }))
}

fn streams_client(transport: Arc<FakeTransport>) -> StreamsClient {
    StreamsClient::new(
        Credentials {
            client_id: "client".into(),
            secret: "secret".into(),
            legacy_url: "https://legacy.streams.test".into(),
            url: "https://streams.test".into(),
        },
        transport,
        RetryConfig {
            max_attempts: 3,
            delay: Duration::from_millis(5),
        },
    )
}

fn conditional_request() -> DebugRequest {
    DebugRequest {
        upkeep_id: upkeep_id(),
        ..Default::default()
    }
}

fn log_request() -> DebugRequest {
    DebugRequest {
        upkeep_id: upkeep_id(),
        tx_hash: Some(tx_hash()),
        log_index: Some(2),
        ..Default::default()
    }
}

async fn run(chain: &FakeChain, streams: Option<&StreamsClient>, request: &DebugRequest) -> Report {
    EligibilityPipeline::new(chain, streams)
        .run(&CancellationToken::new(), request)
        .await
}

fn assert_ineligible(report: &Report, expected: Ineligibility) {
    match &report.verdict {
        Verdict::Ineligible(reason) => assert_eq!(reason, &expected),
        other => panic!("expected ineligible {:?}, got {:?}", expected, other),
    }
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn conditional_upkeep_eligible_at_latest_block() {
    let chain = FakeChain::conditional();
    let report = run(&chain, None, &conditional_request()).await;

    assert!(report.verdict.is_eligible(), "{:?}", report.verdict);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(
        chain.check_args.lock().unwrap().clone(),
        vec![(Bytes::default(), Some(LATEST_BLOCK))]
    );
    assert_eq!(
        chain.simulate_args.lock().unwrap().clone(),
        vec![Bytes::from(b"perform".to_vec())]
    );
    assert!(report
        .findings
        .iter()
        .any(|f| matches!(f, Finding::Link { label, .. } if label == "upkeep")));
}

#[tokio::test]
async fn conditional_upkeep_uses_explicit_block() {
    let chain = FakeChain::conditional();
    let request = DebugRequest {
        block: Some(123),
        ..conditional_request()
    };
    let report = run(&chain, None, &request).await;

    assert!(report.verdict.is_eligible());
    assert_eq!(chain.count("latest_block_number"), 0);
    assert_eq!(chain.check_args.lock().unwrap()[0].1, Some(123));
}

#[tokio::test]
async fn conditional_not_needed_makes_no_lookups() {
    let chain = FakeChain {
        check: CheckOutcome::default(),
        ..FakeChain::conditional()
    };
    let transport = FakeTransport::new(bulk_response);
    let client = streams_client(transport.clone());

    let report = run(&chain, Some(&client), &conditional_request()).await;

    assert_ineligible(&report, Ineligibility::NotNeeded);
    assert_eq!(transport.request_count(), 0);
    assert_eq!(chain.count("check_callback"), 0);
    assert_eq!(chain.count("simulate_perform_upkeep"), 0);
}

#[tokio::test]
async fn paused_upkeep_stops_before_check() {
    let chain = FakeChain {
        upkeep: UpkeepInfo {
            paused: true,
            ..active_upkeep()
        },
        ..FakeChain::conditional()
    };
    let report = run(&chain, None, &conditional_request()).await;

    assert_ineligible(&report, Ineligibility::Paused);
    assert_eq!(chain.count("check_upkeep"), 0);
}

#[tokio::test]
async fn cancelled_upkeep_is_ineligible() {
    let chain = FakeChain {
        upkeep: UpkeepInfo {
            max_valid_blocknumber: 900,
            ..active_upkeep()
        },
        ..FakeChain::conditional()
    };
    let report = run(&chain, None, &conditional_request()).await;

    assert_ineligible(&report, Ineligibility::Cancelled);
}

#[tokio::test]
async fn unknown_upkeep_does_not_exist() {
    let chain = FakeChain {
        upkeep: UpkeepInfo::default(),
        ..FakeChain::conditional()
    };
    let report = run(&chain, None, &conditional_request()).await;

    assert_ineligible(&report, Ineligibility::DoesNotExist);
    assert_eq!(chain.count("get_min_balance"), 0);
}

#[tokio::test]
async fn underfunded_upkeep_is_ineligible() {
    let chain = FakeChain {
        min_balance: U256::from(20_000u64),
        ..FakeChain::conditional()
    };
    let report = run(&chain, None, &conditional_request()).await;

    assert_ineligible(
        &report,
        Ineligibility::InsufficientBalance {
            balance: U256::from(10_000u64),
            min_balance: U256::from(20_000u64),
        },
    );
}

#[tokio::test]
async fn low_balance_is_a_warning_only() {
    let chain = FakeChain {
        min_balance: U256::from(9_800u64),
        ..FakeChain::conditional()
    };
    let report = run(&chain, None, &conditional_request()).await;

    assert!(report.verdict.is_eligible());
    assert!(report
        .findings
        .iter()
        .any(|f| matches!(f, Finding::Warning(w) if w.contains("less than 5%"))));
}

#[tokio::test]
async fn non_registry_contract_is_a_config_error() {
    let chain = FakeChain {
        type_and_version: "LinkToken 1.0.0".into(),
        ..FakeChain::conditional()
    };
    let report = run(&chain, None, &conditional_request()).await;

    assert!(matches!(
        report.verdict,
        Verdict::Unknown {
            error: DebugError::Config(_),
            retryable: false
        }
    ));
    assert_eq!(report.exit_code(), 1);
    assert_eq!(chain.count("get_trigger_type"), 0);
}

#[tokio::test]
async fn transport_failure_is_unknown_and_retryable() {
    let chain = FakeChain {
        check_fails: true,
        ..FakeChain::conditional()
    };
    let report = run(&chain, None, &conditional_request()).await;

    match &report.verdict {
        Verdict::Unknown { error, retryable } => {
            assert!(matches!(error, DebugError::Chain(ChainError::Transport(_))));
            assert!(*retryable);
        }
        other => panic!("unexpected verdict {:?}", other),
    }
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn simulation_failure_reports_low_perform_gas() {
    let chain = FakeChain {
        simulation: SimulationOutcome {
            success: false,
            gas_used: U256::from(600_000u64),
        },
        ..FakeChain::conditional()
    };
    let report = run(&chain, None, &conditional_request()).await;

    assert_ineligible(
        &report,
        Ineligibility::PerformGasTooLow {
            perform_gas: 500_000,
            gas_used: U256::from(600_000u64),
        },
    );
}

#[tokio::test]
async fn simulation_failure_within_gas_limit_is_generic() {
    let chain = FakeChain {
        simulation: SimulationOutcome {
            success: false,
            gas_used: U256::from(90_000u64),
        },
        ..FakeChain::conditional()
    };
    let report = run(&chain, None, &conditional_request()).await;

    assert_ineligible(&report, Ineligibility::SimulationFailed);
}

#[tokio::test]
async fn cancelled_before_start_is_unknown() {
    let chain = FakeChain::conditional();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = EligibilityPipeline::new(&chain, None)
        .run(&cancel, &conditional_request())
        .await;

    assert!(matches!(
        report.verdict,
        Verdict::Unknown {
            error: DebugError::Cancelled,
            retryable: false
        }
    ));
    assert!(chain.calls().is_empty());
}

#[tokio::test]
async fn log_upkeep_eligible() {
    let chain = FakeChain::log();
    let report = run(&chain, None, &log_request()).await;

    assert!(report.verdict.is_eligible(), "{:?}", report.verdict);

    let expected_work_id = upkeep_work_id(
        upkeep_id(),
        &Trigger::Log(LogTrigger {
            tx_hash: tx_hash(),
            log_index: 2,
            block_number: LOG_BLOCK,
            block_hash: block_hash(),
        }),
    );
    assert_eq!(chain.dedup_args.lock().unwrap().clone(), vec![expected_work_id]);

    let check_args = chain.check_args.lock().unwrap().clone();
    assert_eq!(check_args.len(), 1);
    assert!(!check_args[0].0.is_empty());
    assert_eq!(check_args[0].1, Some(LOG_BLOCK));
    assert_eq!(chain.upkeep_blocks.lock().unwrap().clone(), vec![Some(LOG_BLOCK)]);

    assert!(report
        .messages()
        .any(|m| m == format!("workID computed: {}", expected_work_id)));
}

#[tokio::test]
async fn log_upkeep_already_performed_stops_after_dedup() {
    let chain = FakeChain {
        dedup: true,
        ..FakeChain::log()
    };
    let transport = FakeTransport::new(bulk_response);
    let client = streams_client(transport.clone());

    let report = run(&chain, Some(&client), &log_request()).await;

    assert_ineligible(&report, Ineligibility::AlreadyPerformed);
    assert_eq!(chain.calls().last(), Some(&"has_dedup_key"));
    assert_eq!(chain.count("check_upkeep"), 0);
    assert_eq!(chain.count("simulate_perform_upkeep"), 0);
    assert_eq!(transport.request_count(), 0);
    assert!(report.messages().any(|m| m.starts_with("workID computed")));
}

#[tokio::test]
async fn log_upkeep_requires_tx_hash() {
    let chain = FakeChain::log();
    let request = DebugRequest {
        tx_hash: None,
        ..log_request()
    };
    let report = run(&chain, None, &request).await;

    assert!(matches!(
        report.verdict,
        Verdict::Unknown {
            error: DebugError::InvalidInput(_),
            retryable: false
        }
    ));
    assert_eq!(chain.count("transaction_status"), 0);
}

#[tokio::test]
async fn log_upkeep_requires_log_index() {
    let chain = FakeChain::log();
    let request = DebugRequest {
        log_index: None,
        ..log_request()
    };
    let report = run(&chain, None, &request).await;

    assert!(matches!(
        report.verdict.error(),
        Some(DebugError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn pending_transaction_is_ineligible() {
    let chain = FakeChain {
        tx_status: TxStatus::Pending,
        ..FakeChain::log()
    };
    let report = run(&chain, None, &log_request()).await;

    assert_ineligible(&report, Ineligibility::TxPending);
    assert_eq!(chain.count("transaction_receipt"), 0);
}

#[tokio::test]
async fn missing_transaction_is_ineligible() {
    let chain = FakeChain {
        tx_status: TxStatus::NotFound,
        ..FakeChain::log()
    };
    let report = run(&chain, None, &log_request()).await;

    assert_ineligible(&report, Ineligibility::TxNotFound);
}

#[tokio::test]
async fn absent_log_index_is_ineligible() {
    let chain = FakeChain::log();
    let request = DebugRequest {
        log_index: Some(9),
        ..log_request()
    };
    let report = run(&chain, None, &request).await;

    assert_ineligible(&report, Ineligibility::LogNotFound { log_index: 9 });
    assert_eq!(chain.count("has_dedup_key"), 0);
}

#[tokio::test]
async fn log_not_matching_filter_is_ineligible() {
    let chain = FakeChain {
        trigger_config: trigger_config(0b001, H256::repeat_byte(0xcc)),
        ..FakeChain::log()
    };
    let report = run(&chain, None, &log_request()).await;

    assert_ineligible(&report, Ineligibility::LogDoesNotMatchFilter);
    assert_eq!(chain.count("check_upkeep"), 0);
}

#[tokio::test]
async fn log_from_other_contract_is_ineligible() {
    let chain = FakeChain {
        trigger_config: trigger_config_for(Address::repeat_byte(0x77), 0b001, topic1()),
        ..FakeChain::log()
    };
    let report = run(&chain, None, &log_request()).await;

    assert_ineligible(
        &report,
        Ineligibility::LogContractMismatch {
            expected: Address::repeat_byte(0x77),
            actual: emitter(),
        },
    );
    assert_eq!(chain.count("block_timestamp"), 0);
    assert_eq!(chain.count("check_upkeep"), 0);
}

#[tokio::test]
async fn invalid_filter_selector_is_ineligible() {
    let chain = FakeChain {
        trigger_config: trigger_config(9, topic1()),
        ..FakeChain::log()
    };
    let report = run(&chain, None, &log_request()).await;

    assert_ineligible(&report, Ineligibility::InvalidFilterSelector(9));
    assert_eq!(chain.count("check_upkeep"), 0);
}

#[tokio::test]
async fn bulk_lookup_feeds_callback_and_simulation() {
    let chain = FakeChain {
        check: streams_revert(FEED_IDS, &[FEED_A, FEED_B], TIMESTAMP),
        callback: needed(b"from-callback"),
        ..FakeChain::conditional()
    };
    let transport = FakeTransport::new(bulk_response);
    let client = streams_client(transport.clone());

    let report = run(&chain, Some(&client), &conditional_request()).await;

    assert!(report.verdict.is_eligible(), "{:?}", report.verdict);
    assert_eq!(transport.request_count(), 1);
    assert_eq!(chain.count("get_upkeep_privilege_config"), 0);
    assert_eq!(
        chain.callback_args.lock().unwrap().clone(),
        vec![(
            vec![Bytes::from(vec![0x0a, 0x0a]), Bytes::from(vec![0x0b, 0x0b])],
            Bytes::from(vec![0xee])
        )]
    );
    assert_eq!(
        chain.simulate_args.lock().unwrap().clone(),
        vec![Bytes::from(b"from-callback".to_vec())]
    );
}

#[tokio::test]
async fn callback_not_needed_is_ineligible() {
    let chain = FakeChain {
        check: streams_revert(FEED_IDS, &[FEED_A, FEED_B], TIMESTAMP),
        callback: CheckOutcome::default(),
        ..FakeChain::conditional()
    };
    let client = streams_client(FakeTransport::new(bulk_response));

    let report = run(&chain, Some(&client), &conditional_request()).await;

    assert_ineligible(&report, Ineligibility::NotNeeded);
    assert_eq!(chain.count("simulate_perform_upkeep"), 0);
}

#[tokio::test]
async fn legacy_lookup_requires_privilege() {
    let chain = FakeChain {
        check: streams_revert(FEED_ID_HEX, &[FEED_A, FEED_B], BLOCK_NUMBER),
        ..FakeChain::conditional()
    };
    let transport = FakeTransport::new(legacy_response);
    let client = streams_client(transport.clone());

    let report = run(&chain, Some(&client), &conditional_request()).await;

    assert_ineligible(&report, Ineligibility::StreamsAccessNotAllowed);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn legacy_lookup_with_privilege_fetches_per_feed() {
    let chain = FakeChain {
        check: streams_revert(FEED_ID_HEX, &[FEED_A, FEED_B], BLOCK_NUMBER),
        callback: needed(b"legacy"),
        privilege_config: Bytes::from(br#"{"mercuryEnabled":true}"#.to_vec()),
        ..FakeChain::conditional()
    };
    let transport = FakeTransport::new(legacy_response);
    let client = streams_client(transport.clone());

    let report = run(&chain, Some(&client), &conditional_request()).await;

    assert!(report.verdict.is_eligible(), "{:?}", report.verdict);
    assert_eq!(transport.request_count(), 2);
    assert_eq!(
        chain.callback_args.lock().unwrap()[0].0,
        vec![Bytes::from(vec![0x0a, 0x0a]), Bytes::from(vec![0x0b, 0x0b])]
    );
}

#[tokio::test]
async fn malformed_privilege_config_is_unknown() {
    let chain = FakeChain {
        check: streams_revert(FEED_ID_HEX, &[FEED_A], BLOCK_NUMBER),
        privilege_config: Bytes::from(b"not json".to_vec()),
        ..FakeChain::conditional()
    };
    let client = streams_client(FakeTransport::new(legacy_response));

    let report = run(&chain, Some(&client), &conditional_request()).await;

    assert!(matches!(
        report.verdict,
        Verdict::Unknown {
            error: DebugError::Decode { .. },
            retryable: false
        }
    ));
}

#[tokio::test]
async fn unknown_lookup_keys_are_ineligible() {
    let chain = FakeChain {
        check: streams_revert("feedIds", &[FEED_A], TIMESTAMP),
        ..FakeChain::conditional()
    };
    let transport = FakeTransport::new(bulk_response);
    let client = streams_client(transport.clone());

    let report = run(&chain, Some(&client), &conditional_request()).await;

    assert_ineligible(
        &report,
        Ineligibility::InvalidLookupKeys {
            feed_param_key: "feedIds".into(),
            time_param_key: TIMESTAMP.into(),
        },
    );
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn empty_feed_list_is_invalid_revert_data() {
    let chain = FakeChain {
        check: streams_revert(FEED_IDS, &[], TIMESTAMP),
        ..FakeChain::conditional()
    };
    let transport = FakeTransport::new(bulk_response);
    let client = streams_client(transport.clone());

    let report = run(&chain, Some(&client), &conditional_request()).await;

    assert!(matches!(
        report.verdict.ineligibility(),
        Some(Ineligibility::InvalidRevertData(_))
    ));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn plain_revert_is_not_needed() {
    let chain = FakeChain {
        check: CheckOutcome {
            perform_data: Bytes::from(vec![0x08, 0xc3, 0x79, 0xa0]),
            failure_reason: UpkeepFailureReason::TargetCheckReverted,
            ..Default::default()
        },
        ..FakeChain::conditional()
    };
    let transport = FakeTransport::new(bulk_response);
    let client = streams_client(transport.clone());

    let report = run(&chain, Some(&client), &conditional_request()).await;

    assert_ineligible(&report, Ineligibility::NotNeeded);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn lookup_without_credentials_is_a_config_error() {
    let chain = FakeChain {
        check: streams_revert(FEED_IDS, &[FEED_A], TIMESTAMP),
        ..FakeChain::conditional()
    };
    let report = run(&chain, None, &conditional_request()).await;

    assert!(matches!(
        report.verdict.error(),
        Some(DebugError::Config(_))
    ));
    assert_eq!(chain.count("check_callback"), 0);
}

#[tokio::test]
async fn exhausted_lookup_is_unknown_and_retryable() {
    let chain = FakeChain {
        check: streams_revert(FEED_IDS, &[FEED_A, FEED_B], TIMESTAMP),
        ..FakeChain::conditional()
    };
    let transport = FakeTransport::new(|_| HttpResponse {
        status: 500,
        body: Vec::new(),
    });
    let client = streams_client(transport.clone());

    let report = run(&chain, Some(&client), &conditional_request()).await;

    match &report.verdict {
        Verdict::Unknown { error, retryable } => {
            assert!(matches!(error, DebugError::Streams(_)));
            assert!(*retryable);
        }
        other => panic!("unexpected verdict {:?}", other),
    }
    assert_eq!(transport.request_count(), 3);
    assert_eq!(chain.count("check_callback"), 0);
}

#[tokio::test]
async fn rejected_lookup_is_unknown_and_final() {
    let chain = FakeChain {
        check: streams_revert(FEED_IDS, &[FEED_A], TIMESTAMP),
        ..FakeChain::conditional()
    };
    let transport = FakeTransport::new(|_| HttpResponse {
        status: 401,
        body: Vec::new(),
    });
    let client = streams_client(transport.clone());

    let report = run(&chain, Some(&client), &conditional_request()).await;

    assert!(matches!(
        report.verdict,
        Verdict::Unknown {
            error: DebugError::Streams(_),
            retryable: false
        }
    ));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn unknown_lookup_keys_without_credentials_are_ineligible() {
    let chain = FakeChain {
        check: streams_revert("feedIds", &[FEED_A], TIMESTAMP),
        ..FakeChain::conditional()
    };
    let report = run(&chain, None, &conditional_request()).await;

    assert_ineligible(
        &report,
        Ineligibility::InvalidLookupKeys {
            feed_param_key: "feedIds".into(),
            time_param_key: TIMESTAMP.into(),
        },
    );
}

#[tokio::test]
async fn legacy_lookup_without_privilege_or_credentials_is_not_allowed() {
    let chain = FakeChain {
        check: streams_revert(FEED_ID_HEX, &[FEED_A], BLOCK_NUMBER),
        ..FakeChain::conditional()
    };
    let report = run(&chain, None, &conditional_request()).await;

    assert_ineligible(&report, Ineligibility::StreamsAccessNotAllowed);
    assert_eq!(chain.count("get_upkeep_privilege_config"), 1);
}

#[tokio::test]
async fn privileged_legacy_lookup_without_credentials_is_a_config_error() {
    let chain = FakeChain {
        check: streams_revert(FEED_ID_HEX, &[FEED_A], BLOCK_NUMBER),
        privilege_config: Bytes::from(br#"{"mercuryEnabled":true}"#.to_vec()),
        ..FakeChain::conditional()
    };
    let report = run(&chain, None, &conditional_request()).await;

    assert!(matches!(
        report.verdict.error(),
        Some(DebugError::Config(_))
    ));
    assert_eq!(chain.count("check_callback"), 0);
}
