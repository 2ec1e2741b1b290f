use crate::{ParallelSigner, ReceiptHook, SignerError, Submission};
use alloy_primitives::{address, keccak256, Address, Bytes, U256};
use async_trait::async_trait;
use signer_account::{implementations::local::LocalAccount, AccountService};
use signer_config::SignerConfig;
use signer_encoder::{BatchEncoder, EncoderError};
use signer_ledger::{LedgerError, LedgerInterface, LedgerService};
use signer_storage::{implementations::memory::MemoryStore, RequestStore};
use signer_types::{
	BatchCall, PackedTransaction, Request, SecretString, TransactionHash, TransactionReceipt,
	TxFees,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CHAIN_ID: u64 = 31337;
const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const TARGET: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

#[derive(Default)]
struct LedgerState {
	nonce: Mutex<u64>,
	receipts: Mutex<HashMap<TransactionHash, TransactionReceipt>>,
	broadcasts: Mutex<Vec<Vec<u8>>>,
	receipt_probes: AtomicUsize,
	fail_broadcast: AtomicBool,
}

/// Ledger stub with scriptable nonce and receipt state.
#[derive(Clone, Default)]
struct MockLedger {
	state: Arc<LedgerState>,
}

impl MockLedger {
	fn set_nonce(&self, nonce: u64) {
		*self.state.nonce.lock().unwrap() = nonce;
	}

	fn insert_receipt(&self, hash: &TransactionHash, confirmations: u64) {
		self.state.receipts.lock().unwrap().insert(
			hash.clone(),
			TransactionReceipt {
				hash: hash.clone(),
				block_number: 1,
				success: true,
				confirmations,
			},
		);
	}

	fn broadcast_count(&self) -> usize {
		self.state.broadcasts.lock().unwrap().len()
	}

	fn receipt_probes(&self) -> usize {
		self.state.receipt_probes.load(Ordering::SeqCst)
	}

	fn set_fail_broadcast(&self, fail: bool) {
		self.state.fail_broadcast.store(fail, Ordering::SeqCst);
	}
}

#[async_trait]
impl LedgerInterface for MockLedger {
	async fn get_transaction_count(&self, _address: Address) -> Result<u64, LedgerError> {
		Ok(*self.state.nonce.lock().unwrap())
	}

	async fn get_transaction_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, LedgerError> {
		self.state.receipt_probes.fetch_add(1, Ordering::SeqCst);
		Ok(self.state.receipts.lock().unwrap().get(hash).cloned())
	}

	async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TransactionHash, LedgerError> {
		if self.state.fail_broadcast.load(Ordering::SeqCst) {
			return Err(LedgerError::BroadcastRejected("mock broadcast failure".to_string()));
		}
		self.state.broadcasts.lock().unwrap().push(raw.to_vec());
		Ok(TransactionHash(keccak256(raw).to_vec()))
	}
}

struct EncoderState {
	fees: Mutex<TxFees>,
	fail: AtomicBool,
}

/// Encoder stub concatenating request payloads, with scriptable fees.
#[derive(Clone)]
struct MockEncoder {
	state: Arc<EncoderState>,
}

impl Default for MockEncoder {
	fn default() -> Self {
		Self {
			state: Arc::new(EncoderState {
				fees: Mutex::new(TxFees::Eip1559 {
					max_fee_per_gas: 2_000_000_000,
					max_priority_fee_per_gas: 1_000_000_000,
				}),
				fail: AtomicBool::new(false),
			}),
		}
	}
}

impl MockEncoder {
	fn set_fees(&self, fees: TxFees) {
		*self.state.fees.lock().unwrap() = fees;
	}

	fn set_fail(&self, fail: bool) {
		self.state.fail.store(fail, Ordering::SeqCst);
	}
}

#[async_trait]
impl BatchEncoder for MockEncoder {
	async fn encode_batch(&self, requests: &[Request]) -> Result<BatchCall, EncoderError> {
		if self.state.fail.load(Ordering::SeqCst) {
			return Err(EncoderError::EncodingFailed("mock encoder failure".to_string()));
		}
		let mut data = Vec::new();
		for request in requests {
			data.extend_from_slice(&request.function_data);
		}
		Ok(BatchCall {
			to: TARGET,
			data: Bytes::from(data),
			value: U256::ZERO,
			gas_limit: 100_000,
			fees: *self.state.fees.lock().unwrap(),
		})
	}
}

/// Receipt hook recording every invocation, optionally failing.
#[derive(Default)]
struct RecordingHook {
	seen: Mutex<Vec<TransactionHash>>,
	fail: AtomicBool,
}

#[async_trait]
impl ReceiptHook for RecordingHook {
	async fn on_receipt(
		&self,
		receipt: &TransactionReceipt,
	) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
		self.seen.lock().unwrap().push(receipt.hash.clone());
		if self.fail.load(Ordering::SeqCst) {
			return Err("hook failure".into());
		}
		Ok(())
	}
}

struct Harness {
	signer: Arc<ParallelSigner>,
	store: Arc<MemoryStore>,
	ledger: MockLedger,
	encoder: MockEncoder,
}

impl Harness {
	async fn attempts_at(&self, nonce: u64) -> Vec<PackedTransaction> {
		self.store.get_packed_transactions(nonce, CHAIN_ID).await.unwrap()
	}

	async fn request(&self, id: u64) -> Request {
		self.store
			.get_requests(CHAIN_ID, id, 1)
			.await
			.unwrap()
			.into_iter()
			.next()
			.unwrap()
	}
}

async fn harness_with_hook(
	limit: usize,
	delayed_seconds: u64,
	hook: Option<Arc<dyn ReceiptHook>>,
) -> Harness {
	let options = SignerConfig {
		chain_id: CHAIN_ID,
		request_count_limit: limit,
		delayed_seconds,
		check_interval_seconds: 60,
		confirmations: 64,
		timeouts: HashMap::new(),
	};
	let store = Arc::new(MemoryStore::new());
	let account = Arc::new(AccountService::new(Box::new(
		LocalAccount::new(&SecretString::from(DEV_KEY)).unwrap(),
	)));
	let ledger = MockLedger::default();
	let encoder = MockEncoder::default();

	let mut signer = ParallelSigner::new(
		options,
		store.clone() as Arc<dyn RequestStore>,
		account,
		Arc::new(LedgerService::new(Box::new(ledger.clone()))),
		Arc::new(encoder.clone()),
	)
	.await
	.unwrap();
	if let Some(hook) = hook {
		signer = signer.with_receipt_hook(hook);
	}

	Harness {
		signer: Arc::new(signer),
		store,
		ledger,
		encoder,
	}
}

async fn harness(limit: usize, delayed_seconds: u64) -> Harness {
	harness_with_hook(limit, delayed_seconds, None).await
}

fn submission(payload: &[u8], log_id: u64) -> Submission {
	Submission {
		function_data: payload.to_vec(),
		log_id,
	}
}

#[tokio::test]
async fn test_single_submission_creates_one_attempt() {
	let h = harness(3, 0).await;

	let ids = h.signer.send_transactions(vec![submission(b"a", 1)]).await.unwrap();
	assert_eq!(ids, vec![1]);

	let attempts = h.attempts_at(0).await;
	assert_eq!(attempts.len(), 1);
	assert_eq!(attempts[0].request_ids, vec![1]);
	assert_eq!(h.ledger.broadcast_count(), 1);
}

#[tokio::test]
async fn test_empty_submission_is_a_noop() {
	let h = harness(3, 0).await;
	let ids = h.signer.send_transactions(Vec::new()).await.unwrap();
	assert!(ids.is_empty());
	assert!(h.attempts_at(0).await.is_empty());
}

#[tokio::test]
async fn test_batch_limit_bounds_attempt() {
	let h = harness(3, 0).await;

	let submissions = (1..=4).map(|i| submission(b"x", i)).collect();
	let ids = h.signer.send_transactions(submissions).await.unwrap();
	assert_eq!(ids, vec![1, 2, 3, 4]);

	let attempts = h.attempts_at(0).await;
	assert_eq!(attempts.len(), 1);
	assert_eq!(attempts[0].request_ids, vec![1, 2, 3]);

	// The fourth request stays pending.
	assert!(h.request(4).await.tx_id.is_none());
}

#[tokio::test]
async fn test_oversized_queue_is_capped_at_limit() {
	let h = harness(10, 0).await;
	let submissions = (1..=15).map(|i| submission(b"x", i)).collect();
	h.signer.send_transactions(submissions).await.unwrap();

	let attempts = h.attempts_at(0).await;
	assert_eq!(attempts.len(), 1);
	assert_eq!(attempts[0].request_ids, (1..=10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_repack_waits_without_new_data_or_timeout() {
	let h = harness(3, 5).await;
	h.signer.send_transactions(vec![submission(b"a", 1)]).await.unwrap();

	h.signer.repack().await.unwrap();
	assert_eq!(h.attempts_at(0).await.len(), 1);

	// Nothing new arrived and the attempt is fresh: no second attempt.
	h.signer.repack().await.unwrap();
	assert_eq!(h.attempts_at(0).await.len(), 1);
}

#[tokio::test]
async fn test_timeout_repack_is_a_pure_fee_bump() {
	let h = harness(3, 5).await;
	h.signer.send_transactions(vec![submission(b"a", 1)]).await.unwrap();
	h.signer.repack().await.unwrap();

	h.signer.set_timeout(CHAIN_ID, 0);
	tokio::time::sleep(Duration::from_millis(20)).await;
	h.signer.repack().await.unwrap();

	let attempts = h.attempts_at(0).await;
	assert_eq!(attempts.len(), 2);
	assert_eq!(attempts[0].request_ids, attempts[1].request_ids);
	assert_eq!(
		attempts[0].fees,
		TxFees::Eip1559 {
			max_fee_per_gas: 2_000_000_000,
			max_priority_fee_per_gas: 1_000_000_000,
		}
	);
	assert_eq!(
		attempts[1].fees,
		TxFees::Eip1559 {
			max_fee_per_gas: 2_200_000_000,
			max_priority_fee_per_gas: 1_100_000_000,
		}
	);
	assert_ne!(attempts[0].transaction_hash, attempts[1].transaction_hash);
}

#[tokio::test]
async fn test_growing_repack_unions_request_sets() {
	let h = harness(3, 5).await;
	h.signer.send_transactions(vec![submission(b"a", 1)]).await.unwrap();
	h.signer.repack().await.unwrap();

	h.signer.send_transactions(vec![submission(b"b", 2)]).await.unwrap();
	h.signer.repack().await.unwrap();

	let attempts = h.attempts_at(0).await;
	assert_eq!(attempts.len(), 2);
	assert_eq!(attempts[0].request_ids, vec![1]);
	assert_eq!(attempts[1].request_ids, vec![1, 2]);
	// Growing the set still replaces a pending slot, so fees are bumped.
	assert_eq!(
		attempts[1].fees,
		TxFees::Eip1559 {
			max_fee_per_gas: 2_200_000_000,
			max_priority_fee_per_gas: 1_100_000_000,
		}
	);
}

#[tokio::test]
async fn test_resume_point_rederived_after_nonce_advance() {
	let h = harness(10, 5).await;

	h.signer
		.send_transactions(vec![submission(b"a", 1), submission(b"b", 2), submission(b"c", 3)])
		.await
		.unwrap();
	h.signer.repack().await.unwrap();
	let first = h.attempts_at(0).await.remove(0);

	// The first attempt lands; its receipt is visible while the next slot's
	// attempt is still unseen by the ledger.
	h.ledger.insert_receipt(&first.transaction_hash, 1);
	h.ledger.set_nonce(1);
	h.signer
		.send_transactions(vec![submission(b"d", 4), submission(b"e", 5)])
		.await
		.unwrap();
	h.signer.repack().await.unwrap();
	assert_eq!(h.attempts_at(1).await[0].request_ids, vec![4, 5]);

	// The ledger advances past the second attempt without a visible receipt
	// for it. The resume point must come from the attempt that did land,
	// not from assuming the advance confirmed everything.
	h.ledger.set_nonce(2);
	h.signer.send_transactions(vec![submission(b"f", 6)]).await.unwrap();
	h.signer.repack().await.unwrap();

	let attempts = h.attempts_at(2).await;
	assert_eq!(attempts.len(), 1);
	assert_eq!(attempts[0].request_ids, vec![4, 5, 6]);
}

#[tokio::test]
async fn test_floor_fallback_reselects_from_start() {
	let h = harness(3, 5).await;
	h.signer.send_transactions(vec![submission(b"a", 1)]).await.unwrap();
	h.signer.repack().await.unwrap();

	// The slot is consumed on the ledger but no recorded attempt shows a
	// receipt; selection falls back to the first stored request.
	h.ledger.set_nonce(1);
	h.signer.send_transactions(vec![submission(b"b", 2)]).await.unwrap();
	h.signer.repack().await.unwrap();

	let attempts = h.attempts_at(1).await;
	assert_eq!(attempts.len(), 1);
	assert_eq!(attempts[0].request_ids, vec![1, 2]);
}

#[tokio::test]
async fn test_confirmation_finalizes_and_stops_walk() {
	let h = harness(3, 5).await;
	h.signer.send_transactions(vec![submission(b"a", 1)]).await.unwrap();
	h.signer.repack().await.unwrap();
	let first = h.attempts_at(0).await.remove(0);

	h.ledger.insert_receipt(&first.transaction_hash, 1);
	h.ledger.set_nonce(1);
	h.signer.send_transactions(vec![submission(b"b", 2)]).await.unwrap();
	h.signer.repack().await.unwrap();
	let second = h.attempts_at(1).await.remove(0);

	// The newer attempt is deep enough to finalize; the older one is still
	// shallow and must only have its depth recorded.
	h.ledger.set_nonce(2);
	h.ledger.insert_receipt(&second.transaction_hash, 70);
	h.ledger.insert_receipt(&first.transaction_hash, 10);
	h.signer.check_packed_transactions().await.unwrap();

	assert_eq!(h.request(2).await.tx_id, Some(second.transaction_hash));
	assert!(h.request(1).await.tx_id.is_none());
	assert_eq!(h.attempts_at(1).await[0].confirmation, 70);
	assert_eq!(h.attempts_at(0).await[0].confirmation, 10);
}

#[tokio::test]
async fn test_superseded_attempt_found_by_walk() {
	let h = harness(3, 5).await;
	h.signer.send_transactions(vec![submission(b"a", 1)]).await.unwrap();
	h.signer.repack().await.unwrap();
	h.signer.set_timeout(CHAIN_ID, 0);
	tokio::time::sleep(Duration::from_millis(20)).await;
	h.signer.repack().await.unwrap();

	let attempts = h.attempts_at(0).await;
	assert_eq!(attempts.len(), 2);

	// The older, lower-fee attempt is the one that was mined.
	h.ledger.set_nonce(1);
	h.ledger.insert_receipt(&attempts[0].transaction_hash, 70);
	h.signer.check_packed_transactions().await.unwrap();

	assert_eq!(h.request(1).await.tx_id, Some(attempts[0].transaction_hash.clone()));
}

#[tokio::test]
async fn test_bumped_attempt_found_by_slot_recheck() {
	let h = harness(3, 5).await;
	h.signer.send_transactions(vec![submission(b"a", 1)]).await.unwrap();
	h.signer.repack().await.unwrap();
	h.signer.set_timeout(CHAIN_ID, 0);
	tokio::time::sleep(Duration::from_millis(20)).await;
	h.signer.repack().await.unwrap();

	let attempts = h.attempts_at(0).await;
	assert_eq!(attempts.len(), 2);

	// The walk probes one sibling per slot; here the receipt belongs to the
	// other one, which only the full slot recheck can find.
	h.ledger.set_nonce(1);
	h.ledger.insert_receipt(&attempts[1].transaction_hash, 70);
	h.signer.check_packed_transactions().await.unwrap();

	assert_eq!(h.request(1).await.tx_id, Some(attempts[1].transaction_hash.clone()));
	assert_eq!(h.attempts_at(0).await[1].confirmation, 70);
}

#[tokio::test]
async fn test_confirmation_check_before_first_send() {
	let h = harness(3, 5).await;

	// Nonce zero: nothing has ever been mined for this account.
	h.signer.check_packed_transactions().await.unwrap();
	assert_eq!(h.ledger.receipt_probes(), 0);

	// Nonce advanced but no attempt recorded: still nothing to do.
	h.ledger.set_nonce(5);
	h.signer.check_packed_transactions().await.unwrap();
	assert_eq!(h.ledger.receipt_probes(), 0);
}

#[tokio::test]
async fn test_repack_is_a_noop_while_locked() {
	let h = harness(3, 5).await;
	h.signer.send_transactions(vec![submission(b"a", 1)]).await.unwrap();

	let guard = h.signer.repack_lock.lock().await;
	h.signer.repack().await.unwrap();
	drop(guard);

	assert!(h.attempts_at(0).await.is_empty());
	assert_eq!(h.ledger.broadcast_count(), 0);
}

#[tokio::test]
async fn test_inline_repack_errors_do_not_fail_submission() {
	let h = harness(3, 0).await;
	h.encoder.set_fail(true);

	// The submission is durable even though the inline repack failed.
	let ids = h.signer.send_transactions(vec![submission(b"a", 1)]).await.unwrap();
	assert_eq!(ids, vec![1]);
	assert!(h.attempts_at(0).await.is_empty());

	// The next cycle picks the request up.
	h.encoder.set_fail(false);
	h.signer.repack().await.unwrap();
	assert_eq!(h.attempts_at(0).await[0].request_ids, vec![1]);
}

#[tokio::test]
async fn test_broadcast_failure_keeps_attempt_for_retry() {
	let h = harness(3, 5).await;
	h.signer.send_transactions(vec![submission(b"a", 1)]).await.unwrap();

	h.ledger.set_fail_broadcast(true);
	h.signer.repack().await.unwrap();
	assert_eq!(h.attempts_at(0).await.len(), 1);
	assert_eq!(h.ledger.broadcast_count(), 0);

	// The timeout repack retries the slot with escalated fees.
	h.ledger.set_fail_broadcast(false);
	h.signer.set_timeout(CHAIN_ID, 0);
	tokio::time::sleep(Duration::from_millis(20)).await;
	h.signer.repack().await.unwrap();

	let attempts = h.attempts_at(0).await;
	assert_eq!(attempts.len(), 2);
	assert_eq!(h.ledger.broadcast_count(), 1);
	assert_eq!(
		attempts[1].fees,
		TxFees::Eip1559 {
			max_fee_per_gas: 2_200_000_000,
			max_priority_fee_per_gas: 1_100_000_000,
		}
	);
}

#[tokio::test]
async fn test_fee_scheme_change_is_rejected() {
	let h = harness(3, 5).await;
	h.signer.send_transactions(vec![submission(b"a", 1)]).await.unwrap();
	h.signer.repack().await.unwrap();

	h.encoder.set_fees(TxFees::Legacy { gas_price: 1_000_000_000 });
	h.signer.set_timeout(CHAIN_ID, 0);
	tokio::time::sleep(Duration::from_millis(20)).await;

	let result = h.signer.repack().await;
	assert!(matches!(result, Err(SignerError::FeeSchemeMismatch { .. })));
	assert_eq!(h.attempts_at(0).await.len(), 1);
}

#[tokio::test]
async fn test_receipt_hook_is_invoked_and_failures_swallowed() {
	let hook = Arc::new(RecordingHook::default());
	let h = harness_with_hook(3, 5, Some(hook.clone() as Arc<dyn ReceiptHook>)).await;

	h.signer.send_transactions(vec![submission(b"a", 1)]).await.unwrap();
	h.signer.repack().await.unwrap();
	let attempt = h.attempts_at(0).await.remove(0);

	hook.fail.store(true, Ordering::SeqCst);
	h.ledger.set_nonce(1);
	h.ledger.insert_receipt(&attempt.transaction_hash, 70);
	h.signer.check_packed_transactions().await.unwrap();

	// The hook saw the receipt; its failure did not block finalization.
	assert_eq!(hook.seen.lock().unwrap().as_slice(), &[attempt.transaction_hash.clone()]);
	assert_eq!(h.request(1).await.tx_id, Some(attempt.transaction_hash));
}

#[tokio::test]
async fn test_missing_chain_id_rejected_at_construction() {
	let options = SignerConfig {
		chain_id: 0,
		request_count_limit: 3,
		delayed_seconds: 0,
		check_interval_seconds: 60,
		confirmations: 64,
		timeouts: HashMap::new(),
	};
	let store = Arc::new(MemoryStore::new());
	let account = Arc::new(AccountService::new(Box::new(
		LocalAccount::new(&SecretString::from(DEV_KEY)).unwrap(),
	)));
	let result = ParallelSigner::new(
		options,
		store as Arc<dyn RequestStore>,
		account,
		Arc::new(LedgerService::new(Box::new(MockLedger::default()))),
		Arc::new(MockEncoder::default()),
	)
	.await;
	assert!(matches!(result, Err(SignerError::MissingChainId)));
}
