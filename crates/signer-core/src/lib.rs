//! Core packing engine for the parallel signer system.
//!
//! This module turns a stream of durably stored requests into batched,
//! nonce-managed transaction attempts, and reconciles ledger confirmations
//! back onto the originating requests. The engine holds no persistent state
//! of its own; the request store is the single source of truth, and the
//! ledger is consumed as an opaque, eventually-consistent oracle.
//!
//! Operation is driven by two periodic cycles: a repack cycle that selects
//! and submits the next attempt (growing a pending batch, or fee-bumping a
//! stalled one), and a confirmation cycle that walks attempt history against
//! ledger receipts and finalizes requests once the configured depth is
//! reached.

use alloy_primitives::Address;
use async_trait::async_trait;
use signer_account::{AccountError, AccountService};
use signer_config::SignerConfig;
use signer_encoder::{BatchEncoder, EncoderError};
use signer_ledger::{LedgerError, LedgerService};
use signer_storage::{RequestStore, StorageError};
use signer_types::{NewRequest, TransactionReceipt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

mod assemble;
mod batch;
mod confirm;
mod fees;

#[cfg(test)]
mod tests;

/// Repack timeout applied to chains without an explicit configuration entry.
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Errors that can occur while packing and reconciling transactions.
#[derive(Debug, Error)]
pub enum SignerError {
	/// Error from the request store.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	/// Error from the signing account.
	#[error("Account error: {0}")]
	Account(#[from] AccountError),
	/// Error from the ledger.
	#[error("Ledger error: {0}")]
	Ledger(#[from] LedgerError),
	/// Error from the batch encoder.
	#[error("Encoder error: {0}")]
	Encoder(#[from] EncoderError),
	/// The proposed fees use a different scheme than the prior attempt at
	/// the same nonce slot. Attempts at one slot must stick to one scheme.
	#[error("Fee scheme changed from {previous} to {proposed} at the same nonce slot")]
	FeeSchemeMismatch {
		/// Scheme of the prior attempt.
		previous: &'static str,
		/// Scheme proposed by the encoder.
		proposed: &'static str,
	},
	/// A request reached assembly without a store-assigned id. This is a
	/// contract violation by the store, not a retryable condition.
	#[error("Request id has not been assigned by the store")]
	UnassignedRequestId,
	/// The signer was constructed without a usable chain id.
	#[error("Chain id is required and must be non-zero")]
	MissingChainId,
}

/// One logical operation submitted for batching.
#[derive(Debug, Clone)]
pub struct Submission {
	/// Opaque payload consumed by the batch encoder.
	pub function_data: Vec<u8>,
	/// Caller correlation token.
	pub log_id: u64,
}

/// Optional callback invoked for every receipt observed while reconciling
/// confirmations. Hook failures are logged and never interrupt the cycle.
#[async_trait]
pub trait ReceiptHook: Send + Sync {
	/// Called with each receipt the reconciler observes.
	async fn on_receipt(
		&self,
		receipt: &TransactionReceipt,
	) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Per-chain repack timeout table with a runtime override.
struct TimeoutTable {
	per_chain: RwLock<HashMap<u64, u64>>,
}

impl TimeoutTable {
	fn new(per_chain: HashMap<u64, u64>) -> Self {
		Self {
			per_chain: RwLock::new(per_chain),
		}
	}

	fn timeout_millis(&self, chain_id: u64) -> u64 {
		let seconds = self
			.per_chain
			.read()
			.ok()
			.and_then(|table| table.get(&chain_id).copied())
			.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
		seconds * 1000
	}

	fn set(&self, chain_id: u64, seconds: u64) {
		if let Ok(mut table) = self.per_chain.write() {
			table.insert(chain_id, seconds);
		}
	}
}

/// The packing engine for one account on one chain.
///
/// All collaborators are injected: the request store owns the durable
/// records, the account service signs, the ledger service broadcasts and
/// answers nonce/receipt lookups, and the batch encoder supplies the
/// contract-specific call. The engine itself only carries the repack lock
/// and the timeout table.
pub struct ParallelSigner {
	/// Engine configuration.
	options: SignerConfig,
	/// Cached address of the signing account.
	address: Address,
	/// Durable record of requests and attempts.
	store: Arc<dyn RequestStore>,
	/// Signing account.
	account: Arc<AccountService>,
	/// Ledger access.
	ledger: Arc<LedgerService>,
	/// Contract-specific batch encoding.
	encoder: Arc<dyn BatchEncoder>,
	/// Optional receipt callback.
	receipt_hook: Option<Arc<dyn ReceiptHook>>,
	/// Serializes repack runs; a run finding the lock held is a no-op.
	repack_lock: Mutex<()>,
	/// Per-chain repack timeouts.
	timeouts: TimeoutTable,
	/// Handles of the periodic cycles, aborted together on shutdown.
	tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl ParallelSigner {
	/// Creates a new ParallelSigner from its collaborators.
	///
	/// Resolves and caches the account address up front so every later cycle
	/// can query the ledger without touching the account service.
	pub async fn new(
		options: SignerConfig,
		store: Arc<dyn RequestStore>,
		account: Arc<AccountService>,
		ledger: Arc<LedgerService>,
		encoder: Arc<dyn BatchEncoder>,
	) -> Result<Self, SignerError> {
		if options.chain_id == 0 {
			return Err(SignerError::MissingChainId);
		}
		let address = account.get_address().await?;
		let timeouts = TimeoutTable::new(options.timeouts.clone());
		Ok(Self {
			options,
			address,
			store,
			account,
			ledger,
			encoder,
			receipt_hook: None,
			repack_lock: Mutex::new(()),
			timeouts,
			tasks: StdMutex::new(Vec::new()),
		})
	}

	/// Attaches a receipt hook invoked for every observed receipt.
	pub fn with_receipt_hook(mut self, hook: Arc<dyn ReceiptHook>) -> Self {
		self.receipt_hook = Some(hook);
		self
	}

	/// Chain this signer instance targets.
	pub fn chain_id(&self) -> u64 {
		self.options.chain_id
	}

	/// Address of the signing account.
	pub fn address(&self) -> Address {
		self.address
	}

	/// Overrides the repack timeout for a chain at runtime.
	pub fn set_timeout(&self, chain_id: u64, seconds: u64) {
		self.timeouts.set(chain_id, seconds);
	}

	pub(crate) fn now_millis() -> u64 {
		chrono::Utc::now().timestamp_millis().max(0) as u64
	}

	/// Durably stores submissions and returns their assigned ids.
	///
	/// When no packing delay is configured, one repack is triggered inline;
	/// its errors are logged and not propagated, since the submissions are
	/// already durable and the periodic cycle will pick them up.
	pub async fn send_transactions(
		&self,
		submissions: Vec<Submission>,
	) -> Result<Vec<u64>, SignerError> {
		if submissions.is_empty() {
			return Ok(Vec::new());
		}

		let chain_id = self.chain_id();
		let requests = submissions
			.into_iter()
			.map(|s| NewRequest {
				function_data: s.function_data,
				chain_id,
				log_id: s.log_id,
			})
			.collect();
		let ids = self.store.set_requests(requests).await?;

		if self.options.delayed_seconds == 0 {
			if let Err(err) = self.repack().await {
				tracing::error!(chain_id, error = %err, "Inline repack after submission failed");
			}
		}

		Ok(ids)
	}

	/// Runs one repack: discovers the current nonce, selects the batch for
	/// that slot and submits it as a new attempt.
	///
	/// Runs are serialized; a repack invoked while another is in flight
	/// returns immediately without touching the store.
	pub async fn repack(&self) -> Result<(), SignerError> {
		let Ok(_guard) = self.repack_lock.try_lock() else {
			tracing::debug!(chain_id = self.chain_id(), "Repack already in flight, skipping");
			return Ok(());
		};

		let current_nonce = self.ledger.get_transaction_count(self.address).await?;
		let batch = self.select_batch(current_nonce).await?;
		self.send_packed_transaction(&batch, current_nonce).await
	}

	/// Starts the two periodic cycles: repack and confirmation check.
	///
	/// The repack interval is the configured delay, or half the chain's
	/// repack timeout when submissions are packed inline. Cycle errors are
	/// logged and the cycle keeps running.
	pub fn start(self: &Arc<Self>) {
		let chain_id = self.chain_id();

		let check_period = Duration::from_secs(self.options.check_interval_seconds);
		let signer = Arc::clone(self);
		let check_task = tokio::spawn(async move {
			let mut interval =
				tokio::time::interval_at(tokio::time::Instant::now() + check_period, check_period);
			loop {
				interval.tick().await;
				if let Err(err) = signer.check_packed_transactions().await {
					tracing::error!(chain_id, error = %err, "Confirmation check cycle failed");
				}
			}
		});

		// Interval periods must be non-zero.
		let repack_period = if self.options.delayed_seconds == 0 {
			Duration::from_millis((self.timeouts.timeout_millis(chain_id) / 2).max(1_000))
		} else {
			Duration::from_secs(self.options.delayed_seconds)
		};
		let signer = Arc::clone(self);
		let repack_task = tokio::spawn(async move {
			let mut interval = tokio::time::interval_at(
				tokio::time::Instant::now() + repack_period,
				repack_period,
			);
			loop {
				interval.tick().await;
				if let Err(err) = signer.repack().await {
					tracing::error!(chain_id, error = %err, "Repack cycle failed");
				}
			}
		});

		let mut tasks = self.tasks.lock().expect("task registry poisoned");
		tasks.push(check_task);
		tasks.push(repack_task);
	}

	/// Stops both periodic cycles. In-flight store or ledger calls are
	/// dropped at their next await point.
	pub fn shutdown(&self) {
		let mut tasks = self.tasks.lock().expect("task registry poisoned");
		for task in tasks.drain(..) {
			task.abort();
		}
	}
}

impl Drop for ParallelSigner {
	fn drop(&mut self) {
		self.shutdown();
	}
}
