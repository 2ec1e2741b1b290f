//! Ledger access module for the parallel signer system.
//!
//! This module defines the narrow ledger capability consumed by the packing
//! engine: account nonce lookup, receipt lookup with confirmation depth, and
//! raw transaction broadcast. The ledger is treated as an opaque,
//! append-only, eventually-consistent oracle; no timeouts are applied here.

use alloy_primitives::Address;
use async_trait::async_trait;
use signer_types::{TransactionHash, TransactionReceipt};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// Error that occurs when a broadcast is rejected by the node.
	#[error("Broadcast rejected: {0}")]
	BroadcastRejected(String),
}

/// Trait defining the ledger capability used by the signer.
#[async_trait]
pub trait LedgerInterface: Send + Sync {
	/// Returns the number of transactions ever mined for the account, which
	/// is the next nonce slot to be consumed.
	async fn get_transaction_count(&self, address: Address) -> Result<u64, LedgerError>;

	/// Returns the receipt for a transaction, or `None` while the ledger has
	/// no visibility of it. The receipt carries the current confirmation
	/// depth below the chain tip.
	async fn get_transaction_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, LedgerError>;

	/// Broadcasts signed raw transaction bytes and returns the transaction
	/// hash reported by the node.
	async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TransactionHash, LedgerError>;
}

/// Service wrapping the ledger implementation used by one signer instance.
pub struct LedgerService {
	/// The underlying ledger implementation.
	implementation: Box<dyn LedgerInterface>,
}

impl LedgerService {
	/// Creates a new LedgerService with the specified implementation.
	pub fn new(implementation: Box<dyn LedgerInterface>) -> Self {
		Self { implementation }
	}

	/// Returns the current transaction count for the account.
	pub async fn get_transaction_count(&self, address: Address) -> Result<u64, LedgerError> {
		self.implementation.get_transaction_count(address).await
	}

	/// Returns the receipt for a transaction if the ledger has one.
	pub async fn get_transaction_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, LedgerError> {
		self.implementation.get_transaction_receipt(hash).await
	}

	/// Broadcasts signed raw transaction bytes.
	pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TransactionHash, LedgerError> {
		self.implementation.send_raw_transaction(raw).await
	}
}
