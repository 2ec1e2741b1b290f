//! Storage module for the parallel signer system.
//!
//! This module defines the ordered request store consumed by the packing
//! engine: a durable, append-ordered record of requests and packed
//! transaction attempts. The engine never mutates stored records outside the
//! operations defined here, and relies on the store for id assignment.

use async_trait::async_trait;
use signer_types::{NewPackedTransaction, NewRequest, PackedTransaction, Request, TransactionHash};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested record is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
}

/// Trait defining the ordered request store consumed by the signer.
///
/// Implementations must assign ids that are unique per chain and increase
/// monotonically, starting at 1; the engine treats id 0 as "before the first
/// record". All reads are snapshots; the engine tolerates lagging data but
/// not reordered ids.
#[async_trait]
pub trait RequestStore: Send + Sync {
	/// Durably inserts requests and returns their assigned ids, in input
	/// order.
	async fn set_requests(&self, requests: Vec<NewRequest>) -> Result<Vec<u64>, StorageError>;

	/// Returns requests with `id >= minimal_id` for the chain, ascending by
	/// id, at most `limit` of them.
	async fn get_requests(
		&self,
		chain_id: u64,
		minimal_id: u64,
		limit: usize,
	) -> Result<Vec<Request>, StorageError>;

	/// Sets `tx_id` on all requests with the given ids.
	async fn update_request_batch(
		&self,
		ids: &[u64],
		tx_hash: &TransactionHash,
	) -> Result<(), StorageError>;

	/// Durably inserts a packed transaction attempt and returns its assigned
	/// id.
	async fn set_packed_transaction(
		&self,
		tx: NewPackedTransaction,
	) -> Result<u64, StorageError>;

	/// Returns the highest-id attempt for the chain, optionally restricted to
	/// a nonce slot. `None` if no attempt matches.
	async fn get_latest_packed_transaction(
		&self,
		chain_id: u64,
		nonce: Option<u64>,
	) -> Result<Option<PackedTransaction>, StorageError>;

	/// Returns all attempts recorded at the given nonce slot, ascending by
	/// id.
	async fn get_packed_transactions(
		&self,
		nonce: u64,
		chain_id: u64,
	) -> Result<Vec<PackedTransaction>, StorageError>;

	/// Returns the highest-id attempt with `id < max_id`, or `None` when the
	/// floor has been reached.
	async fn get_max_id_packed_transaction(
		&self,
		chain_id: u64,
		max_id: u64,
	) -> Result<Option<PackedTransaction>, StorageError>;

	/// Persists an updated confirmation depth for an attempt.
	async fn set_packed_transaction_confirmation(
		&self,
		id: u64,
		confirmation: u64,
	) -> Result<(), StorageError>;

	/// Returns every zero-confirmation attempt recorded at a nonce slot
	/// `<= nonce` whose slot has no confirmed sibling at all, ascending by
	/// id. These are the slots the ledger has passed without any attempt of
	/// ours being observed on-chain.
	async fn get_unconfirmed_transactions_with_same_nonce(
		&self,
		chain_id: u64,
		nonce: u64,
	) -> Result<Vec<PackedTransaction>, StorageError>;
}
