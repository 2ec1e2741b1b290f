//! In-memory request store implementation.
//!
//! This module provides a memory-based implementation of the RequestStore
//! trait, useful for testing and development scenarios where persistence is
//! not required. Ids are assigned from 1 upwards in insertion order.

use crate::{RequestStore, StorageError};
use async_trait::async_trait;
use signer_types::{NewPackedTransaction, NewRequest, PackedTransaction, Request, TransactionHash};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
	requests: Vec<Request>,
	packed: Vec<PackedTransaction>,
}

/// In-memory request store.
///
/// Records live in two insertion-ordered vectors behind a read-write lock,
/// providing the same ordering guarantees as an auto-increment primary key.
pub struct MemoryStore {
	inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
	/// Creates a new empty MemoryStore.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(RwLock::new(Inner::default())),
		}
	}

	fn now_millis() -> u64 {
		std::time::SystemTime::now()
			.duration_since(std::time::UNIX_EPOCH)
			.unwrap_or_default()
			.as_millis() as u64
	}
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl RequestStore for MemoryStore {
	async fn set_requests(&self, requests: Vec<NewRequest>) -> Result<Vec<u64>, StorageError> {
		let mut inner = self.inner.write().await;
		let mut ids = Vec::with_capacity(requests.len());
		for req in requests {
			let id = inner.requests.len() as u64 + 1;
			inner.requests.push(Request {
				id,
				function_data: req.function_data,
				tx_id: None,
				chain_id: req.chain_id,
				log_id: req.log_id,
				created_at: Self::now_millis(),
			});
			ids.push(id);
		}
		Ok(ids)
	}

	async fn get_requests(
		&self,
		chain_id: u64,
		minimal_id: u64,
		limit: usize,
	) -> Result<Vec<Request>, StorageError> {
		let inner = self.inner.read().await;
		Ok(inner
			.requests
			.iter()
			.filter(|r| r.chain_id == chain_id && r.id >= minimal_id)
			.take(limit)
			.cloned()
			.collect())
	}

	async fn update_request_batch(
		&self,
		ids: &[u64],
		tx_hash: &TransactionHash,
	) -> Result<(), StorageError> {
		let mut inner = self.inner.write().await;
		for req in inner.requests.iter_mut() {
			if ids.contains(&req.id) {
				req.tx_id = Some(tx_hash.clone());
			}
		}
		Ok(())
	}

	async fn set_packed_transaction(
		&self,
		tx: NewPackedTransaction,
	) -> Result<u64, StorageError> {
		let mut inner = self.inner.write().await;
		let id = inner.packed.len() as u64 + 1;
		inner.packed.push(PackedTransaction {
			id,
			nonce: tx.nonce,
			transaction_hash: tx.transaction_hash,
			chain_id: tx.chain_id,
			fees: tx.fees,
			gas_limit: tx.gas_limit,
			request_ids: tx.request_ids,
			confirmation: tx.confirmation,
			created_at: tx.created_at,
		});
		Ok(id)
	}

	async fn get_latest_packed_transaction(
		&self,
		chain_id: u64,
		nonce: Option<u64>,
	) -> Result<Option<PackedTransaction>, StorageError> {
		let inner = self.inner.read().await;
		Ok(inner
			.packed
			.iter()
			.filter(|p| p.chain_id == chain_id && nonce.is_none_or(|n| p.nonce == n))
			.max_by_key(|p| p.id)
			.cloned())
	}

	async fn get_packed_transactions(
		&self,
		nonce: u64,
		chain_id: u64,
	) -> Result<Vec<PackedTransaction>, StorageError> {
		let inner = self.inner.read().await;
		Ok(inner
			.packed
			.iter()
			.filter(|p| p.chain_id == chain_id && p.nonce == nonce)
			.cloned()
			.collect())
	}

	async fn get_max_id_packed_transaction(
		&self,
		chain_id: u64,
		max_id: u64,
	) -> Result<Option<PackedTransaction>, StorageError> {
		let inner = self.inner.read().await;
		Ok(inner
			.packed
			.iter()
			.filter(|p| p.chain_id == chain_id && p.id < max_id)
			.max_by_key(|p| p.id)
			.cloned())
	}

	async fn set_packed_transaction_confirmation(
		&self,
		id: u64,
		confirmation: u64,
	) -> Result<(), StorageError> {
		let mut inner = self.inner.write().await;
		match inner.packed.iter_mut().find(|p| p.id == id) {
			Some(p) => {
				p.confirmation = confirmation;
				Ok(())
			}
			None => Err(StorageError::NotFound),
		}
	}

	async fn get_unconfirmed_transactions_with_same_nonce(
		&self,
		chain_id: u64,
		nonce: u64,
	) -> Result<Vec<PackedTransaction>, StorageError> {
		let inner = self.inner.read().await;
		let mut out = Vec::new();
		for p in &inner.packed {
			if p.chain_id != chain_id || p.nonce > nonce || p.confirmation != 0 {
				continue;
			}
			// Skip slots where any sibling has already been observed on-chain.
			let slot_confirmed = inner
				.packed
				.iter()
				.any(|q| q.chain_id == chain_id && q.nonce == p.nonce && q.confirmation > 0);
			if !slot_confirmed {
				out.push(p.clone());
			}
		}
		Ok(out)
	}
}
