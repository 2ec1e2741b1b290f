//! Alloy-based EVM ledger implementation.
//!
//! Talks to an EVM node over HTTP using the Alloy provider. Confirmation
//! depth is derived from the distance between the receipt's block and the
//! current chain tip.

use crate::{LedgerError, LedgerInterface};
use alloy_primitives::{Address, FixedBytes};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_transport_http::Http;
use async_trait::async_trait;
use signer_types::{TransactionHash, TransactionReceipt};
use std::sync::Arc;

/// Ledger implementation backed by an Alloy HTTP provider.
pub struct AlloyLedger {
	/// Provider for the configured network.
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
}

impl AlloyLedger {
	/// Creates a new AlloyLedger for the given RPC URL.
	pub fn new(rpc_url: &str) -> Result<Self, LedgerError> {
		let url = rpc_url
			.parse()
			.map_err(|e| LedgerError::Network(format!("Invalid RPC URL: {}", e)))?;
		let provider = ProviderBuilder::new().on_http(url);
		Ok(Self {
			provider: Arc::new(provider),
		})
	}
}

#[async_trait]
impl LedgerInterface for AlloyLedger {
	async fn get_transaction_count(&self, address: Address) -> Result<u64, LedgerError> {
		self.provider
			.get_transaction_count(address)
			.await
			.map_err(|e| LedgerError::Network(format!("Failed to get nonce: {}", e)))
	}

	async fn get_transaction_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, LedgerError> {
		if hash.0.len() != 32 {
			return Err(LedgerError::Network(format!(
				"Invalid transaction hash length: {}",
				hash.0.len()
			)));
		}
		let tx_hash = FixedBytes::<32>::from_slice(&hash.0);

		let receipt = match self.provider.get_transaction_receipt(tx_hash).await {
			Ok(Some(receipt)) => receipt,
			Ok(None) => return Ok(None),
			Err(e) => {
				return Err(LedgerError::Network(format!("Failed to get receipt: {}", e)));
			}
		};

		let current_block = self
			.provider
			.get_block_number()
			.await
			.map_err(|e| LedgerError::Network(format!("Failed to get block number: {}", e)))?;
		let tx_block = receipt.block_number.unwrap_or(0);

		Ok(Some(TransactionReceipt {
			hash: TransactionHash(receipt.transaction_hash.0.to_vec()),
			block_number: tx_block,
			success: receipt.status(),
			confirmations: current_block.saturating_sub(tx_block),
		}))
	}

	async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TransactionHash, LedgerError> {
		let pending = self
			.provider
			.send_raw_transaction(raw)
			.await
			.map_err(|e| LedgerError::BroadcastRejected(e.to_string()))?;

		let tx_hash = *pending.tx_hash();
		tracing::debug!(tx_hash = %hex::encode(tx_hash.0), "Broadcast raw transaction");

		Ok(TransactionHash(tx_hash.0.to_vec()))
	}
}
