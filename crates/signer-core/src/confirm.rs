//! Confirmation reconciliation.
//!
//! Walks stored attempts older than the current ledger nonce, probes their
//! receipts and finalizes requests once the configured confirmation depth is
//! reached. Also re-probes nonce slots the ledger has passed without any
//! observed landing, which catches the replace-by-fee race where a
//! superseded lower-fee attempt is the one actually mined.

use crate::{ParallelSigner, SignerError};
use signer_types::PackedTransaction;
use std::cmp::Reverse;

impl ParallelSigner {
	/// Runs one confirmation-check cycle.
	pub async fn check_packed_transactions(&self) -> Result<(), SignerError> {
		let chain_id = self.chain_id();
		let current_nonce = self.ledger.get_transaction_count(self.address).await?;
		if current_nonce == 0 {
			// Nothing has ever been mined for this account.
			return Ok(());
		}

		// Start from the attempt recorded at the last consumed slot, falling
		// back to the newest attempt overall.
		let latest = match self
			.store
			.get_latest_packed_transaction(chain_id, Some(current_nonce - 1))
			.await?
		{
			Some(tx) => tx,
			None => match self.store.get_latest_packed_transaction(chain_id, None).await? {
				Some(tx) => tx,
				None => return Ok(()),
			},
		};

		let mut last_checked_id = latest.id + 1;
		let mut last_checked_nonce = latest.nonce;
		while last_checked_id > 0 {
			let Some(next) = self
				.store
				.get_max_id_packed_transaction(chain_id, last_checked_id)
				.await?
			else {
				break;
			};
			if next.nonce >= current_nonce {
				// Still in flight; only passed slots can be confirmed.
				last_checked_id = next.id;
				continue;
			}
			last_checked_id = self.check_confirmations(next.nonce).await?;
			last_checked_nonce = next.nonce;
		}

		// Passed slots where no attempt was ever observed on-chain: probe
		// every recorded sibling, since a superseded attempt may have been
		// the one mined.
		let recheck_nonce = last_checked_nonce.min(current_nonce - 1);
		let unconfirmed = self
			.store
			.get_unconfirmed_transactions_with_same_nonce(chain_id, recheck_nonce)
			.await?;
		let mut any_landed = false;
		for attempt in &unconfirmed {
			let (landed, _) = self.check_receipt(attempt).await?;
			if landed {
				tracing::info!(
					chain_id,
					nonce = attempt.nonce,
					tx_hash = %attempt.transaction_hash,
					request_ids = ?attempt.request_ids,
					"Superseded attempt landed, picked up by slot recheck"
				);
			}
			any_landed = any_landed || landed;
		}
		if !any_landed && !unconfirmed.is_empty() {
			let attempt_ids: Vec<u64> = unconfirmed.iter().map(|a| a.id).collect();
			tracing::warn!(
				chain_id,
				?attempt_ids,
				"Passed nonce slots with no receipt on any recorded attempt; requests may \
				 have been included by a transaction this signer never observed"
			);
		}

		Ok(())
	}

	/// Checks the sibling attempts at one nonce slot.
	///
	/// Returns the id below which the backward walk should continue, or 0 to
	/// stop the walk: either the slot is settled (an attempt at threshold),
	/// or an attempt was observed on-chain and deeper slots must have landed
	/// earlier.
	async fn check_confirmations(&self, nonce: u64) -> Result<u64, SignerError> {
		let chain_id = self.chain_id();
		let siblings = self.store.get_packed_transactions(nonce, chain_id).await?;
		if siblings.is_empty() {
			// Every walked id maps to a stored attempt, so this slot lookup
			// cannot normally come back empty.
			return Ok(0);
		}
		let min_id = siblings.iter().map(|tx| tx.id).min().unwrap_or(0);

		if siblings
			.iter()
			.any(|tx| tx.confirmation >= self.options.confirmations)
		{
			return Ok(0);
		}

		// At most one sibling can ever be on-chain. Prefer the one already
		// observed with a partial depth, falling back to the oldest attempt.
		let Some(probe) = siblings
			.iter()
			.max_by_key(|tx| (tx.confirmation, Reverse(tx.id)))
		else {
			return Ok(0);
		};

		let (landed, _) = self.check_receipt(probe).await?;
		if landed {
			Ok(0)
		} else {
			Ok(min_id)
		}
	}

	/// Probes one attempt for a receipt.
	///
	/// Persists the observed confirmation depth, and finalizes the attempt's
	/// requests once the depth meets the threshold. Returns whether a receipt
	/// was found and whether the requests were finalized.
	pub(crate) async fn check_receipt(
		&self,
		attempt: &PackedTransaction,
	) -> Result<(bool, bool), SignerError> {
		let Some(receipt) = self
			.ledger
			.get_transaction_receipt(&attempt.transaction_hash)
			.await?
		else {
			return Ok((false, false));
		};

		if let Some(hook) = &self.receipt_hook {
			if let Err(err) = hook.on_receipt(&receipt).await {
				tracing::error!(
					chain_id = self.chain_id(),
					tx_hash = %attempt.transaction_hash,
					error = %err,
					"Receipt hook failed"
				);
			}
		}

		let finalized = receipt.confirmations >= self.options.confirmations;
		if finalized {
			self.store
				.update_request_batch(&attempt.request_ids, &attempt.transaction_hash)
				.await?;
			tracing::info!(
				chain_id = self.chain_id(),
				nonce = attempt.nonce,
				tx_hash = %attempt.transaction_hash,
				request_ids = ?attempt.request_ids,
				confirmations = receipt.confirmations,
				"Requests finalized"
			);
		}
		// Recorded depth only ever grows while an attempt is tracked.
		if receipt.confirmations > attempt.confirmation {
			self.store
				.set_packed_transaction_confirmation(attempt.id, receipt.confirmations)
				.await?;
		}

		Ok((true, finalized))
	}
}
