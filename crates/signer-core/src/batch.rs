//! Batch selection.
//!
//! Decides which stored requests belong in the next attempt for the current
//! nonce slot. Selection never trusts a nonce advance alone: the slot may
//! have been consumed by an attempt whose receipt we have not seen yet, so
//! the resume point is always re-derived from attempt history and receipts.

use crate::{ParallelSigner, SignerError};
use signer_types::{PackedTransaction, Request};

impl ParallelSigner {
	/// Selects the batch for the given nonce slot.
	///
	/// Returns an empty batch when nothing should be sent this cycle: the
	/// pending attempt is full or fresh, and no timeout has elapsed.
	pub(crate) async fn select_batch(
		&self,
		current_nonce: u64,
	) -> Result<Vec<Request>, SignerError> {
		let chain_id = self.chain_id();
		let limit = self.options.request_count_limit;
		let mut minimal_id = 0;

		if let Some(latest) = self.store.get_latest_packed_transaction(chain_id, None).await? {
			if latest.nonce == current_nonce {
				// The slot has not advanced; the previous attempt is still
				// pending. Grow the batch if it has room and new requests
				// arrived, fee-bump it once it is stale, otherwise wait.
				let max_id = latest.max_request_id().unwrap_or(0);
				let newer = self.store.get_requests(chain_id, max_id + 1, limit).await?;

				if latest.request_ids.len() < limit && !newer.is_empty() {
					tracing::debug!(
						chain_id,
						nonce = current_nonce,
						"Repacking to include newly arrived requests"
					);
					minimal_id = latest.min_request_id().unwrap_or(1).saturating_sub(1);
				} else {
					let gap_millis = Self::now_millis().saturating_sub(latest.created_at);
					if gap_millis > self.timeouts.timeout_millis(chain_id) {
						tracing::info!(
							chain_id,
							nonce = current_nonce,
							gap_millis,
							"Pending attempt timed out, repacking as a fee bump"
						);
						minimal_id = latest.min_request_id().unwrap_or(1).saturating_sub(1);
					} else {
						return Ok(Vec::new());
					}
				}
			} else {
				minimal_id = self.resume_point(current_nonce, &latest).await?;
			}
		}

		Ok(self
			.store
			.get_requests(chain_id, minimal_id + 1, limit)
			.await?)
	}

	/// Re-derives the id below which all requests are already carried by a
	/// landed attempt.
	///
	/// Walks attempt history backwards (descending id), and for every nonce
	/// slot below the current nonce probes each sibling attempt for a
	/// receipt. The first landed sibling fixes the resume point. The walk is
	/// bounded: each store page strictly decreases the probed id, and it
	/// terminates at the floor when no attempt has ever landed.
	async fn resume_point(
		&self,
		current_nonce: u64,
		latest: &PackedTransaction,
	) -> Result<u64, SignerError> {
		let chain_id = self.chain_id();
		let mut minimal_id = 0;
		let mut last_checked_id = latest.id + 1;

		loop {
			let Some(packed) = self
				.store
				.get_max_id_packed_transaction(chain_id, last_checked_id)
				.await?
			else {
				break;
			};
			if packed.nonce >= current_nonce {
				// Attempts at or above the current slot cannot have landed.
				last_checked_id = packed.id;
				continue;
			}

			let siblings = self.store.get_packed_transactions(packed.nonce, chain_id).await?;
			for sibling in &siblings {
				last_checked_id = last_checked_id.min(sibling.id);
				if self
					.ledger
					.get_transaction_receipt(&sibling.transaction_hash)
					.await?
					.is_some()
				{
					minimal_id = sibling.max_request_id().unwrap_or(0);
					break;
				}
			}
			if minimal_id > 0 {
				break;
			}
		}

		if minimal_id == 0 {
			// Rare: the ledger advanced past our slots but no recorded
			// attempt shows a receipt. Reselect from the first stored
			// request rather than guessing.
			tracing::warn!(
				chain_id,
				current_nonce,
				"No landed attempt found while walking history, reselecting from the start"
			);
		}
		Ok(minimal_id)
	}
}
