//! Transaction assembly and submission.
//!
//! Turns a selected batch into a signed attempt: encodes the batch call,
//! settles the fees against any prior attempt at the slot, signs, persists
//! the attempt and broadcasts it. The attempt record is written before the
//! broadcast so a failed send never loses the attempt; the timeout-driven
//! repack re-sends it with escalated fees.

use crate::{fees, ParallelSigner, SignerError};
use alloy_primitives::keccak256;
use signer_types::{NewPackedTransaction, Request, TransactionHash, TxFees, UnsignedTransaction};

/// Multiplier applied to the encoder's gas estimate before signing.
const GAS_MARGIN_NUMERATOR: u64 = 3;
const GAS_MARGIN_DENOMINATOR: u64 = 2;

impl ParallelSigner {
	/// Assembles, persists and broadcasts one attempt for the given batch at
	/// the given nonce slot. An empty batch is a no-op.
	pub(crate) async fn send_packed_transaction(
		&self,
		requests: &[Request],
		nonce: u64,
	) -> Result<(), SignerError> {
		if requests.is_empty() {
			return Ok(());
		}
		let chain_id = self.chain_id();

		let request_ids = requests
			.iter()
			.map(|request| {
				if request.id == 0 {
					Err(SignerError::UnassignedRequestId)
				} else {
					Ok(request.id)
				}
			})
			.collect::<Result<Vec<_>, _>>()?;

		let call = self.encoder.encode_batch(requests).await?;
		let fees = self.final_fees(call.fees, nonce).await?;
		let gas_limit = call
			.gas_limit
			.saturating_mul(GAS_MARGIN_NUMERATOR)
			/ GAS_MARGIN_DENOMINATOR;

		let tx = UnsignedTransaction {
			chain_id,
			nonce,
			to: call.to,
			value: call.value,
			input: call.data,
			gas_limit,
			fees,
		};
		let raw = self.account.sign(&tx).await?;
		let transaction_hash = TransactionHash(keccak256(&raw).to_vec());

		let attempt = NewPackedTransaction {
			nonce,
			transaction_hash: transaction_hash.clone(),
			chain_id,
			fees,
			gas_limit,
			request_ids,
			confirmation: 0,
			created_at: Self::now_millis(),
		};
		self.store.set_packed_transaction(attempt).await?;

		tracing::info!(
			chain_id,
			nonce,
			tx_hash = %transaction_hash,
			request_count = requests.len(),
			%fees,
			"Packed transaction stored"
		);

		// The attempt is durable at this point; a failed broadcast is
		// retried by the timeout repack with escalated fees.
		if let Err(err) = self.ledger.send_raw_transaction(&raw).await {
			tracing::error!(
				chain_id,
				nonce,
				tx_hash = %transaction_hash,
				error = %err,
				"Broadcast failed"
			);
		}

		Ok(())
	}

	/// Settles the proposed fees against the latest prior attempt at the
	/// slot, if any.
	async fn final_fees(&self, proposed: TxFees, nonce: u64) -> Result<TxFees, SignerError> {
		match self
			.store
			.get_latest_packed_transaction(self.chain_id(), Some(nonce))
			.await?
		{
			None => Ok(proposed),
			Some(previous) => fees::escalate(proposed, &previous.fees),
		}
	}
}
