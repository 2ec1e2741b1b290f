//! Fee escalation policy.
//!
//! Replacing a pending transaction at a nonce slot requires at least a 10%
//! fee bump over the prior attempt on most ledgers. The policy bumps the
//! prior fee by exactly 10% and clamps the result to four times the caller's
//! own proposal, so a stale high bid can never drag fees up without bound.

use crate::SignerError;
use signer_types::TxFees;

/// Computes the fees for a repack against the prior attempt at the same
/// nonce slot. Both sides must use the same fee scheme.
pub(crate) fn escalate(proposed: TxFees, previous: &TxFees) -> Result<TxFees, SignerError> {
	match (proposed, previous) {
		(
			TxFees::Eip1559 {
				max_fee_per_gas,
				max_priority_fee_per_gas,
			},
			TxFees::Eip1559 {
				max_fee_per_gas: previous_max_fee,
				max_priority_fee_per_gas: previous_priority_fee,
			},
		) => Ok(TxFees::Eip1559 {
			max_fee_per_gas: final_price(max_fee_per_gas, bump(*previous_max_fee)),
			max_priority_fee_per_gas: final_price(
				max_priority_fee_per_gas,
				bump(*previous_priority_fee),
			),
		}),
		(
			TxFees::Legacy { gas_price },
			TxFees::Legacy {
				gas_price: previous_gas_price,
			},
		) => Ok(TxFees::Legacy {
			gas_price: final_price(gas_price, bump(*previous_gas_price)),
		}),
		(proposed, previous) => Err(SignerError::FeeSchemeMismatch {
			previous: previous.scheme(),
			proposed: proposed.scheme(),
		}),
	}
}

/// Prior fee raised by the 10% replacement minimum.
fn bump(previous: u128) -> u128 {
	previous.saturating_mul(110) / 100
}

/// Picks between the caller's proposal and the bumped prior fee, capping the
/// bump at four times the proposal.
fn final_price(proposed: u128, bumped: u128) -> u128 {
	if bumped > proposed {
		bumped.min(proposed.saturating_mul(4))
	} else {
		proposed
	}
}
