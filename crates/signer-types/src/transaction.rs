//! Packed transaction attempts, fee schemes and assembly inputs.
//!
//! A packed transaction is one concrete submission attempt covering a batch
//! of requests at a specific nonce slot. Several attempts may share a nonce
//! (fee bumps, request-set growth); at most one of them can ever land.

use std::fmt;

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::TransactionHash;

/// Fee fields of a transaction, as a tagged variant.
///
/// A transaction uses exactly one fee scheme; making the scheme part of the
/// type rules out partially-populated fee fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum TxFees {
	/// Pre-1559 single gas price.
	Legacy {
		/// Gas price in wei.
		gas_price: u128,
	},
	/// EIP-1559 base/priority fee pair.
	Eip1559 {
		/// Maximum total fee per gas in wei.
		max_fee_per_gas: u128,
		/// Maximum priority fee per gas in wei.
		max_priority_fee_per_gas: u128,
	},
}

impl TxFees {
	/// Returns the scheme name, for diagnostics.
	pub fn scheme(&self) -> &'static str {
		match self {
			TxFees::Legacy { .. } => "legacy",
			TxFees::Eip1559 { .. } => "eip1559",
		}
	}
}

impl fmt::Display for TxFees {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TxFees::Legacy { gas_price } => write!(f, "gas_price={}", gas_price),
			TxFees::Eip1559 {
				max_fee_per_gas,
				max_priority_fee_per_gas,
			} => write!(
				f,
				"max_fee_per_gas={} max_priority_fee_per_gas={}",
				max_fee_per_gas, max_priority_fee_per_gas
			),
		}
	}
}

/// A stored packed transaction attempt.
///
/// Immutable once written, except for `confirmation` which only grows while
/// the attempt is being tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedTransaction {
	/// Store-assigned id.
	pub id: u64,
	/// Nonce slot this attempt occupies.
	pub nonce: u64,
	/// Hash of the signed transaction.
	pub transaction_hash: TransactionHash,
	/// Chain the attempt targets.
	pub chain_id: u64,
	/// Fee fields the attempt was signed with.
	pub fees: TxFees,
	/// Gas limit the attempt was signed with.
	pub gas_limit: u64,
	/// Ids of the requests this attempt carries, in ascending order.
	pub request_ids: Vec<u64>,
	/// Last observed confirmation depth.
	pub confirmation: u64,
	/// Creation time in milliseconds since the Unix epoch.
	pub created_at: u64,
}

impl PackedTransaction {
	/// Smallest request id carried by this attempt.
	pub fn min_request_id(&self) -> Option<u64> {
		self.request_ids.iter().min().copied()
	}

	/// Largest request id carried by this attempt.
	pub fn max_request_id(&self) -> Option<u64> {
		self.request_ids.iter().max().copied()
	}
}

/// A packed transaction attempt before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPackedTransaction {
	/// Nonce slot this attempt occupies.
	pub nonce: u64,
	/// Hash of the signed transaction.
	pub transaction_hash: TransactionHash,
	/// Chain the attempt targets.
	pub chain_id: u64,
	/// Fee fields the attempt was signed with.
	pub fees: TxFees,
	/// Gas limit the attempt was signed with.
	pub gas_limit: u64,
	/// Ids of the requests this attempt carries, in ascending order.
	pub request_ids: Vec<u64>,
	/// Last observed confirmation depth, zero at insertion.
	pub confirmation: u64,
	/// Creation time in milliseconds since the Unix epoch.
	pub created_at: u64,
}

/// A transaction ready to be signed by the account service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
	/// Chain the transaction targets.
	pub chain_id: u64,
	/// Nonce slot.
	pub nonce: u64,
	/// Call target.
	pub to: Address,
	/// Native value carried by the call.
	pub value: U256,
	/// Encoded calldata.
	pub input: Bytes,
	/// Gas limit, already including any safety margin.
	pub gas_limit: u64,
	/// Fee fields.
	pub fees: TxFees,
}

/// Output of the batch encoder: one contract call covering a whole batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCall {
	/// Call target.
	pub to: Address,
	/// Encoded calldata for the batch.
	pub data: Bytes,
	/// Native value carried by the call.
	pub value: U256,
	/// Gas limit estimate for the call, before safety margin.
	pub gas_limit: u64,
	/// Proposed fee fields for this attempt.
	pub fees: TxFees,
}
