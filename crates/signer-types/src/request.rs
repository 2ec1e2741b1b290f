//! Request types for the signer system.
//!
//! A request is one logical operation queued for inclusion in a batched
//! transaction. Requests are durably stored before anything is sent, and the
//! store assigns their ids.

use serde::{Deserialize, Serialize};

use crate::TransactionHash;

/// A stored request, as returned by the request store.
///
/// Ids are assigned by the store, are unique per chain and increase
/// monotonically starting at 1. A request is mutated exactly once, when the
/// attempt carrying it reaches the confirmation threshold and `tx_id` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
	/// Store-assigned id, monotonically increasing per chain.
	pub id: u64,
	/// Opaque payload consumed by the batch encoder.
	pub function_data: Vec<u8>,
	/// Hash of the transaction that finalized this request, once confirmed.
	pub tx_id: Option<TransactionHash>,
	/// Chain the request targets.
	pub chain_id: u64,
	/// Caller correlation token.
	pub log_id: u64,
	/// Creation time in milliseconds since the Unix epoch.
	pub created_at: u64,
}

/// A request submitted for durable insertion, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
	/// Opaque payload consumed by the batch encoder.
	pub function_data: Vec<u8>,
	/// Chain the request targets.
	pub chain_id: u64,
	/// Caller correlation token.
	pub log_id: u64,
}
