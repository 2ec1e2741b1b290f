//! Batch encoding module for the parallel signer system.
//!
//! The packing engine is agnostic of what the batched requests actually do;
//! the batch encoder is the single place where contract-specific encoding
//! lives. Callers supply an implementation that turns a batch of requests
//! into one contract call with a gas estimate and proposed fees.

use async_trait::async_trait;
use signer_types::{BatchCall, Request};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod multicall;
}

/// Errors that can occur while encoding a batch.
#[derive(Debug, Error)]
pub enum EncoderError {
	/// Error that occurs when the encoder configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// Error that occurs when a batch cannot be encoded.
	#[error("Encoding failed: {0}")]
	EncodingFailed(String),
}

/// Trait turning a batch of requests into a single contract call.
///
/// Invoked once per assembled attempt. The returned gas limit is an estimate;
/// the assembler applies its own safety margin on top. The returned fees are
/// a proposal; the assembler may escalate them against a prior attempt at the
/// same nonce slot.
#[async_trait]
pub trait BatchEncoder: Send + Sync {
	/// Encodes the given requests into one batch call.
	async fn encode_batch(&self, requests: &[Request]) -> Result<BatchCall, EncoderError>;
}
