//! Aggregate-call batch encoder.
//!
//! Encodes a batch by forwarding each request's payload to a batch entrypoint
//! contract that executes the encoded calls in order. Gas is estimated from a
//! configured base cost plus a per-call cost; fees come from configuration.

use crate::{BatchEncoder, EncoderError};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use serde::Deserialize;
use signer_types::{BatchCall, Request, TxFees};

sol! {
	/// Batch entrypoint executing each encoded call in order.
	function runBatch(bytes[] calldata calls) external payable;
}

/// Configuration for the aggregate-call encoder.
#[derive(Debug, Clone, Deserialize)]
pub struct MulticallEncoderConfig {
	/// Address of the batch entrypoint contract.
	pub address: String,
	/// Gas cost of the outer call.
	#[serde(default = "default_base_gas_limit")]
	pub base_gas_limit: u64,
	/// Gas cost attributed to each inner call.
	#[serde(default = "default_call_gas_limit")]
	pub call_gas_limit: u64,
	/// Gas price in wei, for the legacy fee scheme.
	#[serde(default)]
	pub gas_price: Option<u128>,
	/// Maximum total fee per gas in wei, for the EIP-1559 scheme.
	#[serde(default)]
	pub max_fee_per_gas: Option<u128>,
	/// Maximum priority fee per gas in wei, for the EIP-1559 scheme.
	#[serde(default)]
	pub max_priority_fee_per_gas: Option<u128>,
}

/// Returns the default gas cost of the outer call.
fn default_base_gas_limit() -> u64 {
	50_000
}

/// Returns the default gas cost attributed to each inner call.
fn default_call_gas_limit() -> u64 {
	60_000
}

/// Batch encoder targeting a fixed batch entrypoint contract.
pub struct MulticallEncoder {
	target: Address,
	base_gas_limit: u64,
	call_gas_limit: u64,
	fees: TxFees,
}

impl MulticallEncoder {
	/// Creates a new MulticallEncoder from configuration.
	///
	/// Exactly one fee scheme must be configured: either `gas_price`, or the
	/// `max_fee_per_gas`/`max_priority_fee_per_gas` pair.
	pub fn new(config: MulticallEncoderConfig) -> Result<Self, EncoderError> {
		let target: Address = config
			.address
			.parse()
			.map_err(|e| EncoderError::Configuration(format!("Invalid target address: {}", e)))?;

		let fees = match (
			config.gas_price,
			config.max_fee_per_gas,
			config.max_priority_fee_per_gas,
		) {
			(Some(gas_price), None, None) => TxFees::Legacy { gas_price },
			(None, Some(max_fee_per_gas), Some(max_priority_fee_per_gas)) => TxFees::Eip1559 {
				max_fee_per_gas,
				max_priority_fee_per_gas,
			},
			_ => {
				return Err(EncoderError::Configuration(
					"exactly one fee scheme must be configured: gas_price, or \
					 max_fee_per_gas with max_priority_fee_per_gas"
						.to_string(),
				))
			}
		};

		Ok(Self {
			target,
			base_gas_limit: config.base_gas_limit,
			call_gas_limit: config.call_gas_limit,
			fees,
		})
	}
}

#[async_trait]
impl BatchEncoder for MulticallEncoder {
	async fn encode_batch(&self, requests: &[Request]) -> Result<BatchCall, EncoderError> {
		if requests.is_empty() {
			return Err(EncoderError::EncodingFailed("empty batch".to_string()));
		}

		let calls: Vec<Bytes> = requests
			.iter()
			.map(|r| Bytes::from(r.function_data.clone()))
			.collect();
		let data = runBatchCall { calls }.abi_encode();

		let gas_limit = self
			.base_gas_limit
			.saturating_add(self.call_gas_limit.saturating_mul(requests.len() as u64));

		Ok(BatchCall {
			to: self.target,
			data: Bytes::from(data),
			value: U256::ZERO,
			gas_limit,
			fees: self.fees,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const TARGET: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

	fn config() -> MulticallEncoderConfig {
		MulticallEncoderConfig {
			address: TARGET.to_string(),
			base_gas_limit: 50_000,
			call_gas_limit: 60_000,
			gas_price: None,
			max_fee_per_gas: Some(2_000_000_000),
			max_priority_fee_per_gas: Some(1_000_000_000),
		}
	}

	fn request(id: u64) -> Request {
		Request {
			id,
			function_data: vec![id as u8; 4],
			tx_id: None,
			chain_id: 1,
			log_id: id,
			created_at: 0,
		}
	}

	#[tokio::test]
	async fn test_encodes_batch_calldata() {
		let encoder = MulticallEncoder::new(config()).unwrap();
		let call = encoder.encode_batch(&[request(1), request(2)]).await.unwrap();

		assert_eq!(call.to, TARGET.parse::<Address>().unwrap());
		assert_eq!(&call.data[..4], &runBatchCall::SELECTOR[..]);
		assert_eq!(call.gas_limit, 50_000 + 2 * 60_000);
		assert!(matches!(call.fees, TxFees::Eip1559 { .. }));
	}

	#[tokio::test]
	async fn test_empty_batch_rejected() {
		let encoder = MulticallEncoder::new(config()).unwrap();
		assert!(encoder.encode_batch(&[]).await.is_err());
	}

	#[test]
	fn test_mixed_fee_schemes_rejected() {
		let mut cfg = config();
		cfg.gas_price = Some(1);
		assert!(matches!(
			MulticallEncoder::new(cfg),
			Err(EncoderError::Configuration(_))
		));
	}

	#[test]
	fn test_missing_fee_scheme_rejected() {
		let mut cfg = config();
		cfg.max_fee_per_gas = None;
		cfg.max_priority_fee_per_gas = None;
		assert!(MulticallEncoder::new(cfg).is_err());
	}
}
