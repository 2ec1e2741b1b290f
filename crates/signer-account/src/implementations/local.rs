//! Local private-key account implementation.
//!
//! Signs transactions in-process with a private key held in memory, using the
//! Alloy wallet types. Suitable for development and for deployments where the
//! key is provisioned through configuration.

use crate::{AccountError, AccountInterface};
use alloy_consensus::{TxEip1559, TxLegacy, TypedTransaction};
use alloy_eips::eip2718::Encodable2718;
use alloy_network::{Ethereum, EthereumWallet, NetworkWallet};
use alloy_primitives::{Address, TxKind};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use signer_types::{SecretString, TxFees, UnsignedTransaction};

/// Account backed by a local private key.
pub struct LocalAccount {
	/// Cached signer address.
	address: Address,
	/// Wallet used to sign transactions.
	wallet: EthereumWallet,
}

impl LocalAccount {
	/// Creates a new LocalAccount from a hex-encoded private key.
	pub fn new(private_key: &SecretString) -> Result<Self, AccountError> {
		let signer: PrivateKeySigner = private_key
			.expose_secret()
			.parse()
			.map_err(|_| AccountError::InvalidKey("invalid private key format".to_string()))?;
		let address = signer.address();
		Ok(Self {
			address,
			wallet: EthereumWallet::new(signer),
		})
	}
}

#[async_trait]
impl AccountInterface for LocalAccount {
	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.address)
	}

	async fn sign_transaction(&self, tx: &UnsignedTransaction) -> Result<Vec<u8>, AccountError> {
		let typed: TypedTransaction = match tx.fees {
			TxFees::Eip1559 {
				max_fee_per_gas,
				max_priority_fee_per_gas,
			} => TxEip1559 {
				chain_id: tx.chain_id,
				nonce: tx.nonce,
				gas_limit: tx.gas_limit,
				max_fee_per_gas,
				max_priority_fee_per_gas,
				to: TxKind::Call(tx.to),
				value: tx.value,
				input: tx.input.clone(),
				..Default::default()
			}
			.into(),
			TxFees::Legacy { gas_price } => TxLegacy {
				chain_id: Some(tx.chain_id),
				nonce: tx.nonce,
				gas_price,
				gas_limit: tx.gas_limit,
				to: TxKind::Call(tx.to),
				value: tx.value,
				input: tx.input.clone(),
			}
			.into(),
		};

		let signed =
			NetworkWallet::<Ethereum>::sign_transaction_from(&self.wallet, self.address, typed)
				.await
				.map_err(|e| AccountError::SigningFailed(e.to_string()))?;

		Ok(signed.encoded_2718())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Bytes, U256, address};

	// Well-known development key (anvil account 0).
	const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn unsigned(fees: TxFees) -> UnsignedTransaction {
		UnsignedTransaction {
			chain_id: 31337,
			nonce: 0,
			to: address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
			value: U256::ZERO,
			input: Bytes::from(vec![0x01, 0x02]),
			gas_limit: 100_000,
			fees,
		}
	}

	#[tokio::test]
	async fn test_address_derivation() {
		let account = LocalAccount::new(&SecretString::from(DEV_KEY)).unwrap();
		assert_eq!(
			account.address().await.unwrap(),
			address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
		);
	}

	#[tokio::test]
	async fn test_sign_eip1559_envelope() {
		let account = LocalAccount::new(&SecretString::from(DEV_KEY)).unwrap();
		let raw = account
			.sign_transaction(&unsigned(TxFees::Eip1559 {
				max_fee_per_gas: 2_000_000_000,
				max_priority_fee_per_gas: 1_000_000_000,
			}))
			.await
			.unwrap();
		// EIP-2718 type byte for a 1559 transaction.
		assert_eq!(raw[0], 0x02);
	}

	#[tokio::test]
	async fn test_sign_legacy_envelope() {
		let account = LocalAccount::new(&SecretString::from(DEV_KEY)).unwrap();
		let raw = account
			.sign_transaction(&unsigned(TxFees::Legacy {
				gas_price: 2_000_000_000,
			}))
			.await
			.unwrap();
		// Legacy transactions are bare RLP lists.
		assert!(raw[0] >= 0xc0);
	}

	#[test]
	fn test_invalid_key_rejected() {
		let result = LocalAccount::new(&SecretString::from("not-a-key"));
		assert!(matches!(result, Err(AccountError::InvalidKey(_))));
	}
}
