//! Account management module for the parallel signer system.
//!
//! This module provides abstractions for the signing account. It defines the
//! interface for address retrieval and transaction signing, and a service
//! wrapper holding the chosen implementation.

use alloy_primitives::Address;
use async_trait::async_trait;
use signer_types::UnsignedTransaction;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// Error that occurs when signing operations fail.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// Error that occurs when a cryptographic key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

/// Trait defining the interface for account implementations.
///
/// Implementations hold the key material for exactly one account and turn
/// unsigned transactions into broadcastable raw bytes.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Retrieves the address associated with this account.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs a transaction and returns the encoded signed bytes, ready for
	/// raw broadcast.
	async fn sign_transaction(&self, tx: &UnsignedTransaction) -> Result<Vec<u8>, AccountError>;
}

/// Service that manages account operations.
///
/// This struct provides a high-level interface for account management,
/// wrapping an underlying account implementation.
pub struct AccountService {
	/// The underlying account implementation.
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	/// Creates a new AccountService with the specified implementation.
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	/// Retrieves the address associated with the managed account.
	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	/// Signs a transaction using the managed account.
	pub async fn sign(&self, tx: &UnsignedTransaction) -> Result<Vec<u8>, AccountError> {
		self.implementation.sign_transaction(tx).await
	}
}
