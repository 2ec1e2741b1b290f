//! Configuration module for the parallel signer system.
//!
//! This module provides structures and utilities for managing signer
//! configuration. It supports loading configuration from TOML files and
//! validates that all required values are properly set before any component
//! is constructed.

use serde::{Deserialize, Deserializer};
use signer_types::SecretString;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the parallel signer.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	/// Configuration for the packing engine itself.
	pub signer: SignerConfig,
	/// Configuration for the ledger connection.
	pub ledger: LedgerConfig,
	/// Configuration for the signing account.
	pub account: AccountConfig,
	/// Configuration for the request store backend.
	#[serde(default)]
	pub storage: StorageConfig,
	/// Configuration for the batch encoder, passed through as raw TOML so
	/// each encoder implementation can define its own format.
	pub encoder: toml::Value,
}

/// Configuration for the packing engine.
#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
	/// Chain this signer instance targets. Required and non-zero.
	pub chain_id: u64,
	/// Maximum number of requests packed into one attempt.
	#[serde(default = "default_request_count_limit")]
	pub request_count_limit: usize,
	/// Maximum delay before newly submitted requests are packed. Zero means
	/// a repack is triggered inline on submission.
	#[serde(default)]
	pub delayed_seconds: u64,
	/// Interval of the confirmation-check cycle in seconds.
	#[serde(default = "default_check_interval_seconds")]
	pub check_interval_seconds: u64,
	/// Confirmation depth required before a request is finalized.
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
	/// Per-chain repack timeout in seconds, keyed by chain id. Chains not
	/// listed here use the built-in default.
	#[serde(default, deserialize_with = "deserialize_timeouts")]
	pub timeouts: HashMap<u64, u64>,
}

/// Returns the default maximum number of requests per attempt.
fn default_request_count_limit() -> usize {
	10
}

/// Returns the default confirmation-check interval in seconds.
fn default_check_interval_seconds() -> u64 {
	60
}

/// Returns the default confirmation depth required for finalization.
fn default_confirmations() -> u64 {
	64
}

/// Configuration for the ledger connection.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
	/// HTTP RPC endpoint of the node.
	pub rpc_url: String,
}

/// Configuration for the signing account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
	/// Hex-encoded private key of the signing account.
	pub private_key: SecretString,
}

/// Configuration for the request store backend.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
	/// Which backend implementation to use.
	#[serde(default = "default_storage_backend")]
	pub backend: String,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			backend: default_storage_backend(),
		}
	}
}

/// Returns the default storage backend name.
fn default_storage_backend() -> String {
	"memory".to_string()
}

/// Deserializes the per-chain timeout table, converting TOML string keys to
/// chain ids.
fn deserialize_timeouts<'de, D>(deserializer: D) -> Result<HashMap<u64, u64>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw: HashMap<String, u64> = HashMap::deserialize(deserializer)?;
	raw.into_iter()
		.map(|(key, value)| {
			key.parse::<u64>()
				.map(|chain_id| (chain_id, value))
				.map_err(|_| serde::de::Error::custom(format!("invalid chain id: {}", key)))
		})
		.collect()
}

impl Config {
	/// Loads and validates configuration from a TOML file.
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		Self::from_str(&content)
	}

	/// Parses and validates configuration from a TOML string.
	#[allow(clippy::should_implement_trait)]
	pub fn from_str(content: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(content)?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.signer.chain_id == 0 {
			return Err(ConfigError::Validation(
				"signer.chain_id is required and must be non-zero".to_string(),
			));
		}
		if self.signer.request_count_limit == 0 {
			return Err(ConfigError::Validation(
				"signer.request_count_limit must be positive".to_string(),
			));
		}
		if self.signer.check_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"signer.check_interval_seconds must be positive".to_string(),
			));
		}
		if self.ledger.rpc_url.is_empty() {
			return Err(ConfigError::Validation(
				"ledger.rpc_url must not be empty".to_string(),
			));
		}
		Ok(())
	}
}
