//! Common types module for the parallel signer system.
//!
//! This module defines the core data types shared by all signer components:
//! queued requests, packed transaction attempts, fee schemes and the ledger
//! types observed while tracking confirmations.

/// Ledger-facing types: transaction hashes and receipts.
pub mod delivery;
/// Request types for submission and storage.
pub mod request;
/// Secure string type for private keys and other sensitive values.
pub mod secret_string;
/// Packed transaction attempts, fee schemes and assembly inputs.
pub mod transaction;

pub use delivery::*;
pub use request::*;
pub use secret_string::SecretString;
pub use transaction::*;
