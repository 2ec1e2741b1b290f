//! Main entry point for the parallel signer service.
//!
//! This binary wires the packing engine to its collaborators: the request
//! store, the signing account, the ledger connection and the batch encoder.
//! It then runs the periodic repack and confirmation cycles until
//! interrupted.

use clap::Parser;
use signer_account::implementations::local::LocalAccount;
use signer_account::AccountService;
use signer_config::Config;
use signer_core::ParallelSigner;
use signer_encoder::implementations::multicall::{MulticallEncoder, MulticallEncoderConfig};
use signer_ledger::implementations::evm::alloy::AlloyLedger;
use signer_ledger::LedgerService;
use signer_storage::implementations::memory::MemoryStore;
use signer_storage::RequestStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line arguments for the signer service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the signer service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the packing engine with all collaborators
/// 5. Runs the periodic cycles until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(args.log_level.to_string()));

	fmt().with_env_filter(env_filter).with_target(true).init();

	// Load configuration
	let config = Config::from_file(&args.config)?;
	tracing::info!(chain_id = config.signer.chain_id, "Loaded configuration");

	let signer = build_signer(&config).await?;
	let signer = Arc::new(signer);
	signer.start();
	tracing::info!(chain_id = signer.chain_id(), address = %signer.address(), "Started signer");

	tokio::signal::ctrl_c().await?;
	signer.shutdown();
	tracing::info!("Stopped signer");

	Ok(())
}

/// Builds the packing engine from configuration.
async fn build_signer(config: &Config) -> Result<ParallelSigner, Box<dyn std::error::Error>> {
	let store: Arc<dyn RequestStore> = match config.storage.backend.as_str() {
		"memory" => Arc::new(MemoryStore::new()),
		other => return Err(format!("unknown storage backend '{}'", other).into()),
	};
	tracing::info!(component = "storage", implementation = %config.storage.backend, "Loaded");

	let account = Arc::new(AccountService::new(Box::new(LocalAccount::new(
		&config.account.private_key,
	)?)));
	tracing::info!(component = "account", implementation = "local", "Loaded");

	let ledger = Arc::new(LedgerService::new(Box::new(AlloyLedger::new(
		&config.ledger.rpc_url,
	)?)));
	tracing::info!(component = "ledger", implementation = "evm_alloy", "Loaded");

	let encoder_config: MulticallEncoderConfig = config.encoder.clone().try_into()?;
	let encoder = Arc::new(MulticallEncoder::new(encoder_config)?);
	tracing::info!(component = "encoder", implementation = "multicall", "Loaded");

	let signer = ParallelSigner::new(
		config.signer.clone(),
		store,
		account,
		ledger,
		encoder,
	)
	.await?;

	Ok(signer)
}
