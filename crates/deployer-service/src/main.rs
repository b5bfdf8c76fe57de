//! Entry point of the `deployer` binary.
//!
//! Deploys the configured VRF consumer contract to one network per
//! invocation and prints the run report as JSON on stdout. The process exits
//! with status 1 when the run fails.

use clap::Parser;
use deployer_config::Config;
use deployer_core::NetworkSelector;
use std::path::PathBuf;

mod factory_registry;

/// Command-line arguments for the deployer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/deployer.toml")]
	config: PathBuf,

	/// Target network, by chain id (31337) or name (goerli)
	#[arg(short, long, env = "DEPLOY_NETWORK")]
	network: NetworkSelector,

	/// Only run when the deployment carries one of these tags
	#[arg(short, long, value_delimiter = ',')]
	tags: Vec<String>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	// RUST_LOG wins over --log-level
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	tracing::info!("Started deployer");

	let config = Config::from_file(&args.config).await?;
	tracing::info!(
		contract = %config.deployer.contract,
		networks = config.networks.len(),
		"Loaded configuration"
	);

	let engine = factory_registry::build_engine_from_config(config).await?;
	let report = engine.run(&args.network, &args.tags).await;

	println!("{}", report.to_json()?);

	if report.is_failure() {
		tracing::error!("Deployment failed");
		std::process::exit(1);
	}

	tracing::info!(status = ?report.status, "Stopped deployer");
	Ok(())
}
