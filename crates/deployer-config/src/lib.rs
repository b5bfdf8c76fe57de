//! Configuration module for the VRF consumer deployer.
//!
//! Configuration is read from TOML. It names the contract to deploy and its
//! compiled artifact, the deployer account, the deployment-record registry,
//! one `[networks.<chain_id>]` table per target chain, and the explorer
//! verification inputs.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["networks.toml", "secrets.toml"]` to include other files
//! - Each top-level section must be unique across all files
//!
//! `${VAR}` and `${VAR:-default}` are replaced with environment variables
//! before parsing.

#[cfg(feature = "testing")]
pub mod builders;
mod loader;

use alloy_primitives::U256;
use deployer_types::{networks::deserialize_networks, NetworksConfig, SecretString};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub use loader::ConfigLoader;

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
		// Keep the message, drop the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the deployer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// What to deploy and how long to wait for it.
	pub deployer: DeployerConfig,
	/// The deployer account.
	pub account: AccountConfig,
	/// Deployment-record registry used to resolve named contracts.
	#[serde(default)]
	pub registry: RegistryConfig,
	/// Per-chain profiles, keyed by chain ID.
	#[serde(deserialize_with = "deserialize_networks")]
	pub networks: NetworksConfig,
	/// Explorer verification inputs. Verification is skipped when absent.
	pub verification: Option<VerificationConfig>,
}

/// Configuration of the deployment unit.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeployerConfig {
	/// Logical name of the contract, used for records and logs.
	pub contract: String,
	/// Path to the compiled artifact holding the creation bytecode.
	pub artifact_path: PathBuf,
	/// Tags this deployment unit answers to. Defaults to `["all", <contract>]`.
	#[serde(default)]
	pub tags: Vec<String>,
	/// Chain IDs treated as ephemeral local simulations.
	#[serde(default = "default_ephemeral_chain_ids")]
	pub ephemeral_chain_ids: Vec<u64>,
	/// Confirmations to wait for on persistent public chains.
	#[serde(default = "default_verification_block_confirmations")]
	pub verification_block_confirmations: u64,
	/// Upper bound on any confirmation wait.
	#[serde(default = "default_confirmation_timeout_seconds")]
	pub confirmation_timeout_seconds: u64,
	/// Delay between receipt polls.
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	/// Logical name of the mock coordinator on ephemeral chains.
	#[serde(default = "default_mock_coordinator")]
	pub mock_coordinator: String,
	/// Amount, in juels, each fresh ephemeral subscription is funded with.
	#[serde(
		default = "default_mock_funding_amount",
		deserialize_with = "deserialize_decimal_u256"
	)]
	pub mock_funding_amount: U256,
}

impl DeployerConfig {
	/// Tags the deployment unit answers to, falling back to the defaults.
	pub fn effective_tags(&self) -> Vec<String> {
		if self.tags.is_empty() {
			vec!["all".to_string(), self.contract.to_lowercase()]
		} else {
			self.tags.clone()
		}
	}
}

fn default_ephemeral_chain_ids() -> Vec<u64> {
	vec![31337]
}

fn default_verification_block_confirmations() -> u64 {
	6
}

fn default_confirmation_timeout_seconds() -> u64 {
	600
}

fn default_poll_interval_ms() -> u64 {
	2000
}

fn default_mock_coordinator() -> String {
	"VRFCoordinatorV2Mock".to_string()
}

fn default_mock_funding_amount() -> U256 {
	// 1 LINK
	U256::from(1_000_000_000_000_000_000u64)
}

fn deserialize_decimal_u256<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;
	U256::from_str_radix(raw.trim(), 10)
		.map_err(|e| serde::de::Error::custom(format!("Invalid amount '{}': {}", raw, e)))
}

/// Configuration for the deployer account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Hex-encoded private key of the deployer.
	pub private_key: SecretString,
}

/// Configuration for the deployment-record registry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of registry implementation names to their configurations.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		let mut file = toml::map::Map::new();
		file.insert(
			"deployments_dir".to_string(),
			toml::Value::String("deployments".to_string()),
		);
		let mut implementations = HashMap::new();
		implementations.insert("file".to_string(), toml::Value::Table(file));

		Self {
			primary: "file".to_string(),
			implementations,
		}
	}
}

/// Inputs for explorer source verification.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerificationConfig {
	/// Standard-JSON compiler input (e.g. a Hardhat build-info file).
	pub source_path: PathBuf,
	/// Fully qualified contract name, `path/To.sol:Name`.
	pub contract_name: String,
	/// Compiler version string as the explorer expects it.
	pub compiler_version: String,
	/// How many times to poll the verification status.
	#[serde(default = "default_max_status_checks")]
	pub max_status_checks: u32,
	/// Delay between status polls.
	#[serde(default = "default_status_poll_seconds")]
	pub status_poll_seconds: u64,
}

fn default_max_status_checks() -> u32 {
	10
}

fn default_status_poll_seconds() -> u64 {
	5
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable and
/// supports defaults with `${VAR_NAME:-default_value}`. Input is limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path.display())))?;

		let mut loader = ConfigLoader::new(base_dir);
		loader.load_config(file_name).await
	}

	/// Validates the configuration.
	///
	/// Checks the deployment unit settings, every network profile, and that
	/// the registry primary names a configured implementation.
	fn validate(&self) -> Result<(), ConfigError> {
		let deployer = &self.deployer;
		if deployer.contract.trim().is_empty() {
			return Err(ConfigError::Validation("Contract name cannot be empty".into()));
		}
		if deployer.artifact_path.as_os_str().is_empty() {
			return Err(ConfigError::Validation("artifact_path cannot be empty".into()));
		}
		if deployer.verification_block_confirmations == 0
			|| deployer.verification_block_confirmations > 100
		{
			return Err(ConfigError::Validation(
				"verification_block_confirmations must be between 1 and 100".into(),
			));
		}
		if deployer.confirmation_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"confirmation_timeout_seconds must be greater than 0".into(),
			));
		}
		if deployer.poll_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"poll_interval_ms must be greater than 0".into(),
			));
		}
		if deployer.mock_coordinator.trim().is_empty() {
			return Err(ConfigError::Validation(
				"mock_coordinator cannot be empty".into(),
			));
		}

		if self.account.private_key.is_empty() {
			return Err(ConfigError::Validation(
				"Account private_key cannot be empty".into(),
			));
		}

		self.validate_networks()?;

		if !self.registry.implementations.contains_key(&self.registry.primary) {
			return Err(ConfigError::Validation(format!(
				"Primary registry '{}' not found in implementations",
				self.registry.primary
			)));
		}

		if let Some(verification) = &self.verification {
			if verification.contract_name.split_once(':').is_none() {
				return Err(ConfigError::Validation(format!(
					"verification.contract_name '{}' must be fully qualified (path:Name)",
					verification.contract_name
				)));
			}
			if verification.compiler_version.trim().is_empty() {
				return Err(ConfigError::Validation(
					"verification.compiler_version cannot be empty".into(),
				));
			}
			if verification.max_status_checks == 0 {
				return Err(ConfigError::Validation(
					"verification.max_status_checks must be at least 1".into(),
				));
			}
		}

		Ok(())
	}

	/// Validates the per-chain profiles.
	///
	/// Presence of `vrf_coordinator` and `subscription_id` is not enforced
	/// here: a public network without them is a provisioning failure of the
	/// run that targets it, not of every run.
	fn validate_networks(&self) -> Result<(), ConfigError> {
		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"Networks configuration cannot be empty".into(),
			));
		}

		let mut names = HashSet::new();
		for (chain_id, network) in &self.networks {
			if network.name.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network {} must have a name",
					chain_id
				)));
			}
			if !names.insert(network.name.as_str()) {
				return Err(ConfigError::Validation(format!(
					"Network name '{}' is used by more than one chain",
					network.name
				)));
			}
			if network.rpc_url.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network {} must have rpc_url",
					chain_id
				)));
			}
			if network.callback_gas_limit == 0 {
				return Err(ConfigError::Validation(format!(
					"Network {} callback_gas_limit must be greater than 0",
					chain_id
				)));
			}
			if let Some(subscription_id) = &network.subscription_id {
				if subscription_id.parse::<u64>().is_err() {
					return Err(ConfigError::Validation(format!(
						"Network {} subscription_id '{}' is not a valid uint64",
						chain_id, subscription_id
					)));
				}
			}
			if network.required_confirmations == Some(0) {
				return Err(ConfigError::Validation(format!(
					"Network {} required_confirmations must be at least 1",
					chain_id
				)));
			}
			if let Some(explorer) = &network.explorer {
				if explorer.api_url.trim().is_empty() {
					return Err(ConfigError::Validation(format!(
						"Network {} explorer.api_url cannot be empty",
						chain_id
					)));
				}
			}
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
