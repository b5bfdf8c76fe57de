//! Configuration builder for tests and local development.

use crate::{AccountConfig, Config, DeployerConfig, RegistryConfig, VerificationConfig};
use alloy_primitives::{address, b256, U256};
use deployer_types::{ExplorerConfig, NetworkConfig, SecretString};
use std::collections::HashMap;
use std::path::PathBuf;

/// First default Hardhat/Anvil account.
const TEST_PRIVATE_KEY: &str =
	"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Fluent builder for [`Config`].
///
/// Starts with a single localhost network on chain 31337 and no verification
/// settings.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	contract: String,
	artifact_path: PathBuf,
	tags: Vec<String>,
	ephemeral_chain_ids: Vec<u64>,
	verification_block_confirmations: u64,
	confirmation_timeout_seconds: u64,
	poll_interval_ms: u64,
	networks: HashMap<u64, NetworkConfig>,
	registry: RegistryConfig,
	verification: Option<VerificationConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		let mut networks = HashMap::new();
		networks.insert(31337, Self::localhost());

		Self {
			contract: "Warrior721".to_string(),
			artifact_path: PathBuf::from("artifacts/Warrior721.json"),
			tags: Vec::new(),
			ephemeral_chain_ids: vec![31337],
			verification_block_confirmations: 6,
			confirmation_timeout_seconds: 5,
			poll_interval_ms: 10,
			networks,
			registry: RegistryConfig::default(),
			verification: None,
		}
	}

	/// The local development network.
	pub fn localhost() -> NetworkConfig {
		NetworkConfig {
			name: "localhost".to_string(),
			rpc_url: "http://127.0.0.1:8545".to_string(),
			vrf_coordinator: None,
			subscription_id: None,
			gas_lane: b256!("d89b2bf150e3b9e13446986e571fb9cab24b13cea0a43ea20a6049a85cc807cc"),
			callback_gas_limit: 500_000,
			fight_fee: U256::from(10_000_000_000_000_000u64),
			mint_fee: U256::from(20_000_000_000_000_000u64),
			required_confirmations: None,
			explorer: None,
		}
	}

	/// A public test network with a live coordinator and subscription.
	pub fn goerli(api_key: Option<&str>) -> NetworkConfig {
		NetworkConfig {
			name: "goerli".to_string(),
			rpc_url: "https://goerli.example".to_string(),
			vrf_coordinator: Some(address!("2Ca8E0C643bDe4C2E08ab1fA0da3401AdAD7734D")),
			subscription_id: Some("5794".to_string()),
			gas_lane: b256!("79d3d8832d904592c0bf9818b621522c988bb8b0c05cdc3b15aea1b6e8db0c15"),
			callback_gas_limit: 500_000,
			fight_fee: U256::from(10_000_000_000_000_000u64),
			mint_fee: U256::from(20_000_000_000_000_000u64),
			required_confirmations: None,
			explorer: Some(ExplorerConfig {
				api_url: "https://api-goerli.etherscan.io/api".to_string(),
				api_key: api_key.map(SecretString::from),
			}),
		}
	}

	pub fn contract(mut self, contract: impl Into<String>) -> Self {
		self.contract = contract.into();
		self
	}

	pub fn artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.artifact_path = path.into();
		self
	}

	pub fn tags(mut self, tags: Vec<String>) -> Self {
		self.tags = tags;
		self
	}

	pub fn ephemeral_chain_ids(mut self, ids: Vec<u64>) -> Self {
		self.ephemeral_chain_ids = ids;
		self
	}

	pub fn verification_block_confirmations(mut self, confirmations: u64) -> Self {
		self.verification_block_confirmations = confirmations;
		self
	}

	pub fn confirmation_timeout_seconds(mut self, seconds: u64) -> Self {
		self.confirmation_timeout_seconds = seconds;
		self
	}

	/// Adds or replaces the network for `chain_id`.
	pub fn network(mut self, chain_id: u64, network: NetworkConfig) -> Self {
		self.networks.insert(chain_id, network);
		self
	}

	pub fn registry(mut self, registry: RegistryConfig) -> Self {
		self.registry = registry;
		self
	}

	pub fn verification(mut self, verification: Option<VerificationConfig>) -> Self {
		self.verification = verification;
		self
	}

	pub fn build(self) -> Config {
		Config {
			deployer: DeployerConfig {
				contract: self.contract,
				artifact_path: self.artifact_path,
				tags: self.tags,
				ephemeral_chain_ids: self.ephemeral_chain_ids,
				verification_block_confirmations: self.verification_block_confirmations,
				confirmation_timeout_seconds: self.confirmation_timeout_seconds,
				poll_interval_ms: self.poll_interval_ms,
				mock_coordinator: "VRFCoordinatorV2Mock".to_string(),
				mock_funding_amount: U256::from(1_000_000_000_000_000_000u64),
			},
			account: AccountConfig {
				private_key: SecretString::from(TEST_PRIVATE_KEY),
			},
			registry: self.registry,
			networks: self.networks,
			verification: self.verification,
		}
	}
}
