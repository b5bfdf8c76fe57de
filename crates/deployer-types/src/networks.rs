//! Network configuration types for multi-chain deployments.
//!
//! This module defines the raw, per-network configuration read from the
//! `[networks.<chain_id>]` tables: where to reach the chain, the randomness
//! coordinator parameters for the contract's constructor, and the explorer
//! used for source verification.

use crate::SecretString;
use alloy_primitives::{utils::parse_ether, Address, B256, U256};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Block explorer settings for a network.
///
/// The explorer is only contacted when `api_key` holds a non-empty credential.
/// Configuration files usually bind it with `"${ETHERSCAN_API_KEY:-}"` so a
/// missing environment variable resolves to an empty (absent) key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExplorerConfig {
	/// Etherscan-compatible API endpoint, e.g. `https://api-goerli.etherscan.io/api`.
	pub api_url: String,
	/// API credential for the explorer.
	#[serde(default)]
	pub api_key: Option<SecretString>,
}

impl ExplorerConfig {
	/// Returns the credential if one is configured and non-empty.
	pub fn credential(&self) -> Option<&SecretString> {
		self.api_key.as_ref().filter(|key| !key.is_empty())
	}
}

/// Configuration for a single target network.
///
/// # Fields
///
/// * `name` - Network name used for logs and deployment records (e.g. "goerli")
/// * `rpc_url` - The HTTP(S) RPC endpoint
/// * `vrf_coordinator` - Address of the live VRF coordinator (public networks only)
/// * `subscription_id` - Pre-existing VRF subscription (public networks only)
/// * `gas_lane` - Key hash selecting the coordinator's gas-price tier
/// * `callback_gas_limit` - Gas limit for the randomness fulfillment callback
/// * `fight_fee` / `mint_fee` - Game fees, written in ether and held in wei
/// * `required_confirmations` - Optional override of the public-chain confirmation count
/// * `explorer` - Optional explorer verification settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	pub name: String,
	pub rpc_url: String,
	#[serde(default)]
	pub vrf_coordinator: Option<Address>,
	#[serde(default)]
	pub subscription_id: Option<String>,
	pub gas_lane: B256,
	pub callback_gas_limit: u32,
	#[serde(deserialize_with = "deserialize_ether")]
	pub fight_fee: U256,
	#[serde(deserialize_with = "deserialize_ether")]
	pub mint_fee: U256,
	#[serde(default)]
	pub required_confirmations: Option<u64>,
	#[serde(default)]
	pub explorer: Option<ExplorerConfig>,
}

/// Networks configuration mapping chain IDs to their configurations.
pub type NetworksConfig = HashMap<u64, NetworkConfig>;

/// Deserializes the `[networks]` table.
///
/// TOML table keys are always strings, so chain IDs arrive as `"31337"` and
/// are parsed into `u64` keys here.
pub fn deserialize_networks<'de, D>(deserializer: D) -> Result<NetworksConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, NetworkConfig> = HashMap::deserialize(deserializer)?;
	let mut result = HashMap::with_capacity(string_map.len());

	for (key, value) in string_map {
		let chain_id = key
			.parse::<u64>()
			.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))?;
		result.insert(chain_id, value);
	}

	Ok(result)
}

/// Parses a decimal ether amount ("0.01") into wei.
fn deserialize_ether<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;
	parse_ether(raw.trim())
		.map_err(|e| serde::de::Error::custom(format!("Invalid ether amount '{}': {}", raw, e)))
}
