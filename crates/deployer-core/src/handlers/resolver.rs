//! Environment resolution.
//!
//! Turns a chain identifier into the `ChainProfile` for the run and decides
//! whether the chain is a disposable local simulation or a public network.

use crate::DeploymentError;
use deployer_config::Config;
use deployer_types::{ChainProfile, EnvironmentClass, NetworkConfig, NetworksConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Resolution knobs that are not per network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSettings {
	pub ephemeral_chain_ids: HashSet<u64>,
	/// Depth required on public chains without a per-network override.
	pub verification_block_confirmations: u64,
}

impl Default for ResolverSettings {
	fn default() -> Self {
		Self {
			ephemeral_chain_ids: HashSet::from([31337]),
			verification_block_confirmations: 6,
		}
	}
}

impl From<&Config> for ResolverSettings {
	fn from(config: &Config) -> Self {
		Self {
			ephemeral_chain_ids: config.deployer.ephemeral_chain_ids.iter().copied().collect(),
			verification_block_confirmations: config.deployer.verification_block_confirmations,
		}
	}
}

/// Maps chain identifiers to chain profiles.
pub struct EnvironmentResolver {
	networks: NetworksConfig,
	settings: ResolverSettings,
}

impl EnvironmentResolver {
	pub fn new(networks: NetworksConfig, settings: ResolverSettings) -> Self {
		Self { networks, settings }
	}

	/// Classifies a chain. Anything not on the ephemeral allow-list is public.
	pub fn classify(&self, chain_id: u64) -> EnvironmentClass {
		if self.settings.ephemeral_chain_ids.contains(&chain_id) {
			EnvironmentClass::EphemeralLocal
		} else {
			EnvironmentClass::PersistentPublic
		}
	}

	pub fn resolve(&self, chain_id: u64) -> Result<ChainProfile, DeploymentError> {
		let network = self
			.networks
			.get(&chain_id)
			.ok_or_else(|| DeploymentError::UnknownChain(chain_id.to_string()))?;
		Ok(self.build_profile(chain_id, network))
	}

	/// Resolves a network by its configured name, e.g. `goerli`.
	pub fn resolve_by_name(&self, name: &str) -> Result<ChainProfile, DeploymentError> {
		let (chain_id, network) = self
			.networks
			.iter()
			.find(|(_, network)| network.name == name)
			.ok_or_else(|| DeploymentError::UnknownChain(name.to_string()))?;
		Ok(self.build_profile(*chain_id, network))
	}

	fn build_profile(&self, chain_id: u64, network: &NetworkConfig) -> ChainProfile {
		let class = self.classify(chain_id);

		let (randomness_service_address, existing_subscription_id, required_confirmations) =
			match class {
				EnvironmentClass::EphemeralLocal => {
					if network.vrf_coordinator.is_some() || network.subscription_id.is_some() {
						tracing::debug!(
							chain_id,
							network = %network.name,
							"Ignoring configured coordinator and subscription on local chain"
						);
					}
					(None, None, 1)
				},
				EnvironmentClass::PersistentPublic => (
					network.vrf_coordinator,
					network.subscription_id.clone(),
					network
						.required_confirmations
						.unwrap_or(self.settings.verification_block_confirmations),
				),
			};

		ChainProfile {
			chain_id,
			display_name: network.name.clone(),
			rpc_url: network.rpc_url.clone(),
			randomness_service_address,
			existing_subscription_id,
			gas_price_tier_id: network.gas_lane,
			callback_gas_limit: network.callback_gas_limit,
			fight_fee: network.fight_fee,
			mint_fee: network.mint_fee,
			required_confirmations,
			explorer: network.explorer.clone(),
		}
	}
}
