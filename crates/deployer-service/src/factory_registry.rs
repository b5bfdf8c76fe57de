//! Registry of every implementation the binary ships with.

use deployer_account::AccountFactory;
use deployer_config::Config;
use deployer_core::{DeployerBuilder, DeployerFactories, DeploymentEngine};
use deployer_delivery::DeliveryFactory;
use deployer_explorer::ExplorerFactory;
use deployer_storage::StorageFactory;
use deployer_vrf::RandomnessFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Implementation factories by concern and name.
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub account: HashMap<String, AccountFactory>,
	pub delivery: HashMap<String, DeliveryFactory>,
	pub randomness: HashMap<String, RandomnessFactory>,
	pub explorer: HashMap<String, ExplorerFactory>,
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

fn register<F>(kind: &str, pairs: Vec<(&'static str, F)>) -> HashMap<String, F> {
	pairs
		.into_iter()
		.map(|(name, factory)| {
			tracing::debug!("Registering {} implementation: {}", kind, name);
			(name.to_string(), factory)
		})
		.collect()
}

pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| FactoryRegistry {
		storage: register("storage", deployer_storage::get_all_implementations()),
		account: register("account", deployer_account::get_all_implementations()),
		delivery: register("delivery", deployer_delivery::get_all_implementations()),
		randomness: register("randomness", deployer_vrf::get_all_implementations()),
		explorer: register("explorer", deployer_explorer::get_all_implementations()),
	})
}

/// Builds the engine, rejecting registry backends the binary does not know.
pub async fn build_engine_from_config(
	config: Config,
) -> Result<DeploymentEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	for name in config.registry.implementations.keys() {
		if !registry.storage.contains_key(name) {
			let mut available: Vec<_> = registry.storage.keys().cloned().collect();
			available.sort();
			return Err(format!(
				"Unknown registry implementation '{}'. Available: [{}]",
				name,
				available.join(", ")
			)
			.into());
		}
	}

	let factories = DeployerFactories {
		storage_factories: registry.storage.clone(),
		account_factories: registry.account.clone(),
		delivery_factories: registry.delivery.clone(),
		randomness_factories: registry.randomness.clone(),
		explorer_factories: registry.explorer.clone(),
	};

	Ok(DeployerBuilder::new(config).build(factories).await?)
}
