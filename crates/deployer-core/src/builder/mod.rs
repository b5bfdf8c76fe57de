//! Wiring of a `DeploymentEngine` from configuration and factories.
//!
//! The deployment-record registry is chosen by configuration like any
//! pluggable backend. The account, chain provider, randomness service and
//! explorer each have a single implementation whose table is derived from the
//! `[deployer]`, `[account]` and `[verification]` sections.

use crate::engine::DeploymentEngine;
use deployer_account::{AccountFactory, AccountService};
use deployer_config::Config;
use deployer_delivery::{DeliveryFactory, DeliveryInterface, DeliveryService};
use deployer_explorer::{ExplorerFactory, ExplorerService};
use deployer_storage::{StorageFactory, StorageService};
use deployer_vrf::{RandomnessFactory, RandomnessService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub const ACCOUNT_IMPLEMENTATION: &str = "local";
pub const DELIVERY_IMPLEMENTATION: &str = "evm_alloy";
pub const RANDOMNESS_IMPLEMENTATION: &str = "vrf_v2_mock";
pub const EXPLORER_IMPLEMENTATION: &str = "etherscan";

/// Highest poll interval the provider accepts.
const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Errors raised while assembling the engine.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factories for every pluggable concern, keyed by implementation name.
#[derive(Default)]
pub struct DeployerFactories {
	pub storage_factories: HashMap<String, StorageFactory>,
	pub account_factories: HashMap<String, AccountFactory>,
	pub delivery_factories: HashMap<String, DeliveryFactory>,
	pub randomness_factories: HashMap<String, RandomnessFactory>,
	pub explorer_factories: HashMap<String, ExplorerFactory>,
}

fn table(entries: Vec<(&str, toml::Value)>) -> toml::Value {
	toml::Value::Table(
		entries
			.into_iter()
			.map(|(key, value)| (key.to_string(), value))
			.collect(),
	)
}

fn factory<'a, F>(
	factories: &'a HashMap<String, F>,
	component: &str,
	name: &str,
) -> Result<&'a F, BuilderError> {
	factories
		.get(name)
		.ok_or_else(|| BuilderError::MissingComponent(format!("{} implementation '{}'", component, name)))
}

fn loaded(component: &'static str, name: &str) {
	tracing::info!(component, implementation = %name, "Loaded");
}

fn failed(component: &'static str, name: &str, error: impl std::fmt::Display) -> BuilderError {
	tracing::error!(component, implementation = %name, error = %error, "Failed to create implementation");
	BuilderError::Config(format!(
		"Failed to create {} implementation '{}': {}",
		component, name, error
	))
}

/// Builds a `DeploymentEngine` from a validated configuration.
pub struct DeployerBuilder {
	config: Config,
}

impl DeployerBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub async fn build(self, factories: DeployerFactories) -> Result<DeploymentEngine, BuilderError> {
		let config = self.config;

		let primary_storage = config.registry.primary.as_str();
		let storage_config = config
			.registry
			.implementations
			.get(primary_storage)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Registry implementation '{}' is not configured",
					primary_storage
				))
			})?;
		let storage_backend = factory(&factories.storage_factories, "storage", primary_storage)?(
			storage_config,
		)
		.map_err(|e| failed("storage", primary_storage, e))?;
		loaded("storage", primary_storage);
		let storage = Arc::new(StorageService::new(storage_backend));

		let account_config = config.account.private_key.with_exposed(|key| {
			table(vec![("private_key", toml::Value::String(key.to_string()))])
		});
		let account = factory(&factories.account_factories, "account", ACCOUNT_IMPLEMENTATION)?(
			&account_config,
		)
		.map_err(|e| failed("account", ACCOUNT_IMPLEMENTATION, e))?;
		loaded("account", ACCOUNT_IMPLEMENTATION);
		let account = AccountService::new(account);
		let account_address = account
			.get_address()
			.await
			.map_err(|e| failed("account", ACCOUNT_IMPLEMENTATION, e))?;
		tracing::info!(address = %account_address, "Deployer account");

		let mut network_ids: Vec<u64> = config.networks.keys().copied().collect();
		network_ids.sort_unstable();
		let delivery_config = table(vec![
			(
				"network_ids",
				toml::Value::Array(
					network_ids
						.iter()
						.map(|id| toml::Value::Integer(*id as i64))
						.collect(),
				),
			),
			(
				"poll_interval_ms",
				toml::Value::Integer(config.deployer.poll_interval_ms.min(MAX_POLL_INTERVAL_MS) as i64),
			),
		]);
		let provider = factory(&factories.delivery_factories, "delivery", DELIVERY_IMPLEMENTATION)?(
			&delivery_config,
			&config.networks,
			&config.account.private_key,
		)
		.map_err(|e| failed("delivery", DELIVERY_IMPLEMENTATION, e))?;
		loaded("delivery", DELIVERY_IMPLEMENTATION);
		let provider: Arc<dyn DeliveryInterface> = Arc::from(provider);
		let delivery = Arc::new(DeliveryService::new(
			network_ids
				.iter()
				.map(|id| (*id, provider.clone()))
				.collect(),
		));

		let randomness_config = table(vec![
			("confirmations", toml::Value::Integer(1)),
			(
				"timeout_seconds",
				toml::Value::Integer(config.deployer.confirmation_timeout_seconds as i64),
			),
		]);
		let randomness = factory(
			&factories.randomness_factories,
			"randomness",
			RANDOMNESS_IMPLEMENTATION,
		)?(&randomness_config, delivery.clone())
		.map_err(|e| failed("randomness", RANDOMNESS_IMPLEMENTATION, e))?;
		loaded("randomness", RANDOMNESS_IMPLEMENTATION);
		let randomness = Arc::new(RandomnessService::new(randomness));

		let explorer_config = match &config.verification {
			Some(verification) => table(vec![
				(
					"max_status_checks",
					toml::Value::Integer(verification.max_status_checks as i64),
				),
				(
					"status_poll_seconds",
					toml::Value::Integer(verification.status_poll_seconds as i64),
				),
			]),
			None => table(vec![]),
		};
		let explorer = factory(&factories.explorer_factories, "explorer", EXPLORER_IMPLEMENTATION)?(
			&explorer_config,
		)
		.map_err(|e| failed("explorer", EXPLORER_IMPLEMENTATION, e))?;
		loaded("explorer", EXPLORER_IMPLEMENTATION);
		let explorer = Arc::new(ExplorerService::new(explorer));

		Ok(DeploymentEngine::new(
			config,
			storage,
			delivery,
			randomness,
			explorer,
			account_address,
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use deployer_config::builders::ConfigBuilder;
	use deployer_config::RegistryConfig;

	fn all_factories() -> DeployerFactories {
		fn collect<F>(pairs: Vec<(&'static str, F)>) -> HashMap<String, F> {
			pairs
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect()
		}

		DeployerFactories {
			storage_factories: collect(deployer_storage::get_all_implementations()),
			account_factories: collect(deployer_account::get_all_implementations()),
			delivery_factories: collect(deployer_delivery::get_all_implementations()),
			randomness_factories: collect(deployer_vrf::get_all_implementations()),
			explorer_factories: collect(deployer_explorer::get_all_implementations()),
		}
	}

	fn memory_registry() -> RegistryConfig {
		RegistryConfig {
			primary: "memory".into(),
			implementations: HashMap::from([(
				"memory".to_string(),
				toml::Value::Table(Default::default()),
			)]),
		}
	}

	#[test]
	fn test_all_factories_are_registered() {
		let factories = all_factories();
		assert!(factories.storage_factories.contains_key("file"));
		assert!(factories.storage_factories.contains_key("memory"));
		assert!(factories.account_factories.contains_key(ACCOUNT_IMPLEMENTATION));
		assert!(factories.delivery_factories.contains_key(DELIVERY_IMPLEMENTATION));
		assert!(factories.randomness_factories.contains_key(RANDOMNESS_IMPLEMENTATION));
		assert!(factories.explorer_factories.contains_key(EXPLORER_IMPLEMENTATION));
	}

	#[tokio::test]
	async fn test_builds_engine_from_config() {
		let config = ConfigBuilder::new().registry(memory_registry()).build();
		let engine = DeployerBuilder::new(config)
			.build(all_factories())
			.await;
		assert!(engine.is_ok());
	}

	#[tokio::test]
	async fn test_missing_factory_is_reported() {
		let config = ConfigBuilder::new().registry(memory_registry()).build();
		let mut factories = all_factories();
		factories.explorer_factories.clear();

		let err = DeployerBuilder::new(config)
			.build(factories)
			.await
			.err()
			.unwrap();
		assert!(matches!(err, BuilderError::MissingComponent(ref m) if m.contains("etherscan")));
	}

	#[tokio::test]
	async fn test_unconfigured_registry_is_rejected() {
		let mut registry = memory_registry();
		registry.primary = "file".into();
		let config = ConfigBuilder::new().registry(registry).build();

		let err = DeployerBuilder::new(config)
			.build(all_factories())
			.await
			.err()
			.unwrap();
		assert!(matches!(err, BuilderError::Config(_)));
	}
}
