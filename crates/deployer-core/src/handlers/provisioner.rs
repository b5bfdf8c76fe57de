//! Subscription provisioning.
//!
//! Local simulations get a brand-new subscription on the mock coordinator,
//! funded from the test balance. Public networks reuse the subscription named
//! in configuration and are never written to.

use super::randomness_failure;
use crate::DeploymentError;
use deployer_delivery::DeliveryService;
use deployer_storage::StorageService;
use deployer_types::{Address, ChainProfile, EnvironmentClass, Subscription, U256};
use deployer_vrf::RandomnessService;
use std::sync::Arc;
use tracing::instrument;

/// Creates or references the randomness subscription for a run.
pub struct SubscriptionProvisioner {
	storage: Arc<StorageService>,
	delivery: Arc<DeliveryService>,
	randomness: Arc<RandomnessService>,
	/// Deployment record name of the mock coordinator.
	mock_coordinator: String,
	funding_amount: U256,
}

impl SubscriptionProvisioner {
	pub fn new(
		storage: Arc<StorageService>,
		delivery: Arc<DeliveryService>,
		randomness: Arc<RandomnessService>,
		mock_coordinator: String,
		funding_amount: U256,
	) -> Self {
		Self {
			storage,
			delivery,
			randomness,
			mock_coordinator,
			funding_amount,
		}
	}

	#[instrument(skip_all, fields(chain_id = profile.chain_id, environment = %class))]
	pub async fn provision(
		&self,
		profile: &ChainProfile,
		class: EnvironmentClass,
		owner: Address,
	) -> Result<Subscription, DeploymentError> {
		match class {
			EnvironmentClass::EphemeralLocal => self.create_funded(profile, owner).await,
			EnvironmentClass::PersistentPublic => reuse_configured(profile, owner),
		}
	}

	/// Finds the mock coordinator deployed on the local chain.
	async fn locate_mock(&self, profile: &ChainProfile) -> Result<Address, DeploymentError> {
		let record = self
			.storage
			.find_deployment(&profile.display_name, &self.mock_coordinator)
			.await
			.map_err(|e| {
				DeploymentError::MockServiceUnavailable(format!(
					"cannot read deployment record of {}: {}",
					self.mock_coordinator, e
				))
			})?
			.ok_or_else(|| {
				DeploymentError::MockServiceUnavailable(format!(
					"{} is not deployed on {}",
					self.mock_coordinator, profile.display_name
				))
			})?;

		let deployed = self
			.delivery
			.has_code(record.address, profile.chain_id)
			.await
			.map_err(|e| DeploymentError::Provider(e.to_string()))?;
		if !deployed {
			return Err(DeploymentError::MockServiceUnavailable(format!(
				"no code at recorded {} address {}",
				self.mock_coordinator, record.address
			)));
		}
		Ok(record.address)
	}

	async fn create_funded(
		&self,
		profile: &ChainProfile,
		owner: Address,
	) -> Result<Subscription, DeploymentError> {
		let coordinator = self.locate_mock(profile).await?;

		let created = self
			.randomness
			.create_subscription(coordinator, profile.chain_id)
			.await
			.map_err(|e| randomness_failure(e, DeploymentError::MockServiceUnavailable))?;
		tracing::info!(
			subscription_id = created.subscription_id,
			coordinator = %coordinator,
			"Created subscription"
		);

		self.randomness
			.fund_subscription(
				coordinator,
				profile.chain_id,
				created.subscription_id,
				self.funding_amount,
			)
			.await
			.map_err(|e| randomness_failure(e, DeploymentError::MockServiceUnavailable))?;
		tracing::info!(
			subscription_id = created.subscription_id,
			amount = %self.funding_amount,
			"Funded subscription"
		);

		Ok(Subscription {
			id: created.subscription_id.to_string(),
			funded_amount: self.funding_amount,
			owner,
			coordinator,
		})
	}
}

fn reuse_configured(profile: &ChainProfile, owner: Address) -> Result<Subscription, DeploymentError> {
	let missing = |reason: &str| DeploymentError::MissingSubscriptionConfig {
		chain_id: profile.chain_id,
		reason: reason.to_string(),
	};

	let coordinator = profile
		.randomness_service_address
		.ok_or_else(|| missing("vrf_coordinator is not configured"))?;
	let id = profile
		.existing_subscription_id
		.as_deref()
		.ok_or_else(|| missing("subscription_id is not configured"))?;
	if id.parse::<u64>().is_err() {
		return Err(missing("subscription_id is not an unsigned 64-bit integer"));
	}

	tracing::info!(subscription_id = %id, coordinator = %coordinator, "Using configured subscription");
	Ok(Subscription {
		id: id.to_string(),
		funded_amount: U256::ZERO,
		owner,
		coordinator,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::handlers::{EnvironmentResolver, ResolverSettings};
	use crate::testing::{FakeChain, FakeCoordinator};
	use deployer_config::builders::ConfigBuilder;
	use deployer_storage::implementations::file::FileStorage;
	use deployer_storage::implementations::memory::MemoryStorage;
	use deployer_types::DeploymentRecord;

	const MOCK: &str = "VRFCoordinatorV2Mock";

	fn mock_address() -> Address {
		Address::repeat_byte(0x5f)
	}

	fn owner() -> Address {
		Address::repeat_byte(0xaa)
	}

	fn profiles() -> EnvironmentResolver {
		let config = ConfigBuilder::new()
			.network(5, ConfigBuilder::goerli(None))
			.build();
		EnvironmentResolver::new(config.networks.clone(), ResolverSettings::from(&config))
	}

	async fn storage_with_mock() -> Arc<StorageService> {
		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		let record = DeploymentRecord {
			address: mock_address(),
			chain_id: Some(31337),
			transaction_hash: None,
			block_number: None,
			args: Vec::new(),
		};
		storage.save_deployment("localhost", MOCK, &record).await.unwrap();
		Arc::new(storage)
	}

	fn provisioner(
		storage: Arc<StorageService>,
		chain: &FakeChain,
		coordinator: &FakeCoordinator,
	) -> SubscriptionProvisioner {
		SubscriptionProvisioner::new(
			storage,
			chain.service(&[31337, 5]),
			Arc::new(RandomnessService::new(Box::new(coordinator.clone()))),
			MOCK.to_string(),
			U256::from(1_000_000_000_000_000_000u64),
		)
	}

	#[tokio::test]
	async fn test_local_subscription_is_created_and_funded() {
		let chain = FakeChain::default().with_code(mock_address());
		let coordinator = FakeCoordinator::default();
		let provisioner = provisioner(storage_with_mock().await, &chain, &coordinator);
		let profile = profiles().resolve(31337).unwrap();

		let subscription = provisioner
			.provision(&profile, EnvironmentClass::EphemeralLocal, owner())
			.await
			.unwrap();

		assert_eq!(subscription.id, "1");
		assert_eq!(subscription.coordinator, mock_address());
		assert_eq!(subscription.owner, owner());
		let fundings = coordinator.state.lock().unwrap().fundings.clone();
		assert_eq!(fundings, vec![(1, U256::from(1_000_000_000_000_000_000u64))]);
	}

	#[tokio::test]
	async fn test_local_subscriptions_are_never_reused() {
		let chain = FakeChain::default().with_code(mock_address());
		let coordinator = FakeCoordinator::default();
		let provisioner = provisioner(storage_with_mock().await, &chain, &coordinator);
		let profile = profiles().resolve(31337).unwrap();

		let first = provisioner
			.provision(&profile, EnvironmentClass::EphemeralLocal, owner())
			.await
			.unwrap();
		let second = provisioner
			.provision(&profile, EnvironmentClass::EphemeralLocal, owner())
			.await
			.unwrap();
		assert_ne!(first.id, second.id);
	}

	#[tokio::test]
	async fn test_mock_located_from_tooling_record_file() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::create_dir_all(dir.path().join("localhost")).unwrap();
		std::fs::write(
			dir.path().join("localhost").join(format!("{}.json", MOCK)),
			format!(
				r#"{{"address":"{}","abi":[],"args":["100000000000000000","1000000000"]}}"#,
				mock_address()
			),
		)
		.unwrap();
		let storage = Arc::new(StorageService::new(Box::new(FileStorage::new(
			dir.path().to_path_buf(),
		))));

		let chain = FakeChain::default().with_code(mock_address());
		let coordinator = FakeCoordinator::default();
		let provisioner = provisioner(storage, &chain, &coordinator);
		let profile = profiles().resolve(31337).unwrap();

		let subscription = provisioner
			.provision(&profile, EnvironmentClass::EphemeralLocal, owner())
			.await
			.unwrap();
		assert_eq!(subscription.coordinator, mock_address());
		assert_eq!(subscription.id, "1");
	}

	#[tokio::test]
	async fn test_missing_mock_record() {
		let chain = FakeChain::default();
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let provisioner = provisioner(storage, &chain, &FakeCoordinator::default());
		let profile = profiles().resolve(31337).unwrap();

		let err = provisioner
			.provision(&profile, EnvironmentClass::EphemeralLocal, owner())
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "mock_service_unavailable");
	}

	#[tokio::test]
	async fn test_mock_record_without_code() {
		// Record left over from an earlier simulation; the chain was reset.
		let chain = FakeChain::default();
		let coordinator = FakeCoordinator::default();
		let provisioner = provisioner(storage_with_mock().await, &chain, &coordinator);
		let profile = profiles().resolve(31337).unwrap();

		let err = provisioner
			.provision(&profile, EnvironmentClass::EphemeralLocal, owner())
			.await
			.unwrap_err();
		assert!(matches!(err, DeploymentError::MockServiceUnavailable(ref m) if m.contains("no code")));
		assert_eq!(coordinator.state.lock().unwrap().next_subscription_id, 0);
	}

	#[tokio::test]
	async fn test_public_subscription_is_referenced_without_transactions() {
		let chain = FakeChain::default();
		let coordinator = FakeCoordinator::default();
		let provisioner = provisioner(storage_with_mock().await, &chain, &coordinator);
		let profile = profiles().resolve(5).unwrap();

		let subscription = provisioner
			.provision(&profile, EnvironmentClass::PersistentPublic, owner())
			.await
			.unwrap();

		assert_eq!(Some(subscription.id.as_str()), profile.existing_subscription_id.as_deref());
		assert_eq!(Some(subscription.coordinator), profile.randomness_service_address);
		assert_eq!(subscription.funded_amount, U256::ZERO);
		assert!(chain.submitted().is_empty());
		assert_eq!(coordinator.state.lock().unwrap().next_subscription_id, 0);
	}

	#[tokio::test]
	async fn test_public_subscription_must_be_configured() {
		let chain = FakeChain::default();
		let provisioner = provisioner(storage_with_mock().await, &chain, &FakeCoordinator::default());

		let mut profile = profiles().resolve(5).unwrap();
		profile.existing_subscription_id = None;
		let err = provisioner
			.provision(&profile, EnvironmentClass::PersistentPublic, owner())
			.await
			.unwrap_err();
		assert!(matches!(err, DeploymentError::MissingSubscriptionConfig { chain_id: 5, .. }));

		profile.existing_subscription_id = Some("not-a-number".into());
		let err = provisioner
			.provision(&profile, EnvironmentClass::PersistentPublic, owner())
			.await
			.unwrap_err();
		assert_eq!(err.kind(), "missing_subscription_config");
	}
}
