//! The deployment run.
//!
//! `DeploymentEngine` drives one run through resolve, provision and deploy,
//! then takes the registration branch on local chains or the verification
//! branch on public ones. The first fatal error stops the run and is recorded
//! in the report together with the step it happened in.

pub mod report;

use crate::artifact::CompiledArtifact;
use crate::handlers::{
	ConsumerRegistrar, ContractDeployer, EnvironmentResolver, ResolverSettings,
	SubscriptionProvisioner, VerificationSubmitter,
};
use crate::{DeploymentError, RunStep};
use deployer_config::Config;
use deployer_delivery::DeliveryService;
use deployer_explorer::ExplorerService;
use deployer_storage::StorageService;
use deployer_types::{Address, ChainProfile, EnvironmentClass, VerificationOutcome};
use deployer_vrf::RandomnessService;
use report::RunReport;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Network a run targets, by chain id or configured name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkSelector {
	ChainId(u64),
	Name(String),
}

impl FromStr for NetworkSelector {
	type Err = Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		Ok(match s.parse::<u64>() {
			Ok(chain_id) => NetworkSelector::ChainId(chain_id),
			Err(_) => NetworkSelector::Name(s.to_string()),
		})
	}
}

impl fmt::Display for NetworkSelector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			NetworkSelector::ChainId(id) => write!(f, "{}", id),
			NetworkSelector::Name(name) => f.write_str(name),
		}
	}
}

/// Orchestrates one deployment run per call to [`DeploymentEngine::run`].
pub struct DeploymentEngine {
	config: Config,
	account_address: Address,
	resolver: EnvironmentResolver,
	provisioner: SubscriptionProvisioner,
	deployer: ContractDeployer,
	registrar: ConsumerRegistrar,
	verifier: VerificationSubmitter,
}

impl DeploymentEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		delivery: Arc<DeliveryService>,
		randomness: Arc<RandomnessService>,
		explorer: Arc<ExplorerService>,
		account_address: Address,
	) -> Self {
		let resolver =
			EnvironmentResolver::new(config.networks.clone(), ResolverSettings::from(&config));
		let provisioner = SubscriptionProvisioner::new(
			storage.clone(),
			delivery.clone(),
			randomness.clone(),
			config.deployer.mock_coordinator.clone(),
			config.deployer.mock_funding_amount,
		);
		let deployer = ContractDeployer::new(
			delivery,
			storage,
			config.deployer.contract.clone(),
			Duration::from_secs(config.deployer.confirmation_timeout_seconds),
		);
		let registrar = ConsumerRegistrar::new(randomness);
		let verifier = VerificationSubmitter::new(explorer, config.verification.clone());

		Self {
			config,
			account_address,
			resolver,
			provisioner,
			deployer,
			registrar,
			verifier,
		}
	}

	/// Runs the pipeline against one network.
	///
	/// `requested_tags` filters the deployment unit: when non-empty and none of
	/// them is carried by the unit, nothing is done and the report says
	/// `skipped`. Failures are reported, not returned.
	#[instrument(skip_all, fields(network = %selector, contract = %self.config.deployer.contract))]
	pub async fn run(&self, selector: &NetworkSelector, requested_tags: &[String]) -> RunReport {
		let mut report = RunReport::new(self.config.deployer.contract.clone());

		let unit_tags = self.config.deployer.effective_tags();
		if !requested_tags.is_empty() && !requested_tags.iter().any(|t| unit_tags.contains(t)) {
			tracing::info!(requested = ?requested_tags, carried = ?unit_tags, "No matching tags, skipping");
			report.skip(format!(
				"tags {:?} do not match deployment tags {:?}",
				requested_tags, unit_tags
			));
			return report;
		}

		if let Err((step, error)) = self.execute(selector, &mut report).await {
			tracing::error!(step = %step, kind = error.kind(), error = %error, "Deployment failed");
			report.fail(step, &error);
		}
		report
	}

	async fn execute(
		&self,
		selector: &NetworkSelector,
		report: &mut RunReport,
	) -> Result<(), (RunStep, DeploymentError)> {
		let at = |step: RunStep| move |error: DeploymentError| (step, error);

		let profile = self.resolve(selector).map_err(at(RunStep::Resolve))?;
		let class = self.resolver.classify(profile.chain_id);
		report.chain_id = Some(profile.chain_id);
		report.network = Some(profile.display_name.clone());
		report.environment = Some(class);
		tracing::info!(
			chain_id = profile.chain_id,
			network = %profile.display_name,
			environment = %class,
			required_confirmations = profile.required_confirmations,
			"Resolved network"
		);

		// Read before provisioning so a bad artifact costs no transaction.
		let artifact = CompiledArtifact::load(&self.config.deployer.artifact_path)
			.await
			.map_err(at(RunStep::Deploy))?;

		let subscription = self
			.provisioner
			.provision(&profile, class, self.account_address)
			.await
			.map_err(at(RunStep::Provision))?;
		report.subscription_id = Some(subscription.id.clone());

		let deployed = self
			.deployer
			.deploy(&artifact, &profile, &subscription, self.account_address)
			.await
			.map_err(at(RunStep::Deploy))?;
		report.contract_address = Some(deployed.address);
		report.transaction_hash = Some(deployed.transaction_hash.to_string());
		report.confirmations = Some(deployed.confirmations_observed);

		match class {
			EnvironmentClass::EphemeralLocal => {
				let tx_hash = self
					.registrar
					.register_consumer(&profile, &subscription, &deployed)
					.await
					.map_err(at(RunStep::Register))?;
				report.consumer_registration = Some(tx_hash.to_string());
				report.verification = Some(VerificationOutcome::skipped(
					"local chains are not verified",
				));
			},
			EnvironmentClass::PersistentPublic => {
				tracing::info!(
					consumer = %deployed.address,
					subscription_id = %subscription.id,
					"Add the contract as a consumer of the subscription through the coordinator's owner"
				);
				let outcome = if has_explorer_credential(&profile) {
					self.verifier.submit_verification(&profile, &deployed).await
				} else {
					tracing::debug!("No explorer credential, skipping verification");
					VerificationOutcome::skipped("no explorer API key configured")
				};
				if let VerificationOutcome::Failed { reason } = &outcome {
					report.warn(format!("verification failed: {}", reason));
				}
				report.verification = Some(outcome);
			},
		}

		Ok(())
	}

	fn resolve(&self, selector: &NetworkSelector) -> Result<ChainProfile, DeploymentError> {
		match selector {
			NetworkSelector::ChainId(chain_id) => self.resolver.resolve(*chain_id),
			NetworkSelector::Name(name) => self.resolver.resolve_by_name(name),
		}
	}
}

fn has_explorer_credential(profile: &ChainProfile) -> bool {
	profile
		.explorer
		.as_ref()
		.and_then(|explorer| explorer.credential())
		.is_some()
}

#[cfg(test)]
mod tests {
	use super::report::RunStatus;
	use super::*;
	use crate::testing::{FakeChain, FakeCoordinator, MockExplorer};
	use deployer_config::builders::ConfigBuilder;
	use deployer_config::VerificationConfig;
	use deployer_explorer::ExplorerError;
	use deployer_storage::implementations::memory::MemoryStorage;
	use deployer_types::{DeploymentRecord, NetworkConfig, U256};
	use tempfile::TempDir;

	fn mock_address() -> Address {
		Address::repeat_byte(0x5f)
	}

	struct Harness {
		engine: DeploymentEngine,
		chain: FakeChain,
		coordinator: FakeCoordinator,
		_temp_dir: TempDir,
	}

	async fn harness(goerli: NetworkConfig, explorer: MockExplorer) -> Harness {
		let temp_dir = TempDir::new().unwrap();
		let artifact_path = temp_dir.path().join("Warrior721.json");
		std::fs::write(&artifact_path, r#"{"contractName":"Warrior721","bytecode":"0x6080604052"}"#)
			.unwrap();
		let source_path = temp_dir.path().join("build-info.json");
		std::fs::write(&source_path, r#"{"input":{"language":"Solidity","sources":{}}}"#).unwrap();

		let config = ConfigBuilder::new()
			.artifact_path(artifact_path)
			.network(5, goerli)
			.verification(Some(VerificationConfig {
				source_path,
				contract_name: "contracts/Warrior721.sol:Warrior721".into(),
				compiler_version: "v0.8.7+commit.e28d00a7".into(),
				max_status_checks: 1,
				status_poll_seconds: 0,
			}))
			.build();

		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		let record = DeploymentRecord {
			address: mock_address(),
			chain_id: Some(31337),
			transaction_hash: None,
			block_number: None,
			args: Vec::new(),
		};
		storage
			.save_deployment("localhost", "VRFCoordinatorV2Mock", &record)
			.await
			.unwrap();

		let chain = FakeChain::default().with_code(mock_address());
		let coordinator = FakeCoordinator::default();
		let engine = DeploymentEngine::new(
			config,
			Arc::new(storage),
			chain.service(&[31337, 5]),
			Arc::new(RandomnessService::new(Box::new(coordinator.clone()))),
			Arc::new(ExplorerService::new(Box::new(explorer))),
			Address::repeat_byte(0xaa),
		);

		Harness {
			engine,
			chain,
			coordinator,
			_temp_dir: temp_dir,
		}
	}

	fn silent_explorer() -> MockExplorer {
		let mut explorer = MockExplorer::new();
		explorer.expect_verify().never();
		explorer
	}

	#[tokio::test]
	async fn test_local_run_creates_funds_deploys_and_registers() {
		let h = harness(ConfigBuilder::goerli(Some("KEY")), silent_explorer()).await;

		let report = h.engine.run(&NetworkSelector::ChainId(31337), &[]).await;

		assert_eq!(report.status, RunStatus::Succeeded, "{:?}", report.error);
		assert_eq!(report.environment, Some(EnvironmentClass::EphemeralLocal));
		assert_eq!(report.subscription_id.as_deref(), Some("1"));
		assert!(report.confirmations.unwrap() >= 1);
		assert!(report.consumer_registration.is_some());
		assert!(matches!(report.verification, Some(VerificationOutcome::Skipped { .. })));

		let coordinator = h.coordinator.state.lock().unwrap();
		assert_eq!(coordinator.fundings, vec![(1, U256::from(1_000_000_000_000_000_000u64))]);
		assert_eq!(coordinator.consumers, vec![(1, report.contract_address.unwrap())]);
	}

	#[tokio::test]
	async fn test_public_run_reuses_subscription_and_verifies() {
		let mut explorer = MockExplorer::new();
		explorer
			.expect_verify()
			.times(1)
			.returning(|_, _, _| Ok(VerificationOutcome::Verified));
		let h = harness(ConfigBuilder::goerli(Some("KEY")), explorer).await;

		let report = h
			.engine
			.run(&NetworkSelector::Name("goerli".into()), &[])
			.await;

		assert_eq!(report.status, RunStatus::Succeeded, "{:?}", report.error);
		assert_eq!(report.chain_id, Some(5));
		assert_eq!(report.subscription_id.as_deref(), Some("5794"));
		assert!(report.confirmations.unwrap() >= 6);
		assert!(report.consumer_registration.is_none());
		assert_eq!(report.verification, Some(VerificationOutcome::Verified));

		// Only the creation transaction reaches the chain.
		let submitted = h.chain.submitted();
		assert_eq!(submitted.len(), 1);
		assert!(submitted[0].is_create());
		assert_eq!(h.coordinator.state.lock().unwrap().next_subscription_id, 0);
		assert!(h.coordinator.state.lock().unwrap().consumers.is_empty());
	}

	#[tokio::test]
	async fn test_public_run_without_credential_skips_verification() {
		let h = harness(ConfigBuilder::goerli(None), silent_explorer()).await;

		let report = h.engine.run(&NetworkSelector::ChainId(5), &[]).await;

		assert_eq!(report.status, RunStatus::Succeeded);
		assert!(report.contract_address.is_some());
		assert!(matches!(report.verification, Some(VerificationOutcome::Skipped { .. })));
		assert!(report.warnings.is_empty());
	}

	#[tokio::test]
	async fn test_verification_failure_is_a_warning() {
		let mut explorer = MockExplorer::new();
		explorer
			.expect_verify()
			.returning(|_, _, _| Err(ExplorerError::Http("503 Service Unavailable".into())));
		let h = harness(ConfigBuilder::goerli(Some("KEY")), explorer).await;

		let report = h.engine.run(&NetworkSelector::ChainId(5), &[]).await;

		assert_eq!(report.status, RunStatus::Succeeded);
		assert!(report.verification.as_ref().unwrap().is_failure());
		assert_eq!(report.warnings.len(), 1);
	}

	#[tokio::test]
	async fn test_missing_public_subscription_stops_before_deploying() {
		let mut goerli = ConfigBuilder::goerli(Some("KEY"));
		goerli.subscription_id = None;
		let h = harness(goerli, silent_explorer()).await;

		let report = h.engine.run(&NetworkSelector::ChainId(5), &[]).await;

		assert!(report.is_failure());
		let error = report.error.unwrap();
		assert_eq!(error.step, RunStep::Provision);
		assert_eq!(error.kind, "missing_subscription_config");
		assert!(h.chain.submitted().is_empty());
	}

	#[tokio::test]
	async fn test_unknown_chain_runs_nothing() {
		let h = harness(ConfigBuilder::goerli(Some("KEY")), silent_explorer()).await;

		let report = h.engine.run(&NetworkSelector::ChainId(137), &[]).await;

		let error = report.error.unwrap();
		assert_eq!(error.step, RunStep::Resolve);
		assert_eq!(error.kind, "unknown_chain");
		assert!(report.chain_id.is_none());
		assert!(h.chain.submitted().is_empty());
		assert_eq!(h.coordinator.state.lock().unwrap().next_subscription_id, 0);
	}

	#[tokio::test]
	async fn test_repeated_local_runs_get_distinct_subscriptions() {
		let h = harness(ConfigBuilder::goerli(None), silent_explorer()).await;

		let first = h.engine.run(&NetworkSelector::ChainId(31337), &[]).await;
		let second = h.engine.run(&NetworkSelector::ChainId(31337), &[]).await;

		assert_ne!(first.subscription_id, second.subscription_id);
		assert_ne!(first.contract_address, second.contract_address);
	}

	#[tokio::test]
	async fn test_unmatched_tags_skip_the_run() {
		let h = harness(ConfigBuilder::goerli(None), silent_explorer()).await;

		let report = h
			.engine
			.run(&NetworkSelector::ChainId(31337), &["mocks".to_string()])
			.await;
		assert_eq!(report.status, RunStatus::Skipped);
		assert!(h.chain.submitted().is_empty());

		let report = h
			.engine
			.run(&NetworkSelector::ChainId(31337), &["warrior721".to_string()])
			.await;
		assert_eq!(report.status, RunStatus::Succeeded);
	}

	#[tokio::test]
	async fn test_timeout_reports_transaction_hash() {
		let h = harness(ConfigBuilder::goerli(None), silent_explorer()).await;
		h.chain.state.lock().unwrap().stalled = true;

		let report = h.engine.run(&NetworkSelector::ChainId(5), &[]).await;

		let error = report.error.unwrap();
		assert_eq!(error.step, RunStep::Deploy);
		assert_eq!(error.kind, "confirmation_timeout");
		assert!(error.transaction_hash.is_some());
	}

	#[test]
	fn test_selector_parsing() {
		assert_eq!("31337".parse::<NetworkSelector>(), Ok(NetworkSelector::ChainId(31337)));
		assert_eq!(
			"goerli".parse::<NetworkSelector>(),
			Ok(NetworkSelector::Name("goerli".into()))
		);
	}
}
