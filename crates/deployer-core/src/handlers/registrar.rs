//! Consumer registration on the mock coordinator.

use super::randomness_failure;
use crate::DeploymentError;
use deployer_types::{ChainProfile, DeploymentArtifact, Subscription, TransactionHash};
use deployer_vrf::RandomnessService;
use std::sync::Arc;
use tracing::instrument;

/// Authorizes a freshly deployed contract to draw from its subscription.
///
/// Only used on local simulations. Public subscriptions are managed by their
/// owners outside of a run.
pub struct ConsumerRegistrar {
	randomness: Arc<RandomnessService>,
}

impl ConsumerRegistrar {
	pub fn new(randomness: Arc<RandomnessService>) -> Self {
		Self { randomness }
	}

	#[instrument(skip_all, fields(chain_id = profile.chain_id, subscription_id = %subscription.id))]
	pub async fn register_consumer(
		&self,
		profile: &ChainProfile,
		subscription: &Subscription,
		deployed: &DeploymentArtifact,
	) -> Result<TransactionHash, DeploymentError> {
		let subscription_id = subscription.numeric_id().ok_or_else(|| {
			DeploymentError::RegistrationRejected(format!(
				"subscription id '{}' is not a uint64",
				subscription.id
			))
		})?;

		let tx_hash = self
			.randomness
			.add_consumer(
				subscription.coordinator,
				profile.chain_id,
				subscription_id,
				deployed.address,
			)
			.await
			.map_err(|e| randomness_failure(e, DeploymentError::RegistrationRejected))?;

		tracing::info!(consumer = %deployed.address, "Registered consumer");
		Ok(tx_hash)
	}
}
