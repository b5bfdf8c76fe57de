//! Pipeline steps of a deployment run.
//!
//! Each handler owns one step: resolving the chain, provisioning the
//! randomness subscription, deploying the contract, registering it as a
//! consumer and submitting it for explorer verification.

pub mod deployment;
pub mod provisioner;
pub mod registrar;
pub mod resolver;
pub mod verification;

pub use deployment::ContractDeployer;
pub use provisioner::SubscriptionProvisioner;
pub use registrar::ConsumerRegistrar;
pub use resolver::{EnvironmentResolver, ResolverSettings};
pub use verification::VerificationSubmitter;

use crate::DeploymentError;
use deployer_delivery::DeliveryError;
use deployer_vrf::RandomnessError;

/// Maps a delivery failure onto the run's error taxonomy.
///
/// Timeouts and transport failures have fixed kinds. Everything else is a
/// rejection, whose kind depends on the step and is built by `rejected`.
pub(crate) fn delivery_failure(
	err: DeliveryError,
	rejected: fn(String) -> DeploymentError,
) -> DeploymentError {
	match err {
		DeliveryError::Timeout {
			hash,
			required,
			observed,
			..
		} => DeploymentError::ConfirmationTimeout {
			tx_hash: hash,
			required,
			observed,
		},
		DeliveryError::Network(msg) => DeploymentError::Provider(msg),
		DeliveryError::NoProviderAvailable(chain_id) => {
			DeploymentError::Provider(format!("no provider configured for chain {}", chain_id))
		},
		other => rejected(other.to_string()),
	}
}

/// Like [`delivery_failure`], for calls made through the randomness service.
pub(crate) fn randomness_failure(
	err: RandomnessError,
	rejected: fn(String) -> DeploymentError,
) -> DeploymentError {
	match err {
		RandomnessError::Delivery(err) => delivery_failure(err, rejected),
		other => rejected(other.to_string()),
	}
}
