//! Deployment orchestration for a VRF-consuming contract.
//!
//! A run targets one network and walks a fixed pipeline:
//! resolve the chain profile, provision a randomness subscription, deploy the
//! contract bound to it, then either register the contract as a consumer
//! (local simulations) or submit its source for explorer verification
//! (public networks). The environment class decided at resolution selects the
//! branch and is passed to every component explicitly.

pub mod artifact;
pub mod builder;
pub mod handlers;
pub mod engine;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{BuilderError, DeployerBuilder, DeployerFactories};
pub use engine::{report::RunReport, DeploymentEngine, NetworkSelector};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fatal errors of a deployment run.
///
/// Every variant aborts the remaining pipeline. None is retried.
#[derive(Debug, Error)]
pub enum DeploymentError {
	/// No profile is configured for the requested chain.
	#[error("Unknown chain: {0}")]
	UnknownChain(String),
	/// The mock coordinator of a local chain could not be located or used.
	#[error("Mock randomness service unavailable: {0}")]
	MockServiceUnavailable(String),
	/// A public chain lacks its coordinator address or subscription id.
	#[error("Missing subscription configuration for chain {chain_id}: {reason}")]
	MissingSubscriptionConfig { chain_id: u64, reason: String },
	/// The creation transaction was rejected or reverted.
	#[error("Deployment reverted: {0}")]
	DeploymentReverted(String),
	/// A transaction did not reach the required depth in time. Its fate is
	/// unknown.
	#[error("Timed out waiting for {required} confirmations of {tx_hash} (observed {observed})")]
	ConfirmationTimeout {
		tx_hash: String,
		required: u64,
		observed: u64,
	},
	/// The coordinator refused to add the consumer.
	#[error("Consumer registration rejected: {0}")]
	RegistrationRejected(String),
	/// The compiled artifact is missing or unusable.
	#[error("Artifact error: {0}")]
	Artifact(String),
	/// The chain could not be reached.
	#[error("Provider error: {0}")]
	Provider(String),
}

impl DeploymentError {
	/// Stable identifier used in run reports.
	pub fn kind(&self) -> &'static str {
		match self {
			DeploymentError::UnknownChain(_) => "unknown_chain",
			DeploymentError::MockServiceUnavailable(_) => "mock_service_unavailable",
			DeploymentError::MissingSubscriptionConfig { .. } => "missing_subscription_config",
			DeploymentError::DeploymentReverted(_) => "deployment_reverted",
			DeploymentError::ConfirmationTimeout { .. } => "confirmation_timeout",
			DeploymentError::RegistrationRejected(_) => "registration_rejected",
			DeploymentError::Artifact(_) => "artifact",
			DeploymentError::Provider(_) => "provider",
		}
	}

	/// Hash of the in-flight transaction, when the error leaves one behind.
	pub fn transaction_hash(&self) -> Option<&str> {
		match self {
			DeploymentError::ConfirmationTimeout { tx_hash, .. } => Some(tx_hash),
			_ => None,
		}
	}
}

/// Pipeline step, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStep {
	Resolve,
	Provision,
	Deploy,
	Register,
	Verify,
}

impl fmt::Display for RunStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			RunStep::Resolve => "resolve",
			RunStep::Provision => "provision",
			RunStep::Deploy => "deploy",
			RunStep::Register => "register",
			RunStep::Verify => "verify",
		};
		f.write_str(name)
	}
}
