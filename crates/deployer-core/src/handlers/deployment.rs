//! Contract deployment.

use super::delivery_failure;
use crate::artifact::CompiledArtifact;
use crate::DeploymentError;
use deployer_delivery::{DeliveryError, DeliveryService};
use deployer_storage::StorageService;
use deployer_types::{
	encode_constructor_args, truncate_id, Address, ChainProfile, ConstructorArg,
	DeploymentArtifact, DeploymentRecord, Subscription, Transaction,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Deploys the contract bound to a subscription and records where it landed.
pub struct ContractDeployer {
	delivery: Arc<DeliveryService>,
	storage: Arc<StorageService>,
	/// Logical name the deployment is recorded under.
	contract_name: String,
	confirmation_timeout: Duration,
}

impl ContractDeployer {
	pub fn new(
		delivery: Arc<DeliveryService>,
		storage: Arc<StorageService>,
		contract_name: String,
		confirmation_timeout: Duration,
	) -> Self {
		Self {
			delivery,
			storage,
			contract_name,
			confirmation_timeout,
		}
	}

	/// Constructor arguments in the order the contract declares them.
	pub fn constructor_args(
		profile: &ChainProfile,
		subscription: &Subscription,
	) -> Result<Vec<ConstructorArg>, DeploymentError> {
		let subscription_id =
			subscription
				.numeric_id()
				.ok_or_else(|| DeploymentError::MissingSubscriptionConfig {
					chain_id: profile.chain_id,
					reason: format!("subscription id '{}' is not a uint64", subscription.id),
				})?;

		Ok(vec![
			ConstructorArg::Uint64(subscription_id),
			ConstructorArg::Address(subscription.coordinator),
			ConstructorArg::Bytes32(profile.gas_price_tier_id),
			ConstructorArg::Uint32(profile.callback_gas_limit),
		])
	}

	#[instrument(skip_all, fields(chain_id = profile.chain_id, contract = %self.contract_name))]
	pub async fn deploy(
		&self,
		artifact: &CompiledArtifact,
		profile: &ChainProfile,
		subscription: &Subscription,
		deployer: Address,
	) -> Result<DeploymentArtifact, DeploymentError> {
		let constructor_args = Self::constructor_args(profile, subscription)?;
		let init_code = artifact.init_code(&encode_constructor_args(&constructor_args));
		let required = profile.required_confirmations;

		let tx_hash = self
			.delivery
			.deliver(Transaction::create(profile.chain_id, init_code))
			.await
			.map_err(|e| match e {
				DeliveryError::Rejected(reason) => DeploymentError::DeploymentReverted(reason),
				other => delivery_failure(other, DeploymentError::DeploymentReverted),
			})?;
		tracing::info!(
			tx_hash = %truncate_id(&tx_hash.to_string()),
			deployer = %deployer,
			required_confirmations = required,
			"Submitted creation transaction"
		);

		let receipt = self
			.delivery
			.confirm(&tx_hash, profile.chain_id, required, self.confirmation_timeout)
			.await
			.map_err(|e| delivery_failure(e, DeploymentError::DeploymentReverted))?;

		if !receipt.success {
			return Err(DeploymentError::DeploymentReverted(format!(
				"creation transaction {} reverted in block {}",
				tx_hash, receipt.block_number
			)));
		}
		let address = receipt.contract_address.ok_or_else(|| {
			DeploymentError::DeploymentReverted(format!(
				"receipt of {} has no contract address",
				tx_hash
			))
		})?;
		if receipt.confirmations < required {
			return Err(DeploymentError::ConfirmationTimeout {
				tx_hash: tx_hash.to_string(),
				required,
				observed: receipt.confirmations,
			});
		}

		let deployed = DeploymentArtifact {
			address,
			constructor_args,
			confirmations_observed: receipt.confirmations,
			transaction_hash: tx_hash,
			block_number: receipt.block_number,
		};
		tracing::info!(
			address = %deployed.address,
			confirmations = deployed.confirmations_observed,
			"Deployed"
		);

		let record = DeploymentRecord::from_artifact(profile.chain_id, &deployed);
		if let Err(e) = self
			.storage
			.save_deployment(&profile.display_name, &self.contract_name, &record)
			.await
		{
			tracing::warn!(error = %e, "Failed to store deployment record");
		}

		Ok(deployed)
	}
}
