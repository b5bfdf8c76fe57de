//! Randomness service (VRF coordinator) access.
//!
//! Only the subscription-management surface of the coordinator is used:
//! creating and funding a subscription and authorizing a consumer. Receipt and
//! event decoding stay inside the implementation; callers get typed results.

use async_trait::async_trait;
use deployer_delivery::{DeliveryError, DeliveryService};
use deployer_types::{
	Address, ConfigSchema, ImplementationRegistry, SubscriptionCreated, TransactionHash, U256,
};
use std::sync::Arc;
use thiserror::Error;

pub mod implementations {
	pub mod mock_coordinator;
}

/// Errors that can occur when talking to the randomness coordinator.
#[derive(Debug, Error)]
pub enum RandomnessError {
	/// The transaction could not be delivered or confirmed.
	#[error("Delivery error: {0}")]
	Delivery(#[from] DeliveryError),
	/// The coordinator call was mined but reverted.
	#[error("{call} reverted in transaction {tx_hash}")]
	Reverted { call: &'static str, tx_hash: String },
	/// The receipt did not carry the expected event.
	#[error("Event not found: {0}")]
	EventNotFound(String),
	/// A value does not fit the coordinator ABI.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	/// The implementation's configuration failed validation.
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
}

/// Subscription management on a VRF coordinator.
#[async_trait]
pub trait RandomnessServiceInterface: Send + Sync {
	/// Schema used to validate this implementation's TOML table.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Creates a new subscription owned by the caller.
	async fn create_subscription(
		&self,
		coordinator: Address,
		chain_id: u64,
	) -> Result<SubscriptionCreated, RandomnessError>;

	/// Tops up a subscription's balance.
	async fn fund_subscription(
		&self,
		coordinator: Address,
		chain_id: u64,
		subscription_id: u64,
		amount: U256,
	) -> Result<TransactionHash, RandomnessError>;

	/// Authorizes `consumer` to request randomness on the subscription.
	async fn add_consumer(
		&self,
		coordinator: Address,
		chain_id: u64,
		subscription_id: u64,
		consumer: Address,
	) -> Result<TransactionHash, RandomnessError>;
}

/// Builds a randomness service from its TOML table on top of the delivery
/// service.
pub type RandomnessFactory = fn(
	&toml::Value,
	Arc<DeliveryService>,
) -> Result<Box<dyn RandomnessServiceInterface>, RandomnessError>;

/// Registry trait for randomness service implementations.
pub trait RandomnessRegistry: ImplementationRegistry<Factory = RandomnessFactory> {}

/// All available randomness implementations as `(name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, RandomnessFactory)> {
	use implementations::mock_coordinator;

	vec![(
		mock_coordinator::Registry::NAME,
		mock_coordinator::Registry::factory(),
	)]
}

/// Wrapper over the configured randomness implementation.
pub struct RandomnessService {
	implementation: Box<dyn RandomnessServiceInterface>,
}

impl RandomnessService {
	pub fn new(implementation: Box<dyn RandomnessServiceInterface>) -> Self {
		Self { implementation }
	}

	pub async fn create_subscription(
		&self,
		coordinator: Address,
		chain_id: u64,
	) -> Result<SubscriptionCreated, RandomnessError> {
		self.implementation
			.create_subscription(coordinator, chain_id)
			.await
	}

	pub async fn fund_subscription(
		&self,
		coordinator: Address,
		chain_id: u64,
		subscription_id: u64,
		amount: U256,
	) -> Result<TransactionHash, RandomnessError> {
		self.implementation
			.fund_subscription(coordinator, chain_id, subscription_id, amount)
			.await
	}

	pub async fn add_consumer(
		&self,
		coordinator: Address,
		chain_id: u64,
		subscription_id: u64,
		consumer: Address,
	) -> Result<TransactionHash, RandomnessError> {
		self.implementation
			.add_consumer(coordinator, chain_id, subscription_id, consumer)
			.await
	}
}
