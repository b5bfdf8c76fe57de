//! Transaction delivery for the deployer.
//!
//! Submits the run's transactions, waits for them to accrue confirmations and
//! reads deployed code back. Signing is done by the account's
//! key inside each implementation's wallet.

use async_trait::async_trait;
use deployer_types::{
	Address, Bytes, ConfigSchema, ImplementationRegistry, NetworksConfig, SecretString,
	Transaction, TransactionHash, TransactionReceipt,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Errors that can occur during transaction delivery operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Transport-level failure talking to the node.
	#[error("Network error: {0}")]
	Network(String),
	/// The node refused the transaction (e.g. it reverts during estimation).
	#[error("Transaction rejected: {0}")]
	Rejected(String),
	/// The transaction did not reach the wanted depth in time. Its fate is
	/// unknown; `hash` identifies it for out-of-band follow-up.
	#[error("Timed out after {waited_secs}s waiting for {required} confirmations of {hash} (observed {observed})")]
	Timeout {
		hash: String,
		required: u64,
		observed: u64,
		waited_secs: u64,
	},
	/// No implementation serves the requested chain.
	#[error("No provider available for chain {0}")]
	NoProviderAvailable(u64),
	/// The implementation's configuration failed validation.
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
}

/// Interface implemented by chain providers.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Schema used to validate this implementation's TOML table.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Signs and submits a transaction, returning its hash once the node
	/// accepted it.
	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError>;

	/// Blocks until the transaction is `confirmations` deep or `timeout`
	/// elapses. A reverted transaction returns as soon as it is mined.
	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		chain_id: u64,
		confirmations: u64,
		timeout: Duration,
	) -> Result<TransactionReceipt, DeliveryError>;

	/// Reads the runtime code at an address.
	async fn get_code(&self, address: Address, chain_id: u64) -> Result<Bytes, DeliveryError>;
}

/// Builds a provider from its TOML table, the network table and the
/// deployer's signing key.
pub type DeliveryFactory = fn(
	&toml::Value,
	&NetworksConfig,
	&SecretString,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError>;

/// Registry trait for delivery implementations.
pub trait DeliveryRegistry: ImplementationRegistry<Factory = DeliveryFactory> {}

/// All available delivery implementations as `(name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, DeliveryFactory)> {
	use implementations::evm::alloy;

	vec![(alloy::Registry::NAME, alloy::Registry::factory())]
}

/// Routes delivery calls to the implementation serving each chain.
pub struct DeliveryService {
	implementations: HashMap<u64, Arc<dyn DeliveryInterface>>,
}

impl DeliveryService {
	pub fn new(implementations: HashMap<u64, Arc<dyn DeliveryInterface>>) -> Self {
		Self { implementations }
	}

	fn implementation(&self, chain_id: u64) -> Result<&Arc<dyn DeliveryInterface>, DeliveryError> {
		self.implementations
			.get(&chain_id)
			.ok_or(DeliveryError::NoProviderAvailable(chain_id))
	}

	/// Submits a transaction on its chain.
	pub async fn deliver(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		self.implementation(tx.chain_id)?.submit(tx).await
	}

	/// Waits for a transaction to reach the given depth.
	pub async fn confirm(
		&self,
		hash: &TransactionHash,
		chain_id: u64,
		confirmations: u64,
		timeout: Duration,
	) -> Result<TransactionReceipt, DeliveryError> {
		self.implementation(chain_id)?
			.wait_for_confirmation(hash, chain_id, confirmations, timeout)
			.await
	}

	/// Submits a transaction and waits for it to reach the given depth.
	pub async fn deliver_and_confirm(
		&self,
		tx: Transaction,
		confirmations: u64,
		timeout: Duration,
	) -> Result<TransactionReceipt, DeliveryError> {
		let chain_id = tx.chain_id;
		let hash = self.deliver(tx).await?;
		self.confirm(&hash, chain_id, confirmations, timeout).await
	}

	/// Whether a contract is deployed at `address`.
	pub async fn has_code(&self, address: Address, chain_id: u64) -> Result<bool, DeliveryError> {
		let code = self.implementation(chain_id)?.get_code(address, chain_id).await?;
		Ok(!code.is_empty())
	}
}
