//! Deployer account management.
//!
//! The account owns the key that pays for and signs every transaction of a
//! run: the subscription calls on local chains and the contract creation
//! everywhere. Delivery implementations build their wallet from it.

use async_trait::async_trait;
use deployer_types::{Address, ConfigSchema, ImplementationRegistry, SecretString};
use thiserror::Error;

pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// The configured key is malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	/// The implementation's configuration failed validation.
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
}

/// Interface implemented by every account backend.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Schema used to validate this implementation's TOML table.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Address of the deployer account.
	async fn address(&self) -> Result<Address, AccountError>;

	/// The signing key, 0x-prefixed.
	fn get_private_key(&self) -> SecretString;
}

/// Builds an account from its TOML table, e.g. `{ private_key = "0x.." }`.
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

/// Registry trait for account implementations.
pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// All available account implementations as `(name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Thin wrapper over the configured account implementation.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	/// Returns the signing key for delivery implementations.
	pub fn get_private_key(&self) -> SecretString {
		self.implementation.get_private_key()
	}
}
