//! Local private-key account.

use crate::{AccountError, AccountFactory, AccountInterface, AccountRegistry};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use deployer_types::{
	with_0x_prefix, without_0x_prefix, Address, ConfigSchema, Field, FieldType,
	ImplementationRegistry, Schema, SecretString, ValidationError,
};

/// Account backed by an in-memory private key.
#[derive(Debug)]
pub struct LocalAccount {
	signer: PrivateKeySigner,
	private_key: SecretString,
}

impl LocalAccount {
	/// Parses a hex private key, with or without the `0x` prefix.
	pub fn new(private_key: &SecretString) -> Result<Self, AccountError> {
		let signer = private_key.with_exposed(|key| {
			without_0x_prefix(key.trim())
				.parse::<PrivateKeySigner>()
				.map_err(|e| AccountError::InvalidKey(e.to_string()))
		})?;
		let private_key =
			private_key.with_exposed(|key| SecretString::new(with_0x_prefix(key.trim())));

		Ok(Self {
			signer,
			private_key,
		})
	}
}

#[async_trait]
impl AccountInterface for LocalAccount {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalAccountSchema)
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	fn get_private_key(&self) -> SecretString {
		self.private_key.clone()
	}
}

/// Schema for `{ private_key = "0x.." }`.
pub struct LocalAccountSchema;

impl ConfigSchema for LocalAccountSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().map(str::trim).unwrap_or_default();
					let digits = without_0x_prefix(key);
					if digits.len() != 64 {
						return Err(format!(
							"Private key must be 64 hex characters, got {}",
							digits.len()
						));
					}
					if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
						return Err("Private key must be hex encoded".to_string());
					}
					Ok(())
				}),
			],
			vec![],
		);
		schema.validate(config)
	}
}

/// Creates a local account from its TOML table.
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalAccountSchema
		.validate(config)
		.map_err(|e| AccountError::InvalidConfig(e.to_string()))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.ok_or_else(|| AccountError::InvalidConfig("private_key is required".into()))?;

	Ok(Box::new(LocalAccount::new(&private_key)?))
}

/// Registry for the local account implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl AccountRegistry for Registry {}
