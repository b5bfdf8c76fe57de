//! Deployment-record registry.
//!
//! Records of deployed contracts are kept per network under the contract's
//! logical name, the layout deployment tooling uses on disk
//! (`deployments/<network>/<Name>.json`). The orchestrator writes a record
//! after each successful deployment and reads records to resolve contracts it
//! depends on by name, such as the mock coordinator on local chains.

use async_trait::async_trait;
use deployer_types::{ConfigSchema, DeploymentRecord, ImplementationRegistry};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// No value is stored under the key.
	#[error("Not found")]
	NotFound,
	/// The stored value could not be (de)serialized.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// The backend failed to read or write.
	#[error("Backend error: {0}")]
	Backend(String),
	/// The implementation's configuration failed validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level key-value interface implemented by storage backends.
///
/// Keys have the form `<namespace>:<id>`; for deployment records the namespace
/// is the network name and the id is the contract name.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Schema used to validate this implementation's TOML table.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Builds a backend from its `[registry.implementations.<name>]` table.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// All available storage implementations as `(name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Splits a `<namespace>:<id>` key, rejecting anything that could escape a
/// namespace directory.
pub(crate) fn split_key(key: &str) -> Result<(&str, &str), StorageError> {
	let (namespace, id) = key
		.split_once(':')
		.ok_or_else(|| StorageError::Backend(format!("Malformed key '{}'", key)))?;

	for part in [namespace, id] {
		if part.is_empty() || part == "." || part == ".." || part.contains(['/', '\\', ':']) {
			return Err(StorageError::Backend(format!("Invalid key segment '{}'", part)));
		}
	}
	Ok((namespace, id))
}

/// Typed access to deployment records on top of a storage backend.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a serializable value as JSON under `namespace:id`.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes = serde_json::to_vec_pretty(data)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key, bytes).await
	}

	/// Retrieves and deserializes the value under `namespace:id`.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes = self.backend.get_bytes(&key).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		let key = format!("{}:{}", namespace, id);
		self.backend.exists(&key).await
	}

	/// Records a deployed contract on a network, replacing any earlier record.
	pub async fn save_deployment(
		&self,
		network: &str,
		contract: &str,
		record: &DeploymentRecord,
	) -> Result<(), StorageError> {
		self.store(network, contract, record).await?;
		tracing::debug!(network, contract, address = %record.address, "Stored deployment record");
		Ok(())
	}

	/// Looks up the record of a named contract on a network.
	///
	/// Returns `Ok(None)` when no record exists.
	pub async fn find_deployment(
		&self,
		network: &str,
		contract: &str,
	) -> Result<Option<DeploymentRecord>, StorageError> {
		match self.retrieve(network, contract).await {
			Ok(record) => Ok(Some(record)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStorage;
	use deployer_types::Address;

	fn record() -> DeploymentRecord {
		DeploymentRecord {
			address: Address::repeat_byte(0x11),
			chain_id: Some(31337),
			transaction_hash: None,
			block_number: Some(1),
			args: Vec::new(),
		}
	}

	#[test]
	fn test_split_key() {
		assert_eq!(split_key("goerli:Warrior721").unwrap(), ("goerli", "Warrior721"));
		assert!(split_key("goerli").is_err());
		assert!(split_key("..:Warrior721").is_err());
		assert!(split_key("goerli:a/b").is_err());
		assert!(split_key("goerli:").is_err());
	}

	#[tokio::test]
	async fn test_save_and_find_deployment() {
		let service = StorageService::new(Box::new(MemoryStorage::new()));

		assert!(service
			.find_deployment("localhost", "Warrior721")
			.await
			.unwrap()
			.is_none());

		service
			.save_deployment("localhost", "Warrior721", &record())
			.await
			.unwrap();

		let found = service
			.find_deployment("localhost", "Warrior721")
			.await
			.unwrap();
		assert_eq!(found, Some(record()));
		assert!(service.exists("localhost", "Warrior721").await.unwrap());
		assert!(!service.exists("goerli", "Warrior721").await.unwrap());
	}

	#[tokio::test]
	async fn test_corrupt_record_is_an_error() {
		let backend = MemoryStorage::new();
		backend
			.set_bytes("localhost:Warrior721", b"not json".to_vec())
			.await
			.unwrap();
		let service = StorageService::new(Box::new(backend));

		let result = service.find_deployment("localhost", "Warrior721").await;
		assert!(matches!(result, Err(StorageError::Serialization(_))));
	}
}
