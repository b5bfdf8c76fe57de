//! Block explorer source verification.
//!
//! Verification is best-effort: implementations report rejections as a
//! `VerificationOutcome::Failed` and only return `Err` when the explorer
//! could not be talked to at all. Either way the caller treats it as a
//! warning.

use async_trait::async_trait;
use deployer_types::{
	ConfigSchema, ImplementationRegistry, SecretString, VerificationOutcome, VerificationRequest,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub mod implementations {
	pub mod etherscan;
}

/// Errors that can occur during explorer operations.
#[derive(Debug, Error)]
pub enum ExplorerError {
	/// The HTTP request failed.
	#[error("HTTP error: {0}")]
	Http(String),
	/// The explorer answered with something that is not its API format.
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
	/// The verification source could not be read.
	#[error("Source error: {0}")]
	Source(String),
	/// The implementation's configuration failed validation.
	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),
}

/// Where and as whom to verify.
#[derive(Debug, Clone)]
pub struct ExplorerEndpoint {
	pub api_url: String,
	pub api_key: SecretString,
}

/// Compiler input and identity of the contract being verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSource {
	/// Solidity standard-JSON compiler input, serialized.
	pub standard_json_input: String,
	/// Fully qualified name, `path/To.sol:Name`.
	pub contract_name: String,
	/// Compiler version, e.g. `v0.8.7+commit.e28d00a7`.
	pub compiler_version: String,
}

impl VerificationSource {
	/// Reads compiler input from a standard-JSON file or a Hardhat build-info
	/// file (whose `input` member is the standard-JSON input).
	pub async fn load(
		path: impl AsRef<Path>,
		contract_name: impl Into<String>,
		compiler_version: impl Into<String>,
	) -> Result<Self, ExplorerError> {
		let path = path.as_ref();
		let raw = tokio::fs::read_to_string(path)
			.await
			.map_err(|e| ExplorerError::Source(format!("{}: {}", path.display(), e)))?;
		let json: serde_json::Value = serde_json::from_str(&raw)
			.map_err(|e| ExplorerError::Source(format!("{}: {}", path.display(), e)))?;

		let input = match json.get("input") {
			Some(input) if input.get("sources").is_some() => input,
			_ => &json,
		};
		if input.get("sources").is_none() {
			return Err(ExplorerError::Source(format!(
				"{} is not a standard-JSON compiler input",
				path.display()
			)));
		}

		Ok(Self {
			standard_json_input: input.to_string(),
			contract_name: contract_name.into(),
			compiler_version: compiler_version.into(),
		})
	}
}

/// Interface implemented by explorer verification backends.
#[async_trait]
pub trait ExplorerInterface: Send + Sync {
	/// Schema used to validate this implementation's TOML table.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Submits the contract for verification and follows it to a verdict.
	async fn verify(
		&self,
		endpoint: &ExplorerEndpoint,
		request: &VerificationRequest,
		source: &VerificationSource,
	) -> Result<VerificationOutcome, ExplorerError>;
}

/// Builds an explorer backend from its TOML table.
pub type ExplorerFactory = fn(&toml::Value) -> Result<Box<dyn ExplorerInterface>, ExplorerError>;

/// Registry trait for explorer implementations.
pub trait ExplorerRegistry: ImplementationRegistry<Factory = ExplorerFactory> {}

/// All available explorer implementations as `(name, factory)` pairs.
pub fn get_all_implementations() -> Vec<(&'static str, ExplorerFactory)> {
	use implementations::etherscan;

	vec![(etherscan::Registry::NAME, etherscan::Registry::factory())]
}

/// Wrapper over the configured explorer implementation.
pub struct ExplorerService {
	implementation: Box<dyn ExplorerInterface>,
}

impl ExplorerService {
	pub fn new(implementation: Box<dyn ExplorerInterface>) -> Self {
		Self { implementation }
	}

	pub async fn verify(
		&self,
		endpoint: &ExplorerEndpoint,
		request: &VerificationRequest,
		source: &VerificationSource,
	) -> Result<VerificationOutcome, ExplorerError> {
		self.implementation.verify(endpoint, request, source).await
	}
}
