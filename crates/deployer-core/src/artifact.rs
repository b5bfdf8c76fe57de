//! Compiled contract artifacts.
//!
//! Reads creation bytecode from the JSON artifacts emitted by Hardhat
//! (`"bytecode": "0x.."`) or Foundry (`"bytecode": { "object": "0x.." }`).

use crate::DeploymentError;
use deployer_types::{without_0x_prefix, Bytes};
use std::path::Path;

/// Creation bytecode of the contract to deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
	pub contract_name: Option<String>,
	pub bytecode: Bytes,
}

impl CompiledArtifact {
	pub async fn load(path: impl AsRef<Path>) -> Result<Self, DeploymentError> {
		let path = path.as_ref();
		let raw = tokio::fs::read_to_string(path)
			.await
			.map_err(|e| DeploymentError::Artifact(format!("{}: {}", path.display(), e)))?;
		Self::parse(&raw).map_err(|e| match e {
			DeploymentError::Artifact(msg) => {
				DeploymentError::Artifact(format!("{}: {}", path.display(), msg))
			},
			other => other,
		})
	}

	pub fn parse(raw: &str) -> Result<Self, DeploymentError> {
		let json: serde_json::Value = serde_json::from_str(raw)
			.map_err(|e| DeploymentError::Artifact(format!("invalid JSON: {}", e)))?;

		let bytecode = match json.get("bytecode") {
			Some(serde_json::Value::String(code)) => code.as_str(),
			Some(serde_json::Value::Object(object)) => object
				.get("object")
				.and_then(|v| v.as_str())
				.ok_or_else(|| DeploymentError::Artifact("bytecode.object missing".into()))?,
			_ => return Err(DeploymentError::Artifact("no bytecode field".into())),
		};

		let digits = without_0x_prefix(bytecode.trim());
		if digits.is_empty() {
			return Err(DeploymentError::Artifact(
				"empty bytecode (abstract contract or interface?)".into(),
			));
		}
		if digits.contains("__") {
			return Err(DeploymentError::Artifact(
				"bytecode has unlinked library placeholders".into(),
			));
		}
		let bytecode = hex::decode(digits)
			.map_err(|e| DeploymentError::Artifact(format!("bytecode is not hex: {}", e)))?;

		Ok(Self {
			contract_name: json
				.get("contractName")
				.and_then(|v| v.as_str())
				.map(str::to_string),
			bytecode: bytecode.into(),
		})
	}

	/// Creation code followed by the encoded constructor arguments.
	pub fn init_code(&self, encoded_args: &[u8]) -> Bytes {
		let mut code = Vec::with_capacity(self.bytecode.len() + encoded_args.len());
		code.extend_from_slice(&self.bytecode);
		code.extend_from_slice(encoded_args);
		code.into()
	}
}
