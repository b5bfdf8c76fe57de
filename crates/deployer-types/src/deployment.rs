//! Deployment artifacts, records and verification outcomes.

use crate::TransactionHash;
use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single constructor argument, tagged with its Solidity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConstructorArg {
	Uint64(u64),
	Uint32(u32),
	Address(Address),
	Bytes32(B256),
}

impl ConstructorArg {
	fn to_sol_value(self) -> DynSolValue {
		match self {
			ConstructorArg::Uint64(v) => DynSolValue::Uint(U256::from(v), 64),
			ConstructorArg::Uint32(v) => DynSolValue::Uint(U256::from(v), 32),
			ConstructorArg::Address(a) => DynSolValue::Address(a),
			ConstructorArg::Bytes32(b) => DynSolValue::FixedBytes(b, 32),
		}
	}
}

impl fmt::Display for ConstructorArg {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConstructorArg::Uint64(v) => write!(f, "{}", v),
			ConstructorArg::Uint32(v) => write!(f, "{}", v),
			ConstructorArg::Address(a) => write!(f, "{}", a),
			ConstructorArg::Bytes32(b) => write!(f, "{}", b),
		}
	}
}

/// ABI-encodes constructor arguments the way they are appended to creation code.
pub fn encode_constructor_args(args: &[ConstructorArg]) -> Bytes {
	let values = args.iter().map(|arg| arg.to_sol_value()).collect();
	DynSolValue::Tuple(values).abi_encode_params().into()
}

/// Result of a successful contract deployment. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentArtifact {
	pub address: Address,
	/// Constructor arguments in binding order.
	pub constructor_args: Vec<ConstructorArg>,
	pub confirmations_observed: u64,
	pub transaction_hash: TransactionHash,
	pub block_number: u64,
}

impl DeploymentArtifact {
	pub fn encoded_constructor_args(&self) -> Bytes {
		encode_constructor_args(&self.constructor_args)
	}
}

/// Explorer verification request, derived entirely from a `DeploymentArtifact`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
	pub address: Address,
	pub constructor_args: Vec<ConstructorArg>,
}

impl VerificationRequest {
	/// Constructor arguments as unprefixed hex, the format explorers expect.
	pub fn encoded_args_hex(&self) -> String {
		hex::encode(encode_constructor_args(&self.constructor_args))
	}
}

impl From<&DeploymentArtifact> for VerificationRequest {
	fn from(artifact: &DeploymentArtifact) -> Self {
		Self {
			address: artifact.address,
			constructor_args: artifact.constructor_args.clone(),
		}
	}
}

/// Outcome of the best-effort explorer verification step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationOutcome {
	Verified,
	AlreadyVerified,
	Skipped { reason: String },
	Failed { reason: String },
}

impl VerificationOutcome {
	pub fn skipped(reason: impl Into<String>) -> Self {
		VerificationOutcome::Skipped {
			reason: reason.into(),
		}
	}

	pub fn failed(reason: impl Into<String>) -> Self {
		VerificationOutcome::Failed {
			reason: reason.into(),
		}
	}

	pub fn is_failure(&self) -> bool {
		matches!(self, VerificationOutcome::Failed { .. })
	}
}

/// Persisted record of a deployed contract on a network.
///
/// Mirrors the `deployments/<network>/<Name>.json` files produced by
/// deployment tooling, so records written by other tools (for example the
/// `VRFCoordinatorV2Mock` deployed by a fixture) can be resolved by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
	pub address: Address,
	#[serde(default)]
	pub chain_id: Option<u64>,
	#[serde(default)]
	pub transaction_hash: Option<String>,
	#[serde(default)]
	pub block_number: Option<u64>,
	/// Constructor arguments as tooling writes them: a JSON array, numbers
	/// as decimal strings.
	#[serde(default)]
	pub args: Vec<serde_json::Value>,
}

impl DeploymentRecord {
	pub fn from_artifact(chain_id: u64, artifact: &DeploymentArtifact) -> Self {
		Self {
			address: artifact.address,
			chain_id: Some(chain_id),
			transaction_hash: Some(artifact.transaction_hash.to_string()),
			block_number: Some(artifact.block_number),
			args: artifact
				.constructor_args
				.iter()
				.map(|arg| serde_json::Value::String(arg.to_string()))
				.collect(),
		}
	}
}
