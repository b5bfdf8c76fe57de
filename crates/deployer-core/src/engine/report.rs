//! Outcome of a deployment run, printed as JSON by the binary.

use crate::{DeploymentError, RunStep};
use deployer_types::{Address, EnvironmentClass, VerificationOutcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
	Succeeded,
	Failed,
	/// The deployment unit was not selected by the requested tags.
	Skipped,
}

/// The fatal error that ended a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
	pub step: RunStep,
	pub kind: String,
	pub message: String,
	/// In-flight transaction left for out-of-band follow-up.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub transaction_hash: Option<String>,
}

/// Everything a run found out, filled in step by step.
///
/// Fields stay `None` for steps that did not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
	pub status: RunStatus,
	pub contract: String,
	pub chain_id: Option<u64>,
	pub network: Option<String>,
	pub environment: Option<EnvironmentClass>,
	pub subscription_id: Option<String>,
	pub contract_address: Option<Address>,
	pub transaction_hash: Option<String>,
	pub confirmations: Option<u64>,
	/// Hash of the `addConsumer` transaction on local chains.
	pub consumer_registration: Option<String>,
	pub verification: Option<VerificationOutcome>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub warnings: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub skip_reason: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<RunFailure>,
}

impl RunReport {
	pub fn new(contract: impl Into<String>) -> Self {
		Self {
			status: RunStatus::Succeeded,
			contract: contract.into(),
			chain_id: None,
			network: None,
			environment: None,
			subscription_id: None,
			contract_address: None,
			transaction_hash: None,
			confirmations: None,
			consumer_registration: None,
			verification: None,
			warnings: Vec::new(),
			skip_reason: None,
			error: None,
		}
	}

	pub fn skip(&mut self, reason: impl Into<String>) {
		self.status = RunStatus::Skipped;
		self.skip_reason = Some(reason.into());
	}

	pub fn fail(&mut self, step: RunStep, error: &DeploymentError) {
		self.status = RunStatus::Failed;
		self.error = Some(RunFailure {
			step,
			kind: error.kind().to_string(),
			message: error.to_string(),
			transaction_hash: error.transaction_hash().map(str::to_string),
		});
	}

	pub fn warn(&mut self, warning: impl Into<String>) {
		self.warnings.push(warning.into());
	}

	pub fn is_failure(&self) -> bool {
		self.status == RunStatus::Failed
	}

	pub fn to_json(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string_pretty(self)
	}
}
