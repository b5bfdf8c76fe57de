//! Etherscan-compatible verification API.
//!
//! Works against Etherscan and its forks (Snowtrace, Polygonscan), which share
//! the `module=contract` verification endpoints.

use crate::{
	ExplorerEndpoint, ExplorerError, ExplorerFactory, ExplorerInterface, ExplorerRegistry,
	VerificationSource,
};
use async_trait::async_trait;
use deployer_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
	VerificationOutcome, VerificationRequest,
};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_MAX_STATUS_CHECKS: u32 = 10;
const DEFAULT_STATUS_POLL_SECONDS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Envelope of every Etherscan API answer.
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
	pub status: String,
	pub message: String,
	pub result: String,
}

/// What a `verifysourcecode` answer means.
#[derive(Debug, PartialEq, Eq)]
pub enum Submission {
	/// Accepted; follow the GUID.
	Pending(String),
	AlreadyVerified,
	Rejected(String),
}

/// What a `checkverifystatus` answer means.
#[derive(Debug, PartialEq, Eq)]
pub enum StatusCheck {
	InProgress,
	Done(VerificationOutcome),
}

fn is_already_verified(result: &str) -> bool {
	result.to_lowercase().contains("already verified")
}

pub fn interpret_submission(response: &ApiResponse) -> Submission {
	if is_already_verified(&response.result) {
		Submission::AlreadyVerified
	} else if response.status == "1" {
		Submission::Pending(response.result.clone())
	} else {
		Submission::Rejected(format!("{}: {}", response.message, response.result))
	}
}

pub fn interpret_status(response: &ApiResponse) -> StatusCheck {
	let result = response.result.as_str();
	if result.starts_with("Pass") {
		StatusCheck::Done(VerificationOutcome::Verified)
	} else if is_already_verified(result) {
		StatusCheck::Done(VerificationOutcome::AlreadyVerified)
	} else if result.contains("Pending") || result.contains("In progress") {
		StatusCheck::InProgress
	} else {
		StatusCheck::Done(VerificationOutcome::failed(result))
	}
}

/// Etherscan verification client.
pub struct EtherscanExplorer {
	client: reqwest::Client,
	max_status_checks: u32,
	status_poll_interval: Duration,
}

impl EtherscanExplorer {
	pub fn new(
		client: reqwest::Client,
		max_status_checks: u32,
		status_poll_interval: Duration,
	) -> Self {
		Self {
			client,
			max_status_checks,
			status_poll_interval,
		}
	}

	async fn read_response(response: reqwest::Response) -> Result<ApiResponse, ExplorerError> {
		let status = response.status();
		let text = response
			.text()
			.await
			.map_err(|e| ExplorerError::Http(e.to_string()))?;
		if !status.is_success() {
			return Err(ExplorerError::Http(format!("{}: {}", status, text)));
		}
		serde_json::from_str(&text).map_err(|e| ExplorerError::InvalidResponse(e.to_string()))
	}

	async fn submit(
		&self,
		endpoint: &ExplorerEndpoint,
		request: &VerificationRequest,
		source: &VerificationSource,
	) -> Result<ApiResponse, ExplorerError> {
		let address = request.address.to_string();
		let constructor_args = request.encoded_args_hex();
		let response = endpoint.api_key.with_exposed(|api_key| {
			let form = [
				("apikey", api_key),
				("module", "contract"),
				("action", "verifysourcecode"),
				("contractaddress", address.as_str()),
				("sourceCode", source.standard_json_input.as_str()),
				("codeformat", "solidity-standard-json-input"),
				("contractname", source.contract_name.as_str()),
				("compilerversion", source.compiler_version.as_str()),
				// Misspelling is part of the API
				("constructorArguements", constructor_args.as_str()),
			];
			self.client.post(&endpoint.api_url).form(&form).send()
		});

		let response = response.await.map_err(|e| ExplorerError::Http(e.to_string()))?;
		Self::read_response(response).await
	}

	async fn check_status(
		&self,
		endpoint: &ExplorerEndpoint,
		guid: &str,
	) -> Result<ApiResponse, ExplorerError> {
		let response = endpoint.api_key.with_exposed(|api_key| {
			let query = [
				("apikey", api_key),
				("module", "contract"),
				("action", "checkverifystatus"),
				("guid", guid),
			];
			self.client.get(&endpoint.api_url).query(&query).send()
		});

		let response = response.await.map_err(|e| ExplorerError::Http(e.to_string()))?;
		Self::read_response(response).await
	}
}

#[async_trait]
impl ExplorerInterface for EtherscanExplorer {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(EtherscanSchema)
	}

	async fn verify(
		&self,
		endpoint: &ExplorerEndpoint,
		request: &VerificationRequest,
		source: &VerificationSource,
	) -> Result<VerificationOutcome, ExplorerError> {
		let response = self.submit(endpoint, request, source).await?;
		let guid = match interpret_submission(&response) {
			Submission::Pending(guid) => guid,
			Submission::AlreadyVerified => return Ok(VerificationOutcome::AlreadyVerified),
			Submission::Rejected(reason) => return Ok(VerificationOutcome::failed(reason)),
		};

		tracing::info!(address = %request.address, guid = %guid, "Verification submitted");

		for attempt in 1..=self.max_status_checks {
			tokio::time::sleep(self.status_poll_interval).await;
			let response = self.check_status(endpoint, &guid).await?;
			match interpret_status(&response) {
				StatusCheck::Done(outcome) => return Ok(outcome),
				StatusCheck::InProgress => {
					tracing::debug!(attempt, result = %response.result, "Verification pending");
				},
			}
		}

		Ok(VerificationOutcome::failed(format!(
			"No verdict after {} status checks (guid {})",
			self.max_status_checks, guid
		)))
	}
}

/// Schema for the Etherscan table.
pub struct EtherscanSchema;

impl ConfigSchema for EtherscanSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new(
					"max_status_checks",
					FieldType::Integer {
						min: Some(1),
						max: Some(120),
					},
				),
				Field::new(
					"status_poll_seconds",
					FieldType::Integer {
						min: Some(0),
						max: Some(300),
					},
				),
				Field::new(
					"request_timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(600),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Creates an Etherscan client.
///
/// Configuration parameters:
/// - `max_status_checks`: status polls before giving up (default: 10)
/// - `status_poll_seconds`: delay between polls (default: 5)
/// - `request_timeout_seconds`: per-request HTTP timeout (default: 30)
pub fn create_explorer(config: &toml::Value) -> Result<Box<dyn ExplorerInterface>, ExplorerError> {
	EtherscanSchema
		.validate(config)
		.map_err(|e| ExplorerError::InvalidConfig(e.to_string()))?;

	let integer = |key: &str| config.get(key).and_then(|v| v.as_integer());
	let max_status_checks = integer("max_status_checks")
		.map(|v| v as u32)
		.unwrap_or(DEFAULT_MAX_STATUS_CHECKS);
	let status_poll_seconds = integer("status_poll_seconds")
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_STATUS_POLL_SECONDS);
	let request_timeout_seconds = integer("request_timeout_seconds")
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS);

	let client = reqwest::Client::builder()
		.timeout(Duration::from_secs(request_timeout_seconds))
		.build()
		.map_err(|e| ExplorerError::InvalidConfig(e.to_string()))?;

	Ok(Box::new(EtherscanExplorer::new(
		client,
		max_status_checks,
		Duration::from_secs(status_poll_seconds),
	)))
}

/// Registry for the Etherscan implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "etherscan";
	type Factory = ExplorerFactory;

	fn factory() -> Self::Factory {
		create_explorer
	}
}

impl ExplorerRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use deployer_types::{Address, ConstructorArg, SecretString};

	fn response(status: &str, message: &str, result: &str) -> ApiResponse {
		ApiResponse {
			status: status.into(),
			message: message.into(),
			result: result.into(),
		}
	}

	#[test]
	fn test_submission_accepted() {
		let submission = interpret_submission(&response("1", "OK", "ezq878u486pzijkvvmerl6a9mzwhv6sefgvqi5tkwceejc7tvn"));
		assert!(matches!(submission, Submission::Pending(guid) if guid.starts_with("ezq")));
	}

	#[test]
	fn test_submission_already_verified() {
		let submission =
			interpret_submission(&response("0", "NOTOK", "Contract source code already verified"));
		assert_eq!(submission, Submission::AlreadyVerified);
	}

	#[test]
	fn test_submission_rejected() {
		let submission = interpret_submission(&response("0", "NOTOK", "Invalid API Key"));
		assert_eq!(submission, Submission::Rejected("NOTOK: Invalid API Key".into()));
	}

	#[test]
	fn test_status_verdicts() {
		assert_eq!(
			interpret_status(&response("0", "NOTOK", "Pending in queue")),
			StatusCheck::InProgress
		);
		assert_eq!(
			interpret_status(&response("1", "OK", "Pass - Verified")),
			StatusCheck::Done(VerificationOutcome::Verified)
		);
		assert_eq!(
			interpret_status(&response("1", "OK", "Already Verified")),
			StatusCheck::Done(VerificationOutcome::AlreadyVerified)
		);
		assert_eq!(
			interpret_status(&response("0", "NOTOK", "Fail - Unable to verify")),
			StatusCheck::Done(VerificationOutcome::failed("Fail - Unable to verify"))
		);
	}

	#[test]
	fn test_factory_validates_config() {
		let config: toml::Value = toml::from_str("max_status_checks = 0").unwrap();
		assert!(matches!(
			create_explorer(&config),
			Err(ExplorerError::InvalidConfig(_))
		));

		let config: toml::Value = toml::from_str("status_poll_seconds = 1").unwrap();
		assert!(create_explorer(&config).is_ok());
	}

	#[tokio::test]
	async fn test_unreachable_explorer_is_an_error() {
		let explorer = EtherscanExplorer::new(reqwest::Client::new(), 1, Duration::ZERO);
		let endpoint = ExplorerEndpoint {
			api_url: "http://127.0.0.1:1/api".into(),
			api_key: SecretString::from("KEY"),
		};
		let request = VerificationRequest {
			address: Address::repeat_byte(0x44),
			constructor_args: vec![ConstructorArg::Uint64(1)],
		};
		let source = VerificationSource {
			standard_json_input: "{}".into(),
			contract_name: "contracts/Warrior721.sol:Warrior721".into(),
			compiler_version: "v0.8.7+commit.e28d00a7".into(),
		};

		let result = explorer.verify(&endpoint, &request, &source).await;
		assert!(matches!(result, Err(ExplorerError::Http(_))));
	}
}
