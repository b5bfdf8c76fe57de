//! Explorer source verification.
//!
//! Best-effort by contract: every problem ends up in the returned
//! `VerificationOutcome` and a warning, never in an error.

use deployer_config::VerificationConfig;
use deployer_explorer::{ExplorerEndpoint, ExplorerService, VerificationSource};
use deployer_types::{ChainProfile, DeploymentArtifact, VerificationOutcome, VerificationRequest};
use std::sync::Arc;
use tracing::instrument;

pub struct VerificationSubmitter {
	explorer: Arc<ExplorerService>,
	settings: Option<VerificationConfig>,
}

impl VerificationSubmitter {
	pub fn new(explorer: Arc<ExplorerService>, settings: Option<VerificationConfig>) -> Self {
		Self { explorer, settings }
	}

	#[instrument(skip_all, fields(chain_id = profile.chain_id, address = %deployed.address))]
	pub async fn submit_verification(
		&self,
		profile: &ChainProfile,
		deployed: &DeploymentArtifact,
	) -> VerificationOutcome {
		let Some(explorer) = profile.explorer.as_ref() else {
			return VerificationOutcome::skipped("no explorer configured for this network");
		};
		let Some(api_key) = explorer.credential() else {
			return VerificationOutcome::skipped("no explorer API key configured");
		};
		let Some(settings) = self.settings.as_ref() else {
			return VerificationOutcome::skipped("no [verification] section configured");
		};

		let source = match VerificationSource::load(
			&settings.source_path,
			settings.contract_name.as_str(),
			settings.compiler_version.as_str(),
		)
		.await
		{
			Ok(source) => source,
			Err(e) => {
				tracing::warn!(error = %e, "Verification source unavailable");
				return VerificationOutcome::failed(e.to_string());
			},
		};

		let endpoint = ExplorerEndpoint {
			api_url: explorer.api_url.clone(),
			api_key: api_key.clone(),
		};
		let request = VerificationRequest::from(deployed);

		tracing::info!(api_url = %endpoint.api_url, "Submitting source for verification");
		match self.explorer.verify(&endpoint, &request, &source).await {
			Ok(VerificationOutcome::Failed { reason }) => {
				tracing::warn!(reason = %reason, "Verification failed");
				VerificationOutcome::Failed { reason }
			},
			Ok(outcome) => {
				tracing::info!(outcome = ?outcome, "Verification finished");
				outcome
			},
			Err(e) => {
				tracing::warn!(error = %e, "Verification request failed");
				VerificationOutcome::failed(e.to_string())
			},
		}
	}
}
