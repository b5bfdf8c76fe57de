//! Resolved chain profiles.
//!
//! A `ChainProfile` is the per-run view of one network's configuration after
//! the environment has been classified. Components receive the profile and the
//! `EnvironmentClass` explicitly instead of re-checking allow-lists.

use crate::ExplorerConfig;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of chain a run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentClass {
	/// Disposable, instantly finalizing simulation with a mock coordinator.
	EphemeralLocal,
	/// Long-lived network with real finality and an external coordinator.
	PersistentPublic,
}

impl fmt::Display for EnvironmentClass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EnvironmentClass::EphemeralLocal => write!(f, "ephemeral-local"),
			EnvironmentClass::PersistentPublic => write!(f, "persistent-public"),
		}
	}
}

/// Chain-specific parameters for one deployment run.
///
/// `randomness_service_address` and `existing_subscription_id` are only ever
/// populated for persistent-public chains; the resolver clears them for
/// ephemeral-local chains, whose coordinator and subscription are created
/// fresh on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProfile {
	pub chain_id: u64,
	pub display_name: String,
	pub rpc_url: String,
	pub randomness_service_address: Option<Address>,
	pub existing_subscription_id: Option<String>,
	/// Key hash ("gas lane") of the coordinator's gas-price tier.
	pub gas_price_tier_id: B256,
	pub callback_gas_limit: u32,
	/// Fee charged per fight, in wei.
	pub fight_fee: U256,
	/// Fee charged per mint, in wei.
	pub mint_fee: U256,
	pub required_confirmations: u64,
	pub explorer: Option<ExplorerConfig>,
}
