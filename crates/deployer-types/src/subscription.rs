//! Randomness subscription types.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// A VRF subscription the deployed contract will request randomness from.
///
/// On ephemeral-local chains the subscription is created and funded by the
/// run itself. On persistent-public chains it is an external resource that is
/// only referenced, and `funded_amount` is zero because the run never funds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
	/// Subscription identifier as assigned by the coordinator.
	pub id: String,
	/// Amount this run funded the subscription with.
	pub funded_amount: U256,
	/// Deployer account that owns (or references) the subscription.
	pub owner: Address,
	/// Coordinator the subscription lives on.
	pub coordinator: Address,
}

impl Subscription {
	/// Parses the identifier into the `uint64` the coordinator ABI uses.
	pub fn numeric_id(&self) -> Option<u64> {
		self.id.parse().ok()
	}
}

/// Typed result of a `createSubscription()` call.
///
/// Randomness service implementations decode the coordinator's
/// `SubscriptionCreated` event into this value so that callers never touch
/// receipts or log encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionCreated {
	pub subscription_id: u64,
	pub owner: Address,
}
