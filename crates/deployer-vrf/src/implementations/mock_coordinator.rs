//! VRF v2 coordinator mock.
//!
//! Local simulations deploy `VRFCoordinatorV2Mock`, which lets anyone create
//! and fund subscriptions without LINK and exposes `addConsumer`. The same
//! calls exist on the live coordinator, but there they are only made by the
//! subscription owner through the VRF UI.

use crate::{RandomnessError, RandomnessFactory, RandomnessRegistry, RandomnessServiceInterface};
use alloy_primitives::{aliases::U96, Log as PrimLog, LogData};
use alloy_sol_types::{sol, SolCall, SolEvent};
use async_trait::async_trait;
use deployer_delivery::DeliveryService;
use deployer_types::{
	truncate_id, Address, Bytes, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema,
	SubscriptionCreated as CreatedSubscription, Transaction, TransactionHash, TransactionReceipt,
	ValidationError, U256,
};
use std::sync::Arc;
use std::time::Duration;

sol! {
	/// Creates a subscription owned by `msg.sender`.
	function createSubscription() external returns (uint64 subId);

	/// Credits `amount` juels to the subscription without a LINK transfer.
	function fundSubscription(uint64 subId, uint96 amount) external;

	/// Authorizes a consumer contract on the subscription.
	function addConsumer(uint64 subId, address consumer) external;

	event SubscriptionCreated(uint64 indexed subId, address owner);
}

const DEFAULT_CONFIRMATIONS: u64 = 1;
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;

/// Drives a `VRFCoordinatorV2Mock` through the delivery service.
pub struct MockCoordinator {
	delivery: Arc<DeliveryService>,
	confirmations: u64,
	timeout: Duration,
}

impl MockCoordinator {
	pub fn new(delivery: Arc<DeliveryService>, confirmations: u64, timeout: Duration) -> Self {
		Self {
			delivery,
			confirmations,
			timeout,
		}
	}

	/// Sends a call to the coordinator and waits for it; a revert is an error.
	async fn call(
		&self,
		name: &'static str,
		coordinator: Address,
		chain_id: u64,
		calldata: Vec<u8>,
	) -> Result<TransactionReceipt, RandomnessError> {
		let tx = Transaction::call(chain_id, coordinator, Bytes::from(calldata));
		let receipt = self
			.delivery
			.deliver_and_confirm(tx, self.confirmations, self.timeout)
			.await?;

		if !receipt.success {
			return Err(RandomnessError::Reverted {
				call: name,
				tx_hash: receipt.hash.to_string(),
			});
		}
		tracing::debug!(call = name, tx_hash = %truncate_id(&receipt.hash.to_string()), "Coordinator call mined");
		Ok(receipt)
	}
}

/// Finds the coordinator's `SubscriptionCreated` event in a receipt.
pub fn extract_subscription_created(
	receipt: &TransactionReceipt,
	coordinator: Address,
) -> Result<CreatedSubscription, RandomnessError> {
	let log = receipt
		.logs
		.iter()
		.filter(|log| log.address == coordinator)
		.find(|log| log.topics.first() == Some(&SubscriptionCreated::SIGNATURE_HASH))
		.ok_or_else(|| {
			RandomnessError::EventNotFound(format!(
				"SubscriptionCreated not emitted by {} in {}",
				coordinator, receipt.hash
			))
		})?;

	let prim_log = PrimLog {
		address: log.address,
		data: LogData::new_unchecked(log.topics.clone(), log.data.clone()),
	};
	let event = SubscriptionCreated::decode_log(&prim_log, true).map_err(|e| {
		RandomnessError::EventNotFound(format!("Failed to decode SubscriptionCreated: {}", e))
	})?;

	Ok(CreatedSubscription {
		subscription_id: event.subId,
		owner: event.owner,
	})
}

#[async_trait]
impl RandomnessServiceInterface for MockCoordinator {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockCoordinatorSchema)
	}

	async fn create_subscription(
		&self,
		coordinator: Address,
		chain_id: u64,
	) -> Result<CreatedSubscription, RandomnessError> {
		let calldata = createSubscriptionCall {}.abi_encode();
		let receipt = self
			.call("createSubscription", coordinator, chain_id, calldata)
			.await?;
		let created = extract_subscription_created(&receipt, coordinator)?;

		tracing::info!(
			subscription_id = created.subscription_id,
			owner = %created.owner,
			"Created subscription"
		);
		Ok(created)
	}

	async fn fund_subscription(
		&self,
		coordinator: Address,
		chain_id: u64,
		subscription_id: u64,
		amount: U256,
	) -> Result<TransactionHash, RandomnessError> {
		let amount = u128::try_from(amount)
			.ok()
			.and_then(|v| U96::try_from(v).ok())
			.ok_or_else(|| {
				RandomnessError::InvalidArgument(format!("Funding amount {} exceeds uint96", amount))
			})?;

		let calldata = fundSubscriptionCall {
			subId: subscription_id,
			amount,
		}
		.abi_encode();
		let receipt = self
			.call("fundSubscription", coordinator, chain_id, calldata)
			.await?;
		Ok(receipt.hash)
	}

	async fn add_consumer(
		&self,
		coordinator: Address,
		chain_id: u64,
		subscription_id: u64,
		consumer: Address,
	) -> Result<TransactionHash, RandomnessError> {
		let calldata = addConsumerCall {
			subId: subscription_id,
			consumer,
		}
		.abi_encode();
		let receipt = self
			.call("addConsumer", coordinator, chain_id, calldata)
			.await?;
		Ok(receipt.hash)
	}
}

/// Schema for the coordinator mock table.
pub struct MockCoordinatorSchema;

impl ConfigSchema for MockCoordinatorSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new(
					"confirmations",
					FieldType::Integer {
						min: Some(1),
						max: Some(100),
					},
				),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Creates a coordinator mock client.
///
/// Configuration parameters:
/// - `confirmations`: depth each call waits for (default: 1)
/// - `timeout_seconds`: bound on each wait (default: 60)
pub fn create_service(
	config: &toml::Value,
	delivery: Arc<DeliveryService>,
) -> Result<Box<dyn RandomnessServiceInterface>, RandomnessError> {
	MockCoordinatorSchema
		.validate(config)
		.map_err(|e| RandomnessError::InvalidConfig(e.to_string()))?;

	let confirmations = config
		.get("confirmations")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_CONFIRMATIONS);
	let timeout_seconds = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(MockCoordinator::new(
		delivery,
		confirmations,
		Duration::from_secs(timeout_seconds),
	)))
}

/// Registry for the coordinator mock implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "vrf_v2_mock";
	type Factory = RandomnessFactory;

	fn factory() -> Self::Factory {
		create_service
	}
}

impl RandomnessRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use deployer_delivery::{DeliveryError, DeliveryInterface};
	use deployer_types::EventLog;
	use mockall::mock;
	use std::collections::HashMap;

	mock! {
		pub Delivery {}

		#[async_trait]
		impl DeliveryInterface for Delivery {
			fn config_schema(&self) -> Box<dyn ConfigSchema>;
			async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError>;
			async fn wait_for_confirmation(
				&self,
				hash: &TransactionHash,
				chain_id: u64,
				confirmations: u64,
				timeout: Duration,
			) -> Result<TransactionReceipt, DeliveryError>;
			async fn get_code(&self, address: Address, chain_id: u64) -> Result<Bytes, DeliveryError>;
		}
	}

	fn coordinator() -> Address {
		Address::repeat_byte(0xc0)
	}

	fn created_log(sub_id: u64, emitter: Address) -> EventLog {
		let data = SubscriptionCreated {
			subId: sub_id,
			owner: Address::repeat_byte(0x0a),
		}
		.encode_log_data();
		EventLog {
			address: emitter,
			topics: data.topics().to_vec(),
			data: data.data,
		}
	}

	fn receipt(success: bool, logs: Vec<EventLog>) -> TransactionReceipt {
		TransactionReceipt {
			hash: TransactionHash(vec![0x01; 32]),
			block_number: 3,
			success,
			contract_address: None,
			logs,
			confirmations: 1,
		}
	}

	fn service(mock: MockDelivery) -> MockCoordinator {
		let mut implementations: HashMap<u64, Arc<dyn DeliveryInterface>> = HashMap::new();
		implementations.insert(31337, Arc::new(mock));
		MockCoordinator::new(
			Arc::new(DeliveryService::new(implementations)),
			1,
			Duration::from_secs(1),
		)
	}

	#[test]
	fn test_extract_subscription_created() {
		let receipt = receipt(true, vec![created_log(7, coordinator())]);
		let created = extract_subscription_created(&receipt, coordinator()).unwrap();
		assert_eq!(created.subscription_id, 7);
		assert_eq!(created.owner, Address::repeat_byte(0x0a));
	}

	#[test]
	fn test_event_from_other_contract_is_ignored() {
		let receipt = receipt(true, vec![created_log(7, Address::repeat_byte(0x99))]);
		let err = extract_subscription_created(&receipt, coordinator()).unwrap_err();
		assert!(matches!(err, RandomnessError::EventNotFound(_)));
	}

	#[tokio::test]
	async fn test_create_subscription_targets_coordinator() {
		let mut mock = MockDelivery::new();
		mock.expect_submit()
			.withf(|tx| {
				tx.to == Some(Address::repeat_byte(0xc0))
					&& tx.data.as_ref() == createSubscriptionCall {}.abi_encode().as_slice()
			})
			.times(1)
			.returning(|_| Ok(TransactionHash(vec![0x01; 32])));
		mock.expect_wait_for_confirmation()
			.times(1)
			.returning(|_, _, _, _| Ok(receipt(true, vec![created_log(1, coordinator())])));

		let created = service(mock)
			.create_subscription(coordinator(), 31337)
			.await
			.unwrap();
		assert_eq!(created.subscription_id, 1);
	}

	#[tokio::test]
	async fn test_reverted_add_consumer() {
		let mut mock = MockDelivery::new();
		mock.expect_submit()
			.returning(|_| Ok(TransactionHash(vec![0x01; 32])));
		mock.expect_wait_for_confirmation()
			.returning(|_, _, _, _| Ok(receipt(false, vec![])));

		let err = service(mock)
			.add_consumer(coordinator(), 31337, 99, Address::repeat_byte(0x33))
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			RandomnessError::Reverted {
				call: "addConsumer",
				..
			}
		));
	}

	#[tokio::test]
	async fn test_funding_amount_must_fit_uint96() {
		let err = service(MockDelivery::new())
			.fund_subscription(coordinator(), 31337, 1, U256::MAX)
			.await
			.unwrap_err();
		assert!(matches!(err, RandomnessError::InvalidArgument(_)));
	}

	#[test]
	fn test_fund_calldata_layout() {
		let calldata = fundSubscriptionCall {
			subId: 1,
			amount: U96::from(1_000_000_000_000_000_000u128),
		}
		.abi_encode();
		assert_eq!(&calldata[..4], fundSubscriptionCall::SELECTOR.as_slice());
		assert_eq!(calldata.len(), 4 + 2 * 32);
	}
}
