//! In-memory collaborators for pipeline tests.

use async_trait::async_trait;
use deployer_delivery::{DeliveryError, DeliveryInterface, DeliveryService};
use deployer_explorer::{ExplorerEndpoint, ExplorerError, ExplorerInterface, VerificationSource};
use deployer_types::{
	Address, Bytes, ConfigSchema, Schema, SubscriptionCreated, Transaction, TransactionHash,
	TransactionReceipt, ValidationError, VerificationOutcome, VerificationRequest, U256,
};
use deployer_vrf::{RandomnessError, RandomnessServiceInterface};
use mockall::mock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct EmptySchema;

impl ConfigSchema for EmptySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

#[derive(Default)]
pub struct ChainState {
	pub head: u64,
	pub submitted: Vec<Transaction>,
	pub receipts: HashMap<Vec<u8>, TransactionReceipt>,
	pub code: HashMap<Address, Bytes>,
	/// Creation transactions are mined but revert.
	pub revert_creates: bool,
	/// Blocks stop being produced after inclusion.
	pub stalled: bool,
}

/// A chain that mines every transaction in its own block and produces
/// blocks on demand while a caller waits for confirmations.
#[derive(Clone, Default)]
pub struct FakeChain {
	pub state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
	pub fn with_code(self, address: Address) -> Self {
		self.state
			.lock()
			.unwrap()
			.code
			.insert(address, Bytes::from(vec![0x60, 0x80]));
		self
	}

	pub fn submitted(&self) -> Vec<Transaction> {
		self.state.lock().unwrap().submitted.clone()
	}

	pub fn service(&self, chain_ids: &[u64]) -> Arc<DeliveryService> {
		let implementation: Arc<dyn DeliveryInterface> = Arc::new(self.clone());
		let implementations = chain_ids
			.iter()
			.map(|id| (*id, implementation.clone()))
			.collect();
		Arc::new(DeliveryService::new(implementations))
	}
}

#[async_trait]
impl DeliveryInterface for FakeChain {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(EmptySchema)
	}

	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		let mut state = self.state.lock().unwrap();
		state.head += 1;
		let nonce = state.submitted.len() as u8 + 1;
		let hash = TransactionHash(vec![nonce; 32]);

		let contract_address = tx.is_create().then(|| Address::repeat_byte(0xc0 + nonce));
		let success = !(tx.is_create() && state.revert_creates);
		if let (Some(address), true) = (contract_address, success) {
			state.code.insert(address, Bytes::from(vec![0x60, 0x80]));
		}

		let receipt = TransactionReceipt {
			hash: hash.clone(),
			block_number: state.head,
			success,
			contract_address: contract_address.filter(|_| success),
			logs: vec![],
			confirmations: 1,
		};
		state.receipts.insert(hash.0.clone(), receipt);
		state.submitted.push(tx);
		Ok(hash)
	}

	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		_chain_id: u64,
		confirmations: u64,
		_timeout: Duration,
	) -> Result<TransactionReceipt, DeliveryError> {
		let mut state = self.state.lock().unwrap();
		let mut receipt = state
			.receipts
			.get(&hash.0)
			.cloned()
			.ok_or_else(|| DeliveryError::Network("unknown transaction".into()))?;

		let wanted_head = receipt.block_number + confirmations.saturating_sub(1);
		if state.stalled {
			return Err(DeliveryError::Timeout {
				hash: hash.to_string(),
				required: confirmations,
				observed: state.head - receipt.block_number + 1,
				waited_secs: 0,
			});
		}
		state.head = state.head.max(wanted_head);
		receipt.confirmations = state.head - receipt.block_number + 1;
		Ok(receipt)
	}

	async fn get_code(&self, address: Address, _chain_id: u64) -> Result<Bytes, DeliveryError> {
		Ok(self
			.state
			.lock()
			.unwrap()
			.code
			.get(&address)
			.cloned()
			.unwrap_or_default())
	}
}

#[derive(Default)]
pub struct CoordinatorState {
	pub next_subscription_id: u64,
	pub fundings: Vec<(u64, U256)>,
	pub consumers: Vec<(u64, Address)>,
	pub reject_consumers: bool,
}

/// A VRF coordinator mock that hands out sequential subscription ids.
#[derive(Clone, Default)]
pub struct FakeCoordinator {
	pub state: Arc<Mutex<CoordinatorState>>,
}

#[async_trait]
impl RandomnessServiceInterface for FakeCoordinator {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(EmptySchema)
	}

	async fn create_subscription(
		&self,
		_coordinator: Address,
		_chain_id: u64,
	) -> Result<SubscriptionCreated, RandomnessError> {
		let mut state = self.state.lock().unwrap();
		state.next_subscription_id += 1;
		Ok(SubscriptionCreated {
			subscription_id: state.next_subscription_id,
			owner: Address::repeat_byte(0xaa),
		})
	}

	async fn fund_subscription(
		&self,
		_coordinator: Address,
		_chain_id: u64,
		subscription_id: u64,
		amount: U256,
	) -> Result<TransactionHash, RandomnessError> {
		self.state
			.lock()
			.unwrap()
			.fundings
			.push((subscription_id, amount));
		Ok(TransactionHash(vec![0xf0; 32]))
	}

	async fn add_consumer(
		&self,
		_coordinator: Address,
		_chain_id: u64,
		subscription_id: u64,
		consumer: Address,
	) -> Result<TransactionHash, RandomnessError> {
		let mut state = self.state.lock().unwrap();
		if state.reject_consumers || subscription_id > state.next_subscription_id {
			return Err(RandomnessError::Reverted {
				call: "addConsumer",
				tx_hash: "0x0c".into(),
			});
		}
		state.consumers.push((subscription_id, consumer));
		Ok(TransactionHash(vec![0x0c; 32]))
	}
}

mock! {
	pub Explorer {}

	#[async_trait]
	impl ExplorerInterface for Explorer {
		fn config_schema(&self) -> Box<dyn ConfigSchema>;
		async fn verify(
			&self,
			endpoint: &ExplorerEndpoint,
			request: &VerificationRequest,
			source: &VerificationSource,
		) -> Result<VerificationOutcome, ExplorerError>;
	}
}
