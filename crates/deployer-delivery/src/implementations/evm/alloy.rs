//! Alloy-based EVM delivery.
//!
//! One HTTP provider per configured network, each with the recommended fillers
//! (nonce, gas, chain id) and a wallet built from the deployer key.

use crate::{DeliveryError, DeliveryFactory, DeliveryInterface, DeliveryRegistry};
use alloy_network::{EthereumWallet, ReceiptResponse};
use alloy_primitives::{Address, Bytes, B256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
use async_trait::async_trait;
use deployer_types::{
	truncate_id, without_0x_prefix, ConfigSchema, EventLog, Field, FieldType,
	ImplementationRegistry, NetworksConfig, Schema, SecretString, Transaction, TransactionHash,
	TransactionReceipt, ValidationError,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type HttpProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Number of confirmations a transaction mined in `tx_block` has at `head`.
///
/// The inclusion block counts as the first confirmation.
pub fn confirmations_at(tx_block: u64, head: u64) -> u64 {
	if head < tx_block {
		0
	} else {
		head - tx_block + 1
	}
}

/// Alloy delivery over HTTP, serving one or more networks.
pub struct AlloyDelivery {
	providers: HashMap<u64, HttpProvider>,
	poll_interval: Duration,
}

impl AlloyDelivery {
	/// Creates providers for `network_ids`, all signing with `signer`.
	pub fn new(
		network_ids: &[u64],
		networks: &NetworksConfig,
		signer: PrivateKeySigner,
		poll_interval: Duration,
	) -> Result<Self, DeliveryError> {
		if network_ids.is_empty() {
			return Err(DeliveryError::InvalidConfig(
				"At least one network_id must be specified".to_string(),
			));
		}

		let mut providers = HashMap::new();
		for network_id in network_ids {
			let network = networks.get(network_id).ok_or_else(|| {
				DeliveryError::InvalidConfig(format!(
					"Network {} not found in configuration",
					network_id
				))
			})?;

			let url = network.rpc_url.parse().map_err(|e| {
				DeliveryError::InvalidConfig(format!(
					"Invalid RPC URL for network {}: {}",
					network_id, e
				))
			})?;

			let wallet = EthereumWallet::from(signer.clone().with_chain_id(Some(*network_id)));
			let provider = ProviderBuilder::new()
				.with_recommended_fillers()
				.wallet(wallet)
				.on_http(url);
			provider.client().set_poll_interval(poll_interval);

			providers.insert(*network_id, Arc::new(provider) as HttpProvider);
		}

		Ok(Self {
			providers,
			poll_interval,
		})
	}

	fn get_provider(&self, chain_id: u64) -> Result<&HttpProvider, DeliveryError> {
		self.providers
			.get(&chain_id)
			.ok_or(DeliveryError::NoProviderAvailable(chain_id))
	}
}

fn to_tx_hash(hash: &TransactionHash) -> Result<B256, DeliveryError> {
	if hash.0.len() != 32 {
		return Err(DeliveryError::Network(format!(
			"Invalid transaction hash length: {}",
			hash.0.len()
		)));
	}
	Ok(B256::from_slice(&hash.0))
}

fn convert_receipt(
	receipt: &alloy_rpc_types::TransactionReceipt,
	confirmations: u64,
) -> TransactionReceipt {
	let logs = receipt
		.inner
		.logs()
		.iter()
		.map(|log| EventLog {
			address: log.address(),
			topics: log.topics().to_vec(),
			data: log.data().data.clone(),
		})
		.collect();

	TransactionReceipt {
		hash: TransactionHash::from(receipt.transaction_hash),
		block_number: receipt.block_number.unwrap_or(0),
		success: receipt.status(),
		contract_address: receipt.contract_address,
		logs,
		confirmations,
	}
}

/// A receipt as far as the confirmation wait cares.
pub(crate) struct Mined<R> {
	pub block_number: Option<u64>,
	pub success: bool,
	pub receipt: R,
}

/// Chain reads behind the confirmation wait.
#[async_trait]
pub(crate) trait ReceiptSource: Send + Sync {
	type Receipt: Send;

	async fn mined(&self, hash: B256) -> Result<Option<Mined<Self::Receipt>>, DeliveryError>;

	async fn head(&self) -> Result<u64, DeliveryError>;
}

struct ProviderSource<'a>(&'a HttpProvider);

#[async_trait]
impl ReceiptSource for ProviderSource<'_> {
	type Receipt = alloy_rpc_types::TransactionReceipt;

	async fn mined(&self, hash: B256) -> Result<Option<Mined<Self::Receipt>>, DeliveryError> {
		let receipt = self
			.0
			.get_transaction_receipt(hash)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get receipt: {}", e)))?;
		Ok(receipt.map(|receipt| Mined {
			block_number: receipt.block_number,
			success: receipt.status(),
			receipt,
		}))
	}

	async fn head(&self) -> Result<u64, DeliveryError> {
		self.0
			.get_block_number()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get block number: {}", e)))
	}
}

/// Polls until `hash` is `confirmations` deep, it reverts, or `timeout`
/// elapses. The deadline also bounds RPC calls that never answer.
pub(crate) async fn await_depth<S: ReceiptSource>(
	source: &S,
	hash: B256,
	confirmations: u64,
	timeout: Duration,
	poll_interval: Duration,
) -> Result<(S::Receipt, u64), DeliveryError> {
	let mut observed = 0;
	let outcome = tokio::time::timeout(
		timeout,
		poll_depth(source, hash, confirmations, poll_interval, &mut observed),
	)
	.await;

	match outcome {
		Ok(result) => result,
		Err(_) => Err(DeliveryError::Timeout {
			hash: hash.to_string(),
			required: confirmations,
			observed,
			waited_secs: timeout.as_secs(),
		}),
	}
}

async fn poll_depth<S: ReceiptSource>(
	source: &S,
	hash: B256,
	confirmations: u64,
	poll_interval: Duration,
	observed: &mut u64,
) -> Result<(S::Receipt, u64), DeliveryError> {
	loop {
		let Some(mined) = source.mined(hash).await? else {
			tokio::time::sleep(poll_interval).await;
			continue;
		};

		let head = source.head().await?;
		*observed = confirmations_at(mined.block_number.unwrap_or(head), head);

		// A revert will not get any better with depth
		if !mined.success || *observed >= confirmations {
			return Ok((mined.receipt, *observed));
		}

		tracing::debug!(
			remaining = confirmations.saturating_sub(*observed),
			"Waiting for more confirmations"
		);
		tokio::time::sleep(poll_interval).await;
	}
}

/// Schema for the delivery table.
///
/// ```toml
/// network_ids = [31337]
/// poll_interval_ms = 2000
/// ```
pub struct AlloyDeliverySchema;

impl ConfigSchema for AlloyDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new(
				"network_ids",
				FieldType::Array(Box::new(FieldType::Integer {
					min: Some(1),
					max: None,
				})),
			)
			.with_validator(|value| match value.as_array() {
				Some(ids) if ids.is_empty() => Err("network_ids cannot be empty".to_string()),
				_ => Ok(()),
			})],
			vec![Field::new(
				"poll_interval_ms",
				FieldType::Integer {
					min: Some(1),
					max: Some(60_000),
				},
			)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AlloyDeliverySchema)
	}

	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		let chain_id = tx.chain_id;
		let is_create = tx.is_create();
		let provider = self.get_provider(chain_id)?;
		let request: TransactionRequest = tx.into();

		let pending = provider.send_transaction(request).await.map_err(|e| {
			if e.as_error_resp().is_some() {
				DeliveryError::Rejected(e.to_string())
			} else {
				DeliveryError::Network(format!("Failed to send transaction: {}", e))
			}
		})?;

		let hash = TransactionHash::from(*pending.tx_hash());
		tracing::info!(
			tx_hash = %truncate_id(&hash.to_string()),
			chain_id,
			is_create,
			"Submitted transaction"
		);
		Ok(hash)
	}

	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		chain_id: u64,
		confirmations: u64,
		timeout: Duration,
	) -> Result<TransactionReceipt, DeliveryError> {
		let tx_hash = to_tx_hash(hash)?;
		let provider = self.get_provider(chain_id)?;

		tracing::info!(
			tx_hash = %truncate_id(&hash.to_string()),
			confirmations,
			timeout_secs = timeout.as_secs(),
			"Waiting for confirmations"
		);

		let (receipt, observed) = await_depth(
			&ProviderSource(provider),
			tx_hash,
			confirmations,
			timeout,
			self.poll_interval,
		)
		.await?;
		Ok(convert_receipt(&receipt, observed))
	}

	async fn get_code(&self, address: Address, chain_id: u64) -> Result<Bytes, DeliveryError> {
		let provider = self.get_provider(chain_id)?;
		provider
			.get_code_at(address)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get code at {}: {}", address, e)))
	}
}

/// Creates an Alloy delivery from its table and the deployer key.
pub fn create_delivery(
	config: &toml::Value,
	networks: &NetworksConfig,
	private_key: &SecretString,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	AlloyDeliverySchema
		.validate(config)
		.map_err(|e| DeliveryError::InvalidConfig(e.to_string()))?;

	let network_ids = config
		.get("network_ids")
		.and_then(|v| v.as_array())
		.map(|ids| {
			ids.iter()
				.filter_map(|v| v.as_integer())
				.map(|v| v as u64)
				.collect::<Vec<_>>()
		})
		.unwrap_or_default();

	let poll_interval_ms = config
		.get("poll_interval_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_POLL_INTERVAL_MS);

	let signer = private_key.with_exposed(|key| {
		without_0x_prefix(key)
			.parse::<PrivateKeySigner>()
			.map_err(|e| DeliveryError::InvalidConfig(format!("Invalid private key: {}", e)))
	})?;

	let delivery = AlloyDelivery::new(
		&network_ids,
		networks,
		signer,
		Duration::from_millis(poll_interval_ms),
	)?;
	Ok(Box::new(delivery))
}

/// Registry for the Alloy delivery implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "evm_alloy";
	type Factory = DeliveryFactory;

	fn factory() -> Self::Factory {
		create_delivery
	}
}

impl DeliveryRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use deployer_types::NetworkConfig;
	use std::sync::atomic::{AtomicU64, Ordering};

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn networks(rpc_url: &str) -> NetworksConfig {
		let mut networks = HashMap::new();
		networks.insert(
			31337,
			NetworkConfig {
				name: "localhost".into(),
				rpc_url: rpc_url.into(),
				vrf_coordinator: None,
				subscription_id: None,
				gas_lane: B256::ZERO,
				callback_gas_limit: 500_000,
				fight_fee: Default::default(),
				mint_fee: Default::default(),
				required_confirmations: None,
				explorer: None,
			},
		);
		networks
	}

	#[test]
	fn test_inclusion_block_is_first_confirmation() {
		assert_eq!(confirmations_at(10, 10), 1);
		assert_eq!(confirmations_at(10, 15), 6);
		assert_eq!(confirmations_at(10, 9), 0);
	}

	/// Chain whose head advances by `step` blocks on every read.
	struct ScriptedChain {
		mined_in: Option<u64>,
		success: bool,
		head: AtomicU64,
		step: u64,
		stall_receipts: bool,
	}

	impl ScriptedChain {
		fn mined(block: u64, head: u64, step: u64) -> Self {
			Self {
				mined_in: Some(block),
				success: true,
				head: AtomicU64::new(head),
				step,
				stall_receipts: false,
			}
		}
	}

	#[async_trait]
	impl ReceiptSource for ScriptedChain {
		type Receipt = u64;

		async fn mined(&self, _hash: B256) -> Result<Option<Mined<u64>>, DeliveryError> {
			if self.stall_receipts {
				std::future::pending::<()>().await;
			}
			Ok(self.mined_in.map(|block| Mined {
				block_number: Some(block),
				success: self.success,
				receipt: block,
			}))
		}

		async fn head(&self) -> Result<u64, DeliveryError> {
			Ok(self.head.fetch_add(self.step, Ordering::SeqCst))
		}
	}

	const POLL: Duration = Duration::from_millis(1);

	#[tokio::test]
	async fn test_wait_returns_once_depth_is_reached() {
		let chain = ScriptedChain::mined(10, 10, 1);

		let (block, observed) =
			await_depth(&chain, B256::ZERO, 3, Duration::from_secs(5), POLL)
				.await
				.unwrap();
		assert_eq!(block, 10);
		assert_eq!(observed, 3);
	}

	#[tokio::test]
	async fn test_wait_returns_reverted_receipt_immediately() {
		let mut chain = ScriptedChain::mined(10, 10, 0);
		chain.success = false;

		let (_, observed) = await_depth(&chain, B256::ZERO, 6, Duration::from_secs(5), POLL)
			.await
			.unwrap();
		assert_eq!(observed, 1);
	}

	#[tokio::test]
	async fn test_wait_times_out_with_last_observed_depth() {
		// Head stuck two blocks past inclusion.
		let chain = ScriptedChain::mined(10, 11, 0);

		let err = await_depth(&chain, B256::repeat_byte(1), 6, Duration::from_millis(50), POLL)
			.await
			.unwrap_err();
		match err {
			DeliveryError::Timeout {
				hash,
				required,
				observed,
				..
			} => {
				assert_eq!(hash, B256::repeat_byte(1).to_string());
				assert_eq!(required, 6);
				assert_eq!(observed, 2);
			},
			other => panic!("unexpected error: {other}"),
		}
	}

	#[tokio::test]
	async fn test_wait_is_bounded_when_the_node_stalls() {
		let mut chain = ScriptedChain::mined(10, 10, 1);
		chain.stall_receipts = true;

		let err = await_depth(&chain, B256::ZERO, 1, Duration::from_millis(50), POLL)
			.await
			.unwrap_err();
		assert!(matches!(err, DeliveryError::Timeout { observed: 0, .. }));
	}

	#[test]
	fn test_schema_requires_network_ids() {
		let config: toml::Value = toml::from_str("poll_interval_ms = 100").unwrap();
		assert!(AlloyDeliverySchema.validate(&config).is_err());

		let config: toml::Value = toml::from_str("network_ids = []").unwrap();
		assert!(AlloyDeliverySchema.validate(&config).is_err());

		let config: toml::Value = toml::from_str("network_ids = [31337]").unwrap();
		assert!(AlloyDeliverySchema.validate(&config).is_ok());
	}

	#[tokio::test]
	async fn test_factory_builds_provider_per_network() {
		let config: toml::Value =
			toml::from_str("network_ids = [31337]\npoll_interval_ms = 50").unwrap();
		let delivery =
			create_delivery(&config, &networks("http://127.0.0.1:8545"), &SecretString::from(KEY));
		assert!(delivery.is_ok());
	}

	#[tokio::test]
	async fn test_factory_rejects_unknown_network() {
		let config: toml::Value = toml::from_str("network_ids = [5]").unwrap();
		let result =
			create_delivery(&config, &networks("http://127.0.0.1:8545"), &SecretString::from(KEY));
		assert!(matches!(result, Err(DeliveryError::InvalidConfig(_))));
	}

	#[tokio::test]
	async fn test_factory_rejects_bad_rpc_url() {
		let config: toml::Value = toml::from_str("network_ids = [31337]").unwrap();
		let result = create_delivery(&config, &networks("not a url"), &SecretString::from(KEY));
		assert!(matches!(result, Err(DeliveryError::InvalidConfig(_))));
	}
}
