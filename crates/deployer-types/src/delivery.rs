//! Transaction delivery types.
//!
//! These types describe what the deployer submits to a chain and what it reads
//! back, independently of the RPC library used to talk to the node.

use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_rpc_types::{TransactionInput, TransactionRequest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A transaction to be signed and submitted by the deployer account.
///
/// `to == None` makes it a contract creation; `data` then carries the creation
/// bytecode followed by the ABI-encoded constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
	pub chain_id: u64,
	pub to: Option<Address>,
	pub data: Bytes,
	pub value: U256,
}

impl Transaction {
	/// Builds a contract creation transaction.
	pub fn create(chain_id: u64, init_code: Bytes) -> Self {
		Self {
			chain_id,
			to: None,
			data: init_code,
			value: U256::ZERO,
		}
	}

	/// Builds a call to an existing contract.
	pub fn call(chain_id: u64, to: Address, data: Bytes) -> Self {
		Self {
			chain_id,
			to: Some(to),
			data,
			value: U256::ZERO,
		}
	}

	pub fn is_create(&self) -> bool {
		self.to.is_none()
	}
}

impl From<Transaction> for TransactionRequest {
	fn from(tx: Transaction) -> Self {
		let mut request = TransactionRequest::default()
			.input(TransactionInput::new(tx.data))
			.value(tx.value);
		request.chain_id = Some(tx.chain_id);
		request.to = Some(match tx.to {
			Some(to) => TxKind::Call(to),
			None => TxKind::Create,
		});
		request
	}
}

/// Blockchain transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHash(pub Vec<u8>);

impl From<B256> for TransactionHash {
	fn from(hash: B256) -> Self {
		Self(hash.0.to_vec())
	}
}

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(&self.0))
	}
}

/// A log entry emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
	pub address: Address,
	pub topics: Vec<B256>,
	pub data: Bytes,
}

/// Transaction receipt containing execution details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TransactionHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
	/// Address of the created contract, for creation transactions.
	pub contract_address: Option<Address>,
	/// Logs emitted during execution.
	pub logs: Vec<EventLog>,
	/// Confirmations observed when the receipt was read. The inclusion block
	/// counts as the first confirmation.
	pub confirmations: u64,
}
