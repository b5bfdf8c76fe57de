//! Common types module for the VRF consumer deployer.
//!
//! This module defines the data model shared by every deployer component:
//! chain profiles and their environment classification, randomness
//! subscriptions, deployment artifacts and records, transaction receipts,
//! and the configuration validation framework used by pluggable implementations.

/// Transaction submission and receipt types.
pub mod delivery;
/// Deployment artifacts, constructor arguments, records and verification outcomes.
pub mod deployment;
/// Raw per-network configuration as read from TOML.
pub mod networks;
/// Resolved chain profiles and environment classification.
pub mod profile;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Secure string type for private keys and API credentials.
pub mod secret_string;
/// Randomness subscription types.
pub mod subscription;
/// Utility functions for formatting and parsing.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use delivery::*;
pub use deployment::*;
pub use networks::{ExplorerConfig, NetworkConfig, NetworksConfig};
pub use profile::{ChainProfile, EnvironmentClass};
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use subscription::*;
pub use utils::{truncate_id, with_0x_prefix, without_0x_prefix};
pub use validation::*;

pub use alloy_primitives::{Address, Bytes, B256, U256};
