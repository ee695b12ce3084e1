//! Node settings, loadable from YAML.

use crate::blockchain::ChainParams;
use crate::error::ConfigError;
use devnode_core::Config;
use primitive_types::{H160, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// EVM rule set the node executes with.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Hardfork {
	Petersburg,
	#[default]
	Istanbul,
}

impl Hardfork {
	pub fn config(&self) -> Config {
		match self {
			Self::Petersburg => Config::petersburg(),
			Self::Istanbul => Config::istanbul(),
		}
	}
}

/// Account seeded into the genesis state.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GenesisAccount {
	pub balance: U256,
	pub nonce: U256,
	/// Hex encoded code, with or without a `0x` prefix.
	pub code: String,
}

impl GenesisAccount {
	pub fn code_bytes(&self) -> Result<Vec<u8>, ConfigError> {
		let code = self.code.strip_prefix("0x").unwrap_or(&self.code);
		Ok(hex::decode(code)?)
	}
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
	pub chain_id: u64,
	pub coinbase: H160,
	pub block_gas_limit: u64,
	/// Gas limit of calls and transactions that do not name one.
	pub default_gas_limit: u64,
	pub default_gas_price: U256,
	/// Delay before pending transactions are mined. Transactions are mined
	/// as they arrive when unset.
	pub block_time_ms: Option<u64>,
	pub hardfork: Hardfork,
	pub genesis_timestamp: u64,
	pub genesis: BTreeMap<H160, GenesisAccount>,
}

impl Default for NodeConfig {
	fn default() -> Self {
		Self {
			chain_id: 1337,
			coinbase: H160::zero(),
			block_gas_limit: 6_721_975,
			default_gas_limit: 6_721_975,
			default_gas_price: U256::from(20_000_000_000u64),
			block_time_ms: None,
			hardfork: Hardfork::default(),
			genesis_timestamp: 0,
			genesis: BTreeMap::new(),
		}
	}
}

impl NodeConfig {
	pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
		Ok(serde_yaml::from_str(source)?)
	}

	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let source = std::fs::read_to_string(path)?;
		Self::from_yaml(&source)
	}

	pub fn evm_config(&self) -> Config {
		self.hardfork.config()
	}

	pub fn chain_params(&self) -> ChainParams {
		ChainParams {
			chain_id: self.chain_id,
			coinbase: self.coinbase,
			block_gas_limit: self.block_gas_limit,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn yaml_with_defaults() {
		let config = NodeConfig::from_yaml(
			r#"
chain_id: 5
hardfork: petersburg
block_time_ms: 250
genesis:
  "0x1000000000000000000000000000000000000001":
    balance: "0xde0b6b3a7640000"
    code: "0x6000"
"#,
		)
		.unwrap();

		assert_eq!(config.chain_id, 5);
		assert_eq!(config.hardfork, Hardfork::Petersburg);
		assert_eq!(config.block_time_ms, Some(250));
		assert_eq!(config.block_gas_limit, NodeConfig::default().block_gas_limit);

		let address = H160::from_slice(&hex::decode("1000000000000000000000000000000000000001").unwrap());
		let account = &config.genesis[&address];
		assert_eq!(account.balance, U256::from(1_000_000_000_000_000_000u64));
		assert_eq!(account.nonce, U256::zero());
		assert_eq!(account.code_bytes().unwrap(), vec![0x60, 0x00]);
		assert_eq!(config.evm_config().gas_sload, 200);
	}

	#[test]
	fn unknown_hardfork_is_an_error() {
		assert!(matches!(
			NodeConfig::from_yaml("hardfork: frontier"),
			Err(ConfigError::Yaml(_))
		));
	}
}
