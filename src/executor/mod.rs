//! Message calls, contract creation and transaction execution on top of the
//! world state.

mod call;
mod frame;
pub mod precompiles;
mod transaction;

pub use self::call::{contract_creation, create_address, message_call};
pub use self::transaction::{execute_transaction, ExTxResult};

use crate::types::Log;
use devnode_core::{CreateScheme, ExitReason, Failure};
use primitive_types::{H160, H256, U256};
use std::collections::BTreeSet;

/// Block environment visible to executing code.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChainContext {
	pub coinbase: H160,
	/// Number of the block being built.
	pub number: u64,
	pub timestamp: u64,
	pub difficulty: U256,
	pub gas_limit: u64,
	pub chain_id: u64,
	/// Hashes of the most recent blocks, oldest first. The last entry is
	/// the parent of the block being built.
	pub block_hashes: Vec<H256>,
}

impl ChainContext {
	/// Hash of a recent ancestor. Zero for the current block, future blocks
	/// and blocks older than the kept window.
	pub fn block_hash(&self, number: U256) -> H256 {
		if number >= U256::from(self.number) {
			return H256::zero();
		}
		let distance = (self.number - number.as_u64()) as usize;
		if distance > self.block_hashes.len() {
			return H256::zero();
		}
		self.block_hashes[self.block_hashes.len() - distance]
	}
}

/// Side effects accumulated by a call tree.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Substrate {
	pub logs: Vec<Log>,
	pub selfdestructs: BTreeSet<H160>,
	pub touched: BTreeSet<H160>,
	pub refund: i64,
}

impl Substrate {
	/// Absorb the substrate of a successful nested frame.
	pub fn merge(&mut self, other: Substrate) {
		self.logs.extend(other.logs);
		self.selfdestructs.extend(other.selfdestructs);
		self.touched.extend(other.touched);
		self.refund += other.refund;
	}
}

#[derive(Clone, Debug)]
pub struct CallParams {
	pub caller: H160,
	pub origin: H160,
	/// Account whose code runs.
	pub code_owner: H160,
	/// Account whose storage and balance the code acts on.
	pub recipient: H160,
	pub gas: u64,
	pub gas_price: U256,
	/// Value moved from `caller` to `recipient`.
	pub transfer_value: U256,
	/// Value reported by `CALLVALUE`.
	pub execution_value: U256,
	pub input: Vec<u8>,
	pub depth: usize,
	/// False for read-only calls.
	pub modify: bool,
	/// Accounts already self-destructed by the enclosing frames.
	pub destroyed: BTreeSet<H160>,
}

#[derive(Clone, Debug)]
pub struct CreateParams {
	pub caller: H160,
	pub origin: H160,
	pub scheme: CreateScheme,
	pub gas: u64,
	pub gas_price: U256,
	/// Endowment moved from `caller` to the new account.
	pub value: U256,
	pub init_code: Vec<u8>,
	pub depth: usize,
	/// Accounts already self-destructed by the enclosing frames.
	pub destroyed: BTreeSet<H160>,
}

/// Outcome of a message call or contract creation.
#[derive(Clone, Debug)]
pub struct CallResult {
	pub reason: ExitReason,
	pub returned: Vec<u8>,
	pub remaining_gas: u64,
	/// Side effects of the call tree. Empty unless the call succeeded.
	pub substrate: Substrate,
	pub failure: Option<Failure>,
	/// Address of the contract created by a successful creation.
	pub created: Option<H160>,
}

impl CallResult {
	pub(crate) fn failed(reason: impl Into<ExitReason>, remaining_gas: u64) -> Self {
		Self {
			reason: reason.into(),
			returned: Vec::new(),
			remaining_gas,
			substrate: Substrate::default(),
			failure: None,
			created: None,
		}
	}

	pub fn is_success(&self) -> bool {
		self.reason.is_succeed()
	}

	/// Stopped by `REVERT` or by an error. Either way no state survives.
	pub fn is_reverted(&self) -> bool {
		!self.reason.is_succeed()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn block_hash_window() {
		let context = ChainContext {
			number: 3,
			block_hashes: vec![H256::repeat_byte(0), H256::repeat_byte(1), H256::repeat_byte(2)],
			..Default::default()
		};
		assert_eq!(context.block_hash(U256::from(2)), H256::repeat_byte(2));
		assert_eq!(context.block_hash(U256::from(0)), H256::repeat_byte(0));
		assert_eq!(context.block_hash(U256::from(3)), H256::zero());
		assert_eq!(context.block_hash(U256::MAX), H256::zero());
	}
}
