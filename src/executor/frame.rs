use super::call::{contract_creation, message_call};
use super::{CallParams, CallResult, ChainContext, CreateParams, Substrate};
use crate::error::StateError;
use crate::state::WorldState;
use crate::types::Log;
use devnode_core::{
	CallRequest, Config, CreateRequest, ExitError, ExitFatal, Handler, Outcome,
};
use primitive_types::{H160, H256, U256};
use std::cell::RefCell;
use std::collections::BTreeSet;

/// Handler of one running frame. World state failures cannot be expressed
/// as exit reasons, so the first one is kept aside and surfaced once the
/// frame stops.
pub(crate) struct Frame<'a> {
	state: &'a mut WorldState,
	chain: &'a ChainContext,
	config: &'a Config,
	origin: H160,
	gas_price: U256,
	depth: usize,
	modify: bool,
	destroyed: BTreeSet<H160>,
	substrate: Substrate,
	fatal: RefCell<Option<StateError>>,
}

impl<'a> Frame<'a> {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		state: &'a mut WorldState,
		chain: &'a ChainContext,
		config: &'a Config,
		origin: H160,
		gas_price: U256,
		depth: usize,
		modify: bool,
		destroyed: BTreeSet<H160>,
	) -> Self {
		Self {
			state,
			chain,
			config,
			origin,
			gas_price,
			depth,
			modify,
			destroyed,
			substrate: Substrate::default(),
			fatal: RefCell::new(None),
		}
	}

	pub fn finish(self) -> (Substrate, Option<StateError>) {
		(self.substrate, self.fatal.into_inner())
	}

	fn record_fatal(&self, error: StateError) {
		log::error!(target: "evm", "world state failure at depth {}: {}", self.depth, error);
		let mut fatal = self.fatal.borrow_mut();
		if fatal.is_none() {
			*fatal = Some(error);
		}
	}

	fn read<T: Default>(&self, value: Result<T, StateError>) -> T {
		value.unwrap_or_else(|e| {
			self.record_fatal(e);
			T::default()
		})
	}

	fn write<T>(&self, value: Result<T, StateError>) -> Result<T, ExitError> {
		value.map_err(|e| {
			self.record_fatal(e);
			ExitError::Other("world state failure".into())
		})
	}

	fn fatal_outcome(&self, error: StateError) -> Outcome {
		self.record_fatal(error);
		Outcome::failed(ExitFatal::Other("world state failure".into()), 0)
	}

	/// Self-destructs visible to a nested frame.
	fn inherited_destroyed(&self) -> BTreeSet<H160> {
		self.destroyed
			.union(&self.substrate.selfdestructs)
			.copied()
			.collect()
	}

	fn absorb(&mut self, result: CallResult) -> Outcome {
		if result.is_success() {
			self.substrate.merge(result.substrate);
		}
		Outcome {
			reason: result.reason,
			output: result.returned,
			gas_left: result.remaining_gas,
			address: result.created,
		}
	}

	fn self_destruct(&mut self, address: H160, target: H160) -> Result<(), StateError> {
		let balance = self.state.balance(address)?;
		if target != address && !balance.is_zero() {
			self.state.add_balance(target, balance)?;
		}
		self.state.sub_balance(address, balance)?;

		self.substrate.selfdestructs.insert(address);
		self.substrate.touched.insert(target);
		Ok(())
	}
}

impl<'a> Handler for Frame<'a> {
	fn balance(&self, address: H160) -> U256 {
		self.read(self.state.balance(address))
	}

	fn code_size(&self, address: H160) -> U256 {
		U256::from(self.read(self.state.code(address)).len())
	}

	fn code_hash(&self, address: H160) -> H256 {
		self.read(self.state.account_record(address))
			.map(|record| record.code_hash)
			.unwrap_or_default()
	}

	fn code(&self, address: H160) -> Vec<u8> {
		self.read(self.state.code(address)).to_vec()
	}

	fn storage(&self, address: H160, index: H256) -> H256 {
		self.read(self.state.storage(address, index))
	}

	fn original_storage(&self, address: H160, index: H256) -> H256 {
		self.read(self.state.original_storage(address, index))
	}

	fn gas_price(&self) -> U256 {
		self.gas_price
	}

	fn origin(&self) -> H160 {
		self.origin
	}

	fn block_hash(&self, number: U256) -> H256 {
		self.chain.block_hash(number)
	}

	fn block_number(&self) -> U256 {
		U256::from(self.chain.number)
	}

	fn block_coinbase(&self) -> H160 {
		self.chain.coinbase
	}

	fn block_timestamp(&self) -> U256 {
		U256::from(self.chain.timestamp)
	}

	fn block_difficulty(&self) -> U256 {
		self.chain.difficulty
	}

	fn block_gas_limit(&self) -> U256 {
		U256::from(self.chain.gas_limit)
	}

	fn chain_id(&self) -> U256 {
		U256::from(self.chain.chain_id)
	}

	fn exists(&self, address: H160) -> bool {
		self.read(self.state.exists(address))
	}

	fn is_empty(&self, address: H160) -> bool {
		self.read(self.state.is_empty(address))
	}

	fn deleted(&self, address: H160) -> bool {
		self.destroyed.contains(&address) || self.substrate.selfdestructs.contains(&address)
	}

	fn set_storage(&mut self, address: H160, index: H256, value: H256) -> Result<(), ExitError> {
		if !self.modify {
			return Err(ExitError::StaticModeViolation);
		}
		let result = self.state.set_storage(address, index, value);
		self.write(result)
	}

	fn log(&mut self, address: H160, topics: Vec<H256>, data: Vec<u8>) -> Result<(), ExitError> {
		if !self.modify {
			return Err(ExitError::StaticModeViolation);
		}
		self.substrate.logs.push(Log {
			address,
			topics,
			data,
		});
		Ok(())
	}

	fn mark_delete(&mut self, address: H160, target: H160) -> Result<(), ExitError> {
		if !self.modify {
			return Err(ExitError::StaticModeViolation);
		}
		let result = self.self_destruct(address, target);
		self.write(result)
	}

	fn call(&mut self, request: CallRequest) -> Outcome {
		let transfer_value = request
			.transfer
			.as_ref()
			.map(|transfer| transfer.value)
			.unwrap_or_default();

		let params = CallParams {
			caller: request.context.caller,
			origin: self.origin,
			code_owner: request.code_address,
			recipient: request.context.address,
			gas: request.gas_limit,
			gas_price: self.gas_price,
			transfer_value,
			execution_value: request.context.apparent_value,
			input: request.input,
			depth: self.depth + 1,
			modify: self.modify && !request.is_static,
			destroyed: self.inherited_destroyed(),
		};

		match message_call(self.state, self.chain, self.config, params) {
			Ok(result) => self.absorb(result),
			Err(e) => self.fatal_outcome(e),
		}
	}

	fn create(&mut self, request: CreateRequest) -> Outcome {
		if !self.modify {
			return Outcome::failed(ExitError::StaticModeViolation, 0);
		}
		if self.depth + 1 > self.config.call_stack_limit {
			return Outcome::failed(ExitError::CallTooDeep, request.gas_limit);
		}
		if self.balance(request.caller) < request.value {
			return Outcome::failed(ExitError::OutOfFund, request.gas_limit);
		}
		if let Err(e) = self.state.inc_nonce(request.caller) {
			return self.fatal_outcome(e);
		}

		let params = CreateParams {
			caller: request.caller,
			origin: self.origin,
			scheme: request.scheme,
			gas: request.gas_limit,
			gas_price: self.gas_price,
			value: request.value,
			init_code: request.init_code,
			depth: self.depth + 1,
			destroyed: self.inherited_destroyed(),
		};

		match contract_creation(self.state, self.chain, self.config, params) {
			Ok(result) => self.absorb(result),
			Err(e) => self.fatal_outcome(e),
		}
	}
}
