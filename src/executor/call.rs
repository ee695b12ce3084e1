use super::frame::Frame;
use super::{precompiles, CallParams, CallResult, ChainContext, CreateParams, Substrate};
use crate::error::StateError;
use crate::state::WorldState;
use crate::types::EMPTY_CODE_HASH;
use devnode_core::utils::keccak256;
use devnode_core::{
	Config, Context, CreateScheme, ExitError, ExitReason, ExitSucceed, Machine,
};
use primitive_types::{H160, U256};

/// Address a creation under `scheme` deploys to. For legacy creations the
/// creator nonce must already have been advanced.
pub fn create_address(state: &WorldState, scheme: CreateScheme) -> Result<H160, StateError> {
	match scheme {
		CreateScheme::Legacy { caller } => {
			let account = state
				.load_immutable_account(caller)?
				.ok_or(StateError::MissingAccount(caller))?;
			Ok(account.next_contract_address())
		}
		CreateScheme::Create2 {
			caller,
			code_hash,
			salt,
		} => {
			let mut preimage = Vec::with_capacity(1 + 20 + 32 + 32);
			preimage.push(0xff);
			preimage.extend_from_slice(caller.as_bytes());
			preimage.extend_from_slice(salt.as_bytes());
			preimage.extend_from_slice(code_hash.as_bytes());
			Ok(H160::from_slice(&keccak256(&preimage)[12..]))
		}
	}
}

/// Run the code of `params.code_owner` against the account of
/// `params.recipient` inside its own checkpoint. The checkpoint is committed
/// when the code succeeds and reverted otherwise.
pub fn message_call(
	state: &mut WorldState,
	chain: &ChainContext,
	config: &Config,
	params: CallParams,
) -> Result<CallResult, StateError> {
	if params.depth > config.call_stack_limit {
		return Ok(CallResult::failed(ExitError::CallTooDeep, params.gas));
	}

	log::debug!(
		target: "evm",
		"call {:?} -> {:?} at depth {}, gas {}, value {}",
		params.caller,
		params.recipient,
		params.depth,
		params.gas,
		params.transfer_value,
	);

	state.checkpoint();
	let transferred = state.transfer(params.caller, params.recipient, params.transfer_value);
	if !or_revert(state, transferred)? {
		state.revert()?;
		return Ok(CallResult::failed(ExitError::OutOfFund, params.gas));
	}

	if let Some(result) = precompiles::execute(params.code_owner, &params.input, params.gas) {
		return match result {
			Ok(output) => {
				state.commit()?;
				let mut substrate = Substrate::default();
				substrate.touched.insert(params.recipient);
				Ok(CallResult {
					reason: ExitSucceed::Returned.into(),
					returned: output.output,
					remaining_gas: params.gas - output.cost,
					substrate,
					failure: None,
					created: None,
				})
			}
			Err(e) => {
				state.revert()?;
				Ok(CallResult::failed(e, 0))
			}
		};
	}

	let code = state.code(params.code_owner);
	let code = or_revert(state, code)?;
	let mut machine = Machine::new(
		code.to_vec(),
		params.input,
		Context {
			address: params.recipient,
			caller: params.caller,
			apparent_value: params.execution_value,
		},
		params.gas,
		params.depth,
		!params.modify,
		config,
	);

	let mut frame = Frame::new(
		state,
		chain,
		config,
		params.origin,
		params.gas_price,
		params.depth,
		params.modify,
		params.destroyed,
	);
	let reason = machine.run(&mut frame);
	let (mut substrate, fatal) = frame.finish();
	if let Some(e) = fatal {
		state.revert()?;
		return Err(e);
	}

	substrate.touched.insert(params.recipient);
	finish(state, machine, reason, substrate, None)
}

/// Deploy a contract: run `params.init_code` for a fresh account and keep
/// its output as the account code. A failed creation leaves no account
/// behind.
pub fn contract_creation(
	state: &mut WorldState,
	chain: &ChainContext,
	config: &Config,
	params: CreateParams,
) -> Result<CallResult, StateError> {
	if params.depth > config.call_stack_limit {
		return Ok(CallResult::failed(ExitError::CallTooDeep, params.gas));
	}

	let address = create_address(state, params.scheme)?;
	log::debug!(
		target: "evm",
		"create {:?} by {:?} at depth {}, gas {}, value {}",
		address,
		params.caller,
		params.depth,
		params.gas,
		params.value,
	);

	if let Some(existing) = state.account_record(address)? {
		if !existing.nonce.is_zero() || existing.code_hash != EMPTY_CODE_HASH {
			return Ok(CallResult::failed(ExitError::CreateCollision, 0));
		}
	}
	if state.balance(params.caller)? < params.value {
		return Ok(CallResult::failed(ExitError::OutOfFund, params.gas));
	}

	state.checkpoint();
	let nonce = if config.create_increase_nonce {
		U256::one()
	} else {
		U256::zero()
	};
	let prepared = prepare_account(state, address, nonce)
		.and_then(|()| state.transfer(params.caller, address, params.value));
	if !or_revert(state, prepared)? {
		state.revert()?;
		return Ok(CallResult::failed(ExitError::OutOfFund, params.gas));
	}

	let mut machine = Machine::new(
		params.init_code,
		Vec::new(),
		Context {
			address,
			caller: params.caller,
			apparent_value: params.value,
		},
		params.gas,
		params.depth,
		false,
		config,
	);

	let mut frame = Frame::new(
		state,
		chain,
		config,
		params.origin,
		params.gas_price,
		params.depth,
		true,
		params.destroyed,
	);
	let mut reason = machine.run(&mut frame);
	let (mut substrate, fatal) = frame.finish();
	if let Some(e) = fatal {
		state.revert()?;
		return Err(e);
	}

	if reason.is_succeed() {
		let deposited = deposit_code(state, &mut machine, address, config);
		reason = or_revert(state, deposited)?;
	}

	substrate.touched.insert(address);
	let mut result = finish(state, machine, reason, substrate, Some(address))?;
	// Only revert data is handed back by a creation.
	if !result.reason.is_revert() {
		result.returned = Vec::new();
	}
	Ok(result)
}

/// Replace whatever is at `address` with a fresh account, keeping any value
/// sent there before its creation.
fn prepare_account(state: &mut WorldState, address: H160, nonce: U256) -> Result<(), StateError> {
	let carried = state.balance(address)?;
	if state.exists(address)? {
		state.delete_account(address)?;
	}
	state.create_account(address, carried, nonce, Vec::new())?;
	Ok(())
}

/// Pop the frame checkpoint before handing a world state failure back, so
/// the caller's checkpoints stay balanced.
fn or_revert<T>(state: &mut WorldState, result: Result<T, StateError>) -> Result<T, StateError> {
	match result {
		Ok(value) => Ok(value),
		Err(e) => {
			state.revert()?;
			Err(e)
		}
	}
}

fn deposit_code(
	state: &mut WorldState,
	machine: &mut Machine<'_>,
	address: H160,
	config: &Config,
) -> Result<ExitReason, StateError> {
	let len = machine.return_value().len();
	if let Some(limit) = config.create_contract_limit {
		if len > limit {
			machine.gasometer_mut().fail();
			return Ok(ExitError::CreateContractLimit.into());
		}
	}
	if let Err(e) = machine.gasometer_mut().record_deposit(len) {
		machine.gasometer_mut().fail();
		return Ok(e.into());
	}

	state.set_code(address, machine.return_value().to_vec())?;
	Ok(ExitSucceed::Returned.into())
}

fn finish(
	state: &mut WorldState,
	machine: Machine<'_>,
	reason: ExitReason,
	substrate: Substrate,
	created: Option<H160>,
) -> Result<CallResult, StateError> {
	let remaining_gas = machine.gasometer().gas();

	if reason.is_succeed() {
		let mut substrate = substrate;
		substrate.refund += machine.gasometer().refunded_gas();
		state.commit()?;
		Ok(CallResult {
			reason,
			returned: machine.into_return_value(),
			remaining_gas,
			substrate,
			failure: None,
			created,
		})
	} else {
		state.revert()?;
		let failure = machine.failure().cloned();
		Ok(CallResult {
			reason,
			returned: machine.into_return_value(),
			remaining_gas,
			substrate: Substrate::default(),
			failure,
			created: None,
		})
	}
}
