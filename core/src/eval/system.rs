use crate::etable::Control;
use crate::handler::{CallRequest, CreateRequest};
use crate::utils::{h160_to_u256, keccak256, l64, u256_to_h160};
use crate::{
	CallScheme, Context, CreateScheme, ExitError, ExitReason, ExitSucceed, Handler, Machine,
	Opcode, Transfer,
};
use primitive_types::U256;
use std::cmp::min;

pub fn sha3(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, from, len);

	try_or_fail!(machine.memory.resize_offset(from, len));
	let data = if len.is_zero() {
		Vec::new()
	} else {
		let from = as_usize_or_fail!(from);
		let len = as_usize_or_fail!(len);
		machine.memory.get(from, len)
	};

	push_h256!(machine, keccak256(&data));
	Control::Continue(1)
}

pub fn address(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	let address = h160_to_u256(machine.context.address);
	push_u256!(machine, address);
	Control::Continue(1)
}

pub fn balance(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, address);
	push_u256!(machine, handler.balance(u256_to_h160(address)));
	Control::Continue(1)
}

pub fn selfbalance(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	if !machine.config().has_self_balance {
		return Control::Exit(ExitError::InvalidOpcode(Opcode::SELFBALANCE).into());
	}
	push_u256!(machine, handler.balance(machine.context.address));
	Control::Continue(1)
}

pub fn origin(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	push_u256!(machine, h160_to_u256(handler.origin()));
	Control::Continue(1)
}

pub fn caller(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	let caller = h160_to_u256(machine.context.caller);
	push_u256!(machine, caller);
	Control::Continue(1)
}

pub fn callvalue(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	let value = machine.context.apparent_value;
	push_u256!(machine, value);
	Control::Continue(1)
}

pub fn gasprice(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	push_u256!(machine, handler.gas_price());
	Control::Continue(1)
}

pub fn extcodesize(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, address);
	push_u256!(machine, handler.code_size(u256_to_h160(address)));
	Control::Continue(1)
}

pub fn extcodehash(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, address);
	push_h256!(machine, handler.code_hash(u256_to_h160(address)));
	Control::Continue(1)
}

pub fn extcodecopy(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, address, memory_offset, code_offset, len);

	try_or_fail!(machine.memory.resize_offset(memory_offset, len));
	if len.is_zero() {
		return Control::Continue(1);
	}

	let code = handler.code(u256_to_h160(address));
	try_or_fail!(machine
		.memory
		.copy_large(memory_offset, code_offset, len, &code));
	Control::Continue(1)
}

/// Hash of one of the 256 most recent complete blocks, zero otherwise.
pub fn blockhash(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, number);
	push_h256!(machine, handler.block_hash(number));
	Control::Continue(1)
}

pub fn coinbase(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	push_u256!(machine, h160_to_u256(handler.block_coinbase()));
	Control::Continue(1)
}

pub fn timestamp(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	push_u256!(machine, handler.block_timestamp());
	Control::Continue(1)
}

pub fn number(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	push_u256!(machine, handler.block_number());
	Control::Continue(1)
}

pub fn difficulty(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	push_u256!(machine, handler.block_difficulty());
	Control::Continue(1)
}

pub fn gaslimit(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	push_u256!(machine, handler.block_gas_limit());
	Control::Continue(1)
}

pub fn chainid(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	if !machine.config().has_chain_id {
		return Control::Exit(ExitError::InvalidOpcode(Opcode::CHAINID).into());
	}
	push_u256!(machine, handler.chain_id());
	Control::Continue(1)
}

pub fn sload(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	pop_h256!(machine, index);
	let value = handler.storage(machine.context.address, index);
	push_h256!(machine, value);
	Control::Continue(1)
}

pub fn sstore(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	pop_h256!(machine, index, value);
	try_or_fail!(handler.set_storage(machine.context.address, index, value));
	Control::Continue(1)
}

pub fn log<const N: usize>(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, offset, len);

	try_or_fail!(machine.memory.resize_offset(offset, len));
	let data = if len.is_zero() {
		Vec::new()
	} else {
		let offset = as_usize_or_fail!(offset);
		let len = as_usize_or_fail!(len);
		machine.memory.get(offset, len)
	};

	let mut topics = Vec::with_capacity(N);
	for _ in 0..N {
		pop_h256!(machine, topic);
		topics.push(topic);
	}

	try_or_fail!(handler.log(machine.context.address, topics, data));
	Control::Continue(1)
}

pub fn selfdestruct(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, target);

	try_or_fail!(handler.mark_delete(machine.context.address, u256_to_h160(target)));
	Control::Exit(ExitSucceed::Suicided.into())
}

fn create_inner(machine: &mut Machine<'_>, handler: &mut dyn Handler, is_create2: bool) -> Control {
	pop_u256!(machine, value, code_offset, len);

	try_or_fail!(machine.memory.resize_offset(code_offset, len));
	let init_code = if len.is_zero() {
		Vec::new()
	} else {
		let code_offset = as_usize_or_fail!(code_offset);
		let len = as_usize_or_fail!(len);
		machine.memory.get(code_offset, len)
	};

	let caller = machine.context.address;
	let scheme = if is_create2 {
		pop_h256!(machine, salt);
		CreateScheme::Create2 {
			caller,
			code_hash: keccak256(&init_code),
			salt,
		}
	} else {
		CreateScheme::Legacy { caller }
	};

	let gas_limit = l64(machine.gasometer.gas());
	try_or_fail!(machine.gasometer.record_cost(gas_limit));

	let outcome = handler.create(CreateRequest {
		caller,
		scheme,
		value,
		init_code,
		gas_limit,
	});
	machine.gasometer.record_stipend(outcome.gas_left);

	match outcome.reason {
		ExitReason::Succeed(_) => {
			machine.retbuf = Vec::new();
			let address = outcome.address.map(h160_to_u256).unwrap_or_default();
			push_u256!(machine, address);
			Control::Continue(1)
		}
		ExitReason::Revert(_) => {
			machine.retbuf = outcome.output;
			push_u256!(machine, U256::zero());
			Control::Continue(1)
		}
		ExitReason::Error(_) => {
			machine.retbuf = Vec::new();
			push_u256!(machine, U256::zero());
			Control::Continue(1)
		}
		ExitReason::Fatal(e) => Control::Exit(e.into()),
	}
}

pub fn create(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	create_inner(machine, handler, false)
}

pub fn create2(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	create_inner(machine, handler, true)
}

fn call_inner(machine: &mut Machine<'_>, handler: &mut dyn Handler, scheme: CallScheme) -> Control {
	pop_u256!(machine, gas, to);
	let value = match scheme {
		CallScheme::Call | CallScheme::CallCode => {
			pop_u256!(machine, value);
			value
		}
		CallScheme::DelegateCall | CallScheme::StaticCall => U256::zero(),
	};
	pop_u256!(machine, in_offset, in_len, out_offset, out_len);

	try_or_fail!(machine.memory.resize_offset(in_offset, in_len));
	try_or_fail!(machine.memory.resize_offset(out_offset, out_len));

	let input = if in_len.is_zero() {
		Vec::new()
	} else {
		let in_offset = as_usize_or_fail!(in_offset);
		let in_len = as_usize_or_fail!(in_len);
		machine.memory.get(in_offset, in_len)
	};

	let to = u256_to_h160(to);
	let address = machine.context.address;
	let context = match scheme {
		CallScheme::Call | CallScheme::StaticCall => Context {
			address: to,
			caller: address,
			apparent_value: value,
		},
		CallScheme::CallCode => Context {
			address,
			caller: address,
			apparent_value: value,
		},
		CallScheme::DelegateCall => Context {
			address,
			caller: machine.context.caller,
			apparent_value: machine.context.apparent_value,
		},
	};
	let transfer = match scheme {
		CallScheme::Call => Some(Transfer {
			source: address,
			target: to,
			value,
		}),
		CallScheme::CallCode => Some(Transfer {
			source: address,
			target: address,
			value,
		}),
		CallScheme::DelegateCall | CallScheme::StaticCall => None,
	};

	let available = l64(machine.gasometer.gas());
	let gas_limit = if gas > U256::from(available) {
		available
	} else {
		gas.as_u64()
	};
	try_or_fail!(machine.gasometer.record_cost(gas_limit));
	let gas_limit = if value.is_zero() {
		gas_limit
	} else {
		gas_limit + machine.config().call_stipend
	};

	let outcome = handler.call(CallRequest {
		scheme,
		code_address: to,
		transfer,
		input,
		gas_limit,
		is_static: machine.is_static() || scheme == CallScheme::StaticCall,
		context,
	});
	machine.gasometer.record_stipend(outcome.gas_left);

	let succeeded = match outcome.reason {
		ExitReason::Succeed(_) => true,
		ExitReason::Revert(_) => false,
		ExitReason::Error(_) => {
			machine.retbuf = Vec::new();
			push_u256!(machine, U256::zero());
			return Control::Continue(1);
		}
		ExitReason::Fatal(e) => return Control::Exit(e.into()),
	};

	let len = min(out_len, U256::from(outcome.output.len()));
	if !len.is_zero() {
		let out_offset = as_usize_or_fail!(out_offset);
		try_or_fail!(machine
			.memory
			.set(out_offset, &outcome.output[..len.as_usize()], None));
	}
	machine.retbuf = outcome.output;

	push_u256!(machine, if succeeded { U256::one() } else { U256::zero() });
	Control::Continue(1)
}

pub fn call(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	call_inner(machine, handler, CallScheme::Call)
}

pub fn callcode(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	call_inner(machine, handler, CallScheme::CallCode)
}

pub fn delegatecall(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	call_inner(machine, handler, CallScheme::DelegateCall)
}

pub fn staticcall(machine: &mut Machine<'_>, handler: &mut dyn Handler, _position: usize) -> Control {
	call_inner(machine, handler, CallScheme::StaticCall)
}

#[cfg(test)]
mod tests {
	use crate::utils::keccak256;
	use primitive_types::H256;

	#[test]
	fn keccak_of_empty_input() {
		let expected = hex::decode("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
			.unwrap();
		assert_eq!(keccak256(&[]), H256::from_slice(&expected));
	}
}
