use crate::etable::Control;
use crate::{ExitError, ExitRevert, ExitSucceed, Handler, Machine, Opcode};
use primitive_types::{H256, U256};
use std::cmp::min;

pub fn stop(_machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	Control::Exit(ExitSucceed::Stopped.into())
}

/// Bytes not assigned to any instruction.
pub fn unknown(machine: &mut Machine<'_>, _handler: &mut dyn Handler, position: usize) -> Control {
	let opcode = Opcode(machine.code()[position]);
	Control::Exit(ExitError::InvalidOpcode(opcode).into())
}

pub fn invalid(_machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	Control::Exit(ExitError::DesignatedInvalid.into())
}

pub fn codesize(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	let size = U256::from(machine.code().len());
	push_u256!(machine, size);
	Control::Continue(1)
}

pub fn codecopy(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, memory_offset, code_offset, len);

	try_or_fail!(machine.memory.resize_offset(memory_offset, len));
	try_or_fail!(machine
		.memory
		.copy_large(memory_offset, code_offset, len, &machine.code));
	Control::Continue(1)
}

pub fn calldataload(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, index);

	let mut load = [0u8; 32];
	let data = machine.data();
	if index < U256::from(data.len()) {
		let start = index.as_usize();
		let end = min(start + 32, data.len());
		load[..end - start].copy_from_slice(&data[start..end]);
	}

	push_h256!(machine, H256::from(load));
	Control::Continue(1)
}

pub fn calldatasize(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	let len = U256::from(machine.data().len());
	push_u256!(machine, len);
	Control::Continue(1)
}

pub fn calldatacopy(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, memory_offset, data_offset, len);

	try_or_fail!(machine.memory.resize_offset(memory_offset, len));
	if len.is_zero() {
		return Control::Continue(1);
	}

	try_or_fail!(machine
		.memory
		.copy_large(memory_offset, data_offset, len, &machine.data));
	Control::Continue(1)
}

pub fn returndatasize(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	let size = U256::from(machine.retbuf.len());
	push_u256!(machine, size);
	Control::Continue(1)
}

pub fn returndatacopy(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, memory_offset, data_offset, len);

	try_or_fail!(machine.memory.resize_offset(memory_offset, len));
	match data_offset.checked_add(len) {
		Some(end) if end <= U256::from(machine.retbuf.len()) => (),
		_ => return Control::Exit(ExitError::OutOfOffset.into()),
	}

	try_or_fail!(machine
		.memory
		.copy_large(memory_offset, data_offset, len, &machine.retbuf));
	Control::Continue(1)
}

pub fn pop(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, _value);
	Control::Continue(1)
}

pub fn mload(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, index);
	try_or_fail!(machine.memory.resize_offset(index, U256::from(32)));
	let index = as_usize_or_fail!(index);
	let value = H256::from_slice(&machine.memory.get(index, 32)[..]);
	push_h256!(machine, value);
	Control::Continue(1)
}

pub fn mstore(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, index);
	pop_h256!(machine, value);
	try_or_fail!(machine.memory.resize_offset(index, U256::from(32)));
	let index = as_usize_or_fail!(index);
	try_or_fail!(machine.memory.set(index, &value[..], Some(32)));
	Control::Continue(1)
}

pub fn mstore8(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, index, value);
	try_or_fail!(machine.memory.resize_offset(index, U256::one()));
	let index = as_usize_or_fail!(index);
	let value = (value.low_u32() & 0xff) as u8;
	try_or_fail!(machine.memory.set(index, &[value], Some(1)));
	Control::Continue(1)
}

fn jump_to(machine: &Machine<'_>, dest: U256) -> Control {
	if dest > U256::from(usize::MAX) || !machine.is_jumpdest(dest.as_usize()) {
		return Control::Exit(ExitError::InvalidJump.into());
	}
	Control::Jump(dest.as_usize())
}

pub fn jump(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, dest);
	jump_to(machine, dest)
}

pub fn jumpi(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	pop_u256!(machine, dest, value);

	if value.is_zero() {
		Control::Continue(1)
	} else {
		jump_to(machine, dest)
	}
}

pub fn jumpdest(_machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	Control::Continue(1)
}

pub fn pc(machine: &mut Machine<'_>, _handler: &mut dyn Handler, position: usize) -> Control {
	push_u256!(machine, U256::from(position));
	Control::Continue(1)
}

pub fn msize(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	let size = machine.memory.effective_len();
	push_u256!(machine, size);
	Control::Continue(1)
}

pub fn gas(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	let gas = U256::from(machine.gasometer.gas());
	push_u256!(machine, gas);
	Control::Continue(1)
}

/// `PUSHn`. Immediate bytes cut off by the end of code read as zero.
pub fn push<const N: usize>(machine: &mut Machine<'_>, _handler: &mut dyn Handler, position: usize) -> Control {
	let code = machine.code();
	let start = min(position + 1, code.len());
	let end = min(position + 1 + N, code.len());

	let mut val = [0u8; 32];
	val[(32 - N)..(32 - N + end - start)].copy_from_slice(&code[start..end]);

	push_u256!(machine, U256::from_big_endian(&val));
	Control::Continue(1 + N)
}

pub fn dup<const N: usize>(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	try_or_fail!(machine.stack.dup(N));
	Control::Continue(1)
}

pub fn swap<const N: usize>(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	try_or_fail!(machine.stack.swap(N));
	Control::Continue(1)
}

fn set_return_value(machine: &mut Machine<'_>) -> Result<(), ExitError> {
	let start = machine.stack.pop()?;
	let len = machine.stack.pop()?;
	machine.memory.resize_offset(start, len)?;

	machine.retval = if len.is_zero() {
		Vec::new()
	} else {
		let start = crate::utils::u256_to_usize(start)?;
		let len = crate::utils::u256_to_usize(len)?;
		machine.memory.get(start, len)
	};
	Ok(())
}

pub fn ret(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	try_or_fail!(set_return_value(machine));
	Control::Exit(ExitSucceed::Returned.into())
}

pub fn revert(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
	try_or_fail!(set_return_value(machine));
	Control::Exit(ExitRevert::Reverted.into())
}
