//! Gas accounting of a single frame.

use crate::{Config, ExitError, Handler, Opcode, Stack};
use primitive_types::{H160, H256, U256};

pub const G_ZERO: u64 = 0;
pub const G_BASE: u64 = 2;
pub const G_VERYLOW: u64 = 3;
pub const G_LOW: u64 = 5;
pub const G_MID: u64 = 8;
pub const G_HIGH: u64 = 10;
pub const G_JUMPDEST: u64 = 1;
pub const G_EXP: u64 = 10;
pub const G_SHA3: u64 = 30;
pub const G_SHA3WORD: u64 = 6;
pub const G_COPY: u64 = 3;
pub const G_BLOCKHASH: u64 = 20;
pub const G_LOG: u64 = 375;
pub const G_LOGTOPIC: u64 = 375;
pub const G_LOGDATA: u64 = 8;
pub const G_CREATE: u64 = 32000;
pub const G_MEMORY: u64 = 3;
pub const G_SLOAD_NET: u64 = 800;
pub const REFUND_SSTORE_RESET_NET: i64 = 4200;
pub const REFUND_SSTORE_SET_NET: i64 = 19200;

/// Memory region an instruction is about to touch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemoryCost {
	pub offset: U256,
	pub len: U256,
}

impl MemoryCost {
	/// Region covering the furthest end of both.
	pub fn join(self, other: MemoryCost) -> MemoryCost {
		if self.len.is_zero() {
			return other;
		}
		if other.len.is_zero() {
			return self;
		}

		let self_end = self.offset.saturating_add(self.len);
		let other_end = other.offset.saturating_add(other.len);
		if self_end >= other_end {
			self
		} else {
			other
		}
	}

	/// Number of 32-byte words memory must cover, `None` when no resize
	/// is needed.
	fn words(&self) -> Result<Option<u64>, ExitError> {
		if self.len.is_zero() {
			return Ok(None);
		}

		let end = self.offset.checked_add(self.len).ok_or(ExitError::OutOfGas)?;
		if end > U256::from(u32::MAX) {
			return Err(ExitError::OutOfGas);
		}
		Ok(Some((end.as_u64() + 31) / 32))
	}
}

/// Cost of one instruction as computed before it runs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GasCost {
	pub cost: u64,
	pub memory: Option<MemoryCost>,
	pub refund: i64,
}

impl GasCost {
	fn fixed(cost: u64) -> Self {
		Self {
			cost,
			..Default::default()
		}
	}

	fn with_memory(cost: u64, memory: MemoryCost) -> Self {
		Self {
			cost,
			memory: Some(memory),
			refund: 0,
		}
	}
}

/// Gasometer of a frame. Tracks the gas limit, consumed gas, memory
/// expansion gas and the refund counter.
#[derive(Clone, Debug)]
pub struct Gasometer<'config> {
	gas_limit: u64,
	used_gas: u64,
	memory_gas: u64,
	refunded_gas: i64,
	config: &'config Config,
}

impl<'config> Gasometer<'config> {
	pub fn new(gas_limit: u64, config: &'config Config) -> Self {
		Self {
			gas_limit,
			used_gas: 0,
			memory_gas: 0,
			refunded_gas: 0,
			config,
		}
	}

	pub fn config(&self) -> &'config Config {
		self.config
	}

	/// Remaining gas.
	pub fn gas(&self) -> u64 {
		self.gas_limit - self.used_gas - self.memory_gas
	}

	pub fn gas_limit(&self) -> u64 {
		self.gas_limit
	}

	/// Total used gas, memory expansion included.
	pub fn total_used_gas(&self) -> u64 {
		self.used_gas + self.memory_gas
	}

	pub fn refunded_gas(&self) -> i64 {
		self.refunded_gas
	}

	/// Consume all remaining gas.
	pub fn fail(&mut self) {
		self.used_gas = self.gas_limit;
		self.memory_gas = 0;
		self.refunded_gas = 0;
	}

	pub fn record_cost(&mut self, cost: u64) -> Result<(), ExitError> {
		if cost > self.gas() {
			self.fail();
			return Err(ExitError::OutOfGas);
		}

		self.used_gas += cost;
		Ok(())
	}

	pub fn record_refund(&mut self, refund: i64) {
		self.refunded_gas += refund;
	}

	/// Give back gas returned by a nested frame.
	pub fn record_stipend(&mut self, stipend: u64) {
		self.used_gas = self.used_gas.saturating_sub(stipend);
	}

	/// Charge the code deposit of a contract creation.
	pub fn record_deposit(&mut self, len: usize) -> Result<(), ExitError> {
		let cost = (len as u64)
			.checked_mul(self.config.gas_code_deposit)
			.ok_or(ExitError::OutOfGas)?;
		self.record_cost(cost)
	}

	/// Charge an instruction, growing the memory gas first.
	pub fn record_opcode(&mut self, cost: GasCost) -> Result<(), ExitError> {
		let memory_gas = match cost.memory {
			Some(memory) => match memory.words() {
				Ok(Some(words)) => self.memory_gas.max(memory_gas(words)),
				Ok(None) => self.memory_gas,
				Err(e) => {
					self.fail();
					return Err(e);
				}
			},
			None => self.memory_gas,
		};

		let total = self.used_gas.checked_add(memory_gas).and_then(|g| g.checked_add(cost.cost));
		match total {
			Some(total) if total <= self.gas_limit => {
				self.used_gas += cost.cost;
				self.memory_gas = memory_gas;
				self.refunded_gas += cost.refund;
				Ok(())
			}
			_ => {
				self.fail();
				Err(ExitError::OutOfGas)
			}
		}
	}
}

/// Quadratic memory cost for `words` words.
pub fn memory_gas(words: u64) -> u64 {
	G_MEMORY * words + words * words / 512
}

fn word_cost(per_word: u64, len: U256) -> Result<u64, ExitError> {
	if len > U256::from(u64::MAX - 31) {
		return Err(ExitError::OutOfGas);
	}
	let words = (len.as_u64() + 31) / 32;
	words.checked_mul(per_word).ok_or(ExitError::OutOfGas)
}

fn region(stack: &Stack, offset: usize, len: usize) -> Result<MemoryCost, ExitError> {
	Ok(MemoryCost {
		offset: stack.peek(offset)?,
		len: stack.peek(len)?,
	})
}

const fn static_costs() -> [Option<u64>; 256] {
	let mut table = [None; 256];

	table[Opcode::STOP.as_usize()] = Some(G_ZERO);

	let base = [
		Opcode::ADDRESS,
		Opcode::ORIGIN,
		Opcode::CALLER,
		Opcode::CALLVALUE,
		Opcode::CALLDATASIZE,
		Opcode::CODESIZE,
		Opcode::GASPRICE,
		Opcode::COINBASE,
		Opcode::TIMESTAMP,
		Opcode::NUMBER,
		Opcode::DIFFICULTY,
		Opcode::GASLIMIT,
		Opcode::RETURNDATASIZE,
		Opcode::POP,
		Opcode::PC,
		Opcode::MSIZE,
		Opcode::GAS,
	];
	let mut i = 0;
	while i < base.len() {
		table[base[i].as_usize()] = Some(G_BASE);
		i += 1;
	}

	let verylow = [
		Opcode::ADD,
		Opcode::SUB,
		Opcode::NOT,
		Opcode::LT,
		Opcode::GT,
		Opcode::SLT,
		Opcode::SGT,
		Opcode::EQ,
		Opcode::ISZERO,
		Opcode::AND,
		Opcode::OR,
		Opcode::XOR,
		Opcode::BYTE,
		Opcode::SHL,
		Opcode::SHR,
		Opcode::SAR,
		Opcode::CALLDATALOAD,
	];
	let mut i = 0;
	while i < verylow.len() {
		table[verylow[i].as_usize()] = Some(G_VERYLOW);
		i += 1;
	}

	let low = [
		Opcode::MUL,
		Opcode::DIV,
		Opcode::SDIV,
		Opcode::MOD,
		Opcode::SMOD,
		Opcode::SIGNEXTEND,
	];
	let mut i = 0;
	while i < low.len() {
		table[low[i].as_usize()] = Some(G_LOW);
		i += 1;
	}

	table[Opcode::ADDMOD.as_usize()] = Some(G_MID);
	table[Opcode::MULMOD.as_usize()] = Some(G_MID);
	table[Opcode::JUMP.as_usize()] = Some(G_MID);
	table[Opcode::JUMPI.as_usize()] = Some(G_HIGH);
	table[Opcode::JUMPDEST.as_usize()] = Some(G_JUMPDEST);
	table[Opcode::BLOCKHASH.as_usize()] = Some(G_BLOCKHASH);

	let mut op = Opcode::PUSH1.as_usize();
	while op <= Opcode::SWAP16.as_usize() {
		table[op] = Some(G_VERYLOW);
		op += 1;
	}

	table
}

static STATIC_COSTS: [Option<u64>; 256] = static_costs();

fn new_account_cost(handler: &dyn Handler, config: &Config, target: H160) -> u64 {
	let missing = if config.empty_considered_exists {
		!handler.exists(target)
	} else {
		!handler.exists(target) || handler.is_empty(target)
	};

	if missing {
		config.gas_new_account
	} else {
		0
	}
}

fn sstore_cost(
	handler: &dyn Handler,
	config: &Config,
	address: H160,
	index: H256,
	new: H256,
	gas: u64,
) -> Result<GasCost, ExitError> {
	let current = handler.storage(address, index);

	if !config.sstore_gas_metering {
		let cost = if current == H256::zero() && new != H256::zero() {
			config.gas_sstore_set
		} else {
			config.gas_sstore_reset
		};
		let refund = if current != H256::zero() && new == H256::zero() {
			config.refund_sstore_clears
		} else {
			0
		};
		return Ok(GasCost {
			cost,
			memory: None,
			refund,
		});
	}

	if config.sstore_revert_under_stipend && gas <= config.call_stipend {
		return Err(ExitError::OutOfGas);
	}

	if new == current {
		return Ok(GasCost::fixed(G_SLOAD_NET));
	}

	let original = handler.original_storage(address, index);
	if original == current {
		if original == H256::zero() {
			return Ok(GasCost::fixed(config.gas_sstore_set));
		}
		let refund = if new == H256::zero() {
			config.refund_sstore_clears
		} else {
			0
		};
		return Ok(GasCost {
			cost: config.gas_sstore_reset,
			memory: None,
			refund,
		});
	}

	let mut refund = 0;
	if original != H256::zero() {
		if current == H256::zero() {
			refund -= config.refund_sstore_clears;
		} else if new == H256::zero() {
			refund += config.refund_sstore_clears;
		}
	}
	if original == new {
		refund += if original == H256::zero() {
			REFUND_SSTORE_SET_NET
		} else {
			REFUND_SSTORE_RESET_NET
		};
	}

	Ok(GasCost {
		cost: G_SLOAD_NET,
		memory: None,
		refund,
	})
}

/// Cost of running `opcode` on the current stack. Static mode violations
/// are detected here, before any gas is charged.
pub fn opcode_cost(
	opcode: Opcode,
	stack: &Stack,
	handler: &dyn Handler,
	address: H160,
	is_static: bool,
	gas: u64,
	config: &Config,
) -> Result<GasCost, ExitError> {
	if let Some(cost) = STATIC_COSTS[opcode.as_usize()] {
		return Ok(GasCost::fixed(cost));
	}

	let cost = match opcode {
		Opcode::EXP => {
			let power = stack.peek(1)?;
			let bytes = ((power.bits() + 7) / 8) as u64;
			GasCost::fixed(G_EXP + config.gas_expbyte * bytes)
		}
		Opcode::SHA3 => {
			let len = stack.peek(1)?;
			GasCost::with_memory(G_SHA3 + word_cost(G_SHA3WORD, len)?, region(stack, 0, 1)?)
		}
		Opcode::CALLDATACOPY | Opcode::CODECOPY | Opcode::RETURNDATACOPY => {
			let len = stack.peek(2)?;
			GasCost::with_memory(G_VERYLOW + word_cost(G_COPY, len)?, region(stack, 0, 2)?)
		}
		Opcode::EXTCODECOPY => {
			let len = stack.peek(3)?;
			GasCost::with_memory(
				config.gas_ext_code + word_cost(G_COPY, len)?,
				region(stack, 1, 3)?,
			)
		}
		Opcode::BALANCE => GasCost::fixed(config.gas_balance),
		Opcode::EXTCODESIZE => GasCost::fixed(config.gas_ext_code),
		Opcode::EXTCODEHASH => GasCost::fixed(config.gas_ext_code_hash),
		Opcode::CHAINID if config.has_chain_id => GasCost::fixed(G_BASE),
		Opcode::SELFBALANCE if config.has_self_balance => GasCost::fixed(G_LOW),
		Opcode::SLOAD => GasCost::fixed(config.gas_sload),
		Opcode::MLOAD | Opcode::MSTORE => GasCost::with_memory(
			G_VERYLOW,
			MemoryCost {
				offset: stack.peek(0)?,
				len: U256::from(32),
			},
		),
		Opcode::MSTORE8 => GasCost::with_memory(
			G_VERYLOW,
			MemoryCost {
				offset: stack.peek(0)?,
				len: U256::one(),
			},
		),
		Opcode::SSTORE => {
			if is_static {
				return Err(ExitError::StaticModeViolation);
			}
			let index = stack.peek_h256(0)?;
			let value = stack.peek_h256(1)?;
			sstore_cost(handler, config, address, index, value, gas)?
		}
		Opcode::LOG0 | Opcode::LOG1 | Opcode::LOG2 | Opcode::LOG3 | Opcode::LOG4 => {
			if is_static {
				return Err(ExitError::StaticModeViolation);
			}
			let topics = (opcode.as_u8() - Opcode::LOG0.as_u8()) as u64;
			let len = stack.peek(1)?;
			if len > U256::from(u64::MAX) {
				return Err(ExitError::OutOfGas);
			}
			let data_cost = len.as_u64().checked_mul(G_LOGDATA).ok_or(ExitError::OutOfGas)?;
			GasCost::with_memory(
				G_LOG + G_LOGTOPIC * topics + data_cost,
				region(stack, 0, 1)?,
			)
		}
		Opcode::CREATE => {
			if is_static {
				return Err(ExitError::StaticModeViolation);
			}
			GasCost::with_memory(G_CREATE, region(stack, 1, 2)?)
		}
		Opcode::CREATE2 => {
			if is_static {
				return Err(ExitError::StaticModeViolation);
			}
			let len = stack.peek(2)?;
			GasCost::with_memory(
				G_CREATE + word_cost(G_SHA3WORD, len)?,
				region(stack, 1, 2)?,
			)
		}
		Opcode::CALL | Opcode::CALLCODE => {
			let target = crate::utils::u256_to_h160(stack.peek(1)?);
			let value = stack.peek(2)?;
			if is_static && opcode == Opcode::CALL && !value.is_zero() {
				return Err(ExitError::StaticModeViolation);
			}

			let mut cost = config.gas_call;
			if !value.is_zero() {
				cost += config.gas_call_value;
				if opcode == Opcode::CALL {
					cost += new_account_cost(handler, config, target);
				}
			}
			let memory = region(stack, 3, 4)?.join(region(stack, 5, 6)?);
			GasCost::with_memory(cost, memory)
		}
		Opcode::DELEGATECALL | Opcode::STATICCALL => {
			let memory = region(stack, 2, 3)?.join(region(stack, 4, 5)?);
			GasCost::with_memory(config.gas_call, memory)
		}
		Opcode::RETURN | Opcode::REVERT => GasCost::with_memory(G_ZERO, region(stack, 0, 1)?),
		Opcode::SELFDESTRUCT => {
			if is_static {
				return Err(ExitError::StaticModeViolation);
			}
			let target = crate::utils::u256_to_h160(stack.peek(0)?);
			let mut cost = config.gas_suicide;
			if !handler.balance(address).is_zero() {
				cost += new_account_cost(handler, config, target);
			}
			let refund = if handler.deleted(address) {
				0
			} else {
				config.refund_suicide
			};
			GasCost {
				cost,
				memory: None,
				refund,
			}
		}
		// Unassigned bytes and `INVALID` fail when they run.
		_ => GasCost::fixed(G_ZERO),
	};

	Ok(cost)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn memory_expansion_is_quadratic() {
		assert_eq!(memory_gas(1), 3);
		assert_eq!(memory_gas(32), 98);
		assert_eq!(memory_gas(1024), 3 * 1024 + 2048);
	}

	#[test]
	fn out_of_gas_consumes_everything() {
		let config = Config::istanbul();
		let mut gasometer = Gasometer::new(100, &config);
		gasometer.record_cost(40).unwrap();
		assert_eq!(gasometer.gas(), 60);
		assert_eq!(gasometer.record_cost(61), Err(ExitError::OutOfGas));
		assert_eq!(gasometer.gas(), 0);
	}

	#[test]
	fn memory_gas_is_charged_once() {
		let config = Config::istanbul();
		let mut gasometer = Gasometer::new(1000, &config);
		let cost = GasCost::with_memory(
			G_VERYLOW,
			MemoryCost {
				offset: U256::zero(),
				len: U256::from(64),
			},
		);
		gasometer.record_opcode(cost).unwrap();
		assert_eq!(gasometer.total_used_gas(), 3 + 6);
		gasometer.record_opcode(cost).unwrap();
		assert_eq!(gasometer.total_used_gas(), 3 + 3 + 6);
	}

	#[test]
	fn join_picks_furthest_end() {
		let a = MemoryCost {
			offset: U256::from(10),
			len: U256::from(10),
		};
		let b = MemoryCost {
			offset: U256::from(0),
			len: U256::from(40),
		};
		let empty = MemoryCost {
			offset: U256::from(1000),
			len: U256::zero(),
		};
		assert_eq!(a.join(b), b);
		assert_eq!(a.join(empty), a);
	}
}
