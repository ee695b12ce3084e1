use std::fmt;

/// Opcode enum. One-to-one corresponding to an `u8` value.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Opcode(pub u8);

macro_rules! opcodes {
	( $( $(#[$attr:meta])* $name:ident = $value:expr, )* ) => {
		impl Opcode {
			$(
				$(#[$attr])*
				pub const $name: Opcode = Opcode($value);
			)*
		}

		const NAMES: [Option<&'static str>; 256] = {
			let mut names = [None; 256];
			$(
				names[$value] = Some(stringify!($name));
			)*
			names
		};
	};
}

opcodes! {
	/// `STOP`
	STOP = 0x00,
	/// `ADD`
	ADD = 0x01,
	/// `MUL`
	MUL = 0x02,
	/// `SUB`
	SUB = 0x03,
	/// `DIV`
	DIV = 0x04,
	/// `SDIV`
	SDIV = 0x05,
	/// `MOD`
	MOD = 0x06,
	/// `SMOD`
	SMOD = 0x07,
	/// `ADDMOD`
	ADDMOD = 0x08,
	/// `MULMOD`
	MULMOD = 0x09,
	/// `EXP`
	EXP = 0x0a,
	/// `SIGNEXTEND`
	SIGNEXTEND = 0x0b,

	LT = 0x10,
	GT = 0x11,
	SLT = 0x12,
	SGT = 0x13,
	EQ = 0x14,
	ISZERO = 0x15,
	AND = 0x16,
	OR = 0x17,
	XOR = 0x18,
	NOT = 0x19,
	BYTE = 0x1a,
	SHL = 0x1b,
	SHR = 0x1c,
	SAR = 0x1d,

	/// `SHA3`, keccak256 over a memory region.
	SHA3 = 0x20,

	ADDRESS = 0x30,
	BALANCE = 0x31,
	ORIGIN = 0x32,
	CALLER = 0x33,
	CALLVALUE = 0x34,
	CALLDATALOAD = 0x35,
	CALLDATASIZE = 0x36,
	CALLDATACOPY = 0x37,
	CODESIZE = 0x38,
	CODECOPY = 0x39,
	GASPRICE = 0x3a,
	EXTCODESIZE = 0x3b,
	EXTCODECOPY = 0x3c,
	RETURNDATASIZE = 0x3d,
	RETURNDATACOPY = 0x3e,
	EXTCODEHASH = 0x3f,

	BLOCKHASH = 0x40,
	COINBASE = 0x41,
	TIMESTAMP = 0x42,
	NUMBER = 0x43,
	DIFFICULTY = 0x44,
	GASLIMIT = 0x45,
	CHAINID = 0x46,
	SELFBALANCE = 0x47,

	POP = 0x50,
	MLOAD = 0x51,
	MSTORE = 0x52,
	MSTORE8 = 0x53,
	SLOAD = 0x54,
	SSTORE = 0x55,
	JUMP = 0x56,
	JUMPI = 0x57,
	PC = 0x58,
	MSIZE = 0x59,
	GAS = 0x5a,
	JUMPDEST = 0x5b,

	PUSH1 = 0x60,
	PUSH2 = 0x61,
	PUSH3 = 0x62,
	PUSH4 = 0x63,
	PUSH5 = 0x64,
	PUSH6 = 0x65,
	PUSH7 = 0x66,
	PUSH8 = 0x67,
	PUSH9 = 0x68,
	PUSH10 = 0x69,
	PUSH11 = 0x6a,
	PUSH12 = 0x6b,
	PUSH13 = 0x6c,
	PUSH14 = 0x6d,
	PUSH15 = 0x6e,
	PUSH16 = 0x6f,
	PUSH17 = 0x70,
	PUSH18 = 0x71,
	PUSH19 = 0x72,
	PUSH20 = 0x73,
	PUSH21 = 0x74,
	PUSH22 = 0x75,
	PUSH23 = 0x76,
	PUSH24 = 0x77,
	PUSH25 = 0x78,
	PUSH26 = 0x79,
	PUSH27 = 0x7a,
	PUSH28 = 0x7b,
	PUSH29 = 0x7c,
	PUSH30 = 0x7d,
	PUSH31 = 0x7e,
	PUSH32 = 0x7f,

	DUP1 = 0x80,
	DUP2 = 0x81,
	DUP3 = 0x82,
	DUP4 = 0x83,
	DUP5 = 0x84,
	DUP6 = 0x85,
	DUP7 = 0x86,
	DUP8 = 0x87,
	DUP9 = 0x88,
	DUP10 = 0x89,
	DUP11 = 0x8a,
	DUP12 = 0x8b,
	DUP13 = 0x8c,
	DUP14 = 0x8d,
	DUP15 = 0x8e,
	DUP16 = 0x8f,

	SWAP1 = 0x90,
	SWAP2 = 0x91,
	SWAP3 = 0x92,
	SWAP4 = 0x93,
	SWAP5 = 0x94,
	SWAP6 = 0x95,
	SWAP7 = 0x96,
	SWAP8 = 0x97,
	SWAP9 = 0x98,
	SWAP10 = 0x99,
	SWAP11 = 0x9a,
	SWAP12 = 0x9b,
	SWAP13 = 0x9c,
	SWAP14 = 0x9d,
	SWAP15 = 0x9e,
	SWAP16 = 0x9f,

	LOG0 = 0xa0,
	LOG1 = 0xa1,
	LOG2 = 0xa2,
	LOG3 = 0xa3,
	LOG4 = 0xa4,

	CREATE = 0xf0,
	CALL = 0xf1,
	CALLCODE = 0xf2,
	RETURN = 0xf3,
	DELEGATECALL = 0xf4,
	CREATE2 = 0xf5,
	STATICCALL = 0xfa,
	REVERT = 0xfd,
	/// Designated invalid instruction.
	INVALID = 0xfe,
	SELFDESTRUCT = 0xff,
}

impl Opcode {
	/// Whether the opcode is a push opcode, returning the number of
	/// immediate bytes it carries.
	pub const fn is_push(&self) -> Option<u8> {
		let value = self.0;
		if value >= 0x60 && value <= 0x7f {
			Some(value - 0x60 + 1)
		} else {
			None
		}
	}

	/// Length in bytes of the instruction, including its immediate data.
	pub const fn instruction_len(&self) -> usize {
		match self.is_push() {
			Some(n) => 1 + n as usize,
			None => 1,
		}
	}

	/// Mnemonic of the opcode, if the byte is assigned.
	pub const fn name(&self) -> Option<&'static str> {
		NAMES[self.0 as usize]
	}

	#[inline]
	pub const fn as_u8(&self) -> u8 {
		self.0
	}

	#[inline]
	pub const fn as_usize(&self) -> usize {
		self.0 as usize
	}
}

impl fmt::Display for Opcode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.name() {
			Some(name) => write!(f, "{name}"),
			None => write!(f, "UNKNOWN({:#04x})", self.0),
		}
	}
}

impl fmt::Debug for Opcode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}

/// Index of the instruction starting at byte `position`, counting each
/// push together with its immediate bytes as one instruction.
pub fn instruction_index(code: &[u8], position: usize) -> usize {
	let mut index = 0;
	let mut i = 0;
	while i < position && i < code.len() {
		i += Opcode(code[i]).instruction_len();
		index += 1;
	}
	index
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn names_and_lengths() {
		assert_eq!(Opcode::PUSH1.instruction_len(), 2);
		assert_eq!(Opcode::PUSH32.instruction_len(), 33);
		assert_eq!(Opcode::ADD.instruction_len(), 1);
		assert_eq!(Opcode::SELFDESTRUCT.to_string(), "SELFDESTRUCT");
		assert_eq!(Opcode(0x0c).to_string(), "UNKNOWN(0x0c)");
		assert_eq!(Opcode(0x0c).name(), None);
	}

	#[test]
	fn instruction_index_skips_immediates() {
		// PUSH2 0x0102, PUSH1 0x03, ADD
		let code = [0x61, 0x01, 0x02, 0x60, 0x03, 0x01];
		assert_eq!(instruction_index(&code, 0), 0);
		assert_eq!(instruction_index(&code, 3), 1);
		assert_eq!(instruction_index(&code, 5), 2);
	}
}
