use crate::eval::{arithmetic, bitwise, misc, system};
use crate::{ExitReason, Handler, Machine, Opcode};
use std::ops::Index;

/// What the machine does after an instruction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Control {
	/// Move the program counter forward by the given number of bytes.
	Continue(usize),
	/// Stop the frame.
	Exit(ExitReason),
	/// Move the program counter to a validated jump destination.
	Jump(usize),
}

/// Instruction handler.
pub type Efn = fn(&mut Machine<'_>, &mut dyn Handler, usize) -> Control;

/// The evaluation table, one handler per opcode byte. Unassigned bytes
/// map to a handler failing with an invalid opcode error.
pub struct Etable([Efn; 256]);

impl Etable {
	pub const fn new() -> Self {
		let mut table = [misc::unknown as Efn; 256];

		table[Opcode::STOP.as_usize()] = misc::stop as Efn;
		table[Opcode::ADD.as_usize()] = arithmetic::add as Efn;
		table[Opcode::MUL.as_usize()] = arithmetic::mul as Efn;
		table[Opcode::SUB.as_usize()] = arithmetic::sub as Efn;
		table[Opcode::DIV.as_usize()] = arithmetic::div as Efn;
		table[Opcode::SDIV.as_usize()] = arithmetic::sdiv as Efn;
		table[Opcode::MOD.as_usize()] = arithmetic::rem as Efn;
		table[Opcode::SMOD.as_usize()] = arithmetic::smod as Efn;
		table[Opcode::ADDMOD.as_usize()] = arithmetic::addmod as Efn;
		table[Opcode::MULMOD.as_usize()] = arithmetic::mulmod as Efn;
		table[Opcode::EXP.as_usize()] = arithmetic::exp as Efn;
		table[Opcode::SIGNEXTEND.as_usize()] = arithmetic::signextend as Efn;

		table[Opcode::LT.as_usize()] = bitwise::lt as Efn;
		table[Opcode::GT.as_usize()] = bitwise::gt as Efn;
		table[Opcode::SLT.as_usize()] = bitwise::slt as Efn;
		table[Opcode::SGT.as_usize()] = bitwise::sgt as Efn;
		table[Opcode::EQ.as_usize()] = bitwise::eq as Efn;
		table[Opcode::ISZERO.as_usize()] = bitwise::iszero as Efn;
		table[Opcode::AND.as_usize()] = bitwise::and as Efn;
		table[Opcode::OR.as_usize()] = bitwise::or as Efn;
		table[Opcode::XOR.as_usize()] = bitwise::xor as Efn;
		table[Opcode::NOT.as_usize()] = bitwise::not as Efn;
		table[Opcode::BYTE.as_usize()] = bitwise::byte as Efn;
		table[Opcode::SHL.as_usize()] = bitwise::shl as Efn;
		table[Opcode::SHR.as_usize()] = bitwise::shr as Efn;
		table[Opcode::SAR.as_usize()] = bitwise::sar as Efn;

		table[Opcode::SHA3.as_usize()] = system::sha3 as Efn;

		table[Opcode::ADDRESS.as_usize()] = system::address as Efn;
		table[Opcode::BALANCE.as_usize()] = system::balance as Efn;
		table[Opcode::ORIGIN.as_usize()] = system::origin as Efn;
		table[Opcode::CALLER.as_usize()] = system::caller as Efn;
		table[Opcode::CALLVALUE.as_usize()] = system::callvalue as Efn;
		table[Opcode::CALLDATALOAD.as_usize()] = misc::calldataload as Efn;
		table[Opcode::CALLDATASIZE.as_usize()] = misc::calldatasize as Efn;
		table[Opcode::CALLDATACOPY.as_usize()] = misc::calldatacopy as Efn;
		table[Opcode::CODESIZE.as_usize()] = misc::codesize as Efn;
		table[Opcode::CODECOPY.as_usize()] = misc::codecopy as Efn;
		table[Opcode::GASPRICE.as_usize()] = system::gasprice as Efn;
		table[Opcode::EXTCODESIZE.as_usize()] = system::extcodesize as Efn;
		table[Opcode::EXTCODECOPY.as_usize()] = system::extcodecopy as Efn;
		table[Opcode::RETURNDATASIZE.as_usize()] = misc::returndatasize as Efn;
		table[Opcode::RETURNDATACOPY.as_usize()] = misc::returndatacopy as Efn;
		table[Opcode::EXTCODEHASH.as_usize()] = system::extcodehash as Efn;

		table[Opcode::BLOCKHASH.as_usize()] = system::blockhash as Efn;
		table[Opcode::COINBASE.as_usize()] = system::coinbase as Efn;
		table[Opcode::TIMESTAMP.as_usize()] = system::timestamp as Efn;
		table[Opcode::NUMBER.as_usize()] = system::number as Efn;
		table[Opcode::DIFFICULTY.as_usize()] = system::difficulty as Efn;
		table[Opcode::GASLIMIT.as_usize()] = system::gaslimit as Efn;
		table[Opcode::CHAINID.as_usize()] = system::chainid as Efn;
		table[Opcode::SELFBALANCE.as_usize()] = system::selfbalance as Efn;

		table[Opcode::POP.as_usize()] = misc::pop as Efn;
		table[Opcode::MLOAD.as_usize()] = misc::mload as Efn;
		table[Opcode::MSTORE.as_usize()] = misc::mstore as Efn;
		table[Opcode::MSTORE8.as_usize()] = misc::mstore8 as Efn;
		table[Opcode::SLOAD.as_usize()] = system::sload as Efn;
		table[Opcode::SSTORE.as_usize()] = system::sstore as Efn;
		table[Opcode::JUMP.as_usize()] = misc::jump as Efn;
		table[Opcode::JUMPI.as_usize()] = misc::jumpi as Efn;
		table[Opcode::PC.as_usize()] = misc::pc as Efn;
		table[Opcode::MSIZE.as_usize()] = misc::msize as Efn;
		table[Opcode::GAS.as_usize()] = misc::gas as Efn;
		table[Opcode::JUMPDEST.as_usize()] = misc::jumpdest as Efn;

		table[Opcode::PUSH1.as_usize()] = misc::push::<1> as Efn;
		table[Opcode::PUSH2.as_usize()] = misc::push::<2> as Efn;
		table[Opcode::PUSH3.as_usize()] = misc::push::<3> as Efn;
		table[Opcode::PUSH4.as_usize()] = misc::push::<4> as Efn;
		table[Opcode::PUSH5.as_usize()] = misc::push::<5> as Efn;
		table[Opcode::PUSH6.as_usize()] = misc::push::<6> as Efn;
		table[Opcode::PUSH7.as_usize()] = misc::push::<7> as Efn;
		table[Opcode::PUSH8.as_usize()] = misc::push::<8> as Efn;
		table[Opcode::PUSH9.as_usize()] = misc::push::<9> as Efn;
		table[Opcode::PUSH10.as_usize()] = misc::push::<10> as Efn;
		table[Opcode::PUSH11.as_usize()] = misc::push::<11> as Efn;
		table[Opcode::PUSH12.as_usize()] = misc::push::<12> as Efn;
		table[Opcode::PUSH13.as_usize()] = misc::push::<13> as Efn;
		table[Opcode::PUSH14.as_usize()] = misc::push::<14> as Efn;
		table[Opcode::PUSH15.as_usize()] = misc::push::<15> as Efn;
		table[Opcode::PUSH16.as_usize()] = misc::push::<16> as Efn;
		table[Opcode::PUSH17.as_usize()] = misc::push::<17> as Efn;
		table[Opcode::PUSH18.as_usize()] = misc::push::<18> as Efn;
		table[Opcode::PUSH19.as_usize()] = misc::push::<19> as Efn;
		table[Opcode::PUSH20.as_usize()] = misc::push::<20> as Efn;
		table[Opcode::PUSH21.as_usize()] = misc::push::<21> as Efn;
		table[Opcode::PUSH22.as_usize()] = misc::push::<22> as Efn;
		table[Opcode::PUSH23.as_usize()] = misc::push::<23> as Efn;
		table[Opcode::PUSH24.as_usize()] = misc::push::<24> as Efn;
		table[Opcode::PUSH25.as_usize()] = misc::push::<25> as Efn;
		table[Opcode::PUSH26.as_usize()] = misc::push::<26> as Efn;
		table[Opcode::PUSH27.as_usize()] = misc::push::<27> as Efn;
		table[Opcode::PUSH28.as_usize()] = misc::push::<28> as Efn;
		table[Opcode::PUSH29.as_usize()] = misc::push::<29> as Efn;
		table[Opcode::PUSH30.as_usize()] = misc::push::<30> as Efn;
		table[Opcode::PUSH31.as_usize()] = misc::push::<31> as Efn;
		table[Opcode::PUSH32.as_usize()] = misc::push::<32> as Efn;

		table[Opcode::DUP1.as_usize()] = misc::dup::<1> as Efn;
		table[Opcode::DUP2.as_usize()] = misc::dup::<2> as Efn;
		table[Opcode::DUP3.as_usize()] = misc::dup::<3> as Efn;
		table[Opcode::DUP4.as_usize()] = misc::dup::<4> as Efn;
		table[Opcode::DUP5.as_usize()] = misc::dup::<5> as Efn;
		table[Opcode::DUP6.as_usize()] = misc::dup::<6> as Efn;
		table[Opcode::DUP7.as_usize()] = misc::dup::<7> as Efn;
		table[Opcode::DUP8.as_usize()] = misc::dup::<8> as Efn;
		table[Opcode::DUP9.as_usize()] = misc::dup::<9> as Efn;
		table[Opcode::DUP10.as_usize()] = misc::dup::<10> as Efn;
		table[Opcode::DUP11.as_usize()] = misc::dup::<11> as Efn;
		table[Opcode::DUP12.as_usize()] = misc::dup::<12> as Efn;
		table[Opcode::DUP13.as_usize()] = misc::dup::<13> as Efn;
		table[Opcode::DUP14.as_usize()] = misc::dup::<14> as Efn;
		table[Opcode::DUP15.as_usize()] = misc::dup::<15> as Efn;
		table[Opcode::DUP16.as_usize()] = misc::dup::<16> as Efn;

		table[Opcode::SWAP1.as_usize()] = misc::swap::<1> as Efn;
		table[Opcode::SWAP2.as_usize()] = misc::swap::<2> as Efn;
		table[Opcode::SWAP3.as_usize()] = misc::swap::<3> as Efn;
		table[Opcode::SWAP4.as_usize()] = misc::swap::<4> as Efn;
		table[Opcode::SWAP5.as_usize()] = misc::swap::<5> as Efn;
		table[Opcode::SWAP6.as_usize()] = misc::swap::<6> as Efn;
		table[Opcode::SWAP7.as_usize()] = misc::swap::<7> as Efn;
		table[Opcode::SWAP8.as_usize()] = misc::swap::<8> as Efn;
		table[Opcode::SWAP9.as_usize()] = misc::swap::<9> as Efn;
		table[Opcode::SWAP10.as_usize()] = misc::swap::<10> as Efn;
		table[Opcode::SWAP11.as_usize()] = misc::swap::<11> as Efn;
		table[Opcode::SWAP12.as_usize()] = misc::swap::<12> as Efn;
		table[Opcode::SWAP13.as_usize()] = misc::swap::<13> as Efn;
		table[Opcode::SWAP14.as_usize()] = misc::swap::<14> as Efn;
		table[Opcode::SWAP15.as_usize()] = misc::swap::<15> as Efn;
		table[Opcode::SWAP16.as_usize()] = misc::swap::<16> as Efn;

		table[Opcode::LOG0.as_usize()] = system::log::<0> as Efn;
		table[Opcode::LOG1.as_usize()] = system::log::<1> as Efn;
		table[Opcode::LOG2.as_usize()] = system::log::<2> as Efn;
		table[Opcode::LOG3.as_usize()] = system::log::<3> as Efn;
		table[Opcode::LOG4.as_usize()] = system::log::<4> as Efn;

		table[Opcode::CREATE.as_usize()] = system::create as Efn;
		table[Opcode::CALL.as_usize()] = system::call as Efn;
		table[Opcode::CALLCODE.as_usize()] = system::callcode as Efn;
		table[Opcode::RETURN.as_usize()] = misc::ret as Efn;
		table[Opcode::DELEGATECALL.as_usize()] = system::delegatecall as Efn;
		table[Opcode::CREATE2.as_usize()] = system::create2 as Efn;
		table[Opcode::STATICCALL.as_usize()] = system::staticcall as Efn;
		table[Opcode::REVERT.as_usize()] = misc::revert as Efn;
		table[Opcode::INVALID.as_usize()] = misc::invalid as Efn;
		table[Opcode::SELFDESTRUCT.as_usize()] = system::selfdestruct as Efn;

		Self(table)
	}
}

impl Default for Etable {
	fn default() -> Self {
		Self::new()
	}
}

impl Index<Opcode> for Etable {
	type Output = Efn;

	fn index(&self, opcode: Opcode) -> &Efn {
		&self.0[opcode.as_usize()]
	}
}

pub static ETABLE: Etable = Etable::new();
