use devnode_core::{
	CallRequest, Config, Context, CreateRequest, ExitError, ExitReason, ExitRevert, ExitSucceed,
	Handler, Machine, Opcode, Outcome,
};
use primitive_types::{H160, H256, U256};
use std::collections::BTreeMap;

#[derive(Default)]
struct MockHandler {
	storage: BTreeMap<H256, H256>,
	logs: Vec<(H160, Vec<H256>, Vec<u8>)>,
	calls: Vec<CallRequest>,
}

impl Handler for MockHandler {
	fn balance(&self, _address: H160) -> U256 {
		U256::from(1000)
	}
	fn code_size(&self, _address: H160) -> U256 {
		U256::zero()
	}
	fn code_hash(&self, _address: H160) -> H256 {
		H256::zero()
	}
	fn code(&self, _address: H160) -> Vec<u8> {
		Vec::new()
	}
	fn storage(&self, _address: H160, index: H256) -> H256 {
		self.storage.get(&index).copied().unwrap_or_default()
	}
	fn original_storage(&self, _address: H160, _index: H256) -> H256 {
		H256::zero()
	}
	fn gas_price(&self) -> U256 {
		U256::one()
	}
	fn origin(&self) -> H160 {
		H160::repeat_byte(0xaa)
	}
	fn block_hash(&self, _number: U256) -> H256 {
		H256::zero()
	}
	fn block_number(&self) -> U256 {
		U256::from(7)
	}
	fn block_coinbase(&self) -> H160 {
		H160::zero()
	}
	fn block_timestamp(&self) -> U256 {
		U256::zero()
	}
	fn block_difficulty(&self) -> U256 {
		U256::zero()
	}
	fn block_gas_limit(&self) -> U256 {
		U256::from(8_000_000)
	}
	fn chain_id(&self) -> U256 {
		U256::from(1337)
	}
	fn exists(&self, _address: H160) -> bool {
		true
	}
	fn is_empty(&self, _address: H160) -> bool {
		false
	}
	fn deleted(&self, _address: H160) -> bool {
		false
	}
	fn set_storage(&mut self, _address: H160, index: H256, value: H256) -> Result<(), ExitError> {
		self.storage.insert(index, value);
		Ok(())
	}
	fn log(&mut self, address: H160, topics: Vec<H256>, data: Vec<u8>) -> Result<(), ExitError> {
		self.logs.push((address, topics, data));
		Ok(())
	}
	fn mark_delete(&mut self, _address: H160, _target: H160) -> Result<(), ExitError> {
		Ok(())
	}
	fn call(&mut self, request: CallRequest) -> Outcome {
		let gas_left = request.gas_limit;
		self.calls.push(request);
		Outcome {
			reason: ExitSucceed::Returned.into(),
			output: vec![0xde, 0xad],
			gas_left,
			address: None,
		}
	}
	fn create(&mut self, request: CreateRequest) -> Outcome {
		Outcome::failed(ExitError::CreateCollision, request.gas_limit)
	}
}

fn context() -> Context {
	Context {
		address: H160::repeat_byte(0x11),
		caller: H160::repeat_byte(0x22),
		apparent_value: U256::zero(),
	}
}

fn run(code: &str, gas: u64, is_static: bool, handler: &mut MockHandler) -> (ExitReason, Machine<'static>) {
	static CONFIG: Config = Config::istanbul();
	let mut machine = Machine::new(
		hex::decode(code).unwrap(),
		Vec::new(),
		context(),
		gas,
		0,
		is_static,
		&CONFIG,
	);
	let reason = machine.run(handler);
	(reason, machine)
}

#[test]
fn add_and_return() {
	// PUSH1 2, PUSH1 3, ADD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
	let mut handler = MockHandler::default();
	let (reason, machine) = run("600260030160005260206000f3", 100_000, false, &mut handler);
	assert_eq!(reason, ExitReason::Succeed(ExitSucceed::Returned));
	assert_eq!(U256::from_big_endian(machine.return_value()), U256::from(5));
	// 3 + 3 + 3 + 3 + 3 (+3 memory) + 3 + 3 + 0
	assert_eq!(machine.gasometer().total_used_gas(), 24);
}

#[test]
fn end_of_code_stops() {
	let mut handler = MockHandler::default();
	let (reason, machine) = run("6001", 100, false, &mut handler);
	assert_eq!(reason, ExitReason::Succeed(ExitSucceed::Stopped));
	assert_eq!(machine.stack().data(), &[U256::one()]);
}

#[test]
fn unknown_opcode_records_failure() {
	// PUSH1 1, PUSH1 2, 0x0c
	let mut handler = MockHandler::default();
	let (reason, machine) = run("600160020c", 100, false, &mut handler);
	assert_eq!(reason, ExitReason::Error(ExitError::InvalidOpcode(Opcode(0x0c))));

	let failure = machine.failure().unwrap();
	assert_eq!(failure.position, 4);
	assert_eq!(failure.instruction_index, 2);
	assert_eq!(machine.gasometer().gas(), 0);
}

#[test]
fn jump_into_push_data_fails() {
	// PUSH1 4, JUMP, PUSH1 0x5b
	let mut handler = MockHandler::default();
	let (reason, _) = run("600456605b", 100, false, &mut handler);
	assert_eq!(reason, ExitReason::Error(ExitError::InvalidJump));

	// PUSH1 4, JUMP, INVALID, JUMPDEST, STOP
	let (reason, _) = run("600456fe5b00", 100, false, &mut handler);
	assert_eq!(reason, ExitReason::Succeed(ExitSucceed::Stopped));
}

#[test]
fn out_of_gas_consumes_all_gas() {
	let mut handler = MockHandler::default();
	let (reason, machine) = run("600160020100", 8, false, &mut handler);
	assert_eq!(reason, ExitReason::Error(ExitError::OutOfGas));
	assert_eq!(machine.gasometer().gas(), 0);
}

#[test]
fn stack_underflow() {
	let mut handler = MockHandler::default();
	let (reason, _) = run("01", 100, false, &mut handler);
	assert_eq!(reason, ExitReason::Error(ExitError::StackUnderflow));
}

#[test]
fn revert_keeps_gas_and_output() {
	// PUSH1 0xff, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, REVERT
	let mut handler = MockHandler::default();
	let (reason, machine) = run("60ff60005360016000fd", 100_000, false, &mut handler);
	assert_eq!(reason, ExitReason::Revert(ExitRevert::Reverted));
	assert_eq!(machine.return_value(), &[0xff]);
	assert!(machine.gasometer().gas() > 0);
	assert_eq!(machine.failure().unwrap().instruction_index, 5);
}

#[test]
fn storage_and_logs_go_through_the_handler() {
	// SSTORE(1, 42); LOG1(0, 0, topic 9)
	let mut handler = MockHandler::default();
	let (reason, _) = run("602a600155600960006000a1", 100_000, false, &mut handler);
	assert_eq!(reason, ExitReason::Succeed(ExitSucceed::Stopped));
	assert_eq!(
		handler.storage.get(&H256::from_low_u64_be(1)),
		Some(&H256::from_low_u64_be(42))
	);
	assert_eq!(handler.logs.len(), 1);
	assert_eq!(handler.logs[0].1, vec![H256::from_low_u64_be(9)]);
}

#[test]
fn static_frame_rejects_sstore() {
	let mut handler = MockHandler::default();
	let (reason, _) = run("602a600155", 100_000, true, &mut handler);
	assert_eq!(reason, ExitReason::Error(ExitError::StaticModeViolation));
	assert!(handler.storage.is_empty());
}

#[test]
fn call_copies_output_and_returns_gas() {
	// CALL(gas 1000, to 0x33, value 0, in 0/0, out 0/32), then MLOAD(0)
	let mut handler = MockHandler::default();
	let (reason, machine) = run(
		"6020600060006000600060336103e8f1600051",
		100_000,
		false,
		&mut handler,
	);
	assert_eq!(reason, ExitReason::Succeed(ExitSucceed::Stopped));
	assert_eq!(handler.calls.len(), 1);
	assert_eq!(handler.calls[0].gas_limit, 1000);
	assert_eq!(handler.calls[0].context.address, H160::from_low_u64_be(0x33));

	let stack = machine.stack().data();
	assert_eq!(stack[0], U256::one());
	assert_eq!(stack[1] >> 240, U256::from(0xdead));
}

#[test]
fn chain_id_and_environment() {
	// CHAINID, NUMBER, ORIGIN
	let mut handler = MockHandler::default();
	let (reason, machine) = run("464332", 100, false, &mut handler);
	assert_eq!(reason, ExitReason::Succeed(ExitSucceed::Stopped));
	assert_eq!(
		machine.stack().data(),
		&[
			U256::from(1337),
			U256::from(7),
			U256::from_big_endian(H160::repeat_byte(0xaa).as_bytes())
		]
	);
}
