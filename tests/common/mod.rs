#![allow(dead_code)]

use evm_devnode::interpreter::utils::keccak256;
use evm_devnode::{GenesisAccount, KeySigner, NodeConfig};
use primitive_types::{H160, H256, U256};
use rlp::RlpStream;

pub const ALICE_KEY: [u8; 32] = [0x11; 32];
pub const BOB_KEY: [u8; 32] = [0x22; 32];
pub const COINBASE: H160 = H160([0xcc; 20]);

pub fn init_logger() {
	let _ = env_logger::builder().is_test(true).try_init();
}

pub fn ether(amount: u64) -> U256 {
	U256::from(amount) * U256::exp10(18)
}

/// Signer holding the alice and bob keys.
pub fn signer() -> (KeySigner, H160, H160) {
	let mut signer = KeySigner::new();
	let alice = signer.add_key(&ALICE_KEY).unwrap();
	let bob = signer.add_key(&BOB_KEY).unwrap();
	(signer, alice, bob)
}

/// Node settings with every address in `funded` holding 100 ether.
pub fn funded_config(funded: &[H160]) -> NodeConfig {
	let mut config = NodeConfig {
		coinbase: COINBASE,
		default_gas_price: U256::from(10),
		..NodeConfig::default()
	};
	for address in funded {
		config.genesis.insert(
			*address,
			GenesisAccount {
				balance: ether(100),
				..Default::default()
			},
		);
	}
	config
}

pub fn contract_address(sender: H160, nonce: u64) -> H160 {
	let mut stream = RlpStream::new_list(2);
	stream.append(&sender);
	stream.append(&nonce);
	H160::from_slice(&keccak256(&stream.out())[12..])
}

pub fn word(value: u64) -> Vec<u8> {
	H256::from_low_u64_be(value).as_bytes().to_vec()
}

/// Init code returning `runtime` as the contract code.
pub fn deploy_code(runtime: &[u8]) -> Vec<u8> {
	assert!(runtime.len() < 256);
	let mut code = vec![
		0x60,
		runtime.len() as u8, // PUSH1 len
		0x80, // DUP1
		0x60,
		0x0b, // PUSH1 offset
		0x60,
		0x00, // PUSH1 0
		0x39, // CODECOPY
		0x60,
		0x00, // PUSH1 0
		0xf3, // RETURN
	];
	code.extend_from_slice(runtime);
	code
}

/// Stores the first calldata word in slot 0.
pub fn setter_runtime() -> Vec<u8> {
	vec![0x60, 0x00, 0x35, 0x60, 0x00, 0x55, 0x00]
}

/// Returns slot 0.
pub fn getter_runtime() -> Vec<u8> {
	vec![
		0x60, 0x00, 0x54, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
	]
}

/// `Error(string)` payload for `message`.
pub fn revert_payload(message: &str) -> Vec<u8> {
	let mut payload = vec![0x08, 0xc3, 0x79, 0xa0];
	payload.extend_from_slice(&word(32));
	payload.extend_from_slice(&word(message.len() as u64));
	let mut data = message.as_bytes().to_vec();
	data.resize((message.len() + 31) / 32 * 32, 0);
	payload.extend_from_slice(&data);
	payload
}

/// Reverts with `Error(message)` when called with value, stops otherwise.
pub fn non_payable_runtime(message: &str) -> Vec<u8> {
	let payload = revert_payload(message);
	assert!(payload.len() < 256);
	let len = payload.len() as u8;
	let mut code = vec![
		0x34, // CALLVALUE
		0x15, // ISZERO
		0x60, 0x11, // PUSH1 ok
		0x57, // JUMPI
		0x60, len, // PUSH1 len
		0x60, 0x13, // PUSH1 payload offset
		0x60, 0x00, // PUSH1 0
		0x39, // CODECOPY
		0x60, len, // PUSH1 len
		0x60, 0x00, // PUSH1 0
		0xfd, // REVERT
		0x5b, // JUMPDEST
		0x00, // STOP
	];
	code.extend_from_slice(&payload);
	code
}

/// Emits an empty LOG2 with the given topics.
pub fn log_runtime(topic0: H256, topic1: H256) -> Vec<u8> {
	let mut code = vec![0x7f];
	code.extend_from_slice(topic1.as_bytes());
	code.push(0x7f);
	code.extend_from_slice(topic0.as_bytes());
	code.extend_from_slice(&[0x60, 0x00, 0x60, 0x00, 0xa2, 0x00]);
	code
}

/// Increments slot 0 and then calls itself with all remaining gas.
pub fn recursive_runtime() -> Vec<u8> {
	vec![
		0x60, 0x00, 0x54, // SLOAD 0
		0x60, 0x01, 0x01, // ADD 1
		0x60, 0x00, 0x55, // SSTORE 0
		0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, // ret, args, value
		0x30, // ADDRESS
		0x5a, // GAS
		0xf1, // CALL
		0x50, // POP
		0x00, // STOP
	]
}
