mod common;

use common::init_logger;
use evm_devnode::{Database, StateError, WorldState};
use primitive_types::{H160, H256, U256};

#[test]
fn created_account_reads_back_after_commit() {
	init_logger();
	let mut state = WorldState::new(Database::memory());
	let address = H160::repeat_byte(0x01);
	let code = vec![0xde, 0xad, 0xbe, 0xef];

	state.checkpoint();
	state
		.create_account(address, U256::from(1000), U256::zero(), code.clone())
		.unwrap();
	state.commit().unwrap();

	let account = state.load_immutable_account(address).unwrap().unwrap();
	assert_eq!(account.balance(), U256::from(1000));
	assert_eq!(account.nonce(), U256::zero());
	assert_eq!(account.code().to_vec(), code);

	let reopened = WorldState::at(state.database().clone(), state.state_root().unwrap()).unwrap();
	let account = reopened.load_immutable_account(address).unwrap().unwrap();
	assert_eq!(account.code().to_vec(), code);
	assert_eq!(account.balance(), U256::from(1000));
}

#[test]
fn inner_reverts_keep_only_the_outer_write() {
	init_logger();
	let mut state = WorldState::new(Database::memory());
	let (a, b, c) = (H160::repeat_byte(0x0a), H160::repeat_byte(0x0b), H160::repeat_byte(0x0c));

	state.checkpoint();
	state.add_balance(a, U256::from(1)).unwrap();
	state.checkpoint();
	state.add_balance(b, U256::from(2)).unwrap();
	state.checkpoint();
	state.add_balance(c, U256::from(3)).unwrap();
	assert_eq!(state.depth(), 3);
	assert_eq!(state.balance(c).unwrap(), U256::from(3));

	state.revert().unwrap();
	state.revert().unwrap();
	state.commit().unwrap();

	assert_eq!(state.balance(a).unwrap(), U256::from(1));
	assert!(!state.exists(b).unwrap());
	assert!(!state.exists(c).unwrap());
	assert!(matches!(state.revert(), Err(StateError::NoCheckpoint)));
}

#[test]
fn committed_storage_survives_reopening() {
	init_logger();
	let db = Database::memory();
	let mut state = WorldState::new(db.clone());
	let address = H160::repeat_byte(0x01);
	let (index, value) = (H256::repeat_byte(0x02), H256::repeat_byte(0x03));

	state.checkpoint();
	state
		.create_account(address, U256::zero(), U256::one(), Vec::new())
		.unwrap();
	state.set_storage(address, index, value).unwrap();
	assert_eq!(state.original_storage(address, index).unwrap(), H256::zero());
	state.commit().unwrap();

	assert_eq!(state.original_storage(address, index).unwrap(), value);

	state.checkpoint();
	state.set_storage(address, index, H256::zero()).unwrap();
	assert_eq!(state.storage(address, index).unwrap(), H256::zero());
	assert_eq!(state.original_storage(address, index).unwrap(), value);
	state.revert().unwrap();

	let reopened = WorldState::at(db, state.state_root().unwrap()).unwrap();
	assert_eq!(reopened.storage(address, index).unwrap(), value);
	assert_eq!(reopened.storage(address, H256::zero()).unwrap(), H256::zero());
}
