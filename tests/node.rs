mod common;

use common::*;
use evm_devnode::interpreter::{ExitError, ExitReason};
use evm_devnode::{
	CallRequest, ChainEvent, Database, Error, GenesisAccount, LogFilter, Node, NodeConfig,
	TransactionRejected, TransactionRequest,
};
use primitive_types::{H160, H256, U256};
use std::time::Duration;

fn transfer(from: H160, to: H160, value: u64) -> TransactionRequest {
	TransactionRequest {
		from,
		to: Some(to),
		value: U256::from(value),
		gas: Some(21_000),
		..Default::default()
	}
}

fn deploy(from: H160, runtime: &[u8]) -> TransactionRequest {
	TransactionRequest {
		from,
		data: deploy_code(runtime),
		gas: Some(200_000),
		..Default::default()
	}
}

fn with_code(mut config: NodeConfig, address: H160, code: &[u8]) -> NodeConfig {
	config.genesis.insert(
		address,
		GenesisAccount {
			code: format!("0x{}", hex::encode(code)),
			..Default::default()
		},
	);
	config
}

/// Returns slot 0 when called without data and stores the first data word
/// in slot 0 otherwise.
fn storage_runtime() -> Vec<u8> {
	let mut code = vec![
		0x36, // CALLDATASIZE
		0x60, 0x0f, // PUSH1 set
		0x57, // JUMPI
	];
	code.extend_from_slice(&getter_runtime());
	code.push(0x5b); // JUMPDEST
	code.extend_from_slice(&setter_runtime());
	code
}

#[test]
fn transfers_are_mined_in_their_own_block() {
	init_logger();
	let (signer, alice, bob) = signer();
	let node = Node::new(funded_config(&[alice])).unwrap();

	let first = node.send_transaction(transfer(alice, bob, 1000), &signer).unwrap();
	let second = node.send_transaction(transfer(alice, bob, 2000), &signer).unwrap();

	assert_eq!(node.block_number().unwrap(), 2);
	assert_eq!(node.nonce(alice).unwrap(), U256::from(2));
	assert_eq!(node.balance(bob).unwrap(), U256::from(3000));
	assert_eq!(node.balance(COINBASE).unwrap(), U256::from(2 * 21_000 * 10));
	assert_eq!(
		node.balance(alice).unwrap(),
		ether(100) - U256::from(3000) - U256::from(2 * 21_000 * 10)
	);

	let (tx, lookup) = node.transaction(second).unwrap().unwrap();
	assert_eq!(tx.nonce, U256::one());
	assert_eq!(lookup.sender, alice);
	assert_eq!(lookup.index, 0);
	assert_eq!(node.block_by_number(2).unwrap().map(|b| b.hash), Some(lookup.block_hash));

	let (receipt, _) = node.receipt(first).unwrap().unwrap();
	assert!(receipt.status);
	assert_eq!(receipt.cumulative_gas_used, 21_000);
	assert!(node.receipt(H256::repeat_byte(0x99)).unwrap().is_none());
}

#[test]
fn revert_reason_is_decoded_and_nonce_still_advances() {
	init_logger();
	let (signer, alice, _) = signer();
	let node = Node::new(funded_config(&[alice])).unwrap();

	node.send_transaction(deploy(alice, &non_payable_runtime("not payable")), &signer)
		.unwrap();
	let contract = contract_address(alice, 0);
	assert!(!node.code(contract).unwrap().is_empty());

	let paying = TransactionRequest {
		value: U256::one(),
		gas: Some(100_000),
		..transfer(alice, contract, 0)
	};
	match node.send_transaction(paying, &signer) {
		Err(Error::Reverted {
			reason,
			transaction: Some(hash),
			..
		}) => {
			assert_eq!(reason.as_deref(), Some("not payable"));
			let (receipt, _) = node.receipt(hash).unwrap().unwrap();
			assert!(!receipt.status);
		}
		other => panic!("unexpected result {:?}", other),
	}
	assert_eq!(node.nonce(alice).unwrap(), U256::from(2));
	assert_eq!(node.block_number().unwrap(), 2);
	assert_eq!(node.balance(contract).unwrap(), U256::zero());

	let free = TransactionRequest {
		gas: Some(100_000),
		..transfer(alice, contract, 0)
	};
	node.send_transaction(free, &signer).unwrap();
	assert_eq!(node.nonce(alice).unwrap(), U256::from(3));
}

#[test]
fn execution_errors_and_rejections_are_reported() {
	init_logger();
	let (signer, alice, bob) = signer();
	let invalid = H160::repeat_byte(0xee);
	let node = Node::new(with_code(funded_config(&[alice]), invalid, &[0xfe])).unwrap();

	let call_invalid = TransactionRequest {
		gas: Some(50_000),
		..transfer(alice, invalid, 0)
	};
	assert!(matches!(
		node.send_transaction(call_invalid, &signer),
		Err(Error::Execution {
			reason: ExitReason::Error(ExitError::DesignatedInvalid),
			transaction: Some(_),
		})
	));
	assert_eq!(node.block_number().unwrap(), 1);

	let stale = TransactionRequest {
		nonce: Some(U256::zero()),
		..transfer(alice, bob, 1)
	};
	assert!(matches!(
		node.send_transaction(stale, &signer),
		Err(Error::Rejected(TransactionRejected::NonceMismatch { .. }))
	));
	assert!(matches!(
		node.send_transaction(transfer(bob, alice, 1), &signer),
		Err(Error::Rejected(TransactionRejected::UnknownSender(_)))
	));
	assert_eq!(node.block_number().unwrap(), 1);
	assert_eq!(node.nonce(alice).unwrap(), U256::one());
}

#[test]
fn calls_read_without_writing() {
	init_logger();
	let (signer, alice, _) = signer();
	let contract = H160::repeat_byte(0x42);
	let node = Node::new(with_code(funded_config(&[alice]), contract, &storage_runtime())).unwrap();

	let store = TransactionRequest {
		data: word(42),
		gas: Some(100_000),
		..transfer(alice, contract, 0)
	};
	node.send_transaction(store, &signer).unwrap();
	assert_eq!(node.storage_at(contract, H256::zero()).unwrap(), H256::from_low_u64_be(42));

	let read = CallRequest {
		from: Some(alice),
		to: contract,
		..Default::default()
	};
	assert_eq!(node.call(read).unwrap(), word(42));

	let write = CallRequest {
		to: contract,
		data: word(7),
		..Default::default()
	};
	assert!(matches!(
		node.call(write),
		Err(Error::Execution {
			reason: ExitReason::Error(ExitError::StaticModeViolation),
			transaction: None,
		})
	));
	assert_eq!(node.storage_at(contract, H256::zero()).unwrap(), H256::from_low_u64_be(42));
	assert_eq!(node.block_number().unwrap(), 1);
}

#[test]
fn call_surfaces_revert_reason() {
	init_logger();
	let (_, alice, _) = signer();
	let contract = H160::repeat_byte(0x42);
	let node = Node::new(with_code(
		funded_config(&[alice]),
		contract,
		&non_payable_runtime("not payable"),
	))
	.unwrap();

	let paying = CallRequest {
		from: Some(alice),
		to: contract,
		value: U256::one(),
		..Default::default()
	};
	match node.call(paying) {
		Err(Error::Reverted {
			reason,
			output,
			transaction,
		}) => {
			assert_eq!(reason.as_deref(), Some("not payable"));
			assert_eq!(output, revert_payload("not payable"));
			assert_eq!(transaction, None);
		}
		other => panic!("unexpected result {:?}", other),
	}
	assert_eq!(node.balance(contract).unwrap(), U256::zero());
	assert_eq!(node.balance(alice).unwrap(), ether(100));

	let free = CallRequest {
		to: contract,
		..Default::default()
	};
	assert_eq!(node.call(free).unwrap(), Vec::<u8>::new());
}

#[test]
fn logs_are_filtered_by_topic_position() {
	init_logger();
	let (signer, alice, _) = signer();
	let topic0 = H256::repeat_byte(0x01);
	let (a, b, c) = (H256::repeat_byte(0x0a), H256::repeat_byte(0x0b), H256::repeat_byte(0x0c));
	let emitters = [H160::repeat_byte(0xa1), H160::repeat_byte(0xa2), H160::repeat_byte(0xa3)];

	let mut config = funded_config(&[alice]);
	for (emitter, topic1) in emitters.iter().zip([a, b, c]) {
		config = with_code(config, *emitter, &log_runtime(topic0, topic1));
	}
	let node = Node::new(config).unwrap();
	let mut events = node.subscribe().unwrap();

	for emitter in &emitters {
		let request = TransactionRequest {
			gas: Some(100_000),
			..transfer(alice, *emitter, 0)
		};
		node.send_transaction(request, &signer).unwrap();
	}

	let filter = LogFilter {
		from_block: Some(0),
		topics: vec![None, Some(vec![a, b])],
		..Default::default()
	};
	let logs = node.get_logs(&filter).unwrap();
	assert_eq!(logs.len(), 2);
	assert_eq!(logs[0].log.address, emitters[0]);
	assert_eq!(logs[0].log.topics, vec![topic0, a]);
	assert_eq!(logs[0].block_number, 1);
	assert_eq!(logs[1].log.address, emitters[1]);
	assert_eq!(logs[1].block_number, 2);
	assert_eq!(logs[1].log_index, 0);

	let by_address = LogFilter {
		from_block: Some(1),
		addresses: vec![emitters[2]],
		..Default::default()
	};
	let logs = node.get_logs(&by_address).unwrap();
	assert_eq!(logs.len(), 1);
	assert_eq!(logs[0].log.topics[1], c);

	// Only the latest block by default.
	assert_eq!(node.get_logs(&LogFilter::default()).unwrap().len(), 1);
	assert!(node
		.get_logs(&LogFilter {
			from_block: Some(2),
			to_block: Some(9),
			..Default::default()
		})
		.is_err());

	let mut heads = 0;
	let mut logs = Vec::new();
	while let Ok(Some(event)) = events.try_next() {
		match event {
			ChainEvent::NewHead(block) => {
				heads += 1;
				assert_eq!(block.number(), heads);
			}
			ChainEvent::Log(entry) => {
				assert_eq!(entry.block_number, heads);
				logs.push(entry.log.address);
			}
		}
	}
	assert_eq!(heads, 3);
	assert_eq!(logs, emitters.to_vec());
}

#[test]
fn node_reopens_from_its_database() {
	init_logger();
	let (signer, alice, bob) = signer();
	let db = Database::memory();
	let config = funded_config(&[alice]);

	let node = Node::with_database(db.clone(), config.clone()).unwrap();
	let hash = node.send_transaction(transfer(alice, bob, 500), &signer).unwrap();
	let latest = node.latest_block().unwrap();
	drop(node);

	let reopened = Node::with_database(db, config).unwrap();
	assert_eq!(reopened.latest_block().unwrap(), latest);
	assert_eq!(reopened.balance(bob).unwrap(), U256::from(500));
	assert_eq!(reopened.nonce(alice).unwrap(), U256::one());
	assert!(reopened.receipt(hash).unwrap().is_some());

	let next = reopened.send_transaction(transfer(alice, bob, 1), &signer).unwrap();
	assert_eq!(reopened.transaction(next).unwrap().unwrap().0.nonce, U256::one());
	assert_eq!(reopened.block_number().unwrap(), 2);
}

#[tokio::test]
async fn delayed_mining_batches_pending_transactions() {
	init_logger();
	let (signer, alice, bob) = signer();
	let config = NodeConfig {
		block_time_ms: Some(50),
		..funded_config(&[alice])
	};
	let node = Node::new(config).unwrap();

	let first = node.send_transaction(transfer(alice, bob, 1), &signer).unwrap();
	let second = node.send_transaction(transfer(alice, bob, 2), &signer).unwrap();
	assert_ne!(first, second);
	assert_eq!(node.pending_count().unwrap(), 2);
	assert_eq!(node.block_number().unwrap(), 0);
	assert_eq!(node.nonce(alice).unwrap(), U256::zero());

	tokio::time::sleep(Duration::from_millis(300)).await;

	assert_eq!(node.pending_count().unwrap(), 0);
	assert_eq!(node.block_number().unwrap(), 1);
	assert_eq!(node.nonce(alice).unwrap(), U256::from(2));
	assert_eq!(node.balance(bob).unwrap(), U256::from(3));

	let (tx, lookup) = node.transaction(second).unwrap().unwrap();
	assert_eq!(tx.nonce, U256::one());
	assert_eq!(lookup.index, 1);
	assert_eq!(lookup.sender, alice);
	assert!(node.mine_pending().unwrap().is_none());
}
