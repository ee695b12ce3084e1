//! Call and send boundary consumed by a JSON-RPC adapter.

use crate::blockchain::{Blockchain, ChainEvent, LogEntry, LogFilter};
use crate::config::NodeConfig;
use crate::db::{keys, Database};
use crate::error::{Error, StateError};
use crate::executor::{message_call, CallParams};
use crate::state::WorldState;
use crate::types::{
	public_key_address, BlockState, Transaction, TransactionReceipt, TxLookup, UnsignedTransaction,
};
use devnode_core::{Config, ExitReason};
use futures::channel::mpsc;
use k256::ecdsa::SigningKey;
use primitive_types::{H160, H256, U256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Selector of `Error(string)`.
pub const REVERT_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Decode the message of an `Error(string)` revert payload.
pub fn decode_revert_reason(output: &[u8]) -> Option<String> {
	if output.len() < 4 || output[..4] != REVERT_SELECTOR {
		return None;
	}

	let data = &output[4..];
	let offset = abi_word(data, 0)?;
	let len = abi_word(data, offset)?;
	let start = offset.checked_add(32)?;
	let end = start.checked_add(len)?;
	if end > data.len() {
		return None;
	}
	String::from_utf8(data[start..end].to_vec()).ok()
}

fn abi_word(data: &[u8], at: usize) -> Option<usize> {
	let word = data.get(at..at.checked_add(32)?)?;
	let value = U256::from_big_endian(word);
	if value > U256::from(usize::MAX) {
		return None;
	}
	Some(value.as_usize())
}

/// Secp256k1 signature with its recovery id.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RecoverableSignature {
	pub recovery_id: u8,
	pub r: H256,
	pub s: H256,
}

/// Signs transaction hashes on behalf of accounts.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait Signer: Send + Sync {
	fn sign(&self, from: H160, hash: H256) -> Result<RecoverableSignature, Error>;
}

/// Signer over a set of in-memory secret keys.
#[derive(Default)]
pub struct KeySigner {
	keys: BTreeMap<H160, SigningKey>,
}

impl KeySigner {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a 32 byte secret key, returning the address it controls.
	pub fn add_key(&mut self, secret: &[u8]) -> Result<H160, Error> {
		let key = SigningKey::from_slice(secret).map_err(|e| Error::Signer(e.to_string()))?;
		let address = public_key_address(key.verifying_key());
		self.keys.insert(address, key);
		Ok(address)
	}

	pub fn addresses(&self) -> impl Iterator<Item = &H160> {
		self.keys.keys()
	}
}

impl Signer for KeySigner {
	fn sign(&self, from: H160, hash: H256) -> Result<RecoverableSignature, Error> {
		let key = self
			.keys
			.get(&from)
			.ok_or_else(|| Error::Signer(format!("no key for {:?}", from)))?;
		let (signature, recovery_id) = key
			.sign_prehash_recoverable(hash.as_bytes())
			.map_err(|e| Error::Signer(e.to_string()))?;

		let bytes = signature.to_bytes();
		Ok(RecoverableSignature {
			recovery_id: recovery_id.to_byte(),
			r: H256::from_slice(&bytes[..32]),
			s: H256::from_slice(&bytes[32..]),
		})
	}
}

impl std::fmt::Debug for KeySigner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KeySigner")
			.field("addresses", &self.keys.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Read-only call against the latest state.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CallRequest {
	pub from: Option<H160>,
	pub to: H160,
	pub data: Vec<u8>,
	pub value: U256,
	pub gas: Option<u64>,
	pub gas_price: Option<U256>,
}

/// Transaction to be signed and mined. Unset fields take the node defaults
/// and the pending nonce of `from`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransactionRequest {
	pub from: H160,
	pub to: Option<H160>,
	pub value: U256,
	pub data: Vec<u8>,
	pub gas: Option<u64>,
	pub gas_price: Option<U256>,
	pub nonce: Option<U256>,
}

fn check_outcome(reason: &ExitReason, output: &[u8], transaction: Option<H256>) -> Result<(), Error> {
	match reason {
		ExitReason::Succeed(_) => Ok(()),
		ExitReason::Revert(_) => Err(Error::Reverted {
			reason: decode_revert_reason(output),
			output: output.to_vec(),
			transaction,
		}),
		ExitReason::Error(_) | ExitReason::Fatal(_) => Err(Error::Execution {
			reason: reason.clone(),
			transaction,
		}),
	}
}

fn now() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}

/// Message call in a checkpoint that is always reverted. The output of a
/// successful call is returned. A revert surfaces as [`Error::Reverted`].
pub fn handle_call(
	state: &mut WorldState,
	chain: &Blockchain,
	config: &Config,
	request: CallRequest,
	default_gas: u64,
) -> Result<Vec<u8>, Error> {
	let context = chain.pending_context(now())?;
	let from = request.from.unwrap_or_default();

	state.checkpoint();
	let result = message_call(
		state,
		&context,
		config,
		CallParams {
			caller: from,
			origin: from,
			code_owner: request.to,
			recipient: request.to,
			gas: request.gas.unwrap_or(default_gas),
			gas_price: request.gas_price.unwrap_or_default(),
			transfer_value: request.value,
			execution_value: request.value,
			input: request.data,
			depth: 0,
			modify: false,
			destroyed: BTreeSet::new(),
		},
	);
	state.revert()?;
	let result = result?;

	log::debug!(target: "rpc", "call {:?} -> {:?}: {}", from, request.to, result.reason);
	check_outcome(&result.reason, &result.returned, None)?;
	Ok(result.returned)
}

struct NodeState {
	state: WorldState,
	chain: Blockchain,
	evm: Config,
	config: NodeConfig,
	pending: Vec<(Transaction, H160)>,
	mining_scheduled: bool,
}

impl NodeState {
	fn pending_nonce(&self, from: H160) -> Result<U256, Error> {
		let queued = self.pending.iter().filter(|(_, sender)| *sender == from).count();
		Ok(self.state.nonce(from)? + U256::from(queued))
	}

	fn mine_pending(&mut self) -> Result<Option<BlockState>, Error> {
		self.mining_scheduled = false;
		if self.pending.is_empty() {
			return Ok(None);
		}

		let txs = std::mem::take(&mut self.pending)
			.into_iter()
			.map(|(tx, _)| tx)
			.collect::<Vec<_>>();
		let context = self.chain.pending_context(now())?;
		let evaluated = self
			.chain
			.evaluate_txs(&mut self.state, context, &self.evm, txs, None)?;
		let block = self.chain.mine_txs(&self.state, &evaluated)?;
		Ok(Some(block))
	}
}

fn seed_genesis(state: &mut WorldState, config: &NodeConfig) -> Result<(), Error> {
	state.checkpoint();
	for (address, account) in &config.genesis {
		let code = match account.code_bytes() {
			Ok(code) => code,
			Err(e) => {
				state.revert()?;
				return Err(e.into());
			}
		};
		state.create_account(*address, account.balance, account.nonce, code)?;
	}
	state.commit()?;
	Ok(())
}

/// World state and chain of a development node, shared between callers.
#[derive(Clone)]
pub struct Node {
	inner: Arc<Mutex<NodeState>>,
}

impl Node {
	/// Node over a fresh in-memory store.
	pub fn new(config: NodeConfig) -> Result<Self, Error> {
		Self::with_database(Database::memory(), config)
	}

	/// Node over `db`. A store holding a chain is reopened at its tip,
	/// otherwise the genesis accounts of `config` are seeded.
	pub fn with_database(db: Database, config: NodeConfig) -> Result<Self, Error> {
		let existing = db.get(keys::TIP).map_err(StateError::from)?.is_some();
		let (state, chain) = if existing {
			let chain = Blockchain::open(db.clone(), config.chain_params())?;
			let state = WorldState::at(db, chain.latest().header.state_root)?;
			(state, chain)
		} else {
			let mut state = WorldState::new(db.clone());
			seed_genesis(&mut state, &config)?;
			let chain = Blockchain::genesis(
				db,
				config.chain_params(),
				state.state_root()?,
				config.genesis_timestamp,
			)?;
			(state, chain)
		};

		log::info!(
			target: "rpc",
			"node on chain {} at block {}",
			config.chain_id,
			chain.latest().number(),
		);

		Ok(Self {
			inner: Arc::new(Mutex::new(NodeState {
				state,
				chain,
				evm: config.evm_config(),
				config,
				pending: Vec::new(),
				mining_scheduled: false,
			})),
		})
	}

	fn lock(&self) -> Result<MutexGuard<'_, NodeState>, Error> {
		self.inner.lock().map_err(|_| Error::Poisoned)
	}

	pub fn call(&self, request: CallRequest) -> Result<Vec<u8>, Error> {
		let mut guard = self.lock()?;
		let node = &mut *guard;
		handle_call(
			&mut node.state,
			&node.chain,
			&node.evm,
			request,
			node.config.default_gas_limit,
		)
	}

	/// Sign `request` with `signer` and submit it, returning the transaction
	/// hash.
	///
	/// Without a block time the transaction is mined in its own block before
	/// returning, and a rejection, revert or execution error is returned as
	/// the matching [`Error`]. With a block time the transaction is queued and
	/// mined by a task on the current tokio runtime once the delay elapses.
	pub fn send_transaction(&self, request: TransactionRequest, signer: &dyn Signer) -> Result<H256, Error> {
		let mut guard = self.lock()?;
		let node = &mut *guard;
		let chain_id = node.config.chain_id;

		let nonce = match request.nonce {
			Some(nonce) => nonce,
			None => node.pending_nonce(request.from)?,
		};
		let unsigned = UnsignedTransaction {
			nonce,
			gas_price: request.gas_price.unwrap_or(node.config.default_gas_price),
			gas_limit: request.gas.unwrap_or(node.config.default_gas_limit),
			to: request.to,
			value: request.value,
			input: request.data,
		};
		let signature = signer.sign(request.from, unsigned.signing_hash(Some(chain_id)))?;
		let tx = unsigned.with_signature(Some(chain_id), signature.recovery_id, signature.r, signature.s);
		let hash = tx.hash();
		log::debug!(target: "rpc", "transaction {:?} from {:?}, nonce {}", hash, request.from, nonce);

		let delay = match node.config.block_time_ms {
			Some(delay) => delay,
			None => {
				let context = node.chain.pending_context(now())?;
				let evaluated = node.chain.evaluate_txs(
					&mut node.state,
					context,
					&node.evm,
					vec![tx],
					Some(request.from),
				)?;
				if let Some((_, rejected)) = evaluated.rejected.first() {
					return Err(rejected.clone().into());
				}
				node.chain.mine_txs(&node.state, &evaluated)?;

				return match evaluated.results.first() {
					Some(result) => check_outcome(&result.reason, &result.returned, Some(hash)).map(|()| hash),
					None => Ok(hash),
				};
			}
		};

		if !node.mining_scheduled {
			let handle = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
			let inner = self.inner.clone();
			handle.spawn(async move {
				tokio::time::sleep(Duration::from_millis(delay)).await;
				let mined = match inner.lock() {
					Ok(mut node) => node.mine_pending(),
					Err(_) => Err(Error::Poisoned),
				};
				if let Err(e) = mined {
					log::error!(target: "rpc", "delayed mining failed: {}", e);
				}
			});
			node.mining_scheduled = true;
		}
		node.pending.push((tx, request.from));
		Ok(hash)
	}

	/// Mine every queued transaction into one block now.
	pub fn mine_pending(&self) -> Result<Option<BlockState>, Error> {
		self.lock()?.mine_pending()
	}

	pub fn pending_count(&self) -> Result<usize, Error> {
		Ok(self.lock()?.pending.len())
	}

	pub fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, Error> {
		Ok(self.lock()?.chain.get_logs(filter)?)
	}

	pub fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<ChainEvent>, Error> {
		Ok(self.lock()?.chain.subscribe())
	}

	pub fn block_number(&self) -> Result<u64, Error> {
		Ok(self.lock()?.chain.latest().number())
	}

	pub fn latest_block(&self) -> Result<BlockState, Error> {
		Ok(self.lock()?.chain.latest().clone())
	}

	pub fn block_by_number(&self, number: u64) -> Result<Option<BlockState>, Error> {
		Ok(self.lock()?.chain.block_by_number(number)?)
	}

	pub fn transaction(&self, hash: H256) -> Result<Option<(Transaction, TxLookup)>, Error> {
		Ok(self.lock()?.chain.transaction(hash)?)
	}

	pub fn receipt(&self, hash: H256) -> Result<Option<(TransactionReceipt, TxLookup)>, Error> {
		Ok(self.lock()?.chain.receipt(hash)?)
	}

	pub fn balance(&self, address: H160) -> Result<U256, Error> {
		Ok(self.lock()?.state.balance(address)?)
	}

	pub fn nonce(&self, address: H160) -> Result<U256, Error> {
		Ok(self.lock()?.state.nonce(address)?)
	}

	pub fn code(&self, address: H160) -> Result<Vec<u8>, Error> {
		Ok(self.lock()?.state.code(address)?.to_vec())
	}

	pub fn storage_at(&self, address: H160, index: H256) -> Result<H256, Error> {
		Ok(self.lock()?.state.storage(address, index)?)
	}
}

impl std::fmt::Debug for Node {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Node").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn revert_payload(message: &str) -> Vec<u8> {
		let mut out = REVERT_SELECTOR.to_vec();
		let mut word = [0u8; 32];
		U256::from(32).to_big_endian(&mut word);
		out.extend_from_slice(&word);
		U256::from(message.len()).to_big_endian(&mut word);
		out.extend_from_slice(&word);
		let mut data = message.as_bytes().to_vec();
		data.resize((message.len() + 31) / 32 * 32, 0);
		out.extend_from_slice(&data);
		out
	}

	#[test]
	fn decodes_error_string() {
		assert_eq!(
			decode_revert_reason(&revert_payload("not payable")),
			Some("not payable".to_string())
		);
	}

	#[test]
	fn ignores_other_payloads() {
		assert_eq!(decode_revert_reason(&[]), None);
		assert_eq!(decode_revert_reason(&[0xde, 0xad, 0xbe, 0xef, 0, 0]), None);

		let mut truncated = revert_payload("a longer message");
		truncated.truncate(4 + 64 + 3);
		assert_eq!(decode_revert_reason(&truncated), None);
	}

	#[test]
	fn key_signer_signatures_recover() {
		let mut signer = KeySigner::new();
		let from = signer.add_key(&[0x11; 32]).unwrap();

		let unsigned = UnsignedTransaction {
			nonce: U256::zero(),
			gas_price: U256::one(),
			gas_limit: 21_000,
			to: Some(H160::repeat_byte(0x22)),
			value: U256::from(5),
			input: Vec::new(),
		};
		let signature = signer.sign(from, unsigned.signing_hash(Some(1337))).unwrap();
		let tx = unsigned.with_signature(Some(1337), signature.recovery_id, signature.r, signature.s);

		assert_eq!(tx.chain_id(), Some(1337));
		assert_eq!(tx.recover_sender(), Ok(from));
		assert!(signer.sign(H160::zero(), H256::zero()).is_err());
	}

	#[test]
	fn send_without_runtime_fails_for_delayed_mining() {
		let mut signer = KeySigner::new();
		let from = signer.add_key(&[0x11; 32]).unwrap();
		let mut config = NodeConfig {
			block_time_ms: Some(10),
			..NodeConfig::default()
		};
		config.genesis.insert(
			from,
			crate::config::GenesisAccount {
				balance: U256::exp10(20),
				..Default::default()
			},
		);
		let node = Node::new(config).unwrap();

		let request = TransactionRequest {
			from,
			to: Some(H160::repeat_byte(0x22)),
			value: U256::one(),
			gas: Some(21_000),
			..Default::default()
		};
		assert!(matches!(node.send_transaction(request, &signer), Err(Error::NoRuntime)));
		assert_eq!(node.pending_count().unwrap(), 0);
	}
}
