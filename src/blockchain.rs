//! Block assembly, chain storage, log queries and chain notifications.

use crate::db::{keys, Database};
use crate::error::{BlockchainError, Error, TransactionRejected};
use crate::executor::{execute_transaction, ChainContext, ExTxResult};
use crate::state::WorldState;
use crate::trie::{ordered_trie, Trie, EMPTY_TRIE_ROOT};
use crate::types::{BlockHeader, BlockState, Log, Transaction, TransactionReceipt, TxLookup};
use devnode_core::Config;
use ethereum_types::{Bloom, BloomInput};
use futures::channel::mpsc;
use primitive_types::{H160, H256, U256};

/// Number of ancestor hashes visible to `BLOCKHASH`.
pub const BLOCK_HASH_WINDOW: u64 = 256;

/// Chain-wide parameters of locally built blocks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChainParams {
	pub chain_id: u64,
	pub coinbase: H160,
	pub block_gas_limit: u64,
}

/// A log together with where it was emitted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogEntry {
	pub log: Log,
	pub block_hash: H256,
	pub block_number: u64,
	pub transaction_hash: H256,
	pub transaction_index: u64,
	/// Position of the log within its block.
	pub log_index: u64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChainEvent {
	NewHead(BlockState),
	Log(LogEntry),
}

/// Log query. Blocks default to the latest one. An empty address list
/// matches any address, and each topic position is either unconstrained or
/// a set of acceptable topics.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LogFilter {
	pub from_block: Option<u64>,
	pub to_block: Option<u64>,
	pub addresses: Vec<H160>,
	pub topics: Vec<Option<Vec<H256>>>,
}

impl LogFilter {
	pub fn matches(&self, log: &Log) -> bool {
		if !self.addresses.is_empty() && !self.addresses.contains(&log.address) {
			return false;
		}

		self.topics.iter().enumerate().all(|(position, filter)| match filter {
			None => true,
			Some(accepted) => log
				.topics
				.get(position)
				.map_or(false, |topic| accepted.contains(topic)),
		})
	}

	/// Whether a block with `bloom` can contain a matching log.
	pub fn may_match(&self, bloom: &Bloom) -> bool {
		let addresses = self.addresses.is_empty()
			|| self
				.addresses
				.iter()
				.any(|address| bloom.contains_input(BloomInput::Raw(address.as_bytes())));

		addresses
			&& self.topics.iter().all(|filter| match filter {
				None => true,
				Some(accepted) => accepted
					.iter()
					.any(|topic| bloom.contains_input(BloomInput::Raw(topic.as_bytes()))),
			})
	}
}

/// Transactions executed against the world state, ready to be mined.
#[derive(Clone, Debug)]
pub struct EvaluatedTxs {
	pub context: ChainContext,
	pub transactions: Vec<Transaction>,
	pub receipts: Vec<TransactionReceipt>,
	pub results: Vec<ExTxResult>,
	pub cumulative_gas_used: u64,
	/// Transactions left out of the batch.
	pub rejected: Vec<(H256, TransactionRejected)>,
}

pub struct Blockchain {
	db: Database,
	params: ChainParams,
	tip: BlockState,
	subscribers: Vec<mpsc::UnboundedSender<ChainEvent>>,
}

impl Blockchain {
	/// Start a chain from a genesis block over `state_root`.
	pub fn genesis(
		db: Database,
		params: ChainParams,
		state_root: H256,
		timestamp: u64,
	) -> Result<Self, BlockchainError> {
		let header = BlockHeader {
			parent_hash: H256::zero(),
			coinbase: H160::zero(),
			state_root,
			transactions_root: EMPTY_TRIE_ROOT,
			receipts_root: EMPTY_TRIE_ROOT,
			logs_bloom: Bloom::default(),
			difficulty: U256::zero(),
			number: 0,
			gas_limit: params.block_gas_limit,
			gas_used: 0,
			timestamp,
		};
		let genesis = BlockState::new(header);

		let chain = Self {
			db,
			params,
			tip: genesis.clone(),
			subscribers: Vec::new(),
		};
		chain.persist_header(&genesis)?;
		chain.db.put(keys::TIP, genesis.hash.as_bytes())?;
		log::info!(target: "blockchain", "genesis block {:?}, state root {:?}", genesis.hash, state_root);
		Ok(chain)
	}

	/// Reopen the chain stored in `db`.
	pub fn open(db: Database, params: ChainParams) -> Result<Self, BlockchainError> {
		let raw = db.get(keys::TIP)?.ok_or(BlockchainError::MissingGenesis)?;
		let hash = decode_hash(&raw)?;
		let header = db
			.get(&keys::header(hash))?
			.ok_or(BlockchainError::UnknownBlock(hash))?;

		Ok(Self {
			db,
			params,
			tip: BlockState::new(rlp::decode(&header)?),
			subscribers: Vec::new(),
		})
	}

	pub fn params(&self) -> &ChainParams {
		&self.params
	}

	pub fn latest(&self) -> &BlockState {
		&self.tip
	}

	/// Number of known headers, genesis included.
	pub fn header_count(&self) -> u64 {
		self.tip.number() + 1
	}

	pub fn block_by_hash(&self, hash: H256) -> Result<Option<BlockState>, BlockchainError> {
		match self.db.get(&keys::header(hash))? {
			Some(raw) => Ok(Some(BlockState::new(rlp::decode(&raw)?))),
			None => Ok(None),
		}
	}

	pub fn block_hash(&self, number: u64) -> Result<Option<H256>, BlockchainError> {
		match self.db.get(&keys::canonical(number))? {
			Some(raw) => Ok(Some(decode_hash(&raw)?)),
			None => Ok(None),
		}
	}

	pub fn block_by_number(&self, number: u64) -> Result<Option<BlockState>, BlockchainError> {
		match self.block_hash(number)? {
			Some(hash) => self.block_by_hash(hash),
			None => Ok(None),
		}
	}

	/// Transactions of a block, in block order.
	pub fn block_transactions(&self, block: &BlockState) -> Result<Vec<Transaction>, BlockchainError> {
		self.ordered_items(block.header.transactions_root)
	}

	pub fn block_receipts(&self, block: &BlockState) -> Result<Vec<TransactionReceipt>, BlockchainError> {
		self.ordered_items(block.header.receipts_root)
	}

	fn ordered_items<T: rlp::Decodable>(&self, root: H256) -> Result<Vec<T>, BlockchainError> {
		let trie = Trie::open(&self.db, root, false)?;
		let mut items = Vec::with_capacity(trie.len());
		for index in 0..trie.len() as u64 {
			let raw = trie
				.get(&rlp::encode(&index))
				.ok_or(BlockchainError::Decode(rlp::DecoderError::Custom("missing trie item")))?;
			items.push(rlp::decode(raw)?);
		}
		Ok(items)
	}

	pub fn transaction_lookup(&self, hash: H256) -> Result<Option<TxLookup>, BlockchainError> {
		match self.db.get(&keys::transaction(hash))? {
			Some(raw) => Ok(Some(rlp::decode(&raw)?)),
			None => Ok(None),
		}
	}

	fn lookup_item<T: rlp::Decodable>(
		&self,
		hash: H256,
		root: impl Fn(&BlockHeader) -> H256,
	) -> Result<Option<(T, TxLookup)>, BlockchainError> {
		let lookup = match self.transaction_lookup(hash)? {
			Some(lookup) => lookup,
			None => return Ok(None),
		};
		let block = self
			.block_by_hash(lookup.block_hash)?
			.ok_or(BlockchainError::UnknownBlock(lookup.block_hash))?;
		let trie = Trie::open(&self.db, root(&block.header), false)?;
		match trie.get(&rlp::encode(&lookup.index)) {
			Some(raw) => Ok(Some((rlp::decode(raw)?, lookup))),
			None => Ok(None),
		}
	}

	pub fn transaction(&self, hash: H256) -> Result<Option<(Transaction, TxLookup)>, BlockchainError> {
		self.lookup_item(hash, |header| header.transactions_root)
	}

	pub fn receipt(&self, hash: H256) -> Result<Option<(TransactionReceipt, TxLookup)>, BlockchainError> {
		self.lookup_item(hash, |header| header.receipts_root)
	}

	/// Environment of the block built on top of the tip.
	pub fn pending_context(&self, timestamp: u64) -> Result<ChainContext, BlockchainError> {
		let number = self.tip.number() + 1;
		let first = number.saturating_sub(BLOCK_HASH_WINDOW);
		let mut block_hashes = Vec::with_capacity((number - first) as usize);
		for ancestor in first..number {
			let hash = self
				.block_hash(ancestor)?
				.ok_or(BlockchainError::InvalidRange {
					from: ancestor,
					to: ancestor,
					count: self.header_count(),
				})?;
			block_hashes.push(hash);
		}

		Ok(ChainContext {
			coinbase: self.params.coinbase,
			number,
			timestamp: timestamp.max(self.tip.header.timestamp),
			difficulty: U256::zero(),
			gas_limit: self.params.block_gas_limit,
			chain_id: self.params.chain_id,
			block_hashes,
		})
	}

	/// Execute `txs` in order. Rejected transactions are left out of the
	/// batch and do not change state. A known `sender` skips signature
	/// recovery.
	pub fn evaluate_txs(
		&self,
		state: &mut WorldState,
		context: ChainContext,
		config: &Config,
		txs: Vec<Transaction>,
		sender: Option<H160>,
	) -> Result<EvaluatedTxs, Error> {
		let mut evaluated = EvaluatedTxs {
			context,
			transactions: Vec::with_capacity(txs.len()),
			receipts: Vec::with_capacity(txs.len()),
			results: Vec::with_capacity(txs.len()),
			cumulative_gas_used: 0,
			rejected: Vec::new(),
		};

		for tx in txs {
			let available = evaluated.context.gas_limit - evaluated.cumulative_gas_used;
			if tx.gas_limit > available {
				let rejected = TransactionRejected::BlockGasLimit {
					gas_limit: tx.gas_limit,
					available,
				};
				log::warn!(target: "blockchain", "leaving out {:?}: {}", tx.hash(), rejected);
				evaluated.rejected.push((tx.hash(), rejected));
				continue;
			}

			match execute_transaction(state, &evaluated.context, config, &tx, sender) {
				Ok(result) => {
					evaluated.cumulative_gas_used += result.gas_used();
					evaluated.receipts.push(TransactionReceipt::new(
						result.is_success(),
						evaluated.cumulative_gas_used,
						result.substrate.logs.clone(),
					));
					evaluated.transactions.push(tx);
					evaluated.results.push(result);
				}
				Err(Error::Rejected(rejected)) => {
					log::warn!(target: "blockchain", "leaving out {:?}: {}", tx.hash(), rejected);
					evaluated.rejected.push((tx.hash(), rejected));
				}
				Err(e) => return Err(e),
			}
		}

		Ok(evaluated)
	}

	/// Build a block from evaluated transactions and append it.
	pub fn mine_txs(
		&mut self,
		state: &WorldState,
		evaluated: &EvaluatedTxs,
	) -> Result<BlockState, BlockchainError> {
		let transactions = ordered_trie(evaluated.transactions.iter().map(|tx| rlp::encode(tx).to_vec()));
		let receipts = ordered_trie(evaluated.receipts.iter().map(|r| rlp::encode(r).to_vec()));

		let mut logs_bloom = Bloom::default();
		for receipt in &evaluated.receipts {
			logs_bloom.accrue_bloom(&receipt.logs_bloom);
		}

		let context = &evaluated.context;
		let header = BlockHeader {
			parent_hash: self.tip.hash,
			coinbase: context.coinbase,
			state_root: state.state_root()?,
			transactions_root: transactions.root(),
			receipts_root: receipts.root(),
			logs_bloom,
			difficulty: context.difficulty,
			number: context.number,
			gas_limit: context.gas_limit,
			gas_used: evaluated.cumulative_gas_used,
			timestamp: context.timestamp,
		};

		let block = BlockState::new(header);
		let senders = evaluated.results.iter().map(|r| r.sender).collect::<Vec<_>>();
		self.add_block(&block, &evaluated.transactions, &evaluated.receipts, &senders)?;
		Ok(block)
	}

	fn persist_header(&self, block: &BlockState) -> Result<(), BlockchainError> {
		self.db.put(&keys::header(block.hash), &rlp::encode(&block.header))?;
		self.db.put(&keys::canonical(block.number()), block.hash.as_bytes())?;
		Ok(())
	}

	/// Append a block to the chain. A block equal to the current tip is
	/// ignored and `false` returned.
	pub fn add_block(
		&mut self,
		block: &BlockState,
		transactions: &[Transaction],
		receipts: &[TransactionReceipt],
		senders: &[H160],
	) -> Result<bool, BlockchainError> {
		if block.hash == self.tip.hash {
			log::debug!(target: "blockchain", "block {:?} is already the tip", block.hash);
			return Ok(false);
		}
		if block.header.parent_hash != self.tip.hash {
			return Err(BlockchainError::ParentMismatch(block.header.parent_hash));
		}

		ordered_trie(transactions.iter().map(|tx| rlp::encode(tx).to_vec())).commit(&self.db)?;
		ordered_trie(receipts.iter().map(|r| rlp::encode(r).to_vec())).commit(&self.db)?;
		self.persist_header(block)?;

		let hashes = transactions.iter().map(Transaction::hash).collect::<Vec<_>>();
		for (index, (hash, sender)) in hashes.iter().zip(senders).enumerate() {
			let lookup = TxLookup {
				block_hash: block.hash,
				index: index as u64,
				sender: *sender,
			};
			self.db.put(&keys::transaction(*hash), &rlp::encode(&lookup))?;
		}

		self.db.put(keys::TIP, block.hash.as_bytes())?;
		self.tip = block.clone();
		log::info!(
			target: "blockchain",
			"block {} {:?}: {} transactions, gas used {}",
			block.number(),
			block.hash,
			transactions.len(),
			block.header.gas_used,
		);

		self.notify(ChainEvent::NewHead(block.clone()));
		for entry in block_log_entries(block, &hashes, receipts) {
			self.notify(ChainEvent::Log(entry));
		}
		Ok(true)
	}

	/// Re-execute a block received from elsewhere and append it. The block
	/// is applied as a whole or not at all: a rejected transaction, or a
	/// gas used, receipts root or state root differing from the header,
	/// leaves `state` at the current tip and is fatal.
	pub fn import_block(
		&mut self,
		state: &mut WorldState,
		config: &Config,
		header: BlockHeader,
		transactions: Vec<Transaction>,
	) -> Result<BlockState, Error> {
		if header.parent_hash != self.tip.hash {
			return Err(BlockchainError::ParentMismatch(header.parent_hash).into());
		}

		let previous = state.state_root()?;
		match self.apply_block(state, config, header, transactions) {
			Ok(block) => Ok(block),
			Err(e) => {
				log::warn!(target: "blockchain", "block import failed, restoring state root {:?}: {}", previous, e);
				*state = WorldState::at(state.database().clone(), previous)?;
				Err(e)
			}
		}
	}

	fn apply_block(
		&mut self,
		state: &mut WorldState,
		config: &Config,
		header: BlockHeader,
		transactions: Vec<Transaction>,
	) -> Result<BlockState, Error> {
		let mut context = self.pending_context(header.timestamp)?;
		context.coinbase = header.coinbase;
		context.difficulty = header.difficulty;
		context.gas_limit = header.gas_limit;

		state.checkpoint();
		let evaluated = self.evaluate_txs(state, context, config, transactions, None)?;
		if let Some((hash, reason)) = evaluated.rejected.first() {
			return Err(BlockchainError::RejectedTransaction {
				hash: *hash,
				reason: reason.clone(),
			}
			.into());
		}
		if evaluated.cumulative_gas_used != header.gas_used {
			return Err(BlockchainError::GasUsedMismatch {
				expected: header.gas_used,
				computed: evaluated.cumulative_gas_used,
			}
			.into());
		}
		let receipts_root =
			ordered_trie(evaluated.receipts.iter().map(|r| rlp::encode(r).to_vec())).root();
		if receipts_root != header.receipts_root {
			return Err(BlockchainError::ReceiptsRootMismatch {
				expected: header.receipts_root,
				computed: receipts_root,
			}
			.into());
		}
		state.commit()?;

		let computed = state.state_root()?;
		if computed != header.state_root {
			log::error!(
				target: "blockchain",
				"state root mismatch importing block {}: expected {:?}, computed {:?}",
				header.number,
				header.state_root,
				computed,
			);
			return Err(BlockchainError::StateRootMismatch {
				expected: header.state_root,
				computed,
			}
			.into());
		}

		let block = BlockState::new(header);
		let senders = evaluated.results.iter().map(|r| r.sender).collect::<Vec<_>>();
		self.add_block(&block, &evaluated.transactions, &evaluated.receipts, &senders)?;
		Ok(block)
	}

	/// Logs matching `filter`, in chain order.
	pub fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, BlockchainError> {
		let latest = self.tip.number();
		let from = filter.from_block.unwrap_or(latest);
		let to = filter.to_block.unwrap_or(latest);
		if from > to || to >= self.header_count() {
			return Err(BlockchainError::InvalidRange {
				from,
				to,
				count: self.header_count(),
			});
		}

		let mut entries = Vec::new();
		for number in from..=to {
			let block = self.block_by_number(number)?.ok_or(BlockchainError::InvalidRange {
				from,
				to,
				count: self.header_count(),
			})?;
			if !filter.may_match(&block.header.logs_bloom) {
				continue;
			}

			let hashes = self
				.block_transactions(&block)?
				.iter()
				.map(Transaction::hash)
				.collect::<Vec<_>>();
			let receipts = self.block_receipts(&block)?;
			entries.extend(
				block_log_entries(&block, &hashes, &receipts)
					.into_iter()
					.filter(|entry| filter.matches(&entry.log)),
			);
		}

		log::debug!(target: "blockchain", "{} logs in blocks {}..={}", entries.len(), from, to);
		Ok(entries)
	}

	/// Receive a `NewHead` event per appended block followed by a `Log`
	/// event per log in it.
	pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ChainEvent> {
		let (sender, receiver) = mpsc::unbounded();
		self.subscribers.push(sender);
		receiver
	}

	fn notify(&mut self, event: ChainEvent) {
		self.subscribers
			.retain(|subscriber| subscriber.unbounded_send(event.clone()).is_ok());
	}
}

fn decode_hash(raw: &[u8]) -> Result<H256, BlockchainError> {
	if raw.len() != 32 {
		return Err(rlp::DecoderError::RlpInvalidLength.into());
	}
	Ok(H256::from_slice(raw))
}

fn block_log_entries(
	block: &BlockState,
	hashes: &[H256],
	receipts: &[TransactionReceipt],
) -> Vec<LogEntry> {
	let mut entries = Vec::new();
	let mut log_index = 0;
	for (transaction_index, (hash, receipt)) in hashes.iter().zip(receipts).enumerate() {
		for log in &receipt.logs {
			entries.push(LogEntry {
				log: log.clone(),
				block_hash: block.hash,
				block_number: block.number(),
				transaction_hash: *hash,
				transaction_index: transaction_index as u64,
				log_index,
			});
			log_index += 1;
		}
	}
	entries
}
