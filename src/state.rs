//! World state with nested checkpoints.
//!
//! Every mutation happens on an account copy held by the innermost
//! checkpoint. Reads fall through the checkpoint stack to the persisted
//! account trie. Committing the outermost checkpoint is the only operation
//! that writes to the store.

use crate::db::Database;
use crate::error::StateError;
use crate::trie::{Trie, EMPTY_TRIE_ROOT};
use crate::types::{AccountRecord, EMPTY_CODE_HASH};
use bytes::Bytes;
use devnode_core::utils::{h256_to_u256, keccak256, u256_to_h256};
use primitive_types::{H160, H256, U256};
use rlp::RlpStream;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Storage writes of one account made since it was last persisted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StorageOverlay {
	writes: BTreeMap<H256, H256>,
	/// Persisted storage is ignored, as for a freshly created account.
	reset: bool,
}

impl StorageOverlay {
	pub fn get(&self, index: &H256) -> Option<H256> {
		match self.writes.get(index) {
			Some(value) => Some(*value),
			None if self.reset => Some(H256::zero()),
			None => None,
		}
	}
}

/// Working copy of an account record together with its code and pending
/// storage writes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EvmAccount {
	pub address: H160,
	pub record: AccountRecord,
	code: Bytes,
	code_dirty: bool,
	storage: StorageOverlay,
	deleted: bool,
}

impl EvmAccount {
	fn persisted(address: H160, record: AccountRecord, code: Bytes) -> Self {
		Self {
			address,
			record,
			code,
			code_dirty: false,
			storage: StorageOverlay::default(),
			deleted: false,
		}
	}

	fn tombstone(address: H160) -> Self {
		Self {
			address,
			record: AccountRecord::default(),
			code: Bytes::new(),
			code_dirty: false,
			storage: StorageOverlay {
				writes: BTreeMap::new(),
				reset: true,
			},
			deleted: true,
		}
	}

	pub fn nonce(&self) -> U256 {
		self.record.nonce
	}

	pub fn balance(&self) -> U256 {
		self.record.balance
	}

	pub fn code(&self) -> &Bytes {
		&self.code
	}

	pub fn code_hash(&self) -> H256 {
		self.record.code_hash
	}

	/// No code, zero nonce and zero balance.
	pub fn is_empty(&self) -> bool {
		self.record.nonce.is_zero()
			&& self.record.balance.is_zero()
			&& self.record.code_hash == EMPTY_CODE_HASH
	}

	/// Address of the contract created by this account with its previous
	/// nonce. The nonce has already been advanced by the time a creation
	/// derives its address.
	pub fn next_contract_address(&self) -> H160 {
		let nonce = self.record.nonce.saturating_sub(U256::one());
		let mut stream = RlpStream::new_list(2);
		stream.append(&self.address);
		stream.append(&nonce);
		H160::from_slice(&keccak256(&stream.out())[12..])
	}

	pub fn inc_nonce(&mut self) {
		self.record.nonce = self.record.nonce.saturating_add(U256::one());
	}

	pub fn set_nonce(&mut self, nonce: U256) {
		self.record.nonce = nonce;
	}

	pub fn add_balance(&mut self, value: U256) {
		self.record.balance = self.record.balance.saturating_add(value);
	}

	/// Returns false, leaving the balance untouched, when it is too low.
	pub fn sub_balance(&mut self, value: U256) -> bool {
		match self.record.balance.checked_sub(value) {
			Some(balance) => {
				self.record.balance = balance;
				true
			}
			None => false,
		}
	}

	pub fn set_code(&mut self, code: Vec<u8>) {
		self.record.code_hash = keccak256(&code);
		self.code = Bytes::from(code);
		self.code_dirty = true;
	}

	pub fn set_storage(&mut self, index: H256, value: H256) {
		self.storage.writes.insert(index, value);
	}

	/// Drop all storage, persisted and pending.
	pub fn reset_storage(&mut self) {
		self.storage = StorageOverlay {
			writes: BTreeMap::new(),
			reset: true,
		};
		self.record.storage_root = EMPTY_TRIE_ROOT;
	}
}

type Checkpoint = BTreeMap<H160, EvmAccount>;

pub struct WorldState {
	db: Database,
	accounts: Trie,
	root: H256,
	checkpoints: Vec<Checkpoint>,
	/// Persisted storage tries, keyed by storage root.
	storage_tries: RefCell<BTreeMap<H256, Trie>>,
}

impl WorldState {
	/// Empty world state.
	pub fn new(db: Database) -> Self {
		Self {
			db,
			accounts: Trie::empty(true),
			root: EMPTY_TRIE_ROOT,
			checkpoints: Vec::new(),
			storage_tries: RefCell::new(BTreeMap::new()),
		}
	}

	/// World state as of a committed state root.
	pub fn at(db: Database, root: H256) -> Result<Self, StateError> {
		let accounts = Trie::open(&db, root, true)?;
		Ok(Self {
			db,
			accounts,
			root,
			checkpoints: Vec::new(),
			storage_tries: RefCell::new(BTreeMap::new()),
		})
	}

	pub fn database(&self) -> &Database {
		&self.db
	}

	/// Number of open checkpoints.
	pub fn depth(&self) -> usize {
		self.checkpoints.len()
	}

	/// Root of the persisted account trie. Fails while checkpoints are open,
	/// since their changes are not part of any root yet.
	pub fn state_root(&self) -> Result<H256, StateError> {
		if !self.checkpoints.is_empty() {
			return Err(StateError::OpenCheckpoints(self.checkpoints.len()));
		}
		Ok(self.root)
	}

	pub fn checkpoint(&mut self) {
		self.checkpoints.push(Checkpoint::new());
		log::trace!(target: "state", "checkpoint opened at depth {}", self.checkpoints.len());
	}

	/// Commit the innermost checkpoint into its parent, or into the store
	/// when it is the outermost one.
	pub fn commit(&mut self) -> Result<(), StateError> {
		let checkpoint = self.checkpoints.pop().ok_or(StateError::NoCheckpoint)?;
		let depth = self.checkpoints.len();

		match self.checkpoints.last_mut() {
			Some(parent) => {
				log::trace!(
					target: "state",
					"merging {} accounts into checkpoint at depth {}",
					checkpoint.len(),
					depth,
				);
				parent.extend(checkpoint);
				Ok(())
			}
			None => self.persist(checkpoint),
		}
	}

	/// Discard the innermost checkpoint.
	pub fn revert(&mut self) -> Result<(), StateError> {
		let checkpoint = self.checkpoints.pop().ok_or(StateError::NoCheckpoint)?;
		log::trace!(
			target: "state",
			"reverted {} accounts at depth {}",
			checkpoint.len(),
			self.checkpoints.len() + 1,
		);
		Ok(())
	}

	fn persist(&mut self, checkpoint: Checkpoint) -> Result<(), StateError> {
		let touched = checkpoint.len();

		for (address, mut account) in checkpoint {
			if account.deleted {
				self.accounts.remove(address.as_bytes());
				continue;
			}

			if account.storage.reset || !account.storage.writes.is_empty() {
				let mut storage = if account.storage.reset {
					Trie::empty(true)
				} else {
					Trie::open(&self.db, account.record.storage_root, true)?
				};
				for (index, value) in &account.storage.writes {
					if value.is_zero() {
						storage.remove(index.as_bytes());
					} else {
						storage.insert(index.as_bytes(), rlp::encode(&h256_to_u256(*value)).to_vec());
					}
				}
				account.record.storage_root = storage.commit(&self.db)?;
			}

			if account.code_dirty && !account.code.is_empty() {
				self.db.put_code(account.record.code_hash, &account.code)?;
			}

			self.accounts
				.insert(address.as_bytes(), rlp::encode(&account.record).to_vec());
		}

		self.root = self.accounts.commit(&self.db)?;
		self.storage_tries.borrow_mut().clear();
		log::debug!(target: "state", "persisted {} accounts, state root {:?}", touched, self.root);
		Ok(())
	}

	/// Innermost copy of an account, tombstones included.
	fn find(&self, address: H160) -> Option<&EvmAccount> {
		self.checkpoints
			.iter()
			.rev()
			.find_map(|checkpoint| checkpoint.get(&address))
	}

	fn persisted_record(&self, address: H160) -> Result<Option<AccountRecord>, StateError> {
		match self.accounts.get(address.as_bytes()) {
			Some(raw) => Ok(Some(rlp::decode(raw)?)),
			None => Ok(None),
		}
	}

	fn persisted_code(&self, code_hash: H256) -> Result<Bytes, StateError> {
		if code_hash == EMPTY_CODE_HASH {
			return Ok(Bytes::new());
		}
		let code = self.db.code(code_hash)?.ok_or(StateError::MissingCode(code_hash))?;
		Ok(Bytes::from(code))
	}

	fn persisted_account(&self, address: H160) -> Result<Option<EvmAccount>, StateError> {
		match self.persisted_record(address)? {
			Some(record) => {
				let code = self.persisted_code(record.code_hash)?;
				Ok(Some(EvmAccount::persisted(address, record, code)))
			}
			None => Ok(None),
		}
	}

	/// Read-only view of an account. Usable without an open checkpoint.
	pub fn load_immutable_account(&self, address: H160) -> Result<Option<EvmAccount>, StateError> {
		match self.find(address) {
			Some(account) if account.deleted => Ok(None),
			Some(account) => Ok(Some(account.clone())),
			None => self.persisted_account(address),
		}
	}

	/// Live account of the innermost checkpoint, copied there on first
	/// touch.
	pub fn load_account(&mut self, address: H160) -> Result<Option<&mut EvmAccount>, StateError> {
		if self.checkpoints.is_empty() {
			return Err(StateError::NoCheckpoint);
		}

		let innermost = self.checkpoints.len() - 1;
		if !self.checkpoints[innermost].contains_key(&address) {
			let account = match self.find(address) {
				Some(account) => account.clone(),
				None => match self.persisted_account(address)? {
					Some(account) => account,
					None => return Ok(None),
				},
			};
			self.checkpoints[innermost].insert(address, account);
		}

		Ok(self.checkpoints[innermost]
			.get_mut(&address)
			.filter(|account| !account.deleted))
	}

	fn require_account(&mut self, address: H160) -> Result<&mut EvmAccount, StateError> {
		self.load_account(address)?
			.ok_or(StateError::MissingAccount(address))
	}

	/// Create an account in the innermost checkpoint with empty storage.
	pub fn create_account(
		&mut self,
		address: H160,
		value: U256,
		nonce: U256,
		code: Vec<u8>,
	) -> Result<&mut EvmAccount, StateError> {
		if self.checkpoints.is_empty() {
			return Err(StateError::NoCheckpoint);
		}
		if self.exists(address)? {
			return Err(StateError::AccountExists(address));
		}

		let mut account = EvmAccount::persisted(
			address,
			AccountRecord {
				nonce,
				balance: value,
				..Default::default()
			},
			Bytes::new(),
		);
		account.reset_storage();
		if !code.is_empty() {
			account.set_code(code);
		}

		let innermost = self.checkpoints.len() - 1;
		let checkpoint = &mut self.checkpoints[innermost];
		checkpoint.insert(address, account);
		Ok(checkpoint
			.get_mut(&address)
			.ok_or(StateError::MissingAccount(address))?)
	}

	/// Load an account, creating an empty one when it does not exist.
	pub fn load_or_create(&mut self, address: H160) -> Result<&mut EvmAccount, StateError> {
		if !self.exists(address)? {
			self.create_account(address, U256::zero(), U256::zero(), Vec::new())?;
		}
		self.require_account(address)
	}

	/// Remove an account and its storage when the checkpoint is committed.
	pub fn delete_account(&mut self, address: H160) -> Result<(), StateError> {
		if self.checkpoints.is_empty() {
			return Err(StateError::NoCheckpoint);
		}
		let innermost = self.checkpoints.len() - 1;
		self.checkpoints[innermost].insert(address, EvmAccount::tombstone(address));
		Ok(())
	}

	pub fn account_record(&self, address: H160) -> Result<Option<AccountRecord>, StateError> {
		match self.find(address) {
			Some(account) if account.deleted => Ok(None),
			Some(account) => Ok(Some(account.record)),
			None => self.persisted_record(address),
		}
	}

	pub fn exists(&self, address: H160) -> Result<bool, StateError> {
		Ok(self.account_record(address)?.is_some())
	}

	/// Exists and has no code, zero nonce and zero balance.
	pub fn is_empty(&self, address: H160) -> Result<bool, StateError> {
		Ok(self.account_record(address)?.map_or(false, |record| {
			record.nonce.is_zero() && record.balance.is_zero() && record.code_hash == EMPTY_CODE_HASH
		}))
	}

	pub fn balance(&self, address: H160) -> Result<U256, StateError> {
		Ok(self.account_record(address)?.map(|r| r.balance).unwrap_or_default())
	}

	pub fn nonce(&self, address: H160) -> Result<U256, StateError> {
		Ok(self.account_record(address)?.map(|r| r.nonce).unwrap_or_default())
	}

	pub fn code(&self, address: H160) -> Result<Bytes, StateError> {
		match self.find(address) {
			Some(account) => Ok(account.code.clone()),
			None => match self.persisted_record(address)? {
				Some(record) => self.persisted_code(record.code_hash),
				None => Ok(Bytes::new()),
			},
		}
	}

	fn persisted_storage(&self, root: H256, index: H256) -> Result<H256, StateError> {
		if root == EMPTY_TRIE_ROOT {
			return Ok(H256::zero());
		}

		let mut tries = self.storage_tries.borrow_mut();
		if !tries.contains_key(&root) {
			tries.insert(root, Trie::open(&self.db, root, true)?);
		}
		match tries.get(&root).and_then(|trie| trie.get(index.as_bytes())) {
			Some(raw) => Ok(u256_to_h256(rlp::decode(raw)?)),
			None => Ok(H256::zero()),
		}
	}

	/// Current storage value, pending writes included.
	pub fn storage(&self, address: H160, index: H256) -> Result<H256, StateError> {
		match self.find(address) {
			Some(account) => match account.storage.get(&index) {
				Some(value) => Ok(value),
				None => self.persisted_storage(account.record.storage_root, index),
			},
			None => match self.persisted_record(address)? {
				Some(record) => self.persisted_storage(record.storage_root, index),
				None => Ok(H256::zero()),
			},
		}
	}

	/// Storage value as of the last persisted state.
	pub fn original_storage(&self, address: H160, index: H256) -> Result<H256, StateError> {
		match self.find(address) {
			Some(account) if account.storage.reset => Ok(H256::zero()),
			_ => match self.persisted_record(address)? {
				Some(record) => self.persisted_storage(record.storage_root, index),
				None => Ok(H256::zero()),
			},
		}
	}

	pub fn set_storage(&mut self, address: H160, index: H256, value: H256) -> Result<(), StateError> {
		self.require_account(address)?.set_storage(index, value);
		Ok(())
	}

	pub fn set_code(&mut self, address: H160, code: Vec<u8>) -> Result<(), StateError> {
		self.require_account(address)?.set_code(code);
		Ok(())
	}

	pub fn inc_nonce(&mut self, address: H160) -> Result<(), StateError> {
		self.require_account(address)?.inc_nonce();
		Ok(())
	}

	pub fn add_balance(&mut self, address: H160, value: U256) -> Result<(), StateError> {
		self.load_or_create(address)?.add_balance(value);
		Ok(())
	}

	/// Returns false when the balance is too low.
	pub fn sub_balance(&mut self, address: H160, value: U256) -> Result<bool, StateError> {
		match self.load_account(address)? {
			Some(account) => Ok(account.sub_balance(value)),
			None => Ok(value.is_zero()),
		}
	}

	/// Move `value` from `source` to `target`, creating the target when
	/// needed. Returns false and changes nothing when the source balance is
	/// too low.
	pub fn transfer(&mut self, source: H160, target: H160, value: U256) -> Result<bool, StateError> {
		if self.balance(source)? < value {
			return Ok(false);
		}
		if value.is_zero() {
			self.load_or_create(target)?;
			return Ok(true);
		}

		self.require_account(source)?.sub_balance(value);
		self.load_or_create(target)?.add_balance(value);
		Ok(true)
	}
}

impl std::fmt::Debug for WorldState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WorldState")
			.field("root", &self.root)
			.field("depth", &self.checkpoints.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn addr(n: u8) -> H160 {
		H160::repeat_byte(n)
	}

	#[test]
	fn mutation_requires_checkpoint() {
		let mut state = WorldState::new(Database::memory());
		assert!(matches!(state.load_account(addr(1)), Err(StateError::NoCheckpoint)));
		assert!(matches!(
			state.create_account(addr(1), U256::one(), U256::zero(), Vec::new()),
			Err(StateError::NoCheckpoint)
		));
		assert!(matches!(state.commit(), Err(StateError::NoCheckpoint)));
		assert!(matches!(state.revert(), Err(StateError::NoCheckpoint)));
	}

	#[test]
	fn created_account_is_persisted_on_commit() {
		let mut state = WorldState::new(Database::memory());
		state.checkpoint();
		state
			.create_account(addr(1), U256::from(100), U256::zero(), vec![0x00])
			.unwrap();
		assert!(state.state_root().is_err());
		state.commit().unwrap();

		assert_ne!(state.state_root().unwrap(), EMPTY_TRIE_ROOT);
		let account = state.load_immutable_account(addr(1)).unwrap().unwrap();
		assert_eq!(account.balance(), U256::from(100));
		assert_eq!(&account.code()[..], &[0x00]);
	}

	#[test]
	fn creating_twice_fails() {
		let mut state = WorldState::new(Database::memory());
		state.checkpoint();
		state.create_account(addr(1), U256::zero(), U256::one(), Vec::new()).unwrap();
		assert!(matches!(
			state.create_account(addr(1), U256::zero(), U256::one(), Vec::new()),
			Err(StateError::AccountExists(_))
		));
	}

	#[test]
	fn reverted_creation_leaves_no_account() {
		let mut state = WorldState::new(Database::memory());
		state.checkpoint();
		state.checkpoint();
		state.create_account(addr(1), U256::one(), U256::zero(), Vec::new()).unwrap();
		state.revert().unwrap();
		assert!(!state.exists(addr(1)).unwrap());
		state.commit().unwrap();
		assert!(state.load_immutable_account(addr(1)).unwrap().is_none());
		assert_eq!(state.state_root().unwrap(), EMPTY_TRIE_ROOT);
	}

	#[test]
	fn nested_writes_are_isolated_until_commit() {
		let mut state = WorldState::new(Database::memory());
		state.checkpoint();
		state.create_account(addr(1), U256::zero(), U256::zero(), Vec::new()).unwrap();
		state.set_storage(addr(1), H256::zero(), H256::repeat_byte(1)).unwrap();

		state.checkpoint();
		state.set_storage(addr(1), H256::zero(), H256::repeat_byte(2)).unwrap();
		assert_eq!(state.storage(addr(1), H256::zero()).unwrap(), H256::repeat_byte(2));
		state.revert().unwrap();
		assert_eq!(state.storage(addr(1), H256::zero()).unwrap(), H256::repeat_byte(1));

		state.checkpoint();
		state.set_storage(addr(1), H256::zero(), H256::repeat_byte(3)).unwrap();
		state.commit().unwrap();
		state.commit().unwrap();

		assert_eq!(state.storage(addr(1), H256::zero()).unwrap(), H256::repeat_byte(3));
		assert_eq!(
			state.original_storage(addr(1), H256::zero()).unwrap(),
			H256::repeat_byte(3)
		);
	}

	#[test]
	fn inner_commits_merge_without_persisting() {
		let mut state = WorldState::new(Database::memory());
		state.checkpoint();
		state.checkpoint();
		state.checkpoint();
		state.create_account(addr(1), U256::from(7), U256::zero(), Vec::new()).unwrap();

		state.commit().unwrap();
		assert_eq!(state.depth(), 2);
		state.commit().unwrap();
		assert_eq!(state.depth(), 1);
		assert!(matches!(state.state_root(), Err(StateError::OpenCheckpoints(1))));
		assert_eq!(state.balance(addr(1)).unwrap(), U256::from(7));

		state.commit().unwrap();
		assert_eq!(state.depth(), 0);
		assert_ne!(state.state_root().unwrap(), EMPTY_TRIE_ROOT);
		assert_eq!(state.balance(addr(1)).unwrap(), U256::from(7));
	}

	#[test]
	fn persisted_state_reopens_at_root() {
		let db = Database::memory();
		let mut state = WorldState::new(db.clone());
		state.checkpoint();
		state.create_account(addr(1), U256::from(5), U256::zero(), vec![0x60, 0x00]).unwrap();
		state.set_storage(addr(1), H256::repeat_byte(9), H256::repeat_byte(8)).unwrap();
		state.commit().unwrap();
		let root = state.state_root().unwrap();

		let reopened = WorldState::at(db, root).unwrap();
		assert_eq!(reopened.balance(addr(1)).unwrap(), U256::from(5));
		assert_eq!(&reopened.code(addr(1)).unwrap()[..], &[0x60, 0x00]);
		assert_eq!(
			reopened.storage(addr(1), H256::repeat_byte(9)).unwrap(),
			H256::repeat_byte(8)
		);
	}

	#[test]
	fn deleted_account_disappears() {
		let mut state = WorldState::new(Database::memory());
		state.checkpoint();
		state.create_account(addr(1), U256::one(), U256::zero(), Vec::new()).unwrap();
		state.commit().unwrap();

		state.checkpoint();
		state.delete_account(addr(1)).unwrap();
		assert!(state.load_account(addr(1)).unwrap().is_none());
		state.commit().unwrap();
		assert!(!state.exists(addr(1)).unwrap());
		assert_eq!(state.state_root().unwrap(), EMPTY_TRIE_ROOT);
	}

	#[test]
	fn transfer_checks_balance() {
		let mut state = WorldState::new(Database::memory());
		state.checkpoint();
		state.create_account(addr(1), U256::from(10), U256::zero(), Vec::new()).unwrap();
		assert!(!state.transfer(addr(1), addr(2), U256::from(11)).unwrap());
		assert!(!state.exists(addr(2)).unwrap());
		assert!(state.transfer(addr(1), addr(2), U256::from(4)).unwrap());
		assert_eq!(state.balance(addr(1)).unwrap(), U256::from(6));
		assert_eq!(state.balance(addr(2)).unwrap(), U256::from(4));
	}

	#[test]
	fn contract_address_follows_previous_nonce() {
		// Well known address of the first contract deployed by
		// 0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0.
		let sender = H160::from_slice(&hex::decode("6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0").unwrap());
		let mut account = EvmAccount::persisted(sender, AccountRecord::default(), Bytes::new());
		account.inc_nonce();
		assert_eq!(
			account.next_contract_address(),
			H160::from_slice(&hex::decode("cd234a471b72ba2f1ccf0a70fcaba648a5eecd8d").unwrap())
		);
	}
}
