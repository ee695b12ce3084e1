//! Root-addressed key-value tries.
//!
//! A trie is held in memory as an ordered map and summarised with the
//! Merkle-Patricia root of its entries. Committing writes the full entry
//! list under the root, so any committed root can be reopened and checked
//! against its content.

use crate::db::Database;
use crate::error::TrieError;
use devnode_core::utils::keccak256;
use primitive_types::H256;
use rlp::{Rlp, RlpStream};
use std::collections::BTreeMap;

/// Root of the trie with no entries, `keccak256(rlp(""))`.
pub const EMPTY_TRIE_ROOT: H256 = H256([
	0x56, 0xe8, 0x1f, 0x17, 0x1b, 0xcc, 0x55, 0xa6, 0xff, 0x83, 0x45, 0xe6, 0x92, 0xc0, 0xf8,
	0x6e, 0x5b, 0x48, 0xe0, 0x1b, 0x99, 0x6c, 0xad, 0xc0, 0x01, 0x62, 0x2f, 0xb5, 0xe3, 0x63,
	0xb4, 0x21,
]);

#[derive(Clone, Debug)]
pub struct Trie {
	entries: BTreeMap<Vec<u8>, Vec<u8>>,
	/// Keys are hashed with keccak256 before insertion.
	secure: bool,
}

impl Trie {
	pub fn empty(secure: bool) -> Self {
		Self {
			entries: BTreeMap::new(),
			secure,
		}
	}

	/// Reopen a committed trie.
	pub fn open(db: &Database, root: H256, secure: bool) -> Result<Self, TrieError> {
		if root == EMPTY_TRIE_ROOT {
			return Ok(Self::empty(secure));
		}

		let raw = db.get(root.as_bytes())?.ok_or(TrieError::MissingRoot(root))?;
		let list = Rlp::new(&raw);
		let mut entries = BTreeMap::new();
		for item in list.iter() {
			let key: Vec<u8> = item.val_at(0)?;
			let value: Vec<u8> = item.val_at(1)?;
			entries.insert(key, value);
		}

		let trie = Self { entries, secure };
		if trie.root() != root {
			return Err(TrieError::Corrupt(root));
		}
		Ok(trie)
	}

	fn key(&self, key: &[u8]) -> Vec<u8> {
		if self.secure {
			keccak256(key).as_bytes().to_vec()
		} else {
			key.to_vec()
		}
	}

	pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
		self.entries.get(&self.key(key)).map(|v| &v[..])
	}

	/// Insert a value. An empty value removes the key.
	pub fn insert(&mut self, key: &[u8], value: Vec<u8>) {
		let key = self.key(key);
		if value.is_empty() {
			self.entries.remove(&key);
		} else {
			self.entries.insert(key, value);
		}
	}

	pub fn remove(&mut self, key: &[u8]) {
		let key = self.key(key);
		self.entries.remove(&key);
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn root(&self) -> H256 {
		if self.entries.is_empty() {
			return EMPTY_TRIE_ROOT;
		}
		ethereum::util::trie_root(self.entries.iter())
	}

	/// Persist the trie under its root and return the root.
	pub fn commit(&self, db: &Database) -> Result<H256, TrieError> {
		let root = self.root();
		if root == EMPTY_TRIE_ROOT {
			return Ok(root);
		}

		let mut stream = RlpStream::new_list(self.entries.len());
		for (key, value) in &self.entries {
			stream.begin_list(2);
			stream.append(key);
			stream.append(value);
		}
		db.put(root.as_bytes(), &stream.out())?;
		Ok(root)
	}
}

/// Trie of items keyed by the RLP encoding of their index, as used for
/// block transactions and receipts.
pub fn ordered_trie(items: impl IntoIterator<Item = Vec<u8>>) -> Trie {
	let mut trie = Trie::empty(false);
	for (index, item) in items.into_iter().enumerate() {
		trie.insert(&rlp::encode(&(index as u64)), item);
	}
	trie
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_root_matches_rlp_of_empty_string() {
		assert_eq!(EMPTY_TRIE_ROOT, keccak256(&rlp::NULL_RLP));
		assert_eq!(Trie::empty(true).root(), EMPTY_TRIE_ROOT);
	}

	#[test]
	fn ordered_trie_matches_ordered_root() {
		let items = vec![b"a".to_vec(), b"bc".to_vec(), b"def".to_vec()];
		let trie = ordered_trie(items.clone());
		assert_eq!(trie.root(), ethereum::util::ordered_trie_root(items));
	}

	#[test]
	fn secure_trie_matches_sec_root() {
		let mut trie = Trie::empty(true);
		trie.insert(b"dog", b"puppy".to_vec());
		trie.insert(b"horse", b"stallion".to_vec());
		let expected = ethereum::util::sec_trie_root(vec![
			(&b"dog"[..], &b"puppy"[..]),
			(&b"horse"[..], &b"stallion"[..]),
		]);
		assert_eq!(trie.root(), expected);
		assert_eq!(trie.get(b"dog"), Some(&b"puppy"[..]));
	}

	#[test]
	fn committed_trie_reopens() {
		let db = Database::memory();
		let mut trie = Trie::empty(true);
		trie.insert(b"key", b"value".to_vec());
		let root = trie.commit(&db).unwrap();

		let reopened = Trie::open(&db, root, true).unwrap();
		assert_eq!(reopened.get(b"key"), Some(&b"value"[..]));
		assert_eq!(reopened.root(), root);
	}

	#[test]
	fn empty_value_removes_key() {
		let mut trie = Trie::empty(false);
		trie.insert(b"key", b"value".to_vec());
		trie.insert(b"key", Vec::new());
		assert!(trie.is_empty());
	}

	#[test]
	fn unknown_root_is_missing() {
		let db = Database::memory();
		let root = H256::repeat_byte(1);
		assert!(matches!(
			Trie::open(&db, root, false),
			Err(TrieError::MissingRoot(r)) if r == root
		));
	}
}
