//! Opaque ordered key-value namespace shared by the world state and the
//! chain store.

use crate::error::StoreError;
use primitive_types::H256;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Backing store. Implementations must be safe to share between the single
/// writer and concurrent readers.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait KeyValueStore: Send + Sync {
	fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
	fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
	fn delete(&self, key: &[u8]) -> Result<(), StoreError>;
}

/// In-memory store, storing all values in a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
	data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.data.read().map(|data| data.len()).unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl KeyValueStore for MemoryStore {
	fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
		let data = self.data.read().map_err(|_| StoreError::Poisoned)?;
		Ok(data.get(key).cloned())
	}

	fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
		let mut data = self.data.write().map_err(|_| StoreError::Poisoned)?;
		data.insert(key.to_vec(), value.to_vec());
		Ok(())
	}

	fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
		let mut data = self.data.write().map_err(|_| StoreError::Poisoned)?;
		data.remove(key);
		Ok(())
	}
}

/// Key layout of the namespace. Trie data is stored under its bare 32-byte
/// root; every other record carries a one byte prefix so the two never
/// collide.
pub mod keys {
	use primitive_types::H256;

	/// Hash of the current chain tip.
	pub const TIP: &[u8] = b"tip";

	fn prefixed(prefix: u8, data: &[u8]) -> Vec<u8> {
		let mut key = Vec::with_capacity(1 + data.len());
		key.push(prefix);
		key.extend_from_slice(data);
		key
	}

	pub fn header(hash: H256) -> Vec<u8> {
		prefixed(b'h', hash.as_bytes())
	}

	pub fn canonical(number: u64) -> Vec<u8> {
		prefixed(b'n', &number.to_be_bytes())
	}

	pub fn transaction(hash: H256) -> Vec<u8> {
		prefixed(b't', hash.as_bytes())
	}

	pub fn code(hash: H256) -> Vec<u8> {
		prefixed(b'c', hash.as_bytes())
	}
}

/// Cheaply cloneable handle to the shared store.
#[derive(Clone)]
pub struct Database {
	store: Arc<dyn KeyValueStore>,
}

impl Database {
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self { store }
	}

	/// Database over a fresh in-memory store.
	pub fn memory() -> Self {
		Self::new(Arc::new(MemoryStore::new()))
	}

	pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
		self.store.get(key)
	}

	pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
		self.store.put(key, value)
	}

	pub fn code(&self, hash: H256) -> Result<Option<Vec<u8>>, StoreError> {
		self.get(&keys::code(hash))
	}

	pub fn put_code(&self, hash: H256, code: &[u8]) -> Result<(), StoreError> {
		self.put(&keys::code(hash), code)
	}
}

impl std::fmt::Debug for Database {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Database").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn memory_store_roundtrip() {
		let store = MemoryStore::new();
		store.put(b"a", b"1").unwrap();
		assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
		store.delete(b"a").unwrap();
		assert_eq!(store.get(b"a").unwrap(), None);
		assert!(store.is_empty());
	}

	#[test]
	fn prefixed_keys_never_collide_with_trie_roots() {
		let hash = H256::repeat_byte(7);
		assert_eq!(keys::header(hash).len(), 33);
		assert_ne!(keys::header(hash), keys::code(hash));
		assert_eq!(keys::canonical(1).len(), 9);
	}
}
