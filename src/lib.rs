//! Embedded Ethereum-compatible execution and state engine for local
//! development: world state with nested checkpoints, message calls and
//! contract creation, transaction execution, block assembly with log
//! queries and notifications, and the call/send boundary used by an RPC
//! adapter.

#![forbid(unsafe_code)]

pub mod blockchain;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod rpc;
pub mod state;
pub mod trie;
pub mod types;

pub use devnode_core as interpreter;

pub use crate::blockchain::{Blockchain, ChainEvent, ChainParams, EvaluatedTxs, LogEntry, LogFilter};
pub use crate::config::{GenesisAccount, Hardfork, NodeConfig};
pub use crate::db::{Database, KeyValueStore, MemoryStore};
pub use crate::error::{
	BlockchainError, ConfigError, Error, StateError, StoreError, TransactionRejected, TrieError,
};
pub use crate::executor::{
	contract_creation, create_address, execute_transaction, message_call, CallParams, CallResult,
	ChainContext, CreateParams, ExTxResult, Substrate,
};
pub use crate::rpc::{
	decode_revert_reason, handle_call, CallRequest, KeySigner, Node, RecoverableSignature, Signer,
	TransactionRequest,
};
pub use crate::state::{EvmAccount, StorageOverlay, WorldState};
pub use crate::types::{
	AccountRecord, BlockHeader, BlockState, Log, Transaction, TransactionReceipt, TxLookup,
	UnsignedTransaction,
};
