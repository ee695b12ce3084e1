use devnode_core::ExitReason;
use primitive_types::{H160, H256, U256};

/// Failure of the underlying key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("store lock poisoned")]
	Poisoned,
	#[error("store backend failure: {0}")]
	Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TrieError {
	#[error(transparent)]
	Store(#[from] StoreError),
	#[error("trie root {0:?} not found in store")]
	MissingRoot(H256),
	#[error("trie data stored under {0:?} does not hash to its key")]
	Corrupt(H256),
	#[error("malformed trie data: {0}")]
	Decode(#[from] rlp::DecoderError),
}

/// Invariant violations of the world state. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
	#[error("state mutation requires an open checkpoint")]
	NoCheckpoint,
	#[error("account {0:?} already exists")]
	AccountExists(H160),
	#[error("account {0:?} does not exist")]
	MissingAccount(H160),
	#[error("code {0:?} not found in store")]
	MissingCode(H256),
	#[error("{0} checkpoints are still open")]
	OpenCheckpoints(usize),
	#[error(transparent)]
	Trie(#[from] TrieError),
	#[error(transparent)]
	Store(#[from] StoreError),
	#[error("malformed account data: {0}")]
	Decode(#[from] rlp::DecoderError),
}

/// A transaction that fails validation before execution begins. Rejected
/// transactions never reach a block and never change state.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TransactionRejected {
	#[error("Invalid transaction signature")]
	InvalidSignature,
	#[error("Transaction chain id {got} does not match chain id {expected}")]
	ChainIdMismatch { expected: u64, got: u64 },
	#[error("Sender account not recognized")]
	UnknownSender(H160),
	#[error("Sender account nonce does not match transaction nonce")]
	NonceMismatch { expected: U256, got: U256 },
	#[error("Insufficient funds for gas * price + value")]
	InsufficientBalance { required: U256, available: U256 },
	#[error("Transaction gas limit is below the intrinsic gas of {intrinsic}")]
	IntrinsicGas { intrinsic: u64, gas_limit: u64 },
	#[error("Transaction gas limit exceeds the remaining block gas")]
	BlockGasLimit { gas_limit: u64, available: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum BlockchainError {
	#[error(transparent)]
	Store(#[from] StoreError),
	#[error(transparent)]
	Trie(#[from] TrieError),
	#[error(transparent)]
	State(#[from] StateError),
	#[error("malformed chain data: {0}")]
	Decode(#[from] rlp::DecoderError),
	#[error("block range {from}..={to} is outside of the {count} known headers")]
	InvalidRange { from: u64, to: u64, count: u64 },
	#[error("unknown block {0:?}")]
	UnknownBlock(H256),
	#[error("parent {0:?} is not the chain tip")]
	ParentMismatch(H256),
	#[error("computed state root {computed:?} does not match header state root {expected:?}")]
	StateRootMismatch { expected: H256, computed: H256 },
	#[error("computed receipts root {computed:?} does not match header receipts root {expected:?}")]
	ReceiptsRootMismatch { expected: H256, computed: H256 },
	#[error("computed gas used {computed} does not match header gas used {expected}")]
	GasUsedMismatch { expected: u64, computed: u64 },
	#[error("block transaction {hash:?} rejected: {reason}")]
	RejectedTransaction { hash: H256, reason: TransactionRejected },
	#[error("chain has no genesis block")]
	MissingGenesis,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read config: {0}")]
	Io(#[from] std::io::Error),
	#[error("invalid config: {0}")]
	Yaml(#[from] serde_yaml::Error),
	#[error("invalid hex: {0}")]
	Hex(#[from] hex::FromHexError),
}

/// Errors surfaced at the node boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Rejected(#[from] TransactionRejected),
	/// Execution reverted. `reason` is the decoded `Error(string)` message
	/// when the output carries one.
	#[error("execution reverted: {}", reason.as_deref().unwrap_or("no reason"))]
	Reverted {
		reason: Option<String>,
		output: Vec<u8>,
		transaction: Option<H256>,
	},
	#[error("execution failed: {reason}")]
	Execution {
		reason: ExitReason,
		transaction: Option<H256>,
	},
	#[error(transparent)]
	State(#[from] StateError),
	#[error(transparent)]
	Blockchain(#[from] BlockchainError),
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error("signer failure: {0}")]
	Signer(String),
	#[error("delayed mining needs a running tokio runtime")]
	NoRuntime,
	#[error("node state lock poisoned")]
	Poisoned,
}

impl Error {
	/// Invariant violations that leave the node in an unknown state.
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			Self::State(_) | Self::Blockchain(_) | Self::Poisoned
		)
	}
}
