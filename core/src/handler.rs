use crate::ExitReason;
use primitive_types::{H160, H256, U256};

/// Create scheme.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum CreateScheme {
	/// Legacy create scheme of `CREATE`.
	Legacy {
		/// Caller of the create.
		caller: H160,
	},
	/// Create scheme of `CREATE2`.
	Create2 {
		/// Caller of the create.
		caller: H160,
		/// Code hash.
		code_hash: H256,
		/// Salt.
		salt: H256,
	},
}

/// Call scheme.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum CallScheme {
	/// `CALL`
	Call,
	/// `CALLCODE`
	CallCode,
	/// `DELEGATECALL`
	DelegateCall,
	/// `STATICCALL`
	StaticCall,
}

/// Context of the running frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Context {
	/// Execution address, whose storage is read and written.
	pub address: H160,
	/// Caller of the EVM.
	pub caller: H160,
	/// Apparent value of the EVM.
	pub apparent_value: U256,
}

/// Transfer from source to target, with given value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transfer {
	/// Source address.
	pub source: H160,
	/// Target address.
	pub target: H160,
	/// Transfer value.
	pub value: U256,
}

/// A nested message call requested by one of the call instructions.
#[derive(Clone, Debug)]
pub struct CallRequest {
	pub scheme: CallScheme,
	/// Account whose code runs.
	pub code_address: H160,
	/// Value moved before the callee runs.
	pub transfer: Option<Transfer>,
	pub input: Vec<u8>,
	/// Gas handed to the callee, stipend included.
	pub gas_limit: u64,
	pub is_static: bool,
	pub context: Context,
}

/// A nested contract creation requested by `CREATE` or `CREATE2`.
#[derive(Clone, Debug)]
pub struct CreateRequest {
	pub caller: H160,
	pub scheme: CreateScheme,
	pub value: U256,
	pub init_code: Vec<u8>,
	pub gas_limit: u64,
}

/// Result of a nested frame as seen by its caller.
#[derive(Clone, Debug)]
pub struct Outcome {
	pub reason: ExitReason,
	/// Returned data of the callee. Empty for failed frames.
	pub output: Vec<u8>,
	/// Gas left to hand back to the caller.
	pub gas_left: u64,
	/// Address of the newly created contract, for successful creations.
	pub address: Option<H160>,
}

impl Outcome {
	/// A frame that failed before running any code.
	pub fn failed(reason: impl Into<ExitReason>, gas_left: u64) -> Self {
		Self {
			reason: reason.into(),
			output: Vec::new(),
			gas_left,
			address: None,
		}
	}
}

/// EVM context handler. Everything an instruction needs from outside the
/// machine goes through here.
#[auto_impl::auto_impl(&mut, Box)]
pub trait Handler {
	/// Get balance of address.
	fn balance(&self, address: H160) -> U256;
	/// Get code size of address.
	fn code_size(&self, address: H160) -> U256;
	/// Get code hash of address. Zero for non-existent accounts.
	fn code_hash(&self, address: H160) -> H256;
	/// Get code of address.
	fn code(&self, address: H160) -> Vec<u8>;
	/// Get storage value of address at index.
	fn storage(&self, address: H160, index: H256) -> H256;
	/// Get storage value of address at index as it was before the
	/// current transaction.
	fn original_storage(&self, address: H160, index: H256) -> H256;

	/// Get the gas price value.
	fn gas_price(&self) -> U256;
	/// Get execution origin.
	fn origin(&self) -> H160;
	/// Get environmental block hash.
	fn block_hash(&self, number: U256) -> H256;
	/// Get environmental block number.
	fn block_number(&self) -> U256;
	/// Get environmental coinbase.
	fn block_coinbase(&self) -> H160;
	/// Get environmental block timestamp.
	fn block_timestamp(&self) -> U256;
	/// Get environmental block difficulty.
	fn block_difficulty(&self) -> U256;
	/// Get environmental gas limit.
	fn block_gas_limit(&self) -> U256;
	/// Get environmental chain ID.
	fn chain_id(&self) -> U256;

	/// Check whether an address exists.
	fn exists(&self, address: H160) -> bool;
	/// Check whether an address exists and is empty.
	fn is_empty(&self, address: H160) -> bool;
	/// Check whether an address has already been marked deleted.
	fn deleted(&self, address: H160) -> bool;

	/// Set storage value of address at index.
	fn set_storage(&mut self, address: H160, index: H256, value: H256) -> Result<(), crate::ExitError>;
	/// Create a log owned by address with given topics and data.
	fn log(&mut self, address: H160, topics: Vec<H256>, data: Vec<u8>) -> Result<(), crate::ExitError>;
	/// Mark an address to be deleted, with funds transferred to target.
	fn mark_delete(&mut self, address: H160, target: H160) -> Result<(), crate::ExitError>;
	/// Run a nested message call to completion.
	fn call(&mut self, request: CallRequest) -> Outcome;
	/// Run a nested contract creation to completion.
	fn create(&mut self, request: CreateRequest) -> Outcome;
}
