/// Interpreter configuration: resource limits and the gas schedule.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
	/// Maximum number of items on the stack.
	pub stack_limit: usize,
	/// Maximum size of memory in bytes.
	pub memory_limit: usize,
	/// Maximum depth of nested message calls.
	pub call_stack_limit: usize,
	/// Gas handed to the callee for free on calls that transfer value.
	pub call_stipend: u64,
	/// Base cost of a message call transaction.
	pub gas_transaction_call: u64,
	/// Base cost of a contract creation transaction.
	pub gas_transaction_create: u64,
	/// Cost per zero byte of transaction data.
	pub gas_transaction_zero_data: u64,
	/// Cost per non-zero byte of transaction data.
	pub gas_transaction_non_zero_data: u64,
	pub gas_sload: u64,
	pub gas_balance: u64,
	pub gas_ext_code: u64,
	pub gas_ext_code_hash: u64,
	pub gas_call: u64,
	pub gas_call_value: u64,
	pub gas_new_account: u64,
	pub gas_expbyte: u64,
	pub gas_sstore_set: u64,
	pub gas_sstore_reset: u64,
	pub refund_sstore_clears: i64,
	pub gas_suicide: u64,
	pub gas_suicide_new_account: u64,
	pub refund_suicide: i64,
	/// Cost per byte of deployed contract code.
	pub gas_code_deposit: u64,
	/// Maximum size of deployed contract code.
	pub create_contract_limit: Option<usize>,
	/// Whether contract creation sets the nonce of the new account to one.
	pub create_increase_nonce: bool,
	/// Whether empty accounts still count as existing for gas purposes.
	pub empty_considered_exists: bool,
	/// Touched accounts that end a transaction empty are removed.
	pub delete_empty: bool,
	/// Refunds are capped at gas used divided by this quotient.
	pub max_refund_quotient: u64,
	/// Net gas metering for `SSTORE`.
	pub sstore_gas_metering: bool,
	/// `SSTORE` fails when no more than the stipend is left.
	pub sstore_revert_under_stipend: bool,
	/// `CHAINID` and `SELFBALANCE` are available.
	pub has_chain_id: bool,
	pub has_self_balance: bool,
}

impl Config {
	/// Petersburg hard fork configuration.
	pub const fn petersburg() -> Config {
		Config {
			stack_limit: 1024,
			memory_limit: usize::MAX,
			call_stack_limit: 1024,
			call_stipend: 2300,
			gas_transaction_call: 21000,
			gas_transaction_create: 53000,
			gas_transaction_zero_data: 4,
			gas_transaction_non_zero_data: 68,
			gas_sload: 200,
			gas_balance: 400,
			gas_ext_code: 700,
			gas_ext_code_hash: 400,
			gas_call: 700,
			gas_call_value: 9000,
			gas_new_account: 25000,
			gas_expbyte: 50,
			gas_sstore_set: 20000,
			gas_sstore_reset: 5000,
			refund_sstore_clears: 15000,
			gas_suicide: 5000,
			gas_suicide_new_account: 25000,
			refund_suicide: 24000,
			gas_code_deposit: 200,
			create_contract_limit: Some(0x6000),
			create_increase_nonce: true,
			empty_considered_exists: false,
			delete_empty: true,
			max_refund_quotient: 2,
			sstore_gas_metering: false,
			sstore_revert_under_stipend: false,
			has_chain_id: false,
			has_self_balance: false,
		}
	}

	/// Istanbul hard fork configuration.
	pub const fn istanbul() -> Config {
		let mut config = Self::petersburg();
		config.gas_transaction_non_zero_data = 16;
		config.gas_sload = 800;
		config.gas_balance = 700;
		config.gas_ext_code_hash = 700;
		config.sstore_gas_metering = true;
		config.sstore_revert_under_stipend = true;
		config.has_chain_id = true;
		config.has_self_balance = true;
		config
	}

	/// Gas charged before any execution of a transaction carrying `data`.
	pub fn intrinsic_gas(&self, data: &[u8], is_create: bool) -> u64 {
		let zero = data.iter().filter(|b| **b == 0).count() as u64;
		let non_zero = data.len() as u64 - zero;
		let base = if is_create {
			self.gas_transaction_create
		} else {
			self.gas_transaction_call
		};

		base + zero * self.gas_transaction_zero_data
			+ non_zero * self.gas_transaction_non_zero_data
	}
}

impl Default for Config {
	fn default() -> Self {
		Self::istanbul()
	}
}

#[cfg(test)]
mod tests {
	use super::Config;

	#[test]
	fn intrinsic_gas_prices_bytes() {
		let config = Config::istanbul();
		assert_eq!(config.intrinsic_gas(&[], false), 21000);
		assert_eq!(config.intrinsic_gas(&[0, 1, 0, 2], false), 21000 + 4 * 2 + 16 * 2);
		assert_eq!(config.intrinsic_gas(&[1], true), 53000 + 16);
		assert_eq!(Config::petersburg().intrinsic_gas(&[1], false), 21068);
	}
}
