use super::call::{contract_creation, message_call};
use super::{CallParams, ChainContext, CreateParams, Substrate};
use crate::error::{Error, TransactionRejected};
use crate::state::WorldState;
use crate::types::{Log, Transaction};
use devnode_core::{Config, CreateScheme, ExitReason, Failure};
use primitive_types::{H160, H256, U256};
use std::collections::BTreeSet;

/// Outcome of an executed transaction.
#[derive(Clone, Debug)]
pub struct ExTxResult {
	pub hash: H256,
	pub sender: H160,
	pub contract_address: Option<H160>,
	pub returned: Vec<u8>,
	pub reason: ExitReason,
	pub gas_limit: u64,
	/// Gas handed back to the sender, refund included.
	pub remaining_gas: u64,
	pub refunded_gas: u64,
	pub substrate: Substrate,
	pub failure: Option<Failure>,
}

impl ExTxResult {
	pub fn gas_used(&self) -> u64 {
		self.gas_limit - self.remaining_gas
	}

	pub fn is_success(&self) -> bool {
		self.reason.is_succeed()
	}

	pub fn logs(&self) -> &[Log] {
		&self.substrate.logs
	}
}

fn validate(
	state: &WorldState,
	config: &Config,
	tx: &Transaction,
	sender: H160,
) -> Result<(u64, U256), Error> {
	let record = state
		.account_record(sender)?
		.ok_or(TransactionRejected::UnknownSender(sender))?;

	if record.nonce != tx.nonce {
		return Err(TransactionRejected::NonceMismatch {
			expected: record.nonce,
			got: tx.nonce,
		}
		.into());
	}

	let intrinsic = config.intrinsic_gas(&tx.input, tx.is_create());
	if tx.gas_limit < intrinsic {
		return Err(TransactionRejected::IntrinsicGas {
			intrinsic,
			gas_limit: tx.gas_limit,
		}
		.into());
	}

	let gas_cost = U256::from(tx.gas_limit).checked_mul(tx.gas_price);
	match gas_cost.and_then(|cost| cost.checked_add(tx.value)) {
		Some(required) if required <= record.balance => (),
		required => {
			return Err(TransactionRejected::InsufficientBalance {
				required: required.unwrap_or(U256::MAX),
				available: record.balance,
			}
			.into())
		}
	}

	Ok((intrinsic, gas_cost.unwrap_or_default()))
}

/// Validate and execute a transaction. The sender is recovered from the
/// signature unless it is already known.
///
/// Validation failures are returned as [`Error::Rejected`] and leave the
/// state untouched. A transaction that passes validation always advances
/// the sender nonce and pays for its gas, whatever its code does.
pub fn execute_transaction(
	state: &mut WorldState,
	chain: &ChainContext,
	config: &Config,
	tx: &Transaction,
	sender: Option<H160>,
) -> Result<ExTxResult, Error> {
	if let Some(chain_id) = tx.chain_id() {
		if chain_id != chain.chain_id {
			return Err(TransactionRejected::ChainIdMismatch {
				expected: chain.chain_id,
				got: chain_id,
			}
			.into());
		}
	}

	let sender = match sender {
		Some(sender) => sender,
		None => tx.recover_sender()?,
	};
	let hash = tx.hash();
	let (intrinsic, gas_cost) = validate(state, config, tx, sender).map_err(|e| {
		log::debug!(target: "executor", "transaction {:?} rejected: {}", hash, e);
		e
	})?;

	state.checkpoint();
	state.inc_nonce(sender)?;
	state.sub_balance(sender, gas_cost)?;
	state.commit()?;

	let gas = tx.gas_limit - intrinsic;
	let result = match tx.to {
		Some(to) => message_call(
			state,
			chain,
			config,
			CallParams {
				caller: sender,
				origin: sender,
				code_owner: to,
				recipient: to,
				gas,
				gas_price: tx.gas_price,
				transfer_value: tx.value,
				execution_value: tx.value,
				input: tx.input.clone(),
				depth: 0,
				modify: true,
				destroyed: BTreeSet::new(),
			},
		)?,
		None => contract_creation(
			state,
			chain,
			config,
			CreateParams {
				caller: sender,
				origin: sender,
				scheme: CreateScheme::Legacy { caller: sender },
				gas,
				gas_price: tx.gas_price,
				value: tx.value,
				init_code: tx.input.clone(),
				depth: 0,
				destroyed: BTreeSet::new(),
			},
		)?,
	};

	let used = tx.gas_limit - result.remaining_gas;
	let refunded_gas = (result.substrate.refund.max(0) as u64).min(used / config.max_refund_quotient);
	let remaining_gas = result.remaining_gas + refunded_gas;
	let fee = U256::from(tx.gas_limit - remaining_gas) * tx.gas_price;

	state.checkpoint();
	state.add_balance(sender, U256::from(remaining_gas) * tx.gas_price)?;
	if !fee.is_zero() {
		state.add_balance(chain.coinbase, fee)?;
	}
	for address in &result.substrate.selfdestructs {
		state.delete_account(*address)?;
	}
	if config.delete_empty {
		for address in &result.substrate.touched {
			if state.is_empty(*address)? {
				state.delete_account(*address)?;
			}
		}
	}
	state.commit()?;

	log::debug!(
		target: "executor",
		"transaction {:?} from {:?}: {}, gas used {}",
		hash,
		sender,
		result.reason,
		tx.gas_limit - remaining_gas,
	);

	Ok(ExTxResult {
		hash,
		sender,
		contract_address: result.created,
		returned: result.returned,
		reason: result.reason,
		gas_limit: tx.gas_limit,
		remaining_gas,
		refunded_gas,
		substrate: result.substrate,
		failure: result.failure,
	})
}
