//! Precompiled contracts at addresses 1 to 4.

use devnode_core::utils::keccak256;
use devnode_core::ExitError;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use primitive_types::{H160, H256};
use std::cmp::min;

/// Output and gas cost of a precompile run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrecompileOutput {
	pub output: Vec<u8>,
	pub cost: u64,
}

const fn address(last: u8) -> H160 {
	H160([0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, last])
}

pub const ECRECOVER: H160 = address(1);
pub const SHA256: H160 = address(2);
pub const RIPEMD160: H160 = address(3);
pub const IDENTITY: H160 = address(4);

pub fn is_precompile(target: H160) -> bool {
	target == ECRECOVER || target == SHA256 || target == RIPEMD160 || target == IDENTITY
}

fn linear_cost(len: usize, base: u64, word: u64) -> Result<u64, ExitError> {
	let words = (len as u64).checked_add(31).ok_or(ExitError::OutOfGas)? / 32;
	words
		.checked_mul(word)
		.and_then(|cost| cost.checked_add(base))
		.ok_or(ExitError::OutOfGas)
}

type Run = fn(&[u8]) -> Vec<u8>;

/// Run the precompile at `target`. `None` when `target` is not one.
pub fn execute(target: H160, input: &[u8], gas_limit: u64) -> Option<Result<PrecompileOutput, ExitError>> {
	let (base, word, run) = match target {
		t if t == ECRECOVER => (3000, 0, ecrecover as Run),
		t if t == SHA256 => (60, 12, sha256 as Run),
		t if t == RIPEMD160 => (600, 120, ripemd160 as Run),
		t if t == IDENTITY => (15, 3, identity as Run),
		_ => return None,
	};

	let result = linear_cost(input.len(), base, word).and_then(|cost| {
		if cost > gas_limit {
			return Err(ExitError::OutOfGas);
		}
		Ok(PrecompileOutput {
			output: run(input),
			cost,
		})
	});
	Some(result)
}

/// Address of the key that signed a hash. Malformed input yields empty
/// output rather than an error.
fn ecrecover(i: &[u8]) -> Vec<u8> {
	let mut input = [0u8; 128];
	input[..min(i.len(), 128)].copy_from_slice(&i[..min(i.len(), 128)]);

	// v must be 27 or 28 over the whole 32 byte word.
	if input[32..63] != [0u8; 31] || ![27, 28].contains(&input[63]) {
		return Vec::new();
	}

	let signature = match Signature::from_slice(&input[64..128]) {
		Ok(signature) => signature,
		Err(_) => return Vec::new(),
	};
	let recovery_id = match RecoveryId::from_byte(input[63] - 27) {
		Some(recovery_id) => recovery_id,
		None => return Vec::new(),
	};
	let key = match VerifyingKey::recover_from_prehash(&input[0..32], &signature, recovery_id) {
		Ok(key) => key,
		Err(_) => return Vec::new(),
	};

	let point = key.to_encoded_point(false);
	let mut address = keccak256(&point.as_bytes()[1..]);
	address.0[0..12].copy_from_slice(&[0u8; 12]);
	address.0.to_vec()
}

fn sha256(input: &[u8]) -> Vec<u8> {
	use sha2::Digest;
	sha2::Sha256::digest(input).to_vec()
}

/// RIPEMD-160 digest left padded to a 32 byte word.
fn ripemd160(input: &[u8]) -> Vec<u8> {
	use ripemd::Digest;
	let mut out = H256::zero();
	out.0[12..].copy_from_slice(&ripemd::Ripemd160::digest(input));
	out.0.to_vec()
}

fn identity(input: &[u8]) -> Vec<u8> {
	input.to_vec()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn run(target: H160, input: &[u8]) -> PrecompileOutput {
		execute(target, input, u64::MAX).unwrap().unwrap()
	}

	#[test]
	fn only_first_four_addresses() {
		assert!(is_precompile(IDENTITY));
		assert!(!is_precompile(address(5)));
		assert!(execute(address(5), &[], 1_000).is_none());
	}

	#[test]
	fn identity_cost_and_output() {
		let out = run(IDENTITY, &[1, 2, 3]);
		assert_eq!(out.output, vec![1, 2, 3]);
		assert_eq!(out.cost, 18);
	}

	#[test]
	fn sha256_of_empty_input() {
		let out = run(SHA256, &[]);
		assert_eq!(
			hex::encode(out.output),
			"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
		);
		assert_eq!(out.cost, 60);
	}

	#[test]
	fn ripemd160_is_padded() {
		let out = run(RIPEMD160, &[]);
		assert_eq!(
			hex::encode(out.output),
			"0000000000000000000000009c1185a5c5e9fc54612808977ee8f548b2258d31"
		);
	}

	#[test]
	fn insufficient_gas() {
		assert_eq!(execute(ECRECOVER, &[], 2_999), Some(Err(ExitError::OutOfGas)));
	}

	#[test]
	fn ecrecover_rejects_bad_v() {
		let mut input = [0u8; 128];
		input[63] = 29;
		assert!(run(ECRECOVER, &input).output.is_empty());
	}
}
