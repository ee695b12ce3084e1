//! Small utilities shared by the instruction handlers and the gasometer.

use crate::ExitError;
use primitive_types::{H160, H256, U256};
use sha3::{Digest, Keccak256};

/// Precalculated `usize::MAX` for `U256`.
pub const USIZE_MAX: U256 = U256([usize::MAX as u64, 0, 0, 0]);

/// Convert [U256] into [H256].
pub fn u256_to_h256(v: U256) -> H256 {
	let mut r = H256::default();
	v.to_big_endian(&mut r[..]);
	r
}

/// Convert [H256] to [U256].
pub fn h256_to_u256(v: H256) -> U256 {
	U256::from_big_endian(&v[..])
}

/// Convert [U256] into [H160], keeping the low 20 bytes.
pub fn u256_to_h160(v: U256) -> H160 {
	H160::from(u256_to_h256(v))
}

/// Convert [H160] to [U256].
pub fn h160_to_u256(v: H160) -> U256 {
	U256::from_big_endian(&v[..])
}

/// Convert [U256] to [usize]. Values that cannot be addressed could never be
/// paid for, so they are reported as out of gas.
pub fn u256_to_usize(v: U256) -> Result<usize, ExitError> {
	if v > USIZE_MAX {
		return Err(ExitError::OutOfGas);
	}
	Ok(v.as_usize())
}

pub fn keccak256(data: &[u8]) -> H256 {
	H256::from_slice(Keccak256::digest(data).as_slice())
}

/// All but one 64th of the available gas.
pub const fn l64(gas: u64) -> u64 {
	gas - gas / 64
}

/// Whether the value is negative in two's complement.
pub fn is_negative(v: U256) -> bool {
	v.bit(255)
}

pub fn negate(v: U256) -> U256 {
	(!v).overflowing_add(U256::one()).0
}

fn abs(v: U256) -> U256 {
	if is_negative(v) {
		negate(v)
	} else {
		v
	}
}

/// Signed division truncating towards zero. Division of the minimum value by
/// minus one wraps back to the minimum value.
pub fn signed_div(a: U256, b: U256) -> U256 {
	if b.is_zero() {
		return U256::zero();
	}
	let quotient = abs(a) / abs(b);
	if is_negative(a) != is_negative(b) {
		negate(quotient)
	} else {
		quotient
	}
}

/// Signed remainder, taking the sign of the dividend.
pub fn signed_mod(a: U256, b: U256) -> U256 {
	if b.is_zero() {
		return U256::zero();
	}
	let remainder = abs(a) % abs(b);
	if is_negative(a) {
		negate(remainder)
	} else {
		remainder
	}
}

pub fn signed_lt(a: U256, b: U256) -> bool {
	match (is_negative(a), is_negative(b)) {
		(true, false) => true,
		(false, true) => false,
		_ => a < b,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn neg(v: u64) -> U256 {
		negate(U256::from(v))
	}

	#[test]
	fn signed_division() {
		let min = U256::one() << 255;
		assert_eq!(signed_div(min, neg(1)), min);
		assert_eq!(signed_div(U256::from(100), neg(1)), neg(100));
		assert_eq!(signed_div(neg(7), U256::from(2)), neg(3));
		assert_eq!(signed_div(U256::from(7), U256::zero()), U256::zero());
	}

	#[test]
	fn signed_remainder() {
		assert_eq!(signed_mod(neg(7), U256::from(3)), neg(1));
		assert_eq!(signed_mod(U256::from(7), neg(3)), U256::from(1));
		assert_eq!(signed_mod(U256::from(7), U256::zero()), U256::zero());
	}

	#[test]
	fn signed_comparison() {
		assert!(signed_lt(neg(1), U256::zero()));
		assert!(!signed_lt(U256::one(), neg(5)));
		assert!(signed_lt(neg(5), neg(1)));
	}

	#[test]
	fn all_but_one_64th() {
		assert_eq!(l64(6400), 6300);
		assert_eq!(l64(63), 63);
	}
}
