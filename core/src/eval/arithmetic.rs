use crate::etable::Control;
use crate::utils::{signed_div, signed_mod};
use crate::{Handler, Machine};
use primitive_types::{U256, U512};

pub(crate) fn to_word(b: bool) -> U256 {
	if b {
		U256::one()
	} else {
		U256::zero()
	}
}

op2!(add, |a, b| a.overflowing_add(b).0);
op2!(mul, |a, b| a.overflowing_mul(b).0);
op2!(sub, |a, b| a.overflowing_sub(b).0);
op2!(div, |a, b| if b.is_zero() { U256::zero() } else { a / b });
op2!(sdiv, signed_div);
op2!(rem, |a, b| if b.is_zero() { U256::zero() } else { a % b });
op2!(smod, signed_mod);
op3!(addmod, |a, b, n| modular(U512::from(a) + U512::from(b), n));
op3!(mulmod, |a, b, n| modular(U512::from(a) * U512::from(b), n));
op2!(exp, |base, power| base.overflowing_pow(power).0);
op2!(signextend, signextend_word);

fn modular(v: U512, n: U256) -> U256 {
	if n.is_zero() {
		return U256::zero();
	}
	U256::try_from(v % U512::from(n)).unwrap_or_default()
}

/// Extend the sign bit of byte `b` (counting from the least significant)
/// of `x` over the higher bytes.
fn signextend_word(b: U256, x: U256) -> U256 {
	if b >= U256::from(32) {
		return x;
	}

	let bit_index = 8 * b.low_u32() as usize + 7;
	let mask = (U256::one() << bit_index) - U256::one();
	if x.bit(bit_index) {
		x | !mask
	} else {
		x & mask
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn modular_arithmetic_uses_wide_intermediates() {
		assert_eq!(modular(U512::from(U256::MAX) + U512::from(2), U256::from(3)), U256::from(2));
		assert_eq!(modular(U512::from(10), U256::zero()), U256::zero());
	}

	#[test]
	fn sign_extension() {
		assert_eq!(signextend_word(U256::zero(), U256::from(0xff)), U256::MAX);
		assert_eq!(signextend_word(U256::zero(), U256::from(0x7f)), U256::from(0x7f));
		assert_eq!(signextend_word(U256::one(), U256::from(0x12ff)), U256::from(0x12ff));
		assert_eq!(signextend_word(U256::from(40), U256::from(0xff)), U256::from(0xff));
	}

	#[test]
	fn boolean_words() {
		assert_eq!(to_word(true), U256::one());
		assert_eq!(to_word(false), U256::zero());
	}
}
