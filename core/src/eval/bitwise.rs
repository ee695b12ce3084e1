use super::arithmetic::to_word;
use crate::etable::Control;
use crate::utils::{is_negative, signed_lt};
use crate::{Handler, Machine};
use primitive_types::U256;

op2!(lt, |a, b| to_word(a < b));
op2!(gt, |a, b| to_word(a > b));
op2!(slt, |a, b| to_word(signed_lt(a, b)));
op2!(sgt, |a, b| to_word(signed_lt(b, a)));
op2!(eq, |a, b| to_word(a == b));
op1!(iszero, |a| to_word(a.is_zero()));
op2!(and, |a, b| a & b);
op2!(or, |a, b| a | b);
op2!(xor, |a, b| a ^ b);
op1!(not, |a| !a);
op2!(byte, byte_of);
op2!(shl, |shift, value| if shift < U256::from(256) { value << shift.as_usize() } else { U256::zero() });
op2!(shr, |shift, value| if shift < U256::from(256) { value >> shift.as_usize() } else { U256::zero() });
op2!(sar, arithmetic_shr);

/// Byte `index` of `value`, counting from the most significant.
fn byte_of(index: U256, value: U256) -> U256 {
	if index >= U256::from(32) {
		return U256::zero();
	}
	U256::from(value.byte(31 - index.as_usize()))
}

fn arithmetic_shr(shift: U256, value: U256) -> U256 {
	let shift = if shift < U256::from(256) {
		shift.as_usize()
	} else {
		256
	};

	let logical = |v: U256| if shift >= 256 { U256::zero() } else { v >> shift };
	if is_negative(value) {
		!logical(!value)
	} else {
		logical(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::utils::negate;

	#[test]
	fn byte_counts_from_the_top() {
		let value = U256::from(0x1234);
		assert_eq!(byte_of(U256::from(31), value), U256::from(0x34));
		assert_eq!(byte_of(U256::from(30), value), U256::from(0x12));
		assert_eq!(byte_of(U256::from(32), value), U256::zero());
	}

	#[test]
	fn arithmetic_shift_keeps_sign() {
		assert_eq!(arithmetic_shr(U256::from(1), negate(U256::from(4))), negate(U256::from(2)));
		assert_eq!(arithmetic_shr(U256::from(300), negate(U256::one())), U256::MAX);
		assert_eq!(arithmetic_shr(U256::from(300), U256::from(5)), U256::zero());
		assert_eq!(arithmetic_shr(U256::from(1), U256::from(5)), U256::from(2));
	}
}
