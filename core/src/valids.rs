use crate::Opcode;

/// Mapping of valid jump destinations from code. Bytes inside push
/// immediates are never valid destinations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Valids(Vec<bool>);

impl Valids {
	/// Create a new valid mapping from given code bytes.
	pub fn new(code: &[u8]) -> Self {
		let mut valids = vec![false; code.len()];

		let mut i = 0;
		while i < code.len() {
			let opcode = Opcode(code[i]);
			if opcode == Opcode::JUMPDEST {
				valids[i] = true;
			}
			i += opcode.instruction_len();
		}

		Valids(valids)
	}

	/// Get the length of the valid mapping. This is the same as the
	/// code bytes.
	#[inline]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns `true` if the position is a valid jump destination.
	pub fn is_jumpdest(&self, position: usize) -> bool {
		self.0.get(position).copied().unwrap_or(false)
	}
}

#[cfg(test)]
mod tests {
	use super::Valids;

	#[test]
	fn jumpdest_inside_push_data_is_invalid() {
		// JUMPDEST, PUSH1 0x5b, JUMPDEST
		let valids = Valids::new(&[0x5b, 0x60, 0x5b, 0x5b]);
		assert!(valids.is_jumpdest(0));
		assert!(!valids.is_jumpdest(2));
		assert!(valids.is_jumpdest(3));
		assert!(!valids.is_jumpdest(4));
	}
}
