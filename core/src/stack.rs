use crate::utils::USIZE_MAX;
use crate::ExitError;
use primitive_types::{H256, U256};

/// EVM stack.
#[derive(Clone, Debug)]
pub struct Stack {
	data: Vec<U256>,
	limit: usize,
}

impl Stack {
	/// Create a new stack with given limit.
	pub fn new(limit: usize) -> Self {
		Self {
			data: Vec::new(),
			limit,
		}
	}

	#[inline]
	pub fn limit(&self) -> usize {
		self.limit
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.data.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	/// Stack data, bottom first.
	#[inline]
	pub fn data(&self) -> &[U256] {
		&self.data
	}

	/// Pop a value from the stack. If the stack is already empty, returns the
	/// `StackUnderflow` error.
	#[inline]
	pub fn pop(&mut self) -> Result<U256, ExitError> {
		self.data.pop().ok_or(ExitError::StackUnderflow)
	}

	#[inline]
	pub fn pop_h256(&mut self) -> Result<H256, ExitError> {
		self.pop().map(crate::utils::u256_to_h256)
	}

	/// Push a new value into the stack. If it will exceed the stack limit,
	/// returns `StackOverflow` error and leaves the stack unchanged.
	#[inline]
	pub fn push(&mut self, value: U256) -> Result<(), ExitError> {
		if self.data.len() + 1 > self.limit {
			return Err(ExitError::StackOverflow);
		}
		self.data.push(value);
		Ok(())
	}

	/// Peek a value at given index for the stack, where the top of
	/// the stack is at index `0`.
	#[inline]
	pub fn peek(&self, no_from_top: usize) -> Result<U256, ExitError> {
		if self.data.len() > no_from_top {
			Ok(self.data[self.data.len() - no_from_top - 1])
		} else {
			Err(ExitError::StackUnderflow)
		}
	}

	#[inline]
	pub fn peek_h256(&self, no_from_top: usize) -> Result<H256, ExitError> {
		self.peek(no_from_top).map(crate::utils::u256_to_h256)
	}

	/// Peek a value as usize. Values larger than `usize::MAX` are reported
	/// as out of gas.
	#[inline]
	pub fn peek_usize(&self, no_from_top: usize) -> Result<usize, ExitError> {
		let u = self.peek(no_from_top)?;
		if u > USIZE_MAX {
			return Err(ExitError::OutOfGas);
		}
		Ok(u.as_usize())
	}

	/// Set a value at given index for the stack, where the top of the
	/// stack is at index `0`.
	#[inline]
	pub fn set(&mut self, no_from_top: usize, val: U256) -> Result<(), ExitError> {
		if self.data.len() > no_from_top {
			let len = self.data.len();
			self.data[len - no_from_top - 1] = val;
			Ok(())
		} else {
			Err(ExitError::StackUnderflow)
		}
	}

	/// Duplicate the item at depth `n` (1-based) onto the top.
	pub fn dup(&mut self, n: usize) -> Result<(), ExitError> {
		let value = self.peek(n - 1)?;
		self.push(value)
	}

	/// Exchange the top item with the item at depth `n + 1`.
	pub fn swap(&mut self, n: usize) -> Result<(), ExitError> {
		let len = self.data.len();
		if len <= n {
			return Err(ExitError::StackUnderflow);
		}
		self.data.swap(len - 1, len - 1 - n);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn overflow_leaves_stack_unchanged() {
		let mut stack = Stack::new(2);
		stack.push(U256::one()).unwrap();
		stack.push(U256::from(2)).unwrap();
		assert_eq!(stack.push(U256::from(3)), Err(ExitError::StackOverflow));
		assert_eq!(stack.len(), 2);
		assert_eq!(stack.peek(0), Ok(U256::from(2)));
	}

	#[test]
	fn dup_and_swap() {
		let mut stack = Stack::new(1024);
		stack.push(U256::from(1)).unwrap();
		stack.push(U256::from(2)).unwrap();
		stack.dup(2).unwrap();
		assert_eq!(stack.data(), &[U256::from(1), U256::from(2), U256::from(1)]);
		stack.swap(2).unwrap();
		assert_eq!(stack.data(), &[U256::from(1), U256::from(2), U256::from(1)]);
		stack.swap(1).unwrap();
		assert_eq!(stack.data(), &[U256::from(1), U256::from(1), U256::from(2)]);
		assert_eq!(stack.swap(3), Err(ExitError::StackUnderflow));
		assert_eq!(Stack::new(4).pop(), Err(ExitError::StackUnderflow));
	}
}
