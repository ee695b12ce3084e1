use crate::{ExitError, ExitFatal};
use primitive_types::U256;
use std::cmp::min;
use std::ops::{BitAnd, Not};

/// A sequential, byte-addressed memory. The effective length only grows,
/// in 32-byte words, and is what `MSIZE` reports.
#[derive(Clone, Debug)]
pub struct Memory {
	data: Vec<u8>,
	effective_len: U256,
	limit: usize,
}

impl Memory {
	/// Create a new memory with the given limit.
	pub fn new(limit: usize) -> Self {
		Self {
			data: Vec::new(),
			effective_len: U256::zero(),
			limit,
		}
	}

	pub fn limit(&self) -> usize {
		self.limit
	}

	/// Length of the backing buffer.
	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn effective_len(&self) -> U256 {
		self.effective_len
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn data(&self) -> &[u8] {
		&self.data
	}

	/// Resize the memory, making it cover the memory region of `offset..(offset + len)`,
	/// with 32 bytes as the step. If the length is zero, this function does nothing.
	pub fn resize_offset(&mut self, offset: U256, len: U256) -> Result<(), ExitError> {
		if len.is_zero() {
			return Ok(());
		}

		let end = offset.checked_add(len).ok_or(ExitError::InvalidRange)?;
		self.resize_end(end)
	}

	/// Resize the memory, making it cover to `end`, with 32 bytes as the step.
	pub fn resize_end(&mut self, end: U256) -> Result<(), ExitError> {
		if end > self.effective_len {
			self.effective_len = next_multiple_of_32(end).ok_or(ExitError::InvalidRange)?;
		}

		Ok(())
	}

	/// Get memory region at given offset, zero filled past the written data.
	pub fn get(&self, offset: usize, size: usize) -> Vec<u8> {
		let mut ret = vec![0; size];
		if offset < self.data.len() {
			let end = min(offset.saturating_add(size), self.data.len());
			ret[..end - offset].copy_from_slice(&self.data[offset..end]);
		}
		ret
	}

	/// Write `value` at `offset`, padding with zeros up to `target_size`
	/// (defaults to the value length).
	pub fn set(
		&mut self,
		offset: usize,
		value: &[u8],
		target_size: Option<usize>,
	) -> Result<(), ExitFatal> {
		let target_size = target_size.unwrap_or(value.len());
		if target_size == 0 {
			return Ok(());
		}

		let end = match offset.checked_add(target_size) {
			Some(end) if end <= self.limit => end,
			_ => return Err(ExitFatal::NotSupported),
		};

		if self.data.len() < end {
			self.data.resize(end, 0);
		}

		let copied = min(value.len(), target_size);
		self.data[offset..offset + copied].copy_from_slice(&value[..copied]);
		self.data[offset + copied..end].fill(0);

		Ok(())
	}

	/// Copy `len` bytes of `data` starting at `data_offset` into memory at
	/// `memory_offset`. Source bytes past the end of `data` read as zero.
	pub fn copy_large(
		&mut self,
		memory_offset: U256,
		data_offset: U256,
		len: U256,
		data: &[u8],
	) -> Result<(), ExitFatal> {
		if len.is_zero() {
			return Ok(());
		}

		if memory_offset > U256::from(usize::MAX) || len > U256::from(usize::MAX) {
			return Err(ExitFatal::NotSupported);
		}
		let memory_offset = memory_offset.as_usize();
		let ulen = len.as_usize();

		let source = if data_offset >= U256::from(data.len()) {
			&[][..]
		} else {
			let start = data_offset.as_usize();
			let end = min(start.saturating_add(ulen), data.len());
			&data[start..end]
		};

		self.set(memory_offset, source, Some(ulen))
	}
}

/// Rounds up `x` to the closest multiple of 32. If `x % 32 == 0` then `x` is returned.
#[inline]
pub(crate) fn next_multiple_of_32(x: U256) -> Option<U256> {
	let r = x.low_u32().bitand(31).not().wrapping_add(1).bitand(31);
	x.checked_add(r.into())
}

#[cfg(test)]
mod tests {
	use super::{next_multiple_of_32, Memory, U256};

	#[test]
	fn rounds_to_word_boundary() {
		assert_eq!(next_multiple_of_32(U256::from(0)), Some(U256::from(0)));
		assert_eq!(next_multiple_of_32(U256::from(1)), Some(U256::from(32)));
		assert_eq!(next_multiple_of_32(U256::from(64)), Some(U256::from(64)));
		assert_eq!(next_multiple_of_32(U256::MAX), None);
	}

	#[test]
	fn effective_len_grows_in_words() {
		let mut memory = Memory::new(1024);
		memory.resize_offset(U256::from(10), U256::from(1)).unwrap();
		assert_eq!(memory.effective_len(), U256::from(32));
		memory.resize_offset(U256::from(0), U256::from(0)).unwrap();
		assert_eq!(memory.effective_len(), U256::from(32));
		memory.resize_offset(U256::from(32), U256::from(1)).unwrap();
		assert_eq!(memory.effective_len(), U256::from(64));
	}

	#[test]
	fn reads_past_data_are_zero() {
		let mut memory = Memory::new(100);
		memory.set(3, &[1, 2, 3, 4], None).unwrap();
		assert_eq!(memory.data(), &[0, 0, 0, 1, 2, 3, 4]);
		assert_eq!(memory.get(5, 4), vec![3, 4, 0, 0]);
		assert_eq!(memory.get(50, 2), vec![0, 0]);
	}

	#[test]
	fn copy_large_pads_with_zeros() {
		let mut memory = Memory::new(100);
		memory
			.copy_large(U256::zero(), U256::from(2), U256::from(4), &[9, 8, 7, 6])
			.unwrap();
		assert_eq!(memory.get(0, 4), vec![7, 6, 0, 0]);
		assert!(memory
			.copy_large(U256::zero(), U256::zero(), U256::from(200), &[])
			.is_err());
	}
}
