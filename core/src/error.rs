use crate::Opcode;
use std::borrow::Cow;
use std::fmt;

/// Exit reason of a frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExitReason {
	/// Machine has succeeded.
	Succeed(ExitSucceed),
	/// Machine returns a normal EVM error.
	Error(ExitError),
	/// Machine encountered an explicit revert.
	Revert(ExitRevert),
	/// Machine encountered an error that is not defined by the EVM and
	/// that cannot be recovered by the caller frame.
	Fatal(ExitFatal),
}

impl ExitReason {
	/// Whether the exit is succeeded.
	pub fn is_succeed(&self) -> bool {
		matches!(self, Self::Succeed(_))
	}

	/// Whether the exit is an error.
	pub fn is_error(&self) -> bool {
		matches!(self, Self::Error(_))
	}

	/// Whether the exit is a revert.
	pub fn is_revert(&self) -> bool {
		matches!(self, Self::Revert(_))
	}

	/// Whether the exit is fatal.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Self::Fatal(_))
	}

	/// Whether the frame state changes are discarded.
	pub fn is_reverted(&self) -> bool {
		!self.is_succeed()
	}
}

impl fmt::Display for ExitReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Succeed(s) => write!(f, "succeed: {s:?}"),
			Self::Error(e) => write!(f, "error: {e}"),
			Self::Revert(_) => write!(f, "revert"),
			Self::Fatal(e) => write!(f, "fatal: {e:?}"),
		}
	}
}

/// Exit succeed reason.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitSucceed {
	/// Machine encountered an explicit stop.
	Stopped,
	/// Machine encountered an explicit return.
	Returned,
	/// Machine encountered an explicit self-destruct.
	Suicided,
}

impl From<ExitSucceed> for ExitReason {
	fn from(s: ExitSucceed) -> Self {
		Self::Succeed(s)
	}
}

/// Exit revert reason.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitRevert {
	/// Machine encountered an explicit revert.
	Reverted,
}

impl From<ExitRevert> for ExitReason {
	fn from(s: ExitRevert) -> Self {
		Self::Revert(s)
	}
}

/// Exit error reason. All remaining gas of the frame is consumed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExitError {
	/// Trying to pop from an empty stack.
	StackUnderflow,
	/// Trying to push into a stack over stack limit.
	StackOverflow,
	/// Jump destination is invalid.
	InvalidJump,
	/// An opcode accesses memory region, but the region is invalid.
	InvalidRange,
	/// Encountered the designated invalid opcode.
	DesignatedInvalid,
	/// Call stack is too deep (runtime).
	CallTooDeep,
	/// Create opcode encountered collision (runtime).
	CreateCollision,
	/// Create init code exceeds limit (runtime).
	CreateContractLimit,
	/// An opcode accesses external information, but the request is off offset
	/// limit (runtime).
	OutOfOffset,
	/// Execution runs out of gas (runtime).
	OutOfGas,
	/// Not enough fund to start the execution (runtime).
	OutOfFund,
	/// Byte that is not assigned to any instruction.
	InvalidOpcode(Opcode),
	/// State mutation attempted in a read-only frame.
	StaticModeViolation,
	/// Other normal errors.
	Other(Cow<'static, str>),
}

impl fmt::Display for ExitError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::StackUnderflow => write!(f, "stack underflow"),
			Self::StackOverflow => write!(f, "stack overflow"),
			Self::InvalidJump => write!(f, "invalid jump destination"),
			Self::InvalidRange => write!(f, "invalid memory range"),
			Self::DesignatedInvalid => write!(f, "invalid instruction"),
			Self::CallTooDeep => write!(f, "call stack too deep"),
			Self::CreateCollision => write!(f, "contract address collision"),
			Self::CreateContractLimit => write!(f, "contract code size limit exceeded"),
			Self::OutOfOffset => write!(f, "out of offset"),
			Self::OutOfGas => write!(f, "out of gas"),
			Self::OutOfFund => write!(f, "insufficient balance for transfer"),
			Self::InvalidOpcode(opcode) => write!(f, "invalid opcode {:#04x}", opcode.0),
			Self::StaticModeViolation => write!(f, "state modification in read-only frame"),
			Self::Other(s) => write!(f, "{s}"),
		}
	}
}

impl From<ExitError> for ExitReason {
	fn from(s: ExitError) -> Self {
		Self::Error(s)
	}
}

/// Exit fatal reason.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExitFatal {
	/// The operation is not supported.
	NotSupported,
	/// The environment explicitly set call errors as fatal error.
	UnhandledInterrupt,
	/// Other fatal errors.
	Other(Cow<'static, str>),
}

impl From<ExitFatal> for ExitReason {
	fn from(s: ExitFatal) -> Self {
		Self::Fatal(s)
	}
}
