//! Interpreter core of the development node: opcodes, stack, memory, gas
//! accounting and the instruction table. State access and nested frames go
//! through the [`Handler`] trait.

#![forbid(unsafe_code)]

mod config;
mod error;
pub mod etable;
mod eval;
pub mod gasometer;
mod handler;
mod machine;
mod memory;
mod opcode;
mod stack;
pub mod utils;
mod valids;

pub use crate::config::Config;
pub use crate::error::{ExitError, ExitFatal, ExitReason, ExitRevert, ExitSucceed};
pub use crate::etable::{Control, Efn, Etable, ETABLE};
pub use crate::gasometer::Gasometer;
pub use crate::handler::{
	CallRequest, CallScheme, Context, CreateRequest, CreateScheme, Handler, Outcome, Transfer,
};
pub use crate::machine::{Failure, Machine};
pub use crate::memory::Memory;
pub use crate::opcode::{instruction_index, Opcode};
pub use crate::stack::Stack;
pub use crate::valids::Valids;
