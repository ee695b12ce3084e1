//! Instruction handlers. Every handler has the [`crate::etable::Efn`]
//! signature and reports how far the program counter moves.

#[macro_use]
mod macros;
pub mod arithmetic;
pub mod bitwise;
pub mod misc;
pub mod system;
