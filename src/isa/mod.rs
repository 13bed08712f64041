//! RV64 instruction-set primitives.
//!
//! This module provides the building blocks the CPU core is made of:
//! - [`fields`] - bit-field extraction and immediate sign-extension
//! - [`opcodes`] - major opcode and function-field constants
//! - [`AccessWidth`] - memory access widths (byte/half/word/double)
//! - [`alu`] - the integer ALU shared by the register and immediate forms

pub mod fields;
pub mod opcodes;
mod width;
pub mod alu;

pub use width::AccessWidth;
pub use alu::AluOp;

/// Width of every instruction this core understands, in bytes.
pub const INSTRUCTION_BYTES: u64 = 4;

/// Number of general-purpose integer registers.
pub const REGISTER_COUNT: usize = 32;
