//! The RV64 CPU core.
//!
//! - [`Registers`]: 32 × 64-bit integer registers and the pc
//! - [`Memory`]: the capability the core fetches through ([`FlatMemory`] backs it by default)
//! - [`decode`](decode::decode) / [`encode`](decode::encode): instruction words
//! - [`Cpu`]: fetch-decode-execute, one instruction per [`Cpu::step`]

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::{Memory, FlatMemory, MemoryError};
pub use registers::Registers;
pub use decode::{Instruction, DecodeError, EncodeError};
pub use execute::{Cpu, CpuConfig, CpuError, CpuSnapshot, IllegalPolicy, StepOutcome};
