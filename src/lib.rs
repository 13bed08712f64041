//! # RV64 Emulator
//!
//! A functional simulator of the RV64 integer ALU subset: LUI, AUIPC and the
//! register-immediate and register-register arithmetic, logic, shift and
//! compare instructions.
//!
//! The core is a single hart stepped one instruction at a time by its
//! caller. Memory is reached only through the [`Memory`] capability, so the
//! same core can run against a [`FlatMemory`] it owns or a bus it borrows.

pub mod isa;
pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use isa::{AccessWidth, AluOp};
pub use cpu::{
    Cpu, CpuConfig, CpuError, CpuSnapshot, FlatMemory, IllegalPolicy, Instruction, Memory,
    MemoryError, Registers, StepOutcome,
};
pub use asm::{assemble, disassemble, load_image, save_image, AssemblerError, ProgramImage};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
