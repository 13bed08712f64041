//! CPU execution engine.
//!
//! Implements the fetch-decode-execute cycle. One call to [`Cpu::step`]
//! performs exactly one instruction fetch through the bound [`Memory`]
//! and at most one register update, then advances the pc by 4. There is
//! no internal loop: the caller owns the stepping cadence.

use crate::cpu::decode::{self, DecodeError, Instruction};
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::Registers;
use crate::isa::{fields, opcodes, AccessWidth};
use log::{debug, trace, warn};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// What a step does with a word it cannot decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IllegalPolicy {
    /// No register effect; the pc still advances and the step reports
    /// [`StepOutcome::Unimplemented`].
    #[default]
    Ignore,
    /// The step fails with [`CpuError::IllegalInstruction`] and the pc is
    /// left on the offending instruction.
    Trap,
}

/// CPU configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Handling of undecodable instruction words.
    pub on_illegal: IllegalPolicy,
}

/// Result of a successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    /// The instruction was decoded and executed.
    Retired(Instruction),
    /// The word had no decode case; only the pc moved. The word itself is
    /// available through [`DecodeError::word`].
    Unimplemented { error: DecodeError },
}

impl StepOutcome {
    /// The executed instruction, if there was one.
    pub fn instruction(&self) -> Option<Instruction> {
        match self {
            StepOutcome::Retired(instr) => Some(*instr),
            StepOutcome::Unimplemented { .. } => None,
        }
    }

    /// Whether the word was left unexecuted.
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, StepOutcome::Unimplemented { .. })
    }
}

/// Architectural state captured for saving or comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub regs: Registers,
    pub cycles: u64,
}

/// An RV64 hart bound to a memory-access capability.
///
/// `M` is whatever the caller hands in. Passing `&mut FlatMemory` keeps
/// ownership of the backing store with the caller.
pub struct Cpu<M> {
    /// Register file and program counter.
    pub regs: Registers,
    /// Execution configuration.
    pub config: CpuConfig,
    /// Steps taken since construction or the last reset.
    pub cycles: u64,
    bus: M,
    last_instr: Option<Instruction>,
}

impl<M: Memory> Cpu<M> {
    /// Bind a CPU to `bus`, with every register and the pc zeroed.
    ///
    /// The capability is not probed; a bus that cannot serve fetches only
    /// shows up on the first [`step`](Self::step).
    pub fn new(bus: M) -> Self {
        Self::with_config(bus, CpuConfig::default())
    }

    /// Bind a CPU to `bus` with an explicit configuration.
    pub fn with_config(bus: M, config: CpuConfig) -> Self {
        Self {
            regs: Registers::new(),
            config,
            cycles: 0,
            bus,
            last_instr: None,
        }
    }

    /// Zero the registers, pc and cycle counter. Memory is untouched:
    /// it belongs to whoever supplied the bus.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.cycles = 0;
        self.last_instr = None;
    }

    /// The bound capability.
    pub fn bus(&self) -> &M {
        &self.bus
    }

    /// The bound capability, mutably (e.g. to load a program).
    pub fn bus_mut(&mut self) -> &mut M {
        &mut self.bus
    }

    /// Current program counter.
    pub fn pc(&self) -> u64 {
        self.regs.pc
    }

    /// Move the program counter.
    pub fn set_pc(&mut self, pc: u64) {
        self.regs.jump(pc);
    }

    /// Read register `idx`.
    pub fn reg(&self, idx: u8) -> u64 {
        self.regs.read(idx)
    }

    /// Write register `idx`. Writes to x0 do not survive the next step.
    pub fn set_reg(&mut self, idx: u8, value: u64) {
        self.regs.write(idx, value);
    }

    /// Execute a single instruction.
    ///
    /// Register x0 reads as zero when this returns, whatever the outcome.
    pub fn step(&mut self) -> Result<StepOutcome, CpuError> {
        let result = self.fetch_and_execute();
        self.regs.normalize_zero();
        result
    }

    fn fetch_and_execute(&mut self) -> Result<StepOutcome, CpuError> {
        // Fetch
        let pc = self.regs.pc;
        let word = self.bus.read(AccessWidth::Word, pc)? as u32;

        // Decode and execute
        let outcome = match decode::decode(word) {
            Ok(instr) => {
                trace!("{:#018x}: {:#010x} {:?}", pc, word, instr);
                self.execute(pc, instr);
                StepOutcome::Retired(instr)
            }
            Err(error) => match self.config.on_illegal {
                IllegalPolicy::Ignore => {
                    let family = opcodes::name(fields::opcode(word)).unwrap_or("unknown");
                    debug!("{:#018x}: ignoring {} ({} family)", pc, error, family);
                    StepOutcome::Unimplemented { error }
                }
                IllegalPolicy::Trap => {
                    warn!("{:#018x}: trapping on {}", pc, error);
                    return Err(CpuError::IllegalInstruction { pc, word, source: error });
                }
            },
        };

        // Advance
        self.regs.advance_pc();
        self.cycles += 1;
        self.last_instr = outcome.instruction();

        Ok(outcome)
    }

    /// Perform the register update of a decoded instruction fetched from `pc`.
    fn execute(&mut self, pc: u64, instr: Instruction) {
        match instr {
            Instruction::Lui { rd, imm } => {
                self.regs.write(rd, imm as u64);
            }

            Instruction::Auipc { rd, imm } => {
                self.regs.write(rd, pc.wrapping_add(imm as u64));
            }

            Instruction::OpImm { op, rd, rs1, imm } => {
                let result = op.apply(self.regs.read(rs1), imm as u64);
                self.regs.write(rd, result);
            }

            Instruction::Op { op, rd, rs1, rs2 } => {
                let result = op.apply(self.regs.read(rs1), self.regs.read(rs2));
                self.regs.write(rd, result);
            }
        }
    }

    /// Step at most `max_steps` times.
    ///
    /// Returns the number of steps taken.
    pub fn run_limited(&mut self, max_steps: u64) -> Result<u64, CpuError> {
        self.run_while(max_steps, |_| true)
    }

    /// Step while `keep_going` approves the current registers, at most
    /// `max_steps` times. Returns the number of steps taken.
    pub fn run_while<F>(&mut self, max_steps: u64, mut keep_going: F) -> Result<u64, CpuError>
    where
        F: FnMut(&Registers) -> bool,
    {
        let mut executed = 0;
        while executed < max_steps && keep_going(&self.regs) {
            self.step()?;
            executed += 1;
        }
        Ok(executed)
    }

    /// The last instruction executed, if the last step retired one.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Capture the architectural state.
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            regs: self.regs.clone(),
            cycles: self.cycles,
        }
    }

    /// Restore a previously captured state.
    pub fn restore(&mut self, snapshot: &CpuSnapshot) {
        self.regs = snapshot.regs.clone();
        self.regs.normalize_zero();
        self.cycles = snapshot.cycles;
        self.last_instr = None;
    }
}

impl<M> std::fmt::Debug for Cpu<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("config", &self.config)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("instruction fetch failed: {0}")]
    Memory(#[from] MemoryError),

    #[error("illegal instruction {word:#010x} at pc {pc:#x}")]
    IllegalInstruction {
        pc: u64,
        word: u32,
        source: DecodeError,
    },
}
