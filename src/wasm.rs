//! WebAssembly bindings for the RV64 emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core emulator.

use wasm_bindgen::prelude::*;
use crate::{Cpu, CpuConfig, FlatMemory, IllegalPolicy, StepOutcome};
use crate::asm::assembler::assemble;
use crate::asm::disasm::disassemble_instruction;
use crate::asm::image::in_image;
use crate::cpu::memory::DEFAULT_MEMORY_SIZE;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly CPU wrapper. Programs load at address 0.
#[wasm_bindgen]
pub struct WasmCpu {
    cpu: Cpu<FlatMemory>,
    program_len: usize,
}

#[wasm_bindgen]
impl WasmCpu {
    /// Create a new CPU instance with empty memory.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(FlatMemory::new(0, DEFAULT_MEMORY_SIZE)),
            program_len: 0,
        }
    }

    /// Trap on undecodable words instead of skipping them.
    #[wasm_bindgen]
    pub fn set_strict(&mut self, strict: bool) {
        self.cpu.config = CpuConfig {
            on_illegal: if strict { IllegalPolicy::Trap } else { IllegalPolicy::Ignore },
        };
    }

    /// Load a program from assembly source code. Returns its word count.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let words = assemble(source)
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        let mem = self.cpu.bus_mut();
        mem.clear();
        mem.load_words(0, &words)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        self.program_len = words.len();
        self.cpu.reset();

        Ok(words.len())
    }

    /// Step one instruction. Returns the disassembled instruction.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        if self.finished() {
            return Err(JsError::new("program finished"));
        }

        let pc = self.cpu.pc();
        let word = self.cpu.bus().word_at(pc).unwrap_or(0);
        let outcome = self.cpu.step()
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        Ok(match outcome {
            StepOutcome::Retired(_) => disassemble_instruction(word),
            StepOutcome::Unimplemented { .. } => format!("{} (skipped)", disassemble_instruction(word)),
        })
    }

    /// Run until the pc leaves the program or `max_cycles` steps were taken.
    /// Returns the total cycle count.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: u32) -> Result<u64, JsError> {
        let len = self.program_len;
        self.cpu
            .run_while(max_cycles as u64, |regs| in_image(0, len, regs.pc))
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(self.cpu.cycles)
    }

    /// Reset the CPU; the loaded program stays in memory.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.cpu.reset();
    }

    /// Whether the pc has left the loaded program.
    #[wasm_bindgen]
    pub fn finished(&self) -> bool {
        !in_image(0, self.program_len, self.cpu.pc())
    }

    /// Get cycle count.
    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }

    /// Get program counter.
    #[wasm_bindgen]
    pub fn pc(&self) -> u64 {
        self.cpu.pc()
    }

    /// Get register `idx` (0-31).
    #[wasm_bindgen]
    pub fn register(&self, idx: u8) -> u64 {
        self.cpu.reg(idx)
    }

    /// Get the instruction word at `addr`, or 0 outside memory.
    #[wasm_bindgen]
    pub fn memory_word_at(&self, addr: u64) -> u32 {
        self.cpu.bus().word_at(addr).unwrap_or(0)
    }

    /// Get registers, pc and cycle count as a JSON string.
    #[wasm_bindgen]
    pub fn registers_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.cpu.snapshot())
            .map_err(|e| JsError::new(&format!("{}", e)))
    }
}

impl Default for WasmCpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source code and return the instruction words.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<Vec<u32>, JsError> {
    assemble(source).map_err(|e| JsError::new(&format!("{}", e)))
}

/// Disassemble a single instruction word.
#[wasm_bindgen]
pub fn wasm_disassemble(word: u32) -> String {
    disassemble_instruction(word)
}

#[cfg(all(test, feature = "wasm"))]
mod tests {
    use super::*;
    use crate::CpuSnapshot;

    #[test]
    fn test_run_stops_when_pc_leaves_program() {
        let mut cpu = WasmCpu::new();
        assert!(matches!(cpu.load_asm("li a0, 5\naddi a1, a0, 1"), Ok(2)));
        assert!(!cpu.finished());

        assert!(matches!(cpu.run(100), Ok(2)));
        assert!(cpu.finished());
        assert_eq!(cpu.pc(), 8);
        assert_eq!(cpu.register(11), 6);
        assert_eq!(cpu.memory_word_at(4), 0x0015_0593);

        let json = cpu.registers_json().ok().unwrap();
        let snapshot: CpuSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot.regs.x[10], 5);
        assert_eq!(snapshot.cycles, 2);

        cpu.reset();
        assert!(matches!(cpu.run(1), Ok(1)));
        assert_eq!(cpu.pc(), 4);
    }

    #[test]
    fn test_strict_mode_and_skipped_words() {
        let mut cpu = WasmCpu::new();
        assert_eq!(cpu.cpu.config.on_illegal, IllegalPolicy::Ignore);
        cpu.set_strict(true);
        assert_eq!(cpu.cpu.config.on_illegal, IllegalPolicy::Trap);
        cpu.set_strict(false);

        // mul a0, a1, a2 is not executed
        assert!(matches!(cpu.load_asm(".word 0x02c58533"), Ok(1)));
        assert_eq!(cpu.step().ok().as_deref(), Some(".word 0x02c58533 (skipped)"));
        assert_eq!(cpu.register(10), 0);
        assert!(cpu.finished());
        assert_eq!(wasm_disassemble(0x0000_0013), "nop");
        assert_eq!(wasm_assemble("nop").ok(), Some(vec![0x0000_0013]));
    }
}
