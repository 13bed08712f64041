//! RV64 integer register file.
//!
//! 32 general-purpose 64-bit registers plus the program counter.
//! Register `x0` is hard-wired to zero: writes to it are allowed to land
//! during a step and are undone by [`Registers::normalize_zero`] once the
//! step finishes.

use crate::isa::{INSTRUCTION_BYTES, REGISTER_COUNT};
use serde::{Serialize, Deserialize};
use std::fmt;

/// ABI names of x0..x31.
pub const ABI_NAMES: [&str; REGISTER_COUNT] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2",
    "s0", "s1", "a0", "a1", "a2", "a3", "a4", "a5",
    "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7",
    "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6",
];

/// The register file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// x0..x31
    pub x: [u64; REGISTER_COUNT],
    /// Address of the next instruction to fetch.
    pub pc: u64,
}

impl Registers {
    /// Create a register file with every register and the pc zeroed.
    pub const fn new() -> Self {
        Self {
            x: [0; REGISTER_COUNT],
            pc: 0,
        }
    }

    /// Reset all registers and the pc to zero.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read register `idx` (only the low 5 bits are used).
    #[inline]
    pub fn read(&self, idx: u8) -> u64 {
        self.x[(idx & 0x1f) as usize]
    }

    /// Write register `idx` (only the low 5 bits are used).
    ///
    /// A write to x0 is stored as-is until the next [`normalize_zero`](Self::normalize_zero).
    #[inline]
    pub fn write(&mut self, idx: u8, value: u64) {
        self.x[(idx & 0x1f) as usize] = value;
    }

    /// Force x0 back to zero.
    #[inline]
    pub fn normalize_zero(&mut self) {
        self.x[0] = 0;
    }

    /// Advance the pc past one instruction, wrapping at the top of the
    /// address space.
    pub fn advance_pc(&mut self) {
        self.pc = self.pc.wrapping_add(INSTRUCTION_BYTES);
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u64) {
        self.pc = addr;
    }

    /// Indices of registers that differ from `other`.
    pub fn diff(&self, other: &Registers) -> Vec<u8> {
        (0..REGISTER_COUNT as u8)
            .filter(|&i| self.read(i) != other.read(i))
            .collect()
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a register name: `x0`..`x31` or an ABI name (`fp` is accepted for `s0`).
pub fn parse_register(name: &str) -> Option<u8> {
    let name = name.trim().to_ascii_lowercase();
    if let Some(num) = name.strip_prefix('x') {
        if let Ok(idx) = num.parse::<u8>() {
            return (usize::from(idx) < REGISTER_COUNT).then_some(idx);
        }
    }
    if name == "fp" {
        return Some(8);
    }
    ABI_NAMES.iter().position(|&abi| abi == name).map(|i| i as u8)
}

impl fmt::Debug for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pc={:#018x}", self.pc)?;
        for (i, value) in self.x.iter().enumerate().filter(|(_, v)| **v != 0) {
            write!(f, " x{}={:#x}", i, value)?;
        }
        Ok(())
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pc  = {:#018x}", self.pc)?;
        for row in 0..REGISTER_COUNT / 2 {
            let (a, b) = (row * 2, row * 2 + 1);
            writeln!(
                f,
                "x{:<2} {:>4} = {:#018x}   x{:<2} {:>4} = {:#018x}",
                a, ABI_NAMES[a], self.x[a], b, ABI_NAMES[b], self.x[b]
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zeroed() {
        let regs = Registers::new();
        assert!(regs.x.iter().all(|&v| v == 0));
        assert_eq!(regs.pc, 0);
    }

    #[test]
    fn test_normalize_zero() {
        let mut regs = Registers::new();
        regs.write(0, 99);
        regs.write(1, 7);
        regs.normalize_zero();
        assert_eq!(regs.read(0), 0);
        assert_eq!(regs.read(1), 7);
    }

    #[test]
    fn test_advance_pc() {
        let mut regs = Registers::new();
        regs.pc = 0x1000;

        regs.advance_pc();
        assert_eq!(regs.pc, 0x1004);

        regs.pc = u64::MAX - 1;
        regs.advance_pc();
        assert_eq!(regs.pc, 2);
    }

    #[test]
    fn test_parse_register() {
        assert_eq!(parse_register("x0"), Some(0));
        assert_eq!(parse_register("X31"), Some(31));
        assert_eq!(parse_register("x32"), None);
        assert_eq!(parse_register("zero"), Some(0));
        assert_eq!(parse_register("a0"), Some(10));
        assert_eq!(parse_register("fp"), Some(8));
        assert_eq!(parse_register("t6"), Some(31));
        assert_eq!(parse_register("q1"), None);
    }

    #[test]
    fn test_diff() {
        let a = Registers::new();
        let mut b = Registers::new();
        b.write(5, 1);
        b.write(31, 2);
        assert_eq!(a.diff(&b), vec![5, 31]);
    }
}
