//! Two-pass assembler for the RV64 integer ALU subset.
//!
//! Syntax:
//! ```text
//! # comment (';' works too)
//! start:                  # define a label
//!     addi a0, zero, 42
//!     slli a1, a0, 3
//!     sub  a2, a1, a0
//!     li   t0, 0x12345678 # lui + addi
//!     la   t1, table      # auipc + addi, pc-relative
//! table:
//!     .word 0xdeadbeef
//! ```
//!
//! Registers are `x0`..`x31` or ABI names. Immediates may be decimal,
//! `0x` hex or `0b` binary, optionally negative.

use crate::asm::image::ProgramImage;
use crate::cpu::decode::{encode, Instruction};
use crate::cpu::registers::parse_register;
use crate::isa::fields::fits_imm12;
use crate::isa::opcodes::SHIFT_ARITHMETIC_BIT;
use crate::isa::AluOp;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to instruction words, origin 0.
pub fn assemble(source: &str) -> Result<Vec<u32>, AssemblerError> {
    assemble_image(source, 0).map(|image| image.words)
}

/// Assemble source code for loading at `origin`, keeping the source line
/// of each emitted word.
pub fn assemble_image(source: &str, origin: u64) -> Result<ProgramImage, AssemblerError> {
    let mut asm = Assembler::new(origin);
    asm.assemble(source)
}

/// How a pending label reference is patched in pass 2.
#[derive(Debug, Clone, Copy)]
enum Fixup {
    /// `auipc rd, hi; addi rd, rd, lo` pair starting at the recorded word.
    PcRelative { rd: u8 },
    /// A `.word` holding the label's absolute address.
    Absolute,
}

/// A label reference waiting for pass 2.
struct Pending {
    index: usize,
    label: String,
    line: usize,
    fixup: Fixup,
}

/// The assembler state.
struct Assembler {
    /// Address of the first emitted word.
    origin: u64,
    /// Symbol table (label -> address).
    symbols: HashMap<String, u64>,
    /// References to patch once every label is known.
    pending: Vec<Pending>,
    /// Output image.
    output: ProgramImage,
    /// Source line being assembled, for error reports.
    line: usize,
}

impl Assembler {
    fn new(origin: u64) -> Self {
        Self {
            origin,
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: ProgramImage::new(),
            line: 0,
        }
    }

    fn current_addr(&self) -> u64 {
        self.origin.wrapping_add(self.output.byte_len())
    }

    fn assemble(&mut self, source: &str) -> Result<ProgramImage, AssemblerError> {
        // Pass 1: collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: resolve label references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        self.line = line_num;
        // Remove comments
        let line = match line.find(['#', ';']) {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();

        // Label definitions, possibly followed by an instruction
        while let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim();
            if !is_identifier(label) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label '{}'", label),
                });
            }
            if self.symbols.insert(label.to_string(), self.current_addr()).is_some() {
                return Err(AssemblerError::DuplicateLabel {
                    line: line_num,
                    label: label.to_string(),
                });
            }
            line = line[colon_idx + 1..].trim();
        }

        if line.is_empty() {
            return Ok(());
        }
        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = match line.find(char::is_whitespace) {
            Some(idx) => (&line[..idx], line[idx..].trim()),
            None => (line, ""),
        };
        let mnemonic = mnemonic.to_ascii_lowercase();
        let operands: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };
        let ops = Operands { list: &operands, line: line_num, mnemonic: &mnemonic };

        match mnemonic.as_str() {
            // Directives
            ".word" => {
                ops.arity(1)?;
                match parse_int(operands[0]) {
                    Some(value) if (i32::MIN as i64..=u32::MAX as i64).contains(&value) => {
                        self.emit_word(value as u32, line);
                    }
                    Some(value) => {
                        return Err(AssemblerError::ValueOutOfRange { line: line_num, value })
                    }
                    None => {
                        let label = ops.label(0)?;
                        self.defer(label, line_num, Fixup::Absolute);
                        self.emit_word(0, line);
                    }
                }
            }

            // Upper immediates
            "lui" | "auipc" => {
                ops.arity(2)?;
                let rd = ops.reg(0)?;
                let upper = ops.imm(1)?;
                if !(-(1 << 19)..(1 << 20)).contains(&upper) {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value: upper });
                }
                let imm = ((upper << 12) as u32 as i32) as i64;
                let instr = if mnemonic == "lui" {
                    Instruction::Lui { rd, imm }
                } else {
                    Instruction::Auipc { rd, imm }
                };
                self.emit(instr, line)?;
            }

            // Register-immediate ALU
            "addi" | "slti" | "sltiu" | "xori" | "ori" | "andi" => {
                ops.arity(3)?;
                let op = imm_op(&mnemonic);
                let (rd, rs1, imm) = (ops.reg(0)?, ops.reg(1)?, ops.imm(2)?);
                if !fits_imm12(imm) {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value: imm });
                }
                self.emit(Instruction::OpImm { op, rd, rs1, imm }, line)?;
            }

            "slli" | "srli" | "srai" => {
                ops.arity(3)?;
                let op = imm_op(&mnemonic);
                let (rd, rs1, shamt) = (ops.reg(0)?, ops.reg(1)?, ops.imm(2)?);
                if !(0..=63).contains(&shamt) {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value: shamt });
                }
                let imm = if op == AluOp::Sra { shamt | SHIFT_ARITHMETIC_BIT } else { shamt };
                self.emit(Instruction::OpImm { op, rd, rs1, imm }, line)?;
            }

            // Register-register ALU
            "add" | "sub" | "sll" | "slt" | "sltu" | "xor" | "srl" | "sra" | "or" | "and" => {
                ops.arity(3)?;
                let op = AluOp::ALL
                    .into_iter()
                    .find(|op| op.mnemonic() == mnemonic)
                    .unwrap_or(AluOp::Add);
                let (rd, rs1, rs2) = (ops.reg(0)?, ops.reg(1)?, ops.reg(2)?);
                self.emit(Instruction::Op { op, rd, rs1, rs2 }, line)?;
            }

            // Pseudo-instructions
            "nop" => {
                ops.arity(0)?;
                self.emit(Instruction::OpImm { op: AluOp::Add, rd: 0, rs1: 0, imm: 0 }, line)?;
            }

            "mv" => {
                ops.arity(2)?;
                let (rd, rs1) = (ops.reg(0)?, ops.reg(1)?);
                self.emit(Instruction::OpImm { op: AluOp::Add, rd, rs1, imm: 0 }, line)?;
            }

            "not" => {
                ops.arity(2)?;
                let (rd, rs1) = (ops.reg(0)?, ops.reg(1)?);
                self.emit(Instruction::OpImm { op: AluOp::Xor, rd, rs1, imm: -1 }, line)?;
            }

            "neg" => {
                ops.arity(2)?;
                let (rd, rs2) = (ops.reg(0)?, ops.reg(1)?);
                self.emit(Instruction::Op { op: AluOp::Sub, rd, rs1: 0, rs2 }, line)?;
            }

            "seqz" => {
                ops.arity(2)?;
                let (rd, rs1) = (ops.reg(0)?, ops.reg(1)?);
                self.emit(Instruction::OpImm { op: AluOp::Sltu, rd, rs1, imm: 1 }, line)?;
            }

            "snez" => {
                ops.arity(2)?;
                let (rd, rs2) = (ops.reg(0)?, ops.reg(1)?);
                self.emit(Instruction::Op { op: AluOp::Sltu, rd, rs1: 0, rs2 }, line)?;
            }

            "sltz" => {
                ops.arity(2)?;
                let (rd, rs1) = (ops.reg(0)?, ops.reg(1)?);
                self.emit(Instruction::Op { op: AluOp::Slt, rd, rs1, rs2: 0 }, line)?;
            }

            "sgtz" => {
                ops.arity(2)?;
                let (rd, rs2) = (ops.reg(0)?, ops.reg(1)?);
                self.emit(Instruction::Op { op: AluOp::Slt, rd, rs1: 0, rs2 }, line)?;
            }

            "li" => {
                ops.arity(2)?;
                let (rd, value) = (ops.reg(0)?, ops.imm(1)?);
                if fits_imm12(value) {
                    self.emit(Instruction::OpImm { op: AluOp::Add, rd, rs1: 0, imm: value }, line)?;
                } else {
                    let (hi, lo) = split_hi_lo(value)
                        .ok_or(AssemblerError::ValueOutOfRange { line: line_num, value })?;
                    self.emit(Instruction::Lui { rd, imm: hi }, line)?;
                    if lo != 0 {
                        self.emit(Instruction::OpImm { op: AluOp::Add, rd, rs1: rd, imm: lo }, line)?;
                    }
                }
            }

            "la" => {
                ops.arity(2)?;
                let rd = ops.reg(0)?;
                let label = ops.label(1)?;
                self.defer(label, line_num, Fixup::PcRelative { rd });
                self.emit(Instruction::Auipc { rd, imm: 0 }, line)?;
                self.emit(Instruction::OpImm { op: AluOp::Add, rd, rs1: rd, imm: 0 }, line)?;
            }

            _ => {
                return Err(AssemblerError::UnknownMnemonic {
                    line: line_num,
                    mnemonic: mnemonic.clone(),
                })
            }
        }

        Ok(())
    }

    fn emit(&mut self, instr: Instruction, source: &str) -> Result<(), AssemblerError> {
        let word = encode(&instr).map_err(|e| AssemblerError::SyntaxError {
            line: self.line,
            message: e.to_string(),
        })?;
        self.emit_word(word, source);
        Ok(())
    }

    fn emit_word(&mut self, word: u32, source: &str) {
        self.output.push(word, source);
    }

    fn defer(&mut self, label: &str, line: usize, fixup: Fixup) {
        self.pending.push(Pending {
            index: self.output.len(),
            label: label.to_string(),
            line,
            fixup,
        });
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for pending in &self.pending {
            let target = *self.symbols.get(&pending.label).ok_or_else(|| {
                AssemblerError::UndefinedLabel {
                    line: pending.line,
                    label: pending.label.clone(),
                }
            })?;
            let out_of_range = |value: i64| AssemblerError::ValueOutOfRange {
                line: pending.line,
                value,
            };

            match pending.fixup {
                Fixup::Absolute => {
                    let value = u32::try_from(target).map_err(|_| out_of_range(target as i64))?;
                    self.output.words[pending.index] = value;
                }
                Fixup::PcRelative { rd } => {
                    let here = self.origin.wrapping_add(pending.index as u64 * 4);
                    let delta = target.wrapping_sub(here) as i64;
                    let (hi, lo) = split_hi_lo(delta).ok_or(out_of_range(delta))?;
                    let auipc = encode(&Instruction::Auipc { rd, imm: hi })
                        .map_err(|_| out_of_range(delta))?;
                    let addi = encode(&Instruction::OpImm { op: AluOp::Add, rd, rs1: rd, imm: lo })
                        .map_err(|_| out_of_range(delta))?;
                    self.output.words[pending.index] = auipc;
                    self.output.words[pending.index + 1] = addi;
                }
            }
        }
        Ok(())
    }
}

/// Operand list of one source line, with error context.
struct Operands<'a> {
    list: &'a [&'a str],
    line: usize,
    mnemonic: &'a str,
}

impl<'a> Operands<'a> {
    fn arity(&self, count: usize) -> Result<(), AssemblerError> {
        if self.list.len() == count {
            Ok(())
        } else {
            Err(AssemblerError::SyntaxError {
                line: self.line,
                message: format!(
                    "{} takes {} operand(s), found {}",
                    self.mnemonic,
                    count,
                    self.list.len()
                ),
            })
        }
    }

    fn reg(&self, idx: usize) -> Result<u8, AssemblerError> {
        let name = self.list[idx];
        parse_register(name).ok_or_else(|| AssemblerError::BadRegister {
            line: self.line,
            name: name.to_string(),
        })
    }

    fn imm(&self, idx: usize) -> Result<i64, AssemblerError> {
        let text = self.list[idx];
        parse_int(text).ok_or_else(|| AssemblerError::SyntaxError {
            line: self.line,
            message: format!("invalid immediate '{}'", text),
        })
    }

    fn label(&self, idx: usize) -> Result<&'a str, AssemblerError> {
        let text = self.list[idx];
        if is_identifier(text) {
            Ok(text)
        } else {
            Err(AssemblerError::SyntaxError {
                line: self.line,
                message: format!("invalid label '{}'", text),
            })
        }
    }
}

/// ALU operation of a register-immediate mnemonic.
fn imm_op(mnemonic: &str) -> AluOp {
    AluOp::ALL
        .into_iter()
        .find(|op| op.imm_mnemonic() == Some(mnemonic))
        .unwrap_or(AluOp::Add)
}

/// Split a value into a `lui`/`auipc` upper part and an `addi` lower part
/// such that `hi + lo == value`, with `hi` representable as a sign-extended
/// 32-bit upper immediate.
fn split_hi_lo(value: i64) -> Option<(i64, i64)> {
    let lo = (value << 52) >> 52;
    let hi = value.wrapping_sub(lo);
    (hi >= i32::MIN as i64 && hi <= i32::MAX as i64).then_some((hi, lo))
}

/// Parse a decimal, `0x` hex or `0b` binary integer, optionally negative.
fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim().replace('_', "");
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };
    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("unknown register on line {line}: {name}")]
    BadRegister { line: usize, name: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("label defined twice on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::decode;
    use crate::cpu::{Cpu, FlatMemory};

    fn run(source: &str, steps: u64) -> Cpu<FlatMemory> {
        let words = assemble(source).unwrap();
        let mut mem = FlatMemory::new(0, 1024);
        mem.load_words(0, &words).unwrap();
        let mut cpu = Cpu::new(mem);
        cpu.run_limited(steps).unwrap();
        cpu
    }

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            # Simple test program
            addi x1, x0, 42
            add  x3, x1, x2
            sub  x3, x1, x2
            lui  t0, 0x12345
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![0x02a0_0093, 0x0020_81b3, 0x4020_81b3, 0x1234_52b7]);
    }

    #[test]
    fn test_assemble_shifts() {
        let result = assemble("srai a0, a1, 3\nsrli a0, a1, 3\nslli a0, a1, 63").unwrap();
        assert_eq!(
            decode(result[0]),
            Ok(Instruction::OpImm { op: AluOp::Sra, rd: 10, rs1: 11, imm: 0x403 })
        );
        assert_eq!(
            decode(result[1]),
            Ok(Instruction::OpImm { op: AluOp::Srl, rd: 10, rs1: 11, imm: 3 })
        );
        assert!(matches!(
            assemble("slli a0, a1, 64"),
            Err(AssemblerError::ValueOutOfRange { line: 1, value: 64 })
        ));
    }

    #[test]
    fn test_li_expansion() {
        assert_eq!(assemble("li a0, -5").unwrap().len(), 1);
        assert_eq!(assemble("li a0, 0x1000").unwrap().len(), 1);

        let cpu = run("li a0, 0x12345678\nli a1, -0x80000000\nli a2, 0x7ffff7ff", 5);
        assert_eq!(cpu.reg(10), 0x1234_5678);
        assert_eq!(cpu.reg(11) as i64, -0x8000_0000);
        assert_eq!(cpu.reg(12), 0x7fff_f7ff);

        assert!(matches!(
            assemble("li a0, 0x7fffffff"),
            Err(AssemblerError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn test_la_resolves_forward_label() {
        let source = r#"
        start:
            la   a0, data
            nop
        data:
            .word 0xdeadbeef
            .word start
        "#;
        let words = assemble_image(source, 0x8000_0000).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words.words[3], 0xdead_beef);

        let mut mem = FlatMemory::new(0x8000_0000, 64);
        mem.load_words(0x8000_0000, &words.words).unwrap();
        let mut cpu = Cpu::new(mem);
        cpu.set_pc(0x8000_0000);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.reg(10), 0x8000_000c);
        assert_eq!(words.words[4], 0x8000_0000);
    }

    #[test]
    fn test_pseudo_instructions() {
        let cpu = run(
            r#"
            li   t0, 7
            mv   t1, t0
            not  t2, t0
            neg  s0, t0
            seqz s1, zero
            snez a0, t0
            sltz a1, s0
            sgtz a2, s0
            nop
            "#,
            9,
        );
        assert_eq!(cpu.reg(6), 7);
        assert_eq!(cpu.reg(7) as i64, !7);
        assert_eq!(cpu.reg(8) as i64, -7);
        assert_eq!(cpu.reg(9), 1);
        assert_eq!(cpu.reg(10), 1);
        assert_eq!(cpu.reg(11), 1);
        assert_eq!(cpu.reg(12), 0);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            assemble("addi x1, x0"),
            Err(AssemblerError::SyntaxError { line: 1, .. })
        ));
        assert!(matches!(
            assemble("nop\nbeq x1, x2, 8"),
            Err(AssemblerError::UnknownMnemonic { line: 2, .. })
        ));
        assert!(matches!(
            assemble("add x1, x2, y3"),
            Err(AssemblerError::BadRegister { line: 1, .. })
        ));
        assert!(matches!(
            assemble("addi x1, x0, 4096"),
            Err(AssemblerError::ValueOutOfRange { line: 1, value: 4096 })
        ));
        assert!(matches!(
            assemble("la a0, nowhere"),
            Err(AssemblerError::UndefinedLabel { line: 1, .. })
        ));
        assert!(matches!(
            assemble("a:\na:"),
            Err(AssemblerError::DuplicateLabel { line: 2, .. })
        ));
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-0x10"), Some(-16));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("1_000"), Some(1000));
        assert_eq!(parse_int("label"), None);
    }
}
