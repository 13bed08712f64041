//! Disassembler for RV64 programs.
//!
//! Converts instruction words back to assembly text the assembler accepts.

use crate::cpu::decode::{decode, Instruction};
use crate::cpu::registers::ABI_NAMES;
use crate::isa::{AluOp, INSTRUCTION_BYTES};

/// Disassemble a single instruction word to text.
///
/// Words outside the implemented subset come back as a `.word` directive.
pub fn disassemble_instruction(word: u32) -> String {
    match decode(word) {
        Ok(decoded) => format_instruction(&decoded),
        Err(_) => format!(".word 0x{:08x}", word),
    }
}

/// Disassemble a slice of words loaded at address 0.
pub fn disassemble(words: &[u32]) -> String {
    disassemble_at(words, 0)
}

/// Disassemble a slice of words loaded at `base`.
pub fn disassemble_at(words: &[u32], base: u64) -> String {
    let mut output = String::new();
    output.push_str("# RV64 Disassembly\n");
    output.push_str("# ----------------\n\n");

    for (idx, word) in words.iter().enumerate() {
        let addr = base.wrapping_add(idx as u64 * INSTRUCTION_BYTES);
        let line = disassemble_instruction(*word);
        output.push_str(&format!("{:08x}: {:08x}  {}\n", addr, word, line));
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    match *instr {
        Instruction::Lui { rd, imm } => format!("lui {}, 0x{:x}", reg(rd), upper(imm)),
        Instruction::Auipc { rd, imm } => format!("auipc {}, 0x{:x}", reg(rd), upper(imm)),
        Instruction::OpImm { op, rd, rs1, imm } => {
            let imm = if op.is_shift() { imm & 0x3f } else { imm };
            if op == AluOp::Add && rd == 0 && rs1 == 0 && imm == 0 {
                return "nop".to_string();
            }
            format!("{} {}, {}, {}", instr.mnemonic(), reg(rd), reg(rs1), imm)
        }
        Instruction::Op { rd, rs1, rs2, .. } => {
            format!("{} {}, {}, {}", instr.mnemonic(), reg(rd), reg(rs1), reg(rs2))
        }
    }
}

fn reg(idx: u8) -> &'static str {
    ABI_NAMES[(idx & 0x1f) as usize]
}

/// The 20-bit field of a U-type immediate.
fn upper(imm: i64) -> u32 {
    ((imm >> 12) as u32) & 0xf_ffff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    #[test]
    fn test_disassemble_known_words() {
        assert_eq!(disassemble_instruction(0x02a0_0093), "addi ra, zero, 42");
        assert_eq!(disassemble_instruction(0x4020_81b3), "sub gp, ra, sp");
        assert_eq!(disassemble_instruction(0x1234_52b7), "lui t0, 0x12345");
        assert_eq!(disassemble_instruction(0x0000_0013), "nop");
    }

    #[test]
    fn test_disassemble_shift_amounts() {
        let words = assemble("srai a0, a1, 5\nslli a0, a1, 63").unwrap();
        assert_eq!(disassemble_instruction(words[0]), "srai a0, a1, 5");
        assert_eq!(disassemble_instruction(words[1]), "slli a0, a1, 63");
    }

    #[test]
    fn test_disassemble_unknown_word() {
        // jal x0, 0
        assert_eq!(disassemble_instruction(0x0000_006f), ".word 0x0000006f");
    }

    #[test]
    fn test_disassembly_reassembles() {
        let source = "lui a0, 0xfffff\nauipc t1, 0x1\nsltiu a2, a3, -1\nsra s0, s1, t2\nxori a0, a0, -2048";
        let words = assemble(source).unwrap();
        let text: Vec<String> = words.iter().map(|w| disassemble_instruction(*w)).collect();
        assert_eq!(assemble(&text.join("\n")).unwrap(), words);
    }

    #[test]
    fn test_disassemble_listing_addresses() {
        let listing = disassemble_at(&[0x0000_0013, 0x0000_006f], 0x8000_0000);
        assert!(listing.contains("80000000: 00000013  nop"));
        assert!(listing.contains("80000004: 0000006f  .word 0x0000006f"));
    }
}
