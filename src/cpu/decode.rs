//! Instruction decoder for the RV64 integer ALU subset.
//!
//! Three instruction families are understood:
//! - upper-immediate: `LUI`, `AUIPC`
//! - register-immediate ALU (`OP-IMM`), selected by the full 3-bit funct3
//! - register-register ALU (`OP`), selected by funct3 plus the alternate bit
//!
//! Everything else decodes to a [`DecodeError`]; what happens next is the
//! caller's choice (see [`IllegalPolicy`](crate::cpu::IllegalPolicy)).

use crate::isa::fields::{self, fits_imm12};
use crate::isa::opcodes::*;
use crate::isa::AluOp;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Load upper immediate: rd := imm
    Lui { rd: u8, imm: i64 },

    /// Add upper immediate to pc: rd := pc + imm
    Auipc { rd: u8, imm: i64 },

    /// Register-immediate ALU: rd := rs1 op imm
    ///
    /// `imm` is the raw sign-extended 12-bit field. For `SRAI` it still
    /// carries bit 10; the ALU masks shift amounts to 6 bits.
    OpImm { op: AluOp, rd: u8, rs1: u8, imm: i64 },

    /// Register-register ALU: rd := rs1 op rs2
    Op { op: AluOp, rd: u8, rs1: u8, rs2: u8 },
}

impl Instruction {
    /// Destination register.
    pub fn rd(&self) -> u8 {
        match *self {
            Instruction::Lui { rd, .. }
            | Instruction::Auipc { rd, .. }
            | Instruction::OpImm { rd, .. }
            | Instruction::Op { rd, .. } => rd,
        }
    }

    /// Assembly mnemonic.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Lui { .. } => "lui",
            Instruction::Auipc { .. } => "auipc",
            // decode never produces OpImm { op: Sub }
            Instruction::OpImm { op, .. } => op.imm_mnemonic().unwrap_or("subi"),
            Instruction::Op { op, .. } => op.mnemonic(),
        }
    }
}

/// Decode a 32-bit instruction word.
pub fn decode(word: u32) -> Result<Instruction, DecodeError> {
    let opcode = fields::opcode(word);
    let rd = fields::rd(word);

    match opcode {
        LUI => Ok(Instruction::Lui { rd, imm: fields::imm_u(word) }),

        AUIPC => Ok(Instruction::Auipc { rd, imm: fields::imm_u(word) }),

        OP_IMM => {
            let rs1 = fields::rs1(word);
            let imm = fields::imm_i(word);
            let op = match fields::funct3(word) {
                FUNCT3_ADD => AluOp::Add,
                FUNCT3_SLL => AluOp::Sll,
                FUNCT3_SLT => AluOp::Slt,
                FUNCT3_SLTU => AluOp::Sltu,
                FUNCT3_XOR => AluOp::Xor,
                FUNCT3_SRL if imm & SHIFT_ARITHMETIC_BIT != 0 => AluOp::Sra,
                FUNCT3_SRL => AluOp::Srl,
                FUNCT3_OR => AluOp::Or,
                _ => AluOp::And,
            };
            Ok(Instruction::OpImm { op, rd, rs1, imm })
        }

        OP => {
            let rs1 = fields::rs1(word);
            let rs2 = fields::rs2(word);
            let funct3 = fields::funct3(word);
            let funct7 = fields::funct7(word);
            let op = match (funct3, funct7) {
                (FUNCT3_ADD, FUNCT7_BASE) => AluOp::Add,
                (FUNCT3_ADD, FUNCT7_ALT) => AluOp::Sub,
                (FUNCT3_SLL, FUNCT7_BASE) => AluOp::Sll,
                (FUNCT3_SLT, FUNCT7_BASE) => AluOp::Slt,
                (FUNCT3_SLTU, FUNCT7_BASE) => AluOp::Sltu,
                (FUNCT3_XOR, FUNCT7_BASE) => AluOp::Xor,
                (FUNCT3_SRL, FUNCT7_BASE) => AluOp::Srl,
                (FUNCT3_SRL, FUNCT7_ALT) => AluOp::Sra,
                (FUNCT3_OR, FUNCT7_BASE) => AluOp::Or,
                (FUNCT3_AND, FUNCT7_BASE) => AluOp::And,
                _ => {
                    return Err(DecodeError::UnknownFunction {
                        word,
                        opcode,
                        funct3,
                        funct7,
                    })
                }
            };
            Ok(Instruction::Op { op, rd, rs1, rs2 })
        }

        _ => Err(DecodeError::UnknownOpcode { word, opcode }),
    }
}

/// funct3 of an ALU operation (the alternate forms share their base's value).
fn funct3_of(op: AluOp) -> u8 {
    match op {
        AluOp::Add | AluOp::Sub => FUNCT3_ADD,
        AluOp::Sll => FUNCT3_SLL,
        AluOp::Slt => FUNCT3_SLT,
        AluOp::Sltu => FUNCT3_SLTU,
        AluOp::Xor => FUNCT3_XOR,
        AluOp::Srl | AluOp::Sra => FUNCT3_SRL,
        AluOp::Or => FUNCT3_OR,
        AluOp::And => FUNCT3_AND,
    }
}

fn check_reg(reg: u8) -> Result<u8, EncodeError> {
    if reg < 32 {
        Ok(reg)
    } else {
        Err(EncodeError::RegisterOutOfRange(reg))
    }
}

/// Encode an instruction to its 32-bit word.
///
/// Encoding is stricter than decoding: immediates must be representable
/// exactly, and shift amounts must be in 0..=63 (`SRAI` may also carry
/// bit 10, as decoded words do).
pub fn encode(instr: &Instruction) -> Result<u32, EncodeError> {
    match *instr {
        Instruction::Lui { rd, imm } | Instruction::Auipc { rd, imm } => {
            let rd = check_reg(rd)?;
            if imm & 0xfff != 0 || imm < i32::MIN as i64 || imm > i32::MAX as i64 {
                return Err(EncodeError::ImmediateOutOfRange(imm));
            }
            let opcode = if matches!(instr, Instruction::Lui { .. }) { LUI } else { AUIPC };
            Ok(fields::pack_u(opcode, rd, imm))
        }

        Instruction::OpImm { op, rd, rs1, imm } => {
            let (rd, rs1) = (check_reg(rd)?, check_reg(rs1)?);
            let field = match op {
                AluOp::Sub => return Err(EncodeError::NoImmediateForm(op)),
                AluOp::Sll | AluOp::Srl => {
                    if !(0..=63).contains(&imm) {
                        return Err(EncodeError::ShiftOutOfRange(imm));
                    }
                    imm
                }
                AluOp::Sra => {
                    let shamt = imm & !SHIFT_ARITHMETIC_BIT;
                    if !(0..=63).contains(&shamt) {
                        return Err(EncodeError::ShiftOutOfRange(imm));
                    }
                    shamt | SHIFT_ARITHMETIC_BIT
                }
                _ => {
                    if !fits_imm12(imm) {
                        return Err(EncodeError::ImmediateOutOfRange(imm));
                    }
                    imm
                }
            };
            Ok(fields::pack_i(OP_IMM, rd, funct3_of(op), rs1, field))
        }

        Instruction::Op { op, rd, rs1, rs2 } => {
            let (rd, rs1, rs2) = (check_reg(rd)?, check_reg(rs1)?, check_reg(rs2)?);
            let funct7 = match op {
                AluOp::Sub | AluOp::Sra => FUNCT7_ALT,
                _ => FUNCT7_BASE,
            };
            Ok(fields::pack_r(OP, rd, funct3_of(op), rs1, rs2, funct7))
        }
    }
}

/// An instruction word this core has no case for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum DecodeError {
    #[error("unimplemented opcode {opcode:#09b} in {word:#010x}")]
    UnknownOpcode { word: u32, opcode: u8 },

    #[error("unimplemented function (funct3={funct3:#05b}, funct7={funct7:#09b}) for opcode {opcode:#09b} in {word:#010x}")]
    UnknownFunction { word: u32, opcode: u8, funct3: u8, funct7: u8 },
}

impl DecodeError {
    /// The undecodable word.
    pub fn word(&self) -> u32 {
        match *self {
            DecodeError::UnknownOpcode { word, .. } | DecodeError::UnknownFunction { word, .. } => word,
        }
    }
}

/// Errors that can occur while encoding an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("register x{0} does not exist")]
    RegisterOutOfRange(u8),

    #[error("immediate {0} does not fit the instruction")]
    ImmediateOutOfRange(i64),

    #[error("shift amount {0} out of range (0-63)")]
    ShiftOutOfRange(i64),

    #[error("{0} has no immediate form")]
    NoImmediateForm(AluOp),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_lui() {
        // lui x5, 0x12345
        assert_eq!(decode(0x1234_52b7), Ok(Instruction::Lui { rd: 5, imm: 0x1234_5000 }));
        // lui x5, 0xfffff
        assert_eq!(decode(0xffff_f2b7), Ok(Instruction::Lui { rd: 5, imm: -4096 }));
    }

    #[test]
    fn test_decode_auipc() {
        // auipc x1, 0x2
        assert_eq!(decode(0x0000_2097), Ok(Instruction::Auipc { rd: 1, imm: 0x2000 }));
    }

    #[test]
    fn test_decode_addi() {
        // addi x1, x0, 42
        assert_eq!(
            decode(0x02a0_0093),
            Ok(Instruction::OpImm { op: AluOp::Add, rd: 1, rs1: 0, imm: 42 })
        );
        // addi x1, x1, -1
        assert_eq!(
            decode(0xfff0_8093),
            Ok(Instruction::OpImm { op: AluOp::Add, rd: 1, rs1: 1, imm: -1 })
        );
    }

    #[test]
    fn test_all_eight_imm_operations_selectable() {
        let cases = [
            (0b000, 5, AluOp::Add),
            (0b001, 5, AluOp::Sll),
            (0b010, 5, AluOp::Slt),
            (0b011, 5, AluOp::Sltu),
            (0b100, 5, AluOp::Xor),
            (0b101, 5, AluOp::Srl),
            (0b101, 0x405, AluOp::Sra),
            (0b110, 5, AluOp::Or),
            (0b111, 5, AluOp::And),
        ];
        for (funct3, imm, expected) in cases {
            let word = fields::pack_i(OP_IMM, 2, funct3, 3, imm);
            match decode(word) {
                Ok(Instruction::OpImm { op, rd: 2, rs1: 3, .. }) => {
                    assert_eq!(op, expected, "funct3={:03b}", funct3)
                }
                other => panic!("funct3={:03b} decoded to {:?}", funct3, other),
            }
        }
    }

    #[test]
    fn test_decode_register_ops() {
        // add x3, x1, x2
        assert_eq!(
            decode(0x0020_81b3),
            Ok(Instruction::Op { op: AluOp::Add, rd: 3, rs1: 1, rs2: 2 })
        );
        // sub x3, x1, x2
        assert_eq!(
            decode(0x4020_81b3),
            Ok(Instruction::Op { op: AluOp::Sub, rd: 3, rs1: 1, rs2: 2 })
        );
        // sra x3, x1, x2
        assert_eq!(
            decode(0x4020_d1b3),
            Ok(Instruction::Op { op: AluOp::Sra, rd: 3, rs1: 1, rs2: 2 })
        );
    }

    #[test]
    fn test_decode_muldiv_words_are_unknown() {
        // mul x3, x1, x2 and divu x3, x1, x2 share funct3 with add and srl
        for (word, funct3) in [(0x0220_81b3u32, FUNCT3_ADD), (0x0220_d1b3, FUNCT3_SRL)] {
            assert_eq!(
                decode(word),
                Err(DecodeError::UnknownFunction { word, opcode: OP, funct3, funct7: 0b000_0001 })
            );
        }
    }

    #[test]
    fn test_decode_unknown_function() {
        // sll with funct7 = 0100000 has no meaning
        let word = fields::pack_r(OP, 3, FUNCT3_SLL, 1, 2, FUNCT7_ALT);
        assert_eq!(
            decode(word),
            Err(DecodeError::UnknownFunction { word, opcode: OP, funct3: 1, funct7: 0b010_0000 })
        );
    }

    #[test]
    fn test_decode_unknown_opcode() {
        // jal x0, 0
        let err = decode(0x0000_006f).unwrap_err();
        assert_eq!(err, DecodeError::UnknownOpcode { word: 0x6f, opcode: 0x6f });
        assert_eq!(err.word(), 0x6f);
        assert!(decode(0).is_err());
        assert!(decode(0xffff_ffff).is_err());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let test_cases = [
            Instruction::Lui { rd: 5, imm: 0x1234_5000 },
            Instruction::Lui { rd: 31, imm: -4096 },
            Instruction::Auipc { rd: 1, imm: i32::MIN as i64 },
            Instruction::OpImm { op: AluOp::Add, rd: 1, rs1: 2, imm: -2048 },
            Instruction::OpImm { op: AluOp::Sltu, rd: 1, rs1: 2, imm: 2047 },
            Instruction::OpImm { op: AluOp::Sll, rd: 1, rs1: 2, imm: 63 },
            Instruction::OpImm { op: AluOp::Sra, rd: 1, rs1: 2, imm: 0x400 | 7 },
            Instruction::Op { op: AluOp::Sub, rd: 10, rs1: 11, rs2: 12 },
            Instruction::Op { op: AluOp::And, rd: 10, rs1: 11, rs2: 12 },
        ];

        for instr in test_cases {
            let word = encode(&instr).unwrap();
            assert_eq!(decode(word), Ok(instr), "word {:#010x}", word);
        }
    }

    #[test]
    fn test_encode_rejects() {
        assert_eq!(
            encode(&Instruction::OpImm { op: AluOp::Add, rd: 1, rs1: 1, imm: 2048 }),
            Err(EncodeError::ImmediateOutOfRange(2048))
        );
        assert_eq!(
            encode(&Instruction::OpImm { op: AluOp::Sub, rd: 1, rs1: 1, imm: 1 }),
            Err(EncodeError::NoImmediateForm(AluOp::Sub))
        );
        assert_eq!(
            encode(&Instruction::OpImm { op: AluOp::Srl, rd: 1, rs1: 1, imm: 64 }),
            Err(EncodeError::ShiftOutOfRange(64))
        );
        assert_eq!(
            encode(&Instruction::Lui { rd: 1, imm: 0x123 }),
            Err(EncodeError::ImmediateOutOfRange(0x123))
        );
        assert_eq!(
            encode(&Instruction::Op { op: AluOp::Add, rd: 32, rs1: 0, rs2: 0 }),
            Err(EncodeError::RegisterOutOfRange(32))
        );
    }
}
