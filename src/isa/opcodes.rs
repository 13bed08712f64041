//! Major opcodes (bits [6:0]) and function-field values.

/// `LUI rd, imm`
pub const LUI: u8 = 0b011_0111;
/// `AUIPC rd, imm`
pub const AUIPC: u8 = 0b001_0111;
/// Register-immediate ALU operations (`ADDI`, `SLLI`, ...).
pub const OP_IMM: u8 = 0b001_0011;
/// Register-register ALU operations (`ADD`, `SUB`, ...).
pub const OP: u8 = 0b011_0011;

// funct3 values shared by OP and OP-IMM.
pub const FUNCT3_ADD: u8 = 0b000;
pub const FUNCT3_SLL: u8 = 0b001;
pub const FUNCT3_SLT: u8 = 0b010;
pub const FUNCT3_SLTU: u8 = 0b011;
pub const FUNCT3_XOR: u8 = 0b100;
pub const FUNCT3_SRL: u8 = 0b101;
pub const FUNCT3_OR: u8 = 0b110;
pub const FUNCT3_AND: u8 = 0b111;

/// funct7 of the base register-register operations.
pub const FUNCT7_BASE: u8 = 0b000_0000;
/// funct7 selecting `SUB` / `SRA`.
pub const FUNCT7_ALT: u8 = 0b010_0000;

/// Bit of the 12-bit I-immediate selecting `SRAI` over `SRLI`.
pub const SHIFT_ARITHMETIC_BIT: i64 = 1 << 10;

/// Human-readable name of a major opcode, if it is one this core executes.
pub fn name(opcode: u8) -> Option<&'static str> {
    match opcode {
        LUI => Some("LUI"),
        AUIPC => Some("AUIPC"),
        OP_IMM => Some("OP-IMM"),
        OP => Some("OP"),
        _ => None,
    }
}
