//! Bit-field extraction for 32-bit RISC-V instruction words.
//!
//! Every format that carries a given field keeps it in the same place, so
//! extraction does not depend on the instruction format:
//!
//! ```text
//!  31      25 24  20 19  15 14  12 11   7 6      0
//! [ funct7   | rs2  | rs1  |funct3| rd   | opcode ]   R-type
//! [ imm[11:0]       | rs1  |funct3| rd   | opcode ]   I-type
//! [ imm[31:12]                    | rd   | opcode ]   U-type
//! ```

/// Bits [6:0].
#[inline]
pub const fn opcode(word: u32) -> u8 {
    (word & 0x7f) as u8
}

/// Bits [11:7].
#[inline]
pub const fn rd(word: u32) -> u8 {
    ((word >> 7) & 0x1f) as u8
}

/// Bits [14:12].
#[inline]
pub const fn funct3(word: u32) -> u8 {
    ((word >> 12) & 0x7) as u8
}

/// Bits [19:15].
#[inline]
pub const fn rs1(word: u32) -> u8 {
    ((word >> 15) & 0x1f) as u8
}

/// Bits [24:20].
#[inline]
pub const fn rs2(word: u32) -> u8 {
    ((word >> 20) & 0x1f) as u8
}

/// Bits [31:25].
#[inline]
pub const fn funct7(word: u32) -> u8 {
    (word >> 25) as u8
}

/// I-type immediate: bits [31:20], sign-extended from bit 31.
#[inline]
pub const fn imm_i(word: u32) -> i64 {
    ((word as i32) >> 20) as i64
}

/// U-type immediate: the word with bits [11:0] cleared, sign-extended from bit 31.
#[inline]
pub const fn imm_u(word: u32) -> i64 {
    ((word & !0xfff) as i32) as i64
}

/// Assemble an R-type word.
pub const fn pack_r(opcode: u8, rd: u8, funct3: u8, rs1: u8, rs2: u8, funct7: u8) -> u32 {
    ((funct7 as u32 & 0x7f) << 25)
        | ((rs2 as u32 & 0x1f) << 20)
        | ((rs1 as u32 & 0x1f) << 15)
        | ((funct3 as u32 & 0x7) << 12)
        | ((rd as u32 & 0x1f) << 7)
        | (opcode as u32 & 0x7f)
}

/// Assemble an I-type word. Only the low 12 bits of `imm` are kept.
pub const fn pack_i(opcode: u8, rd: u8, funct3: u8, rs1: u8, imm: i64) -> u32 {
    (((imm as u32) & 0xfff) << 20)
        | ((rs1 as u32 & 0x1f) << 15)
        | ((funct3 as u32 & 0x7) << 12)
        | ((rd as u32 & 0x1f) << 7)
        | (opcode as u32 & 0x7f)
}

/// Assemble a U-type word. Bits [11:0] of `imm` are discarded.
pub const fn pack_u(opcode: u8, rd: u8, imm: i64) -> u32 {
    ((imm as u32) & !0xfff) | ((rd as u32 & 0x1f) << 7) | (opcode as u32 & 0x7f)
}

/// Whether `value` is representable as a 12-bit signed I-immediate.
#[inline]
pub const fn fits_imm12(value: i64) -> bool {
    value >= -2048 && value <= 2047
}
