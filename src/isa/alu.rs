//! The 64-bit integer ALU.
//!
//! Register-register and register-immediate instructions share these
//! operations; the immediate forms pass their sign-extended immediate
//! as the second operand. Shift amounts are masked to 6 bits, the
//! register width being 64.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Mask applied to every shift amount.
pub const SHIFT_MASK: u64 = 63;

/// An integer ALU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AluOp {
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
}

impl AluOp {
    /// All operations, in funct3 order with the alternate forms after their base.
    pub const ALL: [AluOp; 10] = [
        AluOp::Add,
        AluOp::Sub,
        AluOp::Sll,
        AluOp::Slt,
        AluOp::Sltu,
        AluOp::Xor,
        AluOp::Srl,
        AluOp::Sra,
        AluOp::Or,
        AluOp::And,
    ];

    /// Apply the operation to two register-width operands.
    #[inline]
    pub fn apply(self, a: u64, b: u64) -> u64 {
        match self {
            AluOp::Add => add(a, b),
            AluOp::Sub => sub(a, b),
            AluOp::Sll => shift_left(a, b),
            AluOp::Slt => set_less_than(a, b),
            AluOp::Sltu => set_less_than_unsigned(a, b),
            AluOp::Xor => a ^ b,
            AluOp::Srl => shift_right_logical(a, b),
            AluOp::Sra => shift_right_arithmetic(a, b),
            AluOp::Or => a | b,
            AluOp::And => a & b,
        }
    }

    /// Register-register mnemonic (`add`, `sub`, ...).
    pub fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "add",
            AluOp::Sub => "sub",
            AluOp::Sll => "sll",
            AluOp::Slt => "slt",
            AluOp::Sltu => "sltu",
            AluOp::Xor => "xor",
            AluOp::Srl => "srl",
            AluOp::Sra => "sra",
            AluOp::Or => "or",
            AluOp::And => "and",
        }
    }

    /// Register-immediate mnemonic. `Sub` has no immediate form.
    pub fn imm_mnemonic(self) -> Option<&'static str> {
        match self {
            AluOp::Add => Some("addi"),
            AluOp::Sub => None,
            AluOp::Sll => Some("slli"),
            AluOp::Slt => Some("slti"),
            AluOp::Sltu => Some("sltiu"),
            AluOp::Xor => Some("xori"),
            AluOp::Srl => Some("srli"),
            AluOp::Sra => Some("srai"),
            AluOp::Or => Some("ori"),
            AluOp::And => Some("andi"),
        }
    }

    /// Whether this is one of the three shift operations.
    pub fn is_shift(self) -> bool {
        matches!(self, AluOp::Sll | AluOp::Srl | AluOp::Sra)
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Wrapping addition.
#[inline]
pub fn add(a: u64, b: u64) -> u64 {
    a.wrapping_add(b)
}

/// Wrapping subtraction (a - b).
#[inline]
pub fn sub(a: u64, b: u64) -> u64 {
    a.wrapping_sub(b)
}

/// Logical left shift by the low 6 bits of `amount`.
#[inline]
pub fn shift_left(a: u64, amount: u64) -> u64 {
    a << (amount & SHIFT_MASK)
}

/// Logical right shift by the low 6 bits of `amount`.
#[inline]
pub fn shift_right_logical(a: u64, amount: u64) -> u64 {
    a >> (amount & SHIFT_MASK)
}

/// Arithmetic right shift by the low 6 bits of `amount`.
#[inline]
pub fn shift_right_arithmetic(a: u64, amount: u64) -> u64 {
    ((a as i64) >> (amount & SHIFT_MASK)) as u64
}

/// 1 if `a < b` as signed values, else 0.
#[inline]
pub fn set_less_than(a: u64, b: u64) -> u64 {
    ((a as i64) < (b as i64)) as u64
}

/// 1 if `a < b` as unsigned values, else 0.
#[inline]
pub fn set_less_than_unsigned(a: u64, b: u64) -> u64 {
    (a < b) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_add_sub_wrap() {
        assert_eq!(add(u64::MAX, 1), 0);
        assert_eq!(sub(0, 1), u64::MAX);
        assert_eq!(sub(20, 8), 12);
    }

    #[test]
    fn test_shift_amount_masked() {
        // 64 has its low 6 bits clear, so it is a zero-bit shift
        assert_eq!(shift_left(0xabcd, 64), 0xabcd);
        assert_eq!(shift_right_logical(0xabcd, 0x1_0000_0040), 0xabcd);
        assert_eq!(shift_left(1, 65), 2);
        assert_eq!(shift_left(1, 63), 1 << 63);
    }

    #[test]
    fn test_right_shifts_on_negative() {
        let minus_16 = (-16i64) as u64;
        assert_eq!(shift_right_arithmetic(minus_16, 2) as i64, -4);
        assert_eq!(shift_right_logical(minus_16, 2), 0x3fff_ffff_ffff_fffc);
    }

    #[test]
    fn test_set_less_than_signedness() {
        let minus_one = u64::MAX;
        assert_eq!(set_less_than(minus_one, 0), 1);
        assert_eq!(set_less_than_unsigned(minus_one, 0), 0);
        assert_eq!(set_less_than(5, 5), 0);
        assert_eq!(set_less_than_unsigned(4, 5), 1);
    }

    #[test]
    fn test_imm_mnemonics() {
        assert_eq!(AluOp::Sub.imm_mnemonic(), None);
        assert_eq!(AluOp::Sra.imm_mnemonic(), Some("srai"));
        assert!(AluOp::ALL.iter().filter(|op| op.is_shift()).count() == 3);
    }

    proptest! {
        #[test]
        fn prop_sub_inverts_add(a: u64, b: u64) {
            prop_assert_eq!(AluOp::Sub.apply(AluOp::Add.apply(a, b), b), a);
        }

        #[test]
        fn prop_xor_self_is_zero(a: u64) {
            prop_assert_eq!(AluOp::Xor.apply(a, a), 0);
        }

        #[test]
        fn prop_shifts_ignore_high_amount_bits(a: u64, amount: u64) {
            let low = amount & SHIFT_MASK;
            for op in [AluOp::Sll, AluOp::Srl, AluOp::Sra] {
                prop_assert_eq!(op.apply(a, amount), op.apply(a, low));
            }
        }

        #[test]
        fn prop_set_less_than_is_boolean(a: u64, b: u64) {
            prop_assert!(AluOp::Slt.apply(a, b) <= 1);
            prop_assert!(AluOp::Sltu.apply(a, b) <= 1);
        }
    }
}
