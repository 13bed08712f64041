//! Memory access widths.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Width of a single memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessWidth {
    /// 8 bits
    Byte,
    /// 16 bits
    Half,
    /// 32 bits (instruction fetch)
    Word,
    /// 64 bits
    Double,
}

impl AccessWidth {
    /// Size of the access in bytes.
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            AccessWidth::Byte => 1,
            AccessWidth::Half => 2,
            AccessWidth::Word => 4,
            AccessWidth::Double => 8,
        }
    }
}

impl fmt::Display for AccessWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccessWidth::Byte => "byte",
            AccessWidth::Half => "halfword",
            AccessWidth::Word => "word",
            AccessWidth::Double => "doubleword",
        };
        f.write_str(name)
    }
}
