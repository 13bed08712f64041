//! The memory-access capability the CPU core is bound to.
//!
//! The core never owns or allocates memory of its own: it is handed
//! something implementing [`Memory`] and only ever calls through it.
//! [`FlatMemory`] is the simple backing store the CLI, debugger and
//! tests use; anything else (paged memory, MMIO routers) can implement
//! the trait the same way.

use crate::isa::AccessWidth;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A memory-access capability.
///
/// Any context the backing store needs travels inside the implementor.
/// Values are little-endian and occupy the low `width.bytes()` bytes of
/// the `u64`.
pub trait Memory {
    /// Read `width` bytes at `addr`.
    fn read(&mut self, width: AccessWidth, addr: u64) -> Result<u64, MemoryError>;

    /// Write the low `width` bytes of `value` at `addr`.
    fn write(&mut self, width: AccessWidth, addr: u64, value: u64) -> Result<(), MemoryError>;
}

impl<M: Memory + ?Sized> Memory for &mut M {
    #[inline]
    fn read(&mut self, width: AccessWidth, addr: u64) -> Result<u64, MemoryError> {
        (**self).read(width, addr)
    }

    #[inline]
    fn write(&mut self, width: AccessWidth, addr: u64, value: u64) -> Result<(), MemoryError> {
        (**self).write(width, addr, value)
    }
}

/// Default size of a [`FlatMemory`]: 64 KiB.
pub const DEFAULT_MEMORY_SIZE: usize = 64 * 1024;

/// A contiguous little-endian byte array mapped at `base`.
#[derive(Clone, Serialize, Deserialize)]
pub struct FlatMemory {
    base: u64,
    bytes: Vec<u8>,
}

impl FlatMemory {
    /// Create `size` zeroed bytes mapped at `base`.
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            bytes: vec![0; size],
        }
    }

    /// First mapped address.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Number of mapped bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether no bytes are mapped.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Translate an address range to an offset into the backing vector.
    fn offset(&self, width: AccessWidth, addr: u64) -> Result<usize, MemoryError> {
        let out_of_range = MemoryError::OutOfRange { addr, width };
        let offset = addr.checked_sub(self.base).ok_or(out_of_range.clone())?;
        let end = offset.checked_add(width.bytes() as u64).ok_or(out_of_range.clone())?;
        if end > self.bytes.len() as u64 {
            return Err(out_of_range);
        }
        Ok(offset as usize)
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Store a sequence of instruction words starting at `addr`.
    pub fn load_words(&mut self, addr: u64, words: &[u32]) -> Result<(), MemoryError> {
        let needed = words.len() * AccessWidth::Word.bytes();
        let start = match self.offset(AccessWidth::Byte, addr) {
            Ok(start) if start + needed <= self.bytes.len() => start,
            _ => {
                return Err(MemoryError::ProgramTooLarge {
                    size: needed,
                    available: self.offset(AccessWidth::Byte, addr)
                        .map(|start| self.bytes.len() - start)
                        .unwrap_or(0),
                })
            }
        };

        for (i, word) in words.iter().enumerate() {
            let at = start + i * 4;
            self.bytes[at..at + 4].copy_from_slice(&word.to_le_bytes());
        }
        Ok(())
    }

    /// Read an instruction word, or `None` if it is not fully mapped.
    pub fn word_at(&self, addr: u64) -> Option<u32> {
        let at = self.offset(AccessWidth::Word, addr).ok()?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.bytes[at..at + 4]);
        Some(u32::from_le_bytes(buf))
    }

    /// Dump `count` words starting at `addr` (for debugging).
    /// Unmapped words are skipped.
    pub fn dump_words(&self, addr: u64, count: usize) -> Vec<(u64, u32)> {
        (0..count as u64)
            .map(|i| addr.wrapping_add(i * 4))
            .filter_map(|a| self.word_at(a).map(|w| (a, w)))
            .collect()
    }
}

impl Memory for FlatMemory {
    fn read(&mut self, width: AccessWidth, addr: u64) -> Result<u64, MemoryError> {
        let at = self.offset(width, addr)?;
        let mut buf = [0u8; 8];
        buf[..width.bytes()].copy_from_slice(&self.bytes[at..at + width.bytes()]);
        Ok(u64::from_le_bytes(buf))
    }

    fn write(&mut self, width: AccessWidth, addr: u64, value: u64) -> Result<(), MemoryError> {
        let at = self.offset(width, addr)?;
        let n = width.bytes();
        self.bytes[at..at + n].copy_from_slice(&value.to_le_bytes()[..n]);
        Ok(())
    }
}

impl Default for FlatMemory {
    fn default() -> Self {
        Self::new(0, DEFAULT_MEMORY_SIZE)
    }
}

impl std::fmt::Debug for FlatMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nonzero = self.bytes.iter().filter(|b| **b != 0).count();
        f.debug_struct("FlatMemory")
            .field("base", &format_args!("{:#x}", self.base))
            .field("size", &self.bytes.len())
            .field("nonzero_bytes", &nonzero)
            .finish()
    }
}

/// Errors reported by a memory-access capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("{width} access at {addr:#x} is outside mapped memory")]
    OutOfRange { addr: u64, width: AccessWidth },

    #[error("program of {size} bytes does not fit ({available} bytes available)")]
    ProgramTooLarge { size: usize, available: usize },

    #[error("{width} access at {addr:#x} is not permitted")]
    AccessDenied { addr: u64, width: AccessWidth },
}
