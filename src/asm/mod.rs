//! Assembler, disassembler and program image formats.
//!
//! This module provides:
//! - A two-pass assembler (text → instruction words)
//! - A disassembler (instruction words → readable text)
//! - Hex and raw binary program images

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, assemble_image, AssemblerError};
pub use disasm::{disassemble, disassemble_at, disassemble_instruction};
pub use image::{in_image, load_image, save_image, ImageError, ImageFormat, ProgramImage};
