//! Program image files.
//!
//! Two formats are understood:
//! - `.hex`: text, one 32-bit word per line in hexadecimal (an optional
//!   `0x` prefix is allowed). Anything after `;` or `#` is a comment and
//!   blank lines are ignored.
//! - `.bin`: raw little-endian words, no header.

use crate::isa::INSTRUCTION_BYTES;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Whether `addr` lies within `len` words loaded at `base`.
///
/// Measured as an offset from `base`, so an image that ends exactly at the
/// top of the address space still covers its last word.
pub fn in_image(base: u64, len: usize, addr: u64) -> bool {
    addr.wrapping_sub(base) < (len as u64).saturating_mul(INSTRUCTION_BYTES)
}

/// On-disk representation of a program image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Hex,
    Binary,
}

impl ImageFormat {
    /// Pick a format from a file extension. Anything but `.bin` is hex.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bin") => ImageFormat::Binary,
            _ => ImageFormat::Hex,
        }
    }
}

/// A loaded program image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    /// Instruction words, in address order.
    pub words: Vec<u32>,
    /// Annotation for each word (source text or disassembly), may be empty.
    pub source_lines: Vec<String>,
}

impl ProgramImage {
    /// Create an empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an image from bare words.
    pub fn from_words(words: Vec<u32>) -> Self {
        Self {
            words,
            source_lines: Vec::new(),
        }
    }

    /// Add a word with its annotation.
    pub fn push(&mut self, word: u32, source: &str) {
        self.words.push(word);
        self.source_lines.push(source.to_string());
    }

    /// Get the number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Size in bytes.
    pub fn byte_len(&self) -> u64 {
        self.words.len() as u64 * INSTRUCTION_BYTES
    }

    /// Whether `addr` holds one of this image's words when loaded at `base`.
    pub fn covers(&self, base: u64, addr: u64) -> bool {
        in_image(base, self.len(), addr)
    }
}

/// Parse the hex text format.
pub fn parse_hex(text: &str) -> Result<ProgramImage, ImageError> {
    let mut image = ProgramImage::new();

    for (line_num, line) in text.lines().enumerate() {
        let (body, comment) = match line.find([';', '#']) {
            Some(idx) => (&line[..idx], line[idx + 1..].trim()),
            None => (line, ""),
        };
        let body = body.trim();
        if body.is_empty() {
            continue;
        }

        let digits = body
            .strip_prefix("0x")
            .or_else(|| body.strip_prefix("0X"))
            .unwrap_or(body)
            .replace('_', "");
        let word = u32::from_str_radix(&digits, 16).map_err(|e| ImageError::ParseError {
            line: line_num + 1,
            message: format!("'{}' is not a 32-bit hex word: {}", body, e),
        })?;

        image.push(word, comment);
    }

    Ok(image)
}

/// Parse the raw binary format.
pub fn parse_binary(bytes: &[u8]) -> Result<ProgramImage, ImageError> {
    if bytes.len() % 4 != 0 {
        return Err(ImageError::Truncated { len: bytes.len() });
    }
    let words = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(ProgramImage::from_words(words))
}

/// Render an image in the hex text format.
pub fn to_hex(image: &ProgramImage) -> String {
    let mut out = String::new();
    out.push_str("; RV64 program image\n");
    out.push_str(&format!("; {} words\n\n", image.len()));
    for (i, word) in image.words.iter().enumerate() {
        match image.source_lines.get(i).filter(|s| !s.is_empty()) {
            Some(src) => out.push_str(&format!("{:08x} ; {:04x}: {}\n", word, i * 4, src)),
            None => out.push_str(&format!("{:08x} ; {:04x}\n", word, i * 4)),
        }
    }
    out
}

/// Render an image as raw little-endian bytes.
pub fn to_binary(image: &ProgramImage) -> Vec<u8> {
    image.words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Load an image from disk, choosing the format by extension.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let path = path.as_ref();
    match ImageFormat::from_path(path) {
        ImageFormat::Binary => {
            let bytes = std::fs::read(path).map_err(|e| ImageError::IoError(e.to_string()))?;
            parse_binary(&bytes)
        }
        ImageFormat::Hex => {
            let text = std::fs::read_to_string(path).map_err(|e| ImageError::IoError(e.to_string()))?;
            parse_hex(&text)
        }
    }
}

/// Save an image to disk, choosing the format by extension.
pub fn save_image<P: AsRef<Path>>(path: P, image: &ProgramImage) -> Result<(), ImageError> {
    let path = path.as_ref();
    let bytes = match ImageFormat::from_path(path) {
        ImageFormat::Binary => to_binary(image),
        ImageFormat::Hex => to_hex(image).into_bytes(),
    };
    let mut file = std::fs::File::create(path).map_err(|e| ImageError::IoError(e.to_string()))?;
    file.write_all(&bytes).map_err(|e| ImageError::IoError(e.to_string()))?;
    Ok(())
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("binary image of {len} bytes is not a whole number of words")]
    Truncated { len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        let text = "\
            ; header comment\n\
            02a00093 ; addi x1, x0, 42\n\
            \n\
            0x4020_81b3 # sub x3, x1, x2\n";
        let image = parse_hex(text).unwrap();
        assert_eq!(image.words, vec![0x02a0_0093, 0x4020_81b3]);
        assert_eq!(image.source_lines[0], "addi x1, x0, 42");
    }

    #[test]
    fn test_parse_hex_error_line() {
        let err = parse_hex("00000013\nzzzz\n").unwrap_err();
        assert!(matches!(err, ImageError::ParseError { line: 2, .. }));
        assert!(parse_hex("1_0000_0000").is_err());
    }

    #[test]
    fn test_hex_text_reparses() {
        let mut image = ProgramImage::new();
        image.push(0x0000_0013, "nop");
        image.push(0xffff_f2b7, "");
        let again = parse_hex(&to_hex(&image)).unwrap();
        assert_eq!(again.words, image.words);
    }

    #[test]
    fn test_binary() {
        let image = parse_binary(&[0x13, 0, 0, 0, 0xb3, 0x81, 0x20, 0x40]).unwrap();
        assert_eq!(image.words, vec![0x13, 0x4020_81b3]);
        assert_eq!(to_binary(&image).len(), 8);
        assert_eq!(parse_binary(&[1, 2, 3]), Err(ImageError::Truncated { len: 3 }));
    }

    #[test]
    fn test_covers_image_at_top_of_address_space() {
        let image = ProgramImage::from_words(vec![0x0000_0013; 2]);
        let base = u64::MAX - 7;
        assert!(image.covers(base, base));
        assert!(image.covers(base, u64::MAX - 3));
        assert!(!image.covers(base, 0));
        assert!(!image.covers(base, base - 4));

        assert!(image.covers(0x100, 0x104));
        assert!(!image.covers(0x100, 0x108));
        assert!(!in_image(0x100, 0, 0x100));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ImageFormat::from_path("prog.bin"), ImageFormat::Binary);
        assert_eq!(ImageFormat::from_path("prog.BIN"), ImageFormat::Binary);
        assert_eq!(ImageFormat::from_path("prog.hex"), ImageFormat::Hex);
        assert_eq!(ImageFormat::from_path("prog"), ImageFormat::Hex);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("rv64-image-test-{}.bin", std::process::id()));
        let image = ProgramImage::from_words(vec![0x0000_0013, 0x1234_52b7]);
        save_image(&path, &image).unwrap();
        let loaded = load_image(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.words, image.words);
    }
}
