//! TUI debugger for the RV64 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Disassembly around the pc with breakpoints
//! - All 32 registers, highlighting the last write
//! - Memory view of the loaded image
//! - Step/run/pause/reset controls

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
