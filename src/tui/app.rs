//! Debugger application state and logic.

use crate::asm::disasm::disassemble_instruction;
use crate::asm::image::in_image;
use crate::cpu::{Cpu, CpuConfig, FlatMemory, StepOutcome};
use crate::isa::INSTRUCTION_BYTES;
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged, owning the loaded memory.
    pub cpu: Cpu<FlatMemory>,
    /// Load address of the program and reset pc.
    pub base: u64,
    /// Program length in instruction words.
    pub program_len: usize,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<u64>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in words.
    pub mem_scroll: usize,
    /// Registers written by the last step.
    pub changed: Vec<u8>,
    /// Breakpoint address a resumed run steps over once.
    resume_at: Option<u64>,
}

impl DebuggerApp {
    /// Create a debugger over memory that already holds the program at `base`.
    pub fn new(mem: FlatMemory, base: u64, program_len: usize, config: CpuConfig) -> Self {
        let mut cpu = Cpu::with_config(mem, config);
        cpu.set_pc(base);

        Self {
            cpu,
            base,
            program_len,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            mem_scroll: 0,
            changed: Vec::new(),
            resume_at: None,
        }
    }

    /// Whether `addr` holds a word of the loaded program.
    pub fn is_program_addr(&self, addr: u64) -> bool {
        in_image(self.base, self.program_len, addr)
    }

    /// Whether the pc still points into the loaded program.
    pub fn in_program(&self) -> bool {
        self.is_program_addr(self.cpu.pc())
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.in_program() {
            self.status = format!("Program finished at pc={:#x}", self.cpu.pc());
            self.running = false;
            return;
        }

        let pc = self.cpu.pc();
        let before = self.cpu.regs.clone();
        match self.cpu.step() {
            Ok(StepOutcome::Retired(_)) => {
                let word = self.cpu.bus().word_at(pc).unwrap_or(0);
                self.status = format!("pc={:#x}: {}", pc, disassemble_instruction(word));
            }
            Ok(StepOutcome::Unimplemented { error, .. }) => {
                self.status = format!("pc={:#x}: skipped ({})", pc, error);
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
        self.changed = before.diff(&self.cpu.regs);
    }

    /// Run until the program ends, a breakpoint, or an error.
    pub fn run(&mut self) {
        self.running = true;
        self.resume_at = Some(self.cpu.pc());
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.in_program() {
            self.running = false;
            self.status = format!("Finished after {} cycles", self.cpu.cycles);
            return;
        }

        // Check for breakpoint
        let pc = self.cpu.pc();
        if self.breakpoints.contains(&pc) && self.resume_at.take() != Some(pc) {
            self.running = false;
            self.status = format!("Breakpoint at pc={:#x}", pc);
            return;
        }

        self.resume_at = None;
        self.step();
    }

    /// Toggle breakpoint at the current pc.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.pc();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at pc={:#x}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at pc={:#x}", pc);
        }
    }

    /// Reset the CPU to the program entry. Memory keeps the program.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.cpu.set_pc(self.base);
        self.running = false;
        self.changed.clear();
        self.status = "Reset. Ready.".into();
    }

    /// Get disassembly around the current pc as (address, text, is_current).
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u64, String, bool)> {
        let pc = self.cpu.pc();
        let mem = self.cpu.bus();
        let back = (lines as u64 / 2) * INSTRUCTION_BYTES;
        let start = pc.saturating_sub(back).max(mem.base());

        (0..lines as u64)
            .filter_map(|i| {
                let addr = start + i * INSTRUCTION_BYTES;
                mem.word_at(addr)
                    .map(|word| (addr, disassemble_instruction(word), addr == pc))
            })
            .collect()
    }
}

/// Run the debugger over memory holding `program_len` words at `base`.
pub fn run_debugger(
    mem: FlatMemory,
    base: u64,
    program_len: usize,
    config: CpuConfig,
) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(mem, base, program_len, config);
    let max_scroll = app.cpu.bus().len() / INSTRUCTION_BYTES as usize;

    // Main loop
    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => {
                            app.mem_scroll = app.mem_scroll.saturating_sub(1);
                        }
                        KeyCode::Down => {
                            if app.mem_scroll + 1 < max_scroll {
                                app.mem_scroll += 1;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    fn app(source: &str) -> DebuggerApp {
        let words = assemble(source).unwrap();
        let mut mem = FlatMemory::new(0x1000, 256);
        mem.load_words(0x1000, &words).unwrap();
        DebuggerApp::new(mem, 0x1000, words.len(), CpuConfig::default())
    }

    #[test]
    fn test_step_until_program_end() {
        let mut app = app("li a0, 1\naddi a0, a0, 2");
        app.step();
        assert_eq!(app.changed, vec![10]);
        app.step();
        assert_eq!(app.cpu.reg(10), 3);
        assert!(!app.in_program());

        app.step();
        assert_eq!(app.cpu.pc(), 0x1008);
        assert!(app.status.starts_with("Program finished"));
    }

    #[test]
    fn test_program_at_top_of_address_space() {
        let base = u64::MAX - 7;
        let words = assemble("addi a0, zero, 1\naddi a0, a0, 1").unwrap();
        let mut mem = FlatMemory::new(base, 8);
        mem.load_words(base, &words).unwrap();
        let mut app = DebuggerApp::new(mem, base, words.len(), CpuConfig::default());

        assert!(app.in_program());
        app.run();
        for _ in 0..4 {
            app.tick();
        }
        assert_eq!(app.cpu.reg(10), 2);
        assert_eq!(app.cpu.pc(), 0);
        assert!(!app.in_program());
    }

    #[test]
    fn test_run_stops_at_breakpoint() {
        let mut app = app("nop\nnop\nli a0, 9\nnop");
        app.cpu.set_pc(0x1008);
        app.toggle_breakpoint();
        app.cpu.set_pc(0x1000);

        app.run();
        for _ in 0..10 {
            app.tick();
        }
        assert!(!app.running);
        assert_eq!(app.cpu.pc(), 0x1008);

        // Resuming steps past the breakpoint
        app.run();
        for _ in 0..10 {
            app.tick();
        }
        assert_eq!(app.cpu.reg(10), 9);
        assert!(app.status.starts_with("Finished"));
    }

    #[test]
    fn test_reset_and_disassembly() {
        let mut app = app("addi a0, zero, 5\nsub a1, a0, a0");
        app.step();
        app.reset();
        assert_eq!(app.cpu.pc(), 0x1000);
        assert_eq!(app.cpu.reg(10), 0);

        let lines = app.get_disassembly(4);
        assert_eq!(lines[0], (0x1000, "addi a0, zero, 5".to_string(), true));
        assert_eq!(lines[1].1, "sub a1, a0, a0");
    }
}
