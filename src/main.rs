//! RV64 Emulator - CLI Entry Point
//!
//! Commands:
//! - `rv64-emu run <program>` - Run an assembly source or program image
//! - `rv64-emu debug <program>` - Interactive debugger
//! - `rv64-emu asm <source>` - Assemble to a hex or binary image
//! - `rv64-emu disasm <image>` - Disassemble an image

use clap::{Parser, Subcommand};
use rv64::cpu::memory::DEFAULT_MEMORY_SIZE;
use rv64::{CpuConfig, IllegalPolicy, ProgramImage};

#[derive(Parser)]
#[command(name = "rv64-emu")]
#[command(version = "0.1.0")]
#[command(about = "A functional RV64 integer-ALU instruction set simulator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it leaves its image
    Run {
        /// Path to the .s/.asm source or .hex/.bin image to execute
        program: String,
        /// Maximum number of cycles to run
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Show trace output
        #[arg(short, long)]
        trace: bool,
        #[command(flatten)]
        machine: MachineArgs,
        /// Write the final register snapshot as JSON
        #[arg(long)]
        dump_json: Option<String>,
    },
    /// Interactive debugger
    Debug {
        /// Path to the program to debug
        program: String,
        #[command(flatten)]
        machine: MachineArgs,
    },
    /// Assemble source to a program image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image (.hex or .bin)
        #[arg(short, long)]
        output: Option<String>,
        /// Load address used to resolve absolute label references
        #[arg(long, value_parser = parse_address, default_value = "0")]
        base: u64,
    },
    /// Disassemble a program image to readable text
    Disasm {
        /// Path to the .hex or .bin image
        image: String,
        /// Address of the first word
        #[arg(long, value_parser = parse_address, default_value = "0")]
        base: u64,
    },
    /// Run the built-in self-test
    Test,
}

/// Options shared by the commands that build a machine.
#[derive(clap::Args)]
struct MachineArgs {
    /// Trap on undecodable instructions instead of skipping them
    #[arg(long)]
    strict: bool,
    /// Load address and initial pc
    #[arg(long, value_parser = parse_address, default_value = "0")]
    base: u64,
    /// Memory size in bytes
    #[arg(long, default_value_t = DEFAULT_MEMORY_SIZE)]
    mem_size: usize,
    /// JSON file with the CPU configuration
    #[arg(long)]
    config: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { program, max_cycles, trace, machine, dump_json }) => {
            run_program(&program, max_cycles, trace, &machine, dump_json.as_deref());
        }
        Some(Commands::Debug { program, machine }) => {
            debug_program(&program, &machine);
        }
        Some(Commands::Asm { source, output, base }) => {
            assemble_file(&source, output, base);
        }
        Some(Commands::Disasm { image, base }) => {
            disassemble_file(&image, base);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("RV64 Emulator v0.1.0");
            println!("A functional RV64 integer-ALU simulator");
            println!();
            println!("Use --help for available commands");
            println!();
            demo_program();
        }
    }
}

/// Accept decimal or `0x`-prefixed hexadecimal addresses.
fn parse_address(text: &str) -> Result<u64, String> {
    let text = text.replace('_', "");
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", text, e))
}

fn fail(context: &str, error: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}: {}", context, error);
    std::process::exit(1);
}

/// Assemble a source file or load an image, depending on the extension.
fn load_program(path: &str, base: u64) -> ProgramImage {
    use rv64::asm::{assemble_image, load_image};

    let image = if path.ends_with(".s") || path.ends_with(".asm") {
        let source = std::fs::read_to_string(path)
            .unwrap_or_else(|e| fail("Failed to read file", e));
        let image = assemble_image(&source, base)
            .unwrap_or_else(|e| fail("Assembly error", e));
        println!("📝 Assembled {} instructions", image.len());
        image
    } else {
        let image = load_image(path).unwrap_or_else(|e| fail("Failed to load image", e));
        println!("📂 Loaded {} words", image.len());
        image
    };

    if image.is_empty() {
        fail("Nothing to execute", path);
    }
    image
}

fn build_config(machine: &MachineArgs) -> CpuConfig {
    let mut config = match &machine.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .unwrap_or_else(|e| fail("Failed to read config", e));
            serde_json::from_str::<CpuConfig>(&text)
                .unwrap_or_else(|e| fail("Invalid config", e))
        }
        None => CpuConfig::default(),
    };
    if machine.strict {
        config.on_illegal = IllegalPolicy::Trap;
    }
    config
}

fn build_memory(image: &ProgramImage, machine: &MachineArgs) -> rv64::FlatMemory {
    let mut mem = rv64::FlatMemory::new(machine.base, machine.mem_size);
    if let Err(e) = mem.load_words(machine.base, &image.words) {
        fail("Failed to load program", e);
    }
    mem
}

fn run_program(
    path: &str,
    max_cycles: u64,
    trace: bool,
    machine: &MachineArgs,
    dump_json: Option<&str>,
) {
    use rv64::asm::disasm::disassemble_instruction;
    use rv64::Cpu;

    println!("🔧 Running: {}", path);

    let image = load_program(path, machine.base);
    let mut cpu = Cpu::with_config(build_memory(&image, machine), build_config(machine));
    cpu.set_pc(machine.base);

    println!();
    println!("━━━ Execution ━━━");

    let mut cycles = 0u64;
    while image.covers(machine.base, cpu.pc()) && cycles < max_cycles {
        let pc = cpu.pc();
        let word = cpu.bus().word_at(pc).unwrap_or(0);

        match cpu.step() {
            Ok(_) => {
                if trace {
                    println!("{:08x}: {:<28} {}", pc, disassemble_instruction(word), changed(&cpu));
                }
                cycles += 1;
            }
            Err(e) => {
                eprintln!("❌ CPU error at pc={:#x}: {}", pc, e);
                std::process::exit(1);
            }
        }
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", cycles);
    println!("{}", cpu.regs);

    if let Some(out) = dump_json {
        let json = serde_json::to_string_pretty(&cpu.snapshot())
            .unwrap_or_else(|e| fail("Failed to encode snapshot", e));
        std::fs::write(out, json).unwrap_or_else(|e| fail("Failed to write snapshot", e));
        println!("✓ Snapshot saved to {}", out);
    }

    if cycles >= max_cycles {
        println!();
        println!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", max_cycles);
    }
}

/// The destination register of the last retired instruction, for tracing.
fn changed<M: rv64::Memory>(cpu: &rv64::Cpu<M>) -> String {
    match cpu.last_instruction() {
        Some(instr) if instr.rd() != 0 => {
            format!("x{}={:#x}", instr.rd(), cpu.reg(instr.rd()))
        }
        Some(_) => String::new(),
        None => "(skipped)".to_string(),
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, machine: &MachineArgs) {
    use rv64::tui::run_debugger;

    println!("🔍 Loading: {}", path);

    let image = load_program(path, machine.base);
    let mem = build_memory(&image, machine);

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(mem, machine.base, image.len(), build_config(machine)) {
        fail("Debugger error", e);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str, _machine: &MachineArgs) {
    fail("Debugger unavailable", "built without the `tui` feature");
}

fn assemble_file(source_path: &str, output: Option<String>, base: u64) {
    use rv64::asm::{assemble_image, save_image};

    let out_path = output.unwrap_or_else(|| {
        let stem = source_path
            .strip_suffix(".asm")
            .or_else(|| source_path.strip_suffix(".s"))
            .unwrap_or(source_path);
        format!("{}.hex", stem)
    });

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = std::fs::read_to_string(source_path)
        .unwrap_or_else(|e| fail("Failed to read file", e));
    let image = assemble_image(&source, base).unwrap_or_else(|e| fail("Assembly error", e));

    println!("✓ Assembled {} instructions", image.len());

    if let Err(e) = save_image(&out_path, &image) {
        fail("Failed to save image", e);
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(image_path: &str, base: u64) {
    use rv64::asm::{disassemble_at, load_image};

    println!("📖 Disassembling: {}", image_path);
    println!();

    let image = load_image(image_path).unwrap_or_else(|e| fail("Failed to load image", e));
    println!("{}", disassemble_at(&image.words, base));
}

fn demo_program() {
    use rv64::{assemble, Cpu, FlatMemory};
    use rv64::asm::disasm::disassemble_instruction;

    println!("━━━ RV64 Demo ━━━");
    println!();

    let source = "li a0, 100\nli a1, -7\nadd a2, a0, a1\nslli a3, a2, 4\nsltu a4, a1, a0";
    let words = match assemble(source) {
        Ok(words) => words,
        Err(e) => fail("Assembly error", e),
    };

    let mut mem = FlatMemory::new(0, 256);
    if let Err(e) = mem.load_words(0, &words) {
        fail("Failed to load program", e);
    }
    let mut cpu = Cpu::new(&mut mem);

    for word in &words {
        let pc = cpu.pc();
        if let Err(e) = cpu.step() {
            fail("CPU error", e);
        }
        println!("  {:04x}: {:<22} {}", pc, disassemble_instruction(*word), changed(&cpu));
    }
    println!();
    println!("✓ Core ALU working!");
}

fn run_self_test() {
    use rv64::{assemble, Cpu, FlatMemory, StepOutcome};
    use rv64::asm::disasm::disassemble_instruction;

    println!("━━━ RV64 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let run = |source: &str| -> Option<Cpu<FlatMemory>> {
        let words = assemble(source).ok()?;
        let mut mem = FlatMemory::new(0, 1024);
        mem.load_words(0, &words).ok()?;
        let mut cpu = Cpu::new(mem);
        cpu.run_limited(words.len() as u64).ok()?;
        Some(cpu)
    };

    let mut check = |name: &str, ok: bool| {
        print!("{}... ", name);
        if ok { println!("✓"); passed += 1; }
        else { println!("✗"); failed += 1; }
    };

    // Test 1: upper immediates
    let cpu = run("lui a0, 0x12345\nauipc a1, 0x1");
    check(
        "LUI/AUIPC",
        cpu.is_some_and(|c| c.reg(10) == 0x1234_5000 && c.reg(11) == 0x1004),
    );

    // Test 2: add and subtract
    let cpu = run("addi a0, zero, 20\naddi a1, zero, 8\nsub a2, a0, a1\nadd a3, a0, a1");
    check("ADD/SUB", cpu.is_some_and(|c| c.reg(12) == 12 && c.reg(13) == 28));

    // Test 3: shift amounts use the low six bits only
    let cpu = run("li a0, -1\naddi a1, zero, 0x46\nsll a2, a0, a1\nsrai a3, a0, 63");
    check(
        "Shift masking",
        cpu.is_some_and(|c| c.reg(12) == 0xffff_ffff_ffff_ffc0 && c.reg(13) == u64::MAX),
    );

    // Test 4: x0 stays zero
    let cpu = run("addi zero, zero, 5\nlui zero, 0xfffff");
    check("x0 hardwired to zero", cpu.is_some_and(|c| c.reg(0) == 0));

    // Test 5: undecodable words advance the pc only
    let mut mem = FlatMemory::new(0, 16);
    let skipped = mem.load_words(0, &[0x0000_006f]).is_ok() && {
        let mut cpu = Cpu::new(&mut mem);
        matches!(cpu.step(), Ok(StepOutcome::Unimplemented { .. })) && cpu.pc() == 4
    };
    check("Unimplemented words skipped", skipped);

    // Test 6: disassembly re-assembles to the same words
    let round_trip = assemble("xori t0, t1, -1\nsra s0, s1, a0").is_ok_and(|words| {
        let text: Vec<String> = words.iter().map(|w| disassemble_instruction(*w)).collect();
        assemble(&text.join("\n")).is_ok_and(|again| again == words)
    });
    check("Disassembly round trip", round_trip);

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
