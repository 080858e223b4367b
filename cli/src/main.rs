/// cpu6507 CLI
///
/// Runs and disassembles raw 6507 program images.
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use cpu6507::disassembly::{disassemble, DisasmEntry, SymbolTable};
use cpu6507::memory::MOS6507_ADDRESS_MASK;
use cpu6507::{Cpu, CpuConfig, FlatMemory};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug output globally (for troubleshooting and development)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable verbose output globally (traces every bus fault and retired instruction)
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a raw program image and print each retired instruction
    Run {
        /// Path to the raw image file
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
        /// Address the first image byte is loaded at
        #[arg(long, default_value = "F000", value_parser = parse_address)]
        origin: u16,
        /// Start address; defaults to the reset vector
        #[arg(long, value_parser = parse_address)]
        start: Option<u16>,
        /// Maximum number of instructions to execute
        #[arg(long, default_value_t = 1000)]
        steps: usize,
        /// Fail on reads or writes the bus rejects instead of tolerating them
        #[arg(long, default_value_t = false)]
        strict: bool,
        /// Symbol file with `label`, `read` and `write` entries
        #[arg(long, value_name = "FILE")]
        symbols: Option<PathBuf>,
    },
    /// Disassemble a raw program image without executing it
    Disasm {
        /// Path to the raw image file
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
        /// Address the first image byte is loaded at
        #[arg(long, default_value = "F000", value_parser = parse_address)]
        origin: u16,
        /// First address to decode; defaults to the origin
        #[arg(long, value_parser = parse_address)]
        start: Option<u16>,
        /// Number of instructions to decode
        #[arg(long, default_value_t = 32)]
        count: usize,
        /// Symbol file with `label`, `read` and `write` entries
        #[arg(long, value_name = "FILE")]
        symbols: Option<PathBuf>,
    },
}

/// Parse a hex address written as `F000`, `$F000` or `0xF000`.
fn parse_address(value: &str) -> Result<u16, String> {
    let digits = value
        .strip_prefix('$')
        .or_else(|| value.strip_prefix("0x"))
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u16::from_str_radix(digits, 16).map_err(|err| format!("invalid address {value:?}: {err}"))
}

fn init_logging(debug: bool, verbose: bool) {
    let default = if verbose {
        "trace"
    } else if debug {
        "debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.verbose);

    match cli.command {
        Commands::Run {
            image,
            origin,
            start,
            steps,
            strict,
            symbols,
        } => {
            let symbols = load_symbols(symbols.as_deref())?;
            run_image(&image, origin, start, steps, strict, symbols.as_ref())
        }
        Commands::Disasm {
            image,
            origin,
            start,
            count,
            symbols,
        } => {
            let symbols = load_symbols(symbols.as_deref())?;
            disasm_image(&image, origin, start.unwrap_or(origin), count, symbols.as_ref())
        }
    }
}

/// Load an image into a fresh 6507 address space.
fn load_image(path: &Path, origin: u16) -> anyhow::Result<FlatMemory> {
    if !path.exists() {
        bail!("image file not found: {}", path.display());
    }
    let bytes = std::fs::read(path).with_context(|| format!("failed to read image from {}", path.display()))?;
    if bytes.is_empty() {
        bail!("image {} is empty", path.display());
    }
    let capacity = usize::from(MOS6507_ADDRESS_MASK) + 1;
    if bytes.len() > capacity {
        bail!(
            "image {} is {} bytes; the 6507 addresses at most {capacity}",
            path.display(),
            bytes.len()
        );
    }

    let mut memory = FlatMemory::mos6507();
    memory.load(origin, &bytes);
    debug!(origin, len = bytes.len(), "image loaded");
    Ok(memory)
}

fn load_symbols(path: Option<&Path>) -> anyhow::Result<Option<SymbolTable>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read symbols from {}", path.display()))?;
    let table = SymbolTable::parse(&source).with_context(|| format!("invalid symbol file {}", path.display()))?;
    Ok(Some(table))
}

fn run_image(
    path: &Path,
    origin: u16,
    start: Option<u16>,
    steps: usize,
    strict: bool,
    symbols: Option<&SymbolTable>,
) -> anyhow::Result<()> {
    let mut memory = load_image(path, origin)?;
    let mut cpu = Cpu::with_config(CpuConfig {
        strict_addressing: strict,
        ..CpuConfig::default()
    });
    match start {
        Some(addr) => cpu.load_pc(addr),
        None => cpu
            .load_reset_vector(&mut memory)
            .context("failed to read the reset vector")?,
    }
    info!(pc = cpu.registers().pc, steps, strict, "starting execution");

    let mut cycles: u64 = 0;
    let mut executed = 0;
    for _ in 0..steps {
        let trace = cpu
            .execute_instruction(&mut memory, || {
                cycles += 1;
                Ok::<(), Infallible>(())
            })
            .with_context(|| {
                let failed = cpu.last_result();
                format!(
                    "execution stopped at {:#06X} ({}) during {:?}",
                    failed.address,
                    failed.mnemonic(),
                    cpu.phase()
                )
            })?;
        executed += 1;
        println!("{}", DisasmEntry::from_trace(&trace, symbols)?);

        if cpu.is_jammed() {
            warn!(address = trace.address, "CPU jammed, stopping");
            break;
        }
    }

    println!("{}", cpu.registers());
    println!("{executed} instructions, {cycles} cycles");
    Ok(())
}

fn disasm_image(
    path: &Path,
    origin: u16,
    start: u16,
    count: usize,
    symbols: Option<&SymbolTable>,
) -> anyhow::Result<()> {
    let memory = load_image(path, origin)?;
    for entry in disassemble(&memory, start, count, symbols)? {
        println!("{entry}");
    }
    Ok(())
}
