//! Command-line driver for the memory-system simulator: loads a physical
//! memory image, runs a command file through the TLB and cache hierarchies,
//! and reports per-command hit/miss outcomes.

use clap::{Args, Parser, Subcommand};
use memsim_cli::command::{self, CommandKind};
use memsim_cli::error::{CliError, CliResult};
use memsim_cli::program::Program;
use memsim_cli::{hexdump, loader};
use memsim_core::addr::VirtualAddress;
use memsim_core::cache::{CacheConfig, CacheHierarchy};
use memsim_core::executor::{Access, Executor};
use memsim_core::pagewalk::walk;
use memsim_core::tlb::TlbHierarchy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "memsim", version, about = "Page-walk, TLB and cache hierarchy simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command file against a memory image.
    Run(RunArgs),
    /// Translate one virtual address and show the surrounding bytes.
    Inspect(InspectArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Memory image: a descriptor file, unless `--raw` is given.
    #[arg(long)]
    memory: PathBuf,
    /// Treat `--memory` as a raw whole-file dump instead of a descriptor.
    #[arg(long)]
    raw: bool,
    /// Command file to execute.
    #[arg(long)]
    commands: PathBuf,
    /// Write a hex dump of the final memory state to this path.
    #[arg(long)]
    dump: Option<PathBuf>,
    /// Suppress per-command output; only report the final summary.
    #[arg(long)]
    quiet: bool,
    /// Print the parsed command stream in its original textual notation
    /// before executing it, to verify the parse round-trip.
    #[arg(long)]
    echo_program: bool,
    #[command(flatten)]
    geometry: Geometry,
}

#[derive(Args)]
struct InspectArgs {
    /// Memory image: a descriptor file, unless `--raw` is given.
    #[arg(long)]
    memory: PathBuf,
    /// Treat `--memory` as a raw whole-file dump instead of a descriptor.
    #[arg(long)]
    raw: bool,
    /// Virtual address to translate, in hex (`0x` prefix optional).
    #[arg(long)]
    addr: String,
}

#[derive(Args)]
struct Geometry {
    /// Lines per L1 TLB (instruction and data each get this many).
    #[arg(long, default_value_t = 8)]
    tlb_l1_lines: usize,
    /// Lines in the unified L2 TLB.
    #[arg(long, default_value_t = 32)]
    tlb_l2_lines: usize,
    /// Sets per L1 cache (instruction and data each get this many).
    #[arg(long, default_value_t = 16)]
    cache_l1_sets: usize,
    /// Ways per L1 cache set.
    #[arg(long, default_value_t = 4)]
    cache_l1_ways: usize,
    /// Sets in the unified L2 cache.
    #[arg(long, default_value_t = 64)]
    cache_l2_sets: usize,
    /// Ways per L2 cache set.
    #[arg(long, default_value_t = 8)]
    cache_l2_ways: usize,
    /// Words per cache line.
    #[arg(long, default_value_t = 4)]
    words_per_line: usize,
}

impl Geometry {
    fn build(&self) -> (TlbHierarchy, CacheHierarchy) {
        let tlb = TlbHierarchy::new(self.tlb_l1_lines, self.tlb_l2_lines);
        let l1 = CacheConfig { sets: self.cache_l1_sets, ways: self.cache_l1_ways, words_per_line: self.words_per_line };
        let l2 = CacheConfig { sets: self.cache_l2_sets, ways: self.cache_l2_ways, words_per_line: self.words_per_line };
        (tlb, CacheHierarchy::new(l1, l2))
    }
}

fn parse_hex_vaddr(token: &str) -> CliResult<u64> {
    let digits = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")).unwrap_or(token);
    u64::from_str_radix(digits, 16)
        .map_err(|e| CliError::Parse { path: PathBuf::from("<--addr>"), line: 0, reason: format!("invalid hex address `{token}`: {e}") })
}

fn load_memory(path: &PathBuf, raw: bool) -> CliResult<memsim_core::memory::PhysicalMemory> {
    if raw {
        loader::load_raw(path)
    } else {
        loader::load_descriptor(path)
    }
}

fn to_access(kind: CommandKind) -> CliResult<Access> {
    Ok(match kind {
        CommandKind::ReadInstruction { vaddr } => {
            Access::Instruction { vaddr: VirtualAddress::from_u64(vaddr)?, data_size: 4 }
        }
        CommandKind::ReadData { vaddr, size } => Access::Read { vaddr: VirtualAddress::from_u64(vaddr)?, data_size: size },
        CommandKind::WriteData { vaddr, size, value } => {
            Access::Write { vaddr: VirtualAddress::from_u64(vaddr)?, data_size: size, value }
        }
    })
}

fn describe_kind(kind: CommandKind) -> String {
    match kind {
        CommandKind::ReadInstruction { vaddr } => format!("R  I   @{vaddr:016X}"),
        CommandKind::ReadData { vaddr, size } => format!("R  {}  @{vaddr:016X}", if size == 4 { "DW" } else { "DB" }),
        CommandKind::WriteData { vaddr, size, value } => {
            format!("W  {}  {value:X} @{vaddr:016X}", if size == 4 { "DW" } else { "DB" })
        }
    }
}

/// Echo the parsed program back in `commands.c`'s textual notation, one
/// line per command, numbered as `parse_commands` numbered them.
fn echo_program(program: &Program) {
    for command in program.iter() {
        println!("#{:<4} {}", command.order, describe_kind(command.kind));
    }
}

fn run(args: RunArgs) -> CliResult<()> {
    let mut mem = load_memory(&args.memory, args.raw)?;
    let program = Program::new(command::parse_commands(&args.commands)?);
    if args.echo_program {
        echo_program(&program);
    }
    let (tlb, cache) = args.geometry.build();
    let mut executor = Executor::new(tlb, cache);

    let mut hits = 0usize;
    let mut total = 0usize;
    for command in program.iter() {
        let access = to_access(command.kind)?;
        let outcome = executor.execute(&mut mem, access)?;
        total += 1;
        if outcome.cache_hit {
            hits += 1;
        }
        if !args.quiet {
            let value = outcome.read_value.map_or(String::new(), |v| format!(" value=0x{v:08X}"));
            println!(
                "#{:<4} {} -> paddr={} tlb={} cache={}{}",
                command.order,
                describe_kind(command.kind),
                outcome.paddr,
                if outcome.tlb_hit { "HIT" } else { "MISS" },
                if outcome.cache_hit { "HIT" } else { "MISS" },
                value
            );
        }
    }

    log::info!("executed {total} commands, {hits} cache hits");

    if let Some(dump_path) = &args.dump {
        let rendered = hexdump::hex_dump(mem.as_slice(), 0);
        std::fs::write(dump_path, rendered).map_err(|source| CliError::Io { path: dump_path.clone(), source })?;
    }

    Ok(())
}

fn inspect(args: InspectArgs) -> CliResult<()> {
    let mem = load_memory(&args.memory, args.raw)?;
    let vaddr64 = parse_hex_vaddr(&args.addr)?;
    let vaddr = VirtualAddress::from_u64(vaddr64)?;
    let paddr = walk(&mem, vaddr)?;

    println!("virtual:  {vaddr}");
    println!("physical: {paddr}");

    let start = paddr.as_u32().saturating_sub(8) & !0xF;
    let end = (start + 64).min(mem.len() as u32);
    print!("{}", hexdump::hex_dump(&mem.as_slice()[start as usize..end as usize], start));

    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => run(args),
        Commands::Inspect(args) => inspect(args),
    };
    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}
