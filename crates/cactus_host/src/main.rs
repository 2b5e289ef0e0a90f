mod check;
mod config;
mod runner;
mod stats;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use config::{BackendKind, HostConfig};
use runner::Machine;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cactus", about = "eQASM quantum control processor simulator")]
struct Cli {
    /// Raise log verbosity (-v info and per-cycle trace, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a program and report diagnostics
    Check {
        file: PathBuf,
        /// Write the canonical listing to this file
        #[arg(long)]
        emit: Option<PathBuf>,
    },
    /// Run a program once and print the final state
    Run {
        file: PathBuf,
        #[command(flatten)]
        machine: MachineArgs,
        /// Print data memory after the run, as ADDR:LEN
        #[arg(long, value_parser = parse_range)]
        dump_mem: Option<(usize, usize)>,
    },
    /// Run a program many times in parallel and report measurement statistics
    Shots {
        file: PathBuf,
        #[command(flatten)]
        machine: MachineArgs,
        #[arg(short = 'n', long, default_value_t = 1000)]
        shots: u64,
    },
}

#[derive(Args)]
struct MachineArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    max_cycles: Option<u64>,
    #[arg(long)]
    qubits: Option<usize>,
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,
    #[arg(long)]
    seed: Option<u64>,
    /// Probability of measuring 1 with the random backend
    #[arg(long)]
    p_one: Option<f64>,
    /// Raw data-memory image loaded at address 0
    #[arg(long)]
    mem_image: Option<PathBuf>,
}

impl MachineArgs {
    /// Merges the configuration file with the command-line overrides.
    fn resolve(&self) -> Result<Machine> {
        let file = match &self.config {
            Some(path) => HostConfig::load(path)?,
            None => HostConfig::default(),
        };

        let mut config = file.processor.to_config();
        if let Some(max) = self.max_cycles {
            config.max_cycles = max;
        }
        if let Some(n) = self.qubits {
            config.num_qubits = n;
        }

        let mut backend = file.backend;
        if let Some(kind) = self.backend {
            backend.kind = kind;
        }
        if let Some(seed) = self.seed {
            backend.seed = seed;
        }
        if let Some(p) = self.p_one {
            backend.p_one = p;
        }

        let mem_image = match &self.mem_image {
            Some(path) => cactus_io::loader::load_memory_image(path)?,
            None => Vec::new(),
        };

        log::debug!("processor config: {:?}", config);
        log::debug!("backend: {:?}", backend);
        Ok(Machine {
            config,
            backend,
            mem_image,
        })
    }
}

/// Parses `ADDR:LEN`; both parts accept a `0x` prefix.
fn parse_range(s: &str) -> Result<(usize, usize), String> {
    let (addr, len) = s
        .split_once(':')
        .ok_or_else(|| format!("expected ADDR:LEN, got '{}'", s))?;
    let num = |t: &str| {
        let t = t.trim();
        let parsed = match t.strip_prefix("0x") {
            Some(hex) => usize::from_str_radix(hex, 16),
            None => t.parse(),
        };
        parsed.map_err(|e| format!("invalid number '{}': {}", t, e))
    };
    Ok((num(addr)?, num(len)?))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Check { file, emit } => {
            check::check_program(&file, emit.as_deref())?;
        }
        Commands::Run {
            file,
            machine,
            dump_mem,
        } => {
            runner::run_program(&file, &machine.resolve()?, cli.verbose > 0, dump_mem)?;
        }
        Commands::Shots {
            file,
            machine,
            shots,
        } => {
            runner::run_shots(&file, &machine.resolve()?, shots)?;
        }
    }
    Ok(())
}
