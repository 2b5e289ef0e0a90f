use crate::config::BackendSection;
use crate::stats::ShotStats;
use anyhow::{Context, Result};
use cactus_common::isa::Instruction;
use cactus_core::backend::QuantumBackend;
use cactus_core::{Processor, ProcessorConfig, RunOutcome};
use cactus_io::loader;
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;

type HostProcessor = Processor<Box<dyn QuantumBackend + Send>>;

/// Everything needed to bring up a processor for one run.
pub struct Machine {
    pub config: ProcessorConfig,
    pub backend: BackendSection,
    /// Written at address 0 before the program starts.
    pub mem_image: Vec<u8>,
}

impl Machine {
    /// Creates a processor, preloads data memory and uploads `program`.
    ///
    /// `stream` selects the backend's random stream.
    fn boot(&self, program: Vec<Instruction>, stream: u64) -> Result<HostProcessor> {
        let backend = self.backend.build(self.config.num_qubits, stream)?;
        let mut cpu = Processor::new(self.config.clone(), backend);
        cpu.memory_mut()
            .load_image(0, &self.mem_image)
            .context("Memory image does not fit in data memory")?;
        cpu.upload_program(program)
            .context("Program rejected by the loader")?;
        Ok(cpu)
    }
}

/// Runs a program once and prints the final architectural state.
///
/// # Arguments
///
/// * `path` - eQASM source file
/// * `machine` - Processor configuration, backend and memory image
/// * `verbose` - Log every executed instruction at info level
/// * `dump_mem` - Optional `(addr, len)` range of data memory to print
pub fn run_program(
    path: &Path,
    machine: &Machine,
    verbose: bool,
    dump_mem: Option<(usize, usize)>,
) -> Result<()> {
    println!("Loading program from {}...", path.display());
    let program = loader::load_program(path)?;
    println!("Loaded {} instructions.", program.len());

    let mut cpu = machine.boot(program, 0)?;
    cpu.set_verbose(verbose);

    let start = Instant::now();
    let outcome = cpu.run();
    let elapsed = start.elapsed();

    match &outcome {
        Ok(RunOutcome::Halted { cycles }) => {
            println!("Halted after {} cycles ({:?}).", cycles, elapsed)
        }
        Ok(RunOutcome::CycleLimit { cycles }) => println!(
            "Cycle limit reached after {} cycles at pc {} ({:?}).",
            cycles,
            cpu.pc(),
            elapsed
        ),
        Err(e) => println!("Execution stopped: {}", e),
    }

    print_state(&cpu, dump_mem)?;
    outcome.context("Execution failed")?;
    Ok(())
}

fn print_state(cpu: &HostProcessor, dump_mem: Option<(usize, usize)>) -> Result<()> {
    println!("\nGeneral Purpose Registers");
    print!("{}", cpu.gpr());
    println!("\nFloating Point Registers");
    print!("{}", cpu.fpr());
    println!("\nCondition Flags");
    print!("{}", cpu.flags());

    let msmt: Vec<String> = cpu.msmt_results().iter().map(|m| m.to_string()).collect();
    println!("\nMeasurement Results (q0 first): [{}]", msmt.join(", "));

    if let Some((addr, len)) = dump_mem {
        let bytes = cpu
            .memory()
            .slice(addr, len)
            .context("Memory dump range is out of bounds")?;
        println!("\nData Memory [{:#x}, {:#x})", addr, addr + len);
        for (row, chunk) in bytes.chunks(16).enumerate() {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
            println!("{:08x}: {}", addr + row * 16, hex.join(" "));
        }
    }
    Ok(())
}

/// Runs `shots` independent copies of a program in parallel and reports
/// the distribution of final measurement results.
pub fn run_shots(path: &Path, machine: &Machine, shots: u64) -> Result<()> {
    println!("Loading program from {}...", path.display());
    let program = loader::load_program(path)?;
    println!("Loaded {} instructions.", program.len());

    println!("Starting {} shots (Parallel - Rayon)...", shots);
    let start = Instant::now();

    let stats = (0..shots)
        .into_par_iter()
        .map(|shot| -> Result<ShotStats> {
            let mut cpu = machine.boot(program.clone(), shot)?;
            let outcome = cpu
                .run()
                .with_context(|| format!("Shot {} failed", shot))?;
            let (cycles, halted) = match outcome {
                RunOutcome::Halted { cycles } => (cycles, true),
                RunOutcome::CycleLimit { cycles } => (cycles, false),
            };
            let mut local = ShotStats::new();
            local.update(cpu.msmt_results(), cycles, halted);
            Ok(local)
        })
        .try_reduce(ShotStats::new, |a, b| Ok(a.merge(b)))?;

    let seconds = start.elapsed().as_secs_f64();
    println!("Time: {:.4} s", seconds);
    println!("Throughput: {:.2} shots/s", shots as f64 / seconds);
    stats.print_report();
    Ok(())
}
