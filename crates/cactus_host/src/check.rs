use anyhow::{Context, Result, bail};
use cactus_core::backend::IdealBackend;
use cactus_core::{Processor, ProcessorConfig};
use cactus_io::loader;
use std::path::Path;

/// Assembles a program without running it.
///
/// Prints every syntax diagnostic, then validates the program against the
/// loader (capacity, duplicate labels, branch targets) and optionally
/// writes the canonical listing.
pub fn check_program(path: &Path, emit: Option<&Path>) -> Result<()> {
    let outcome = loader::read_source(path)?;
    for e in &outcome.errors {
        eprintln!("{}: {}", path.display(), e);
    }
    if !outcome.success() {
        bail!("{} syntax error(s) in {}", outcome.errors.len(), path.display());
    }

    let config = ProcessorConfig {
        data_mem_size: 0,
        ..ProcessorConfig::default()
    };
    let mut cpu = Processor::new(config, IdealBackend);
    cpu.upload_program(outcome.instructions.clone())
        .with_context(|| format!("{} does not load", path.display()))?;

    println!(
        "{}: {} instructions, {} labels",
        path.display(),
        outcome.instructions.len(),
        outcome.labels.len()
    );
    for (label, index) in &outcome.labels {
        println!("  {:>6}  {}", index, label);
    }

    if let Some(out) = emit {
        loader::write_listing(out, &outcome.instructions)?;
        println!("Listing written to {}", out.display());
    }
    Ok(())
}
