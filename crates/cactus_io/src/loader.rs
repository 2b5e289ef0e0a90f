use crate::parser::{ParseOutcome, parse};
use anyhow::{Context, Result, bail};
use cactus_common::isa::Instruction;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Reads and parses an eQASM source file.
///
/// Lexical errors and I/O failures are returned as errors. Syntax errors
/// are not: they are reported in the returned outcome so the caller can
/// print every diagnostic.
///
/// # Arguments
///
/// * `path` - Path to the `.eqasm` source file
///
/// # Returns
///
/// The parse outcome, or an error if the file cannot be read or lexed.
pub fn read_source<P: AsRef<Path>>(path: P) -> Result<ParseOutcome> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read eQASM file {}", path.display()))?;
    let outcome = parse(&source).with_context(|| format!("Failed to lex {}", path.display()))?;
    Ok(outcome)
}

/// Reads an eQASM source file and returns its instructions, failing on
/// any syntax diagnostic.
pub fn load_program<P: AsRef<Path>>(path: P) -> Result<Vec<Instruction>> {
    let path = path.as_ref();
    let outcome = read_source(path)?;
    if !outcome.success() {
        let messages: Vec<String> = outcome.errors.iter().map(|e| e.to_string()).collect();
        bail!(
            "{} syntax error(s) in {}:\n{}",
            messages.len(),
            path.display(),
            messages.join("\n")
        );
    }
    Ok(outcome.instructions)
}

/// Loads a raw data-memory image. Byte `i` of the file lands at address `i`.
pub fn load_memory_image<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let mut file = File::open(path).context("Failed to open memory image")?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    log::info!("memory image: {} bytes", buffer.len());
    Ok(buffer)
}

/// Writes the canonical listing of `instructions`, one per line.
///
/// The listing parses back to the same instructions and labels.
pub fn write_listing<P: AsRef<Path>>(path: P, instructions: &[Instruction]) -> Result<()> {
    let mut file = File::create(path).context("Failed to create listing file")?;
    for insn in instructions {
        writeln!(file, "{}", insn)?;
    }
    Ok(())
}
