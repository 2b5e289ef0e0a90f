//! Execution core of the eQASM quantum control processor simulator.
//!
//! This crate provides the architectural state of the control processor
//! (register files, data memory, target registers, condition flags), the
//! program loader and the fetch-decode-execute engine. Quantum operations
//! are forwarded to an external qubit-state backend through the
//! `QuantumBackend` trait; several reference backends are bundled.

use thiserror::Error;

/// Interface to the qubit-state backend and bundled reference backends.
///
/// The engine resolves every micro-operation of a quantum bundle to qubit
/// indices and hands them to a backend implementing `QuantumBackend`. The
/// backend is treated as an opaque, synchronous oracle.
pub mod backend;

/// Processor configuration.
///
/// Collects the sizes of every architectural resource together with the
/// execution bound and start address. Defaults come from the shared
/// architectural constants.
pub mod config;

/// Condition-flag vector recomputed by `CMP`.
pub mod flags;

/// Flat byte-addressable data memory with little-endian word accessors.
pub mod memory;

/// The quantum control processor: program loader and execution engine.
///
/// Owns all architectural state exclusively and advances it one instruction
/// per cycle. A run ends on `STOP` or when the configured cycle bound is
/// reached.
pub mod processor;

/// Quantum operation target registers loaded by `SMIS` and `SMIT`.
pub mod qotr;

/// General purpose and floating point register files.
///
/// Both files are compositions of one fixed-width cell bank; the integer
/// and float interpretations are provided by the wrappers.
pub mod regfile;

/// Fixed-width bit cell values and their integer and float operations.
pub mod value;

pub use backend::QuantumBackend;
pub use config::ProcessorConfig;
pub use processor::{Processor, RunOutcome};
pub use value::Value;

/// Runtime data errors raised by register files, memory and target registers.
///
/// These indicate a malformed instruction stream that passed loading, or a
/// backend that broke its contract. They are fatal: the instruction that hit
/// one does not complete and execution stops.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// A value of one width was combined with or written into a cell of another.
    #[error("width mismatch: expected a {expected}-bit value, found {found} bits")]
    WidthMismatch { expected: u32, found: u32 },

    /// An integer does not fit in the requested cell width.
    #[error("value {value} does not fit in {width} bits")]
    ValueOutOfRange { value: i128, width: u32 },

    /// A float view was requested on a cell that is not 32 bits wide.
    #[error("single-precision view requires a 32-bit cell, found {0} bits")]
    UnsupportedFloatWidth(u32),

    /// A bit-field range lies outside the cell.
    #[error("bit field [{start}, {end}) lies outside a {width}-bit cell")]
    FieldOutOfRange { start: usize, end: usize, width: u32 },

    /// A register index beyond the end of its register file.
    #[error("register {class}{index} does not exist ({count} registers)")]
    RegisterOutOfRange {
        class: &'static str,
        index: usize,
        count: usize,
    },

    /// A data memory access outside the memory bounds.
    #[error("address {addr} is outside data memory of {size} bytes")]
    AddressOutOfRange { addr: i64, size: usize },

    /// A target register was loaded with an empty list.
    #[error("target register {class}{index} cannot be loaded with an empty list")]
    EmptyTargetList { class: &'static str, index: usize },

    /// A target register list exceeds the register capacity.
    #[error("target register {class}{index} holds at most {capacity} entries, got {len}")]
    TargetListTooLong {
        class: &'static str,
        index: usize,
        len: usize,
        capacity: usize,
    },

    /// A target register list names the same qubit or pair twice.
    #[error("target register {class}{index} lists an entry twice")]
    DuplicateTarget { class: &'static str, index: usize },

    /// A two-qubit target pair uses the same qubit on both sides.
    #[error("qubit pair ({0}, {0}) addresses a single qubit")]
    DegeneratePair(usize),

    /// A qubit index at or beyond the number of qubits.
    #[error("qubit {qubit} does not exist ({num_qubits} qubits)")]
    QubitOutOfRange { qubit: usize, num_qubits: usize },

    /// A bundle referenced a target register that was never loaded.
    #[error("target register {class}{index} has not been set")]
    UndefinedTargetRegister { class: &'static str, index: usize },

    /// The backend returned a measurement outcome other than 0 or 1.
    #[error("backend returned measurement outcome {outcome} for qubit {qubit}")]
    InvalidMeasurement { qubit: usize, outcome: u32 },

    #[error("integer division by zero")]
    DivideByZero,
}

/// Errors that terminate execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The instruction at `pc` raised a runtime data error.
    #[error("cycle {cycle}, pc {pc}: {source}")]
    Fault {
        pc: usize,
        cycle: u64,
        #[source]
        source: DataError,
    },

    /// The program counter left instruction memory without reaching `STOP`.
    #[error("pc {pc} is outside instruction memory ({len} instructions)")]
    PcOutOfRange { pc: usize, len: usize },

    /// A branch named a label that the label table does not contain.
    ///
    /// Only reachable for programs built through `append_insn`, which
    /// does not validate branch targets.
    #[error("pc {pc}: branch to undefined label '{label}'")]
    UndefinedLabel { pc: usize, label: String },
}

/// Errors that reject a program upload. The processor state is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("program has {len} instructions, instruction memory holds {capacity}")]
    ProgramTooLarge { len: usize, capacity: usize },

    #[error("instruction {index} branches to undefined label '{label}'")]
    UndefinedLabel { index: usize, label: String },

    #[error("label '{label}' is defined more than once")]
    DuplicateLabel { label: String },
}
