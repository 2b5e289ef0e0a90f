//! Common definitions shared across the quantum control processor simulator.
//!
//! This crate provides the architectural size constants of the control
//! processor and the instruction set data model produced by the assembler
//! and consumed by the execution engine. It carries no behaviour beyond
//! construction and disassembly so that it can be shared by every other
//! crate in the workspace.

#![no_std]

extern crate alloc;

// Architectural dimensions of the quantum control processor.
//
// These values describe the default machine: how many registers of each
// class exist, how wide they are, how much instruction and data memory is
// available and how many qubits the attached backend drives. They are the
// defaults used to build a processor configuration and can be overridden at
// construction time.
pub mod config {
    /// Number of instruction slots in the instruction memory.
    ///
    /// Programs longer than this are rejected at upload time. One million
    /// slots is far beyond any realistic eQASM kernel, so the bound mainly
    /// protects against runaway program generators.
    pub const SIZE_INSN_MEM: usize = 1_000_000;

    /// Width of a data memory address in bits.
    pub const MEM_ADDR_WIDTH: u32 = 22;

    /// Size of the byte-addressable data memory (4 MiB).
    pub const SIZE_DATA_MEM: usize = 1 << MEM_ADDR_WIDTH;

    /// Number of general purpose registers.
    pub const NUM_GPR: usize = 32;

    /// Width of a general purpose register in bits.
    pub const GPR_WIDTH: u32 = 32;

    /// Number of floating point registers.
    pub const NUM_FPR: usize = 32;

    /// Width of a floating point register in bits (IEEE-754 single precision).
    pub const FPR_WIDTH: u32 = 32;

    /// Number of single-qubit operation target registers (`s0..s31`).
    pub const NUM_SQ_QOTR: usize = 32;

    /// Number of two-qubit operation target registers (`t0..t63`).
    pub const NUM_TQ_QOTR: usize = 64;

    /// Maximum number of entries held by one target register.
    ///
    /// Applies to the qubit list of a single-qubit register and to the
    /// qubit-pair list of a two-qubit register alike.
    pub const QOTR_CAPACITY: usize = 32;

    /// Number of qubits driven by the quantum backend.
    pub const NUM_QUBIT: usize = 7;

    /// Default bound on executed cycles before `run` gives up.
    pub const MAX_EXEC_CYCLES: u64 = 1_000_000;
}

/// Instruction set definitions for the eQASM control processor.
///
/// Defines the condition flags, the per-class operation selectors and the
/// tagged `Operation` sum type that every assembled instruction is made of.
/// Each variant only carries the operand fields its opcode needs.
pub mod isa;
