//! Processor configuration.
//!
//! Sizes of every architectural resource plus the start address and the
//! cycle bound, defaulting to the shared architectural constants.

use cactus_common::config::*;

/// Sizes of the architectural resources and execution limits of one processor.
///
/// The default is the reference machine described by the shared
/// constants: 32 x 32-bit GPRs and FPRs, 32 single-qubit and 64 two-qubit
/// target registers, 7 qubits, 4 MiB of data memory and room for one
/// million instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Maximum program length accepted by `upload_program`.
    pub insn_mem_size: usize,

    /// Data memory size in bytes. Preserved across `reset`.
    pub data_mem_size: usize,

    pub num_gpr: usize,
    pub gpr_width: u32,
    pub num_fpr: usize,
    pub fpr_width: u32,
    pub num_sq_qotr: usize,
    pub num_tq_qotr: usize,

    /// Entries per target register (qubits or qubit pairs).
    pub qotr_capacity: usize,

    /// Qubits driven by the backend; bounds every target-register entry
    /// and the measurement-result array.
    pub num_qubits: usize,

    /// `run` returns `RunOutcome::CycleLimit` once this many cycles executed.
    pub max_cycles: u64,

    /// Program counter value after reset and restart.
    pub start_addr: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            insn_mem_size: SIZE_INSN_MEM,
            data_mem_size: SIZE_DATA_MEM,
            num_gpr: NUM_GPR,
            gpr_width: GPR_WIDTH,
            num_fpr: NUM_FPR,
            fpr_width: FPR_WIDTH,
            num_sq_qotr: NUM_SQ_QOTR,
            num_tq_qotr: NUM_TQ_QOTR,
            qotr_capacity: QOTR_CAPACITY,
            num_qubits: NUM_QUBIT,
            max_cycles: MAX_EXEC_CYCLES,
            start_addr: 0,
        }
    }
}
