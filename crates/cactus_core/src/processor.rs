//! Quantum control processor: program loader and execution engine.
//!
//! Implements the fetch-decode-execute loop of the eQASM control processor.
//! Each cycle fetches the instruction at the program counter, updates the
//! register files, data memory and condition flags, dispatches quantum
//! bundles to the backend and redirects or advances the program counter.
//! State after cycle N depends only on the state after cycle N-1 and the
//! instruction executed, so replaying a program against a deterministic
//! backend reproduces the same trace.

use crate::backend::QuantumBackend;
use crate::config::ProcessorConfig;
use crate::flags::FlagVector;
use crate::memory::DataMemory;
use crate::qotr::TargetRegisters;
use crate::regfile::{Fpr, Gpr};
use crate::value::Value;
use crate::{DataError, ExecError, LoadError};
use cactus_common::isa::{
    AluOp, FcmpOp, FpuOp, Instruction, LoadOp, Operation, QuantumOp, QubitTarget, StoreOp,
};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// How a call to `run` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A `STOP` instruction executed.
    Halted { cycles: u64 },
    /// The configured cycle bound was reached first.
    CycleLimit { cycles: u64 },
}

/// Where the program counter goes after an instruction.
enum Flow<'a> {
    Next,
    Branch(&'a str),
    Stop,
}

/// Architectural state mutated by instruction execution.
///
/// Kept apart from instruction memory so that an instruction can be
/// borrowed from the program while the state is updated.
struct ArchState {
    gpr: Gpr,
    fpr: Fpr,
    qotr: TargetRegisters,
    memory: DataMemory,
    flags: FlagVector,
    msmt_result: Vec<u32>,
    pc: usize,
    cycle: u64,
    stopped: bool,
}

/// The eQASM quantum control processor.
///
/// Owns the instruction memory, the label table, every register file, the
/// data memory and the backend. One caller drives it; every operation runs
/// to completion before returning.
///
/// # Type Parameters
///
/// * `B` - Qubit-state backend receiving the gates and measurements of
///   quantum bundles
pub struct Processor<B: QuantumBackend> {
    config: ProcessorConfig,
    insn_mem: Vec<Instruction>,
    label_addr: HashMap<String, usize>,
    state: ArchState,
    backend: B,
    verbose: bool,
}

impl<B: QuantumBackend> Processor<B> {
    /// Creates a processor with empty instruction memory and zeroed state.
    ///
    /// # Panics
    ///
    /// Panics if `config.gpr_width` or `config.fpr_width` is not in
    /// `1..=64`.
    pub fn new(config: ProcessorConfig, backend: B) -> Self {
        let state = ArchState {
            gpr: Gpr::new(config.num_gpr, config.gpr_width),
            fpr: Fpr::new(config.num_fpr, config.fpr_width),
            qotr: TargetRegisters::new(
                config.num_sq_qotr,
                config.num_tq_qotr,
                config.qotr_capacity,
                config.num_qubits,
            ),
            memory: DataMemory::new(config.data_mem_size),
            flags: FlagVector::new(),
            msmt_result: vec![0; config.num_qubits],
            pc: config.start_addr,
            cycle: 0,
            stopped: false,
        };
        Self {
            config,
            insn_mem: Vec::new(),
            label_addr: HashMap::new(),
            state,
            backend,
            verbose: false,
        }
    }

    /// Clears everything except data memory: program, labels, registers,
    /// target registers, flags, measurement results and the run counters.
    pub fn reset(&mut self) {
        self.restart();
        self.insn_mem.clear();
        self.label_addr.clear();
        self.state.gpr.clear();
        self.state.fpr.clear();
        self.state.qotr.clear();
        log::info!("processor reset");
    }

    /// Rewinds the loaded program: clears the program counter, cycle
    /// counter, stop flag, condition flags and measurement results while
    /// keeping the program, registers and data memory.
    pub fn restart(&mut self) {
        let s = &mut self.state;
        s.stopped = false;
        s.cycle = 0;
        s.pc = self.config.start_addr;
        s.msmt_result.fill(0);
        s.flags = FlagVector::new();
    }

    /// Validates and installs a program.
    ///
    /// Rejects programs longer than the instruction memory, programs whose
    /// instructions carry the same label twice and programs with a `BR`
    /// to a label that no instruction carries. A rejected program leaves
    /// the processor untouched; an accepted one resets it first.
    pub fn upload_program(&mut self, insns: Vec<Instruction>) -> Result<(), LoadError> {
        if insns.len() > self.config.insn_mem_size {
            return Err(LoadError::ProgramTooLarge {
                len: insns.len(),
                capacity: self.config.insn_mem_size,
            });
        }

        let label_addr = build_label_table(&insns)?;
        for (index, insn) in insns.iter().enumerate() {
            if let Some(label) = insn.branch_target() {
                if !label_addr.contains_key(label) {
                    return Err(LoadError::UndefinedLabel {
                        index,
                        label: label.to_string(),
                    });
                }
            }
        }

        self.reset();
        log::info!(
            "uploaded program: {} instructions, {} labels",
            insns.len(),
            label_addr.len()
        );
        self.insn_mem = insns;
        self.label_addr = label_addr;
        Ok(())
    }

    /// Appends one instruction to the loaded program.
    ///
    /// Rejects a label already defined anywhere in the program. Branch
    /// targets are not checked, so forward references work; a branch to a
    /// label that never appears fails when it executes.
    pub fn append_insn(&mut self, insn: Instruction) -> Result<(), LoadError> {
        if self.insn_mem.len() >= self.config.insn_mem_size {
            return Err(LoadError::ProgramTooLarge {
                len: self.insn_mem.len() + 1,
                capacity: self.config.insn_mem_size,
            });
        }
        for (i, label) in insn.labels.iter().enumerate() {
            if self.label_addr.contains_key(label) || insn.labels[..i].contains(label) {
                return Err(LoadError::DuplicateLabel {
                    label: label.clone(),
                });
            }
        }

        let index = self.insn_mem.len();
        for label in &insn.labels {
            self.label_addr.insert(label.clone(), index);
        }
        self.insn_mem.push(insn);
        log::debug!("insn mem size: {}", self.insn_mem.len());
        Ok(())
    }

    /// Executes the instruction at the program counter.
    ///
    /// Does nothing once the processor has halted. A runtime error leaves
    /// the program counter on the faulting instruction. A taken branch whose
    /// label is missing from the label table is an error; an untaken one
    /// falls through.
    pub fn advance_one_cycle(&mut self) -> Result<(), ExecError> {
        if self.state.stopped {
            return Ok(());
        }

        let pc = self.state.pc;
        let insn = self.insn_mem.get(pc).ok_or(ExecError::PcOutOfRange {
            pc,
            len: self.insn_mem.len(),
        })?;
        self.state.cycle += 1;
        if self.verbose {
            log::info!("cycle {}: pc {}: {}", self.state.cycle, pc, insn);
        } else {
            log::trace!("cycle {}: pc {}: {}", self.state.cycle, pc, insn);
        }

        let cycle = self.state.cycle;
        let flow = self
            .state
            .execute(&insn.op, &mut self.backend)
            .map_err(|source| ExecError::Fault { pc, cycle, source })?;

        self.state.pc = match flow {
            Flow::Next => pc + 1,
            Flow::Stop => {
                self.state.stopped = true;
                pc + 1
            }
            Flow::Branch(label) => {
                self.label_addr
                    .get(label)
                    .copied()
                    .ok_or_else(|| ExecError::UndefinedLabel {
                        pc,
                        label: label.to_string(),
                    })?
            }
        };
        Ok(())
    }

    /// Runs until `STOP` or until `max_cycles` cycles have executed in total.
    pub fn run(&mut self) -> Result<RunOutcome, ExecError> {
        while !self.state.stopped {
            if self.state.cycle >= self.config.max_cycles {
                log::warn!(
                    "cycle limit of {} reached at pc {}",
                    self.config.max_cycles,
                    self.state.pc
                );
                return Ok(RunOutcome::CycleLimit {
                    cycles: self.state.cycle,
                });
            }
            self.advance_one_cycle()?;
        }
        Ok(RunOutcome::Halted {
            cycles: self.state.cycle,
        })
    }

    /// Overrides the cycle bound used by `run`.
    pub fn set_max_cycles(&mut self, max_cycles: u64) {
        self.config.max_cycles = max_cycles;
    }

    /// Logs every executed instruction at info level instead of trace.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Configuration the processor was built with.
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Index of the next instruction to fetch.
    pub fn pc(&self) -> usize {
        self.state.pc
    }

    /// Cycles executed since the last reset or restart.
    pub fn cycle(&self) -> u64 {
        self.state.cycle
    }

    /// Whether `STOP` has executed.
    pub fn is_halted(&self) -> bool {
        self.state.stopped
    }

    /// The loaded program.
    pub fn instructions(&self) -> &[Instruction] {
        &self.insn_mem
    }

    /// Instruction index a label resolves to.
    pub fn label_addr(&self, label: &str) -> Option<usize> {
        self.label_addr.get(label).copied()
    }

    /// General purpose register file.
    pub fn gpr(&self) -> &Gpr {
        &self.state.gpr
    }

    /// Mutable general purpose register file.
    pub fn gpr_mut(&mut self) -> &mut Gpr {
        &mut self.state.gpr
    }

    /// Floating-point register file.
    pub fn fpr(&self) -> &Fpr {
        &self.state.fpr
    }

    /// Mutable floating-point register file.
    pub fn fpr_mut(&mut self) -> &mut Fpr {
        &mut self.state.fpr
    }

    /// Single- and two-qubit target registers.
    pub fn qotr(&self) -> &TargetRegisters {
        &self.state.qotr
    }

    /// Data memory.
    pub fn memory(&self) -> &DataMemory {
        &self.state.memory
    }

    /// Mutable data memory, e.g. to preload an image before running.
    pub fn memory_mut(&mut self) -> &mut DataMemory {
        &mut self.state.memory
    }

    /// Full copy of the data memory.
    pub fn data_memory_snapshot(&self) -> Vec<u8> {
        self.state.memory.snapshot().to_vec()
    }

    /// Condition flags as left by the last `CMP`.
    pub fn flags(&self) -> &FlagVector {
        &self.state.flags
    }

    /// Latest measurement outcome per qubit, 0 before any measurement.
    pub fn msmt_results(&self) -> &[u32] {
        &self.state.msmt_result
    }

    /// Mutable measurement results.
    pub fn msmt_results_mut(&mut self) -> &mut [u32] {
        &mut self.state.msmt_result
    }

    /// The qubit-state backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable qubit-state backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

/// Maps every label to the index of the instruction carrying it.
fn build_label_table(insns: &[Instruction]) -> Result<HashMap<String, usize>, LoadError> {
    let mut table = HashMap::new();
    for (index, insn) in insns.iter().enumerate() {
        for label in &insn.labels {
            match table.entry(label.clone()) {
                Entry::Occupied(_) => {
                    return Err(LoadError::DuplicateLabel {
                        label: label.clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(index);
                }
            }
        }
    }
    Ok(table)
}

impl ArchState {
    fn execute<'a, B: QuantumBackend>(
        &mut self,
        op: &'a Operation,
        backend: &mut B,
    ) -> Result<Flow<'a>, DataError> {
        let width = self.gpr.width();
        match op {
            Operation::Stop => return Ok(Flow::Stop),

            Operation::Nop | Operation::Qwait { .. } => {}

            Operation::Qwaitr { rs } => {
                self.gpr.read(*rs)?;
            }

            Operation::Smis { si, qubits } => self.qotr.set_sq_reg(*si, qubits)?,

            Operation::Smit { ti, pairs } => self.qotr.set_tq_reg(*ti, pairs)?,

            Operation::Not { rd, rt } => {
                let v = self.gpr.read(*rt)?.not();
                self.gpr.write(*rd, v)?;
            }

            Operation::Cmp { rs, rt } => {
                let a = self.gpr.read(*rs)?;
                let b = self.gpr.read(*rt)?;
                self.flags.update_from_compare(&a, &b);
            }

            Operation::Br { flag, target } => {
                if self.flags.get(*flag) {
                    return Ok(Flow::Branch(target));
                }
            }

            Operation::Fbr { flag, rd } => {
                let v = Value::from_unsigned(self.flags.get(*flag) as u64, width)?;
                self.gpr.write(*rd, v)?;
            }

            Operation::Fmr { rd, qs } => {
                let outcome = *self.msmt_result.get(*qs).ok_or(DataError::QubitOutOfRange {
                    qubit: *qs,
                    num_qubits: self.msmt_result.len(),
                })?;
                self.gpr.write(*rd, Value::from_unsigned(outcome as u64, width)?)?;
            }

            Operation::Ldi { rd, imm } => {
                self.gpr.write(*rd, Value::from_signed(*imm as i64, width)?)?;
            }

            Operation::Ldui { rd, rs, imm } => {
                let low = self.gpr.read(*rs)?;
                let composed = low.splice(17..32, *imm as u64)?;
                self.gpr.write(*rd, composed)?;
            }

            Operation::Alu { op, rd, rs, rt } => {
                let a = self.gpr.read(*rs)?;
                let b = self.gpr.read(*rt)?;
                let v = match op {
                    AluOp::Add => a.wrapping_add(&b)?,
                    AluOp::Sub => a.wrapping_sub(&b)?,
                    AluOp::And => a.and(&b)?,
                    AluOp::Or => a.or(&b)?,
                    AluOp::Xor => a.xor(&b)?,
                    AluOp::Mul => a.wrapping_mul(&b)?,
                    AluOp::Div => a.signed_div(&b)?,
                    AluOp::Rem => a.signed_rem(&b)?,
                };
                self.gpr.write(*rd, v)?;
            }

            Operation::Load { op, rd, rt, offset } => {
                let addr = self.address(*rt, *offset)?;
                let v = match op {
                    LoadOp::Lw => Value::word(self.memory.read_word(addr)?),
                    LoadOp::Lb => Value::byte(self.memory.read_byte(addr)?).sign_extend(width)?,
                    LoadOp::Lbu => Value::byte(self.memory.read_byte(addr)?).zero_extend(width)?,
                };
                self.gpr.write(*rd, v)?;
            }

            Operation::Store { op, rs, rt, offset } => {
                let addr = self.address(*rt, *offset)?;
                let v = self.gpr.read(*rs)?;
                match op {
                    StoreOp::Sw => self.memory.write_word(addr, v.as_word()?)?,
                    StoreOp::Sb => self.memory.write_byte(addr, v.truncate(8).unsigned() as u8)?,
                }
            }

            Operation::FcvtWS { rd, fs } => {
                // saturating, NaN converts to 0
                let v = self.fpr.read_f32(*fs)? as i32;
                self.gpr.write(*rd, Value::from_signed(v as i64, width)?)?;
            }

            Operation::FcvtSW { fd, rs } => {
                let v = self.gpr.read_signed(*rs)? as f32;
                self.fpr.write_f32(*fd, v)?;
            }

            Operation::Flw { fd, rt, offset } => {
                let addr = self.address(*rt, *offset)?;
                self.fpr.write(*fd, Value::word(self.memory.read_word(addr)?))?;
            }

            Operation::Fsw { fs, rt, offset } => {
                let addr = self.address(*rt, *offset)?;
                let v = self.fpr.read(*fs)?;
                self.memory.write_word(addr, v.as_word()?)?;
            }

            Operation::Fpu { op, fd, fs, ft } => {
                let a = self.fpr.read(*fs)?;
                let b = self.fpr.read(*ft)?;
                let v = match op {
                    FpuOp::Add => a.float_op(&b, |x, y| x + y)?,
                    FpuOp::Sub => a.float_op(&b, |x, y| x - y)?,
                    FpuOp::Mul => a.float_op(&b, |x, y| x * y)?,
                    FpuOp::Div => a.float_op(&b, |x, y| x / y)?,
                };
                self.fpr.write(*fd, v)?;
            }

            Operation::Fcmp { op, rd, fs, ft } => {
                let a = self.fpr.read_f32(*fs)?;
                let b = self.fpr.read_f32(*ft)?;
                let result = match op {
                    FcmpOp::Eq => a == b,
                    FcmpOp::Lt => a < b,
                    FcmpOp::Le => a <= b,
                };
                self.gpr.write(*rd, Value::from_unsigned(result as u64, width)?)?;
            }

            Operation::Bundle { ops, .. } => self.issue_bundle(ops, backend)?,
        }
        Ok(Flow::Next)
    }

    /// Effective address `unsigned(rt) + offset`; bounds are checked by the memory.
    fn address(&self, rt: usize, offset: i32) -> Result<usize, DataError> {
        let addr = self.gpr.read_unsigned(rt)? as i64 + offset as i64;
        usize::try_from(addr).map_err(|_| DataError::AddressOutOfRange {
            addr,
            size: self.memory.size(),
        })
    }

    /// Resolves every micro-operation to qubits, then issues the backend calls.
    ///
    /// All target registers are resolved before the first call so that a bad
    /// register aborts the bundle without any side effect on the backend.
    fn issue_bundle<B: QuantumBackend>(
        &mut self,
        ops: &[QuantumOp],
        backend: &mut B,
    ) -> Result<(), DataError> {
        let mut resolved: Vec<(&QuantumOp, Vec<(usize, Option<usize>)>)> =
            Vec::with_capacity(ops.len());
        for op in ops {
            let targets = match op.target {
                QubitTarget::None => Vec::new(),
                QubitTarget::Single(si) => self
                    .qotr
                    .read_sq_reg(si)?
                    .iter()
                    .map(|&q| (q, None))
                    .collect(),
                QubitTarget::Pair(ti) => self
                    .qotr
                    .read_tq_reg(ti)?
                    .iter()
                    .map(|&(a, b)| (a, Some(b)))
                    .collect(),
            };
            resolved.push((op, targets));
        }

        for (op, targets) in resolved {
            for (a, b) in targets {
                if op.is_measurement() {
                    self.measure(backend, a)?;
                    if let Some(b) = b {
                        self.measure(backend, b)?;
                    }
                } else {
                    match b {
                        None => backend.apply_single_qubit_gate(&op.name, a),
                        Some(b) => backend.apply_two_qubit_gate(&op.name, a, b),
                    }
                }
            }
        }
        Ok(())
    }

    fn measure<B: QuantumBackend>(&mut self, backend: &mut B, qubit: usize) -> Result<(), DataError> {
        let outcome = backend.measure_qubit(qubit);
        if outcome > 1 {
            return Err(DataError::InvalidMeasurement { qubit, outcome });
        }
        self.msmt_result[qubit] = outcome;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, RecordingBackend};
    use cactus_common::isa::CmpFlag;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn machine() -> Processor<RecordingBackend> {
        let config = ProcessorConfig {
            data_mem_size: 256,
            max_cycles: 1_000,
            ..ProcessorConfig::default()
        };
        Processor::new(config, RecordingBackend::new())
    }

    fn program(ops: Vec<Operation>) -> Vec<Instruction> {
        ops.into_iter().map(Instruction::new).collect()
    }

    fn run_ops(ops: Vec<Operation>) -> Processor<RecordingBackend> {
        let mut p = machine();
        p.upload_program(program(ops)).unwrap();
        assert!(matches!(p.run().unwrap(), RunOutcome::Halted { .. }));
        p
    }

    fn ldi(rd: usize, imm: i32) -> Operation {
        Operation::Ldi { rd, imm }
    }

    fn alu(op: AluOp, rd: usize, rs: usize, rt: usize) -> Operation {
        Operation::Alu { op, rd, rs, rt }
    }

    #[test]
    fn add_wraps_modulo_word() {
        let p = run_ops(vec![
            ldi(1, i32::MAX),
            alu(AluOp::Add, 2, 1, 1),
            Operation::Stop,
        ]);
        assert_eq!(p.gpr().read_signed(2).unwrap(), -2);
        assert_eq!(p.cycle(), 3);
        assert_eq!(p.pc(), 3);
        assert!(p.is_halted());
    }

    #[test]
    fn compare_sets_signed_and_unsigned_flags() {
        let p = run_ops(vec![
            ldi(1, -1),
            ldi(2, 1),
            Operation::Cmp { rs: 1, rt: 2 },
            Operation::Fbr { flag: CmpFlag::Lt, rd: 3 },
            Operation::Fbr { flag: CmpFlag::Gtu, rd: 4 },
            Operation::Fbr { flag: CmpFlag::Eq, rd: 5 },
            Operation::Fbr { flag: CmpFlag::Always, rd: 6 },
            Operation::Stop,
        ]);
        assert_eq!(p.gpr().read_unsigned(3).unwrap(), 1);
        assert_eq!(p.gpr().read_unsigned(4).unwrap(), 1);
        assert_eq!(p.gpr().read_unsigned(5).unwrap(), 0);
        assert_eq!(p.gpr().read_unsigned(6).unwrap(), 1);
        assert!(!p.flags().get(CmpFlag::Never));
    }

    #[test]
    fn ldi_ldui_compose_word() {
        let p = run_ops(vec![
            ldi(1, 0x15577),
            Operation::Ldui { rd: 1, rs: 1, imm: 0x7F88 },
            Operation::Stop,
        ]);
        assert_eq!(p.gpr().read_unsigned(1).unwrap(), 0xFF11_5577);
    }

    #[test]
    fn byte_stores_and_loads() {
        let p = run_ops(vec![
            ldi(1, 0xF1),
            Operation::Store { op: StoreOp::Sb, rs: 1, rt: 0, offset: 0 },
            Operation::Store { op: StoreOp::Sb, rs: 1, rt: 0, offset: 1 },
            Operation::Store { op: StoreOp::Sb, rs: 1, rt: 0, offset: 2 },
            Operation::Load { op: LoadOp::Lw, rd: 2, rt: 0, offset: 0 },
            Operation::Load { op: LoadOp::Lb, rd: 3, rt: 0, offset: 0 },
            Operation::Load { op: LoadOp::Lbu, rd: 4, rt: 0, offset: 0 },
            Operation::Stop,
        ]);
        assert_eq!(p.gpr().read_unsigned(2).unwrap(), 0x00F1_F1F1);
        assert_eq!(p.gpr().read_unsigned(3).unwrap(), 0xFFFF_FFF1);
        assert_eq!(p.gpr().read_unsigned(4).unwrap(), 0xF1);
        assert_eq!(&p.data_memory_snapshot()[..4], &[0xF1, 0xF1, 0xF1, 0x00]);
    }

    #[test]
    fn word_store_uses_base_plus_offset() {
        let p = run_ops(vec![
            ldi(1, 0x1234_5678),
            ldi(2, 16),
            Operation::Store { op: StoreOp::Sw, rs: 1, rt: 2, offset: -8 },
            Operation::Load { op: LoadOp::Lw, rd: 3, rt: 0, offset: 8 },
            Operation::Stop,
        ]);
        assert_eq!(p.memory().slice(8, 4).unwrap(), &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(p.gpr().read_unsigned(3).unwrap(), 0x1234_5678);
    }

    #[test]
    fn negative_address_faults() {
        let mut p = machine();
        p.upload_program(program(vec![
            Operation::Load { op: LoadOp::Lw, rd: 1, rt: 0, offset: -4 },
            Operation::Stop,
        ]))
        .unwrap();
        assert!(matches!(
            p.run(),
            Err(ExecError::Fault {
                pc: 0,
                source: DataError::AddressOutOfRange { addr: -4, size: 256 },
                ..
            })
        ));
    }

    #[test]
    fn not_inverts_every_bit() {
        let p = run_ops(vec![ldi(1, 0xf0f0), Operation::Not { rd: 2, rt: 1 }, Operation::Stop]);
        assert_eq!(p.gpr().read_unsigned(2).unwrap(), 0xFFFF_0F0F);
    }

    #[test]
    fn division_truncates_and_faults_on_zero() {
        let p = run_ops(vec![
            ldi(1, -7),
            ldi(2, 2),
            alu(AluOp::Div, 3, 1, 2),
            alu(AluOp::Rem, 4, 1, 2),
            alu(AluOp::Mul, 5, 1, 2),
            Operation::Stop,
        ]);
        assert_eq!(p.gpr().read_signed(3).unwrap(), -3);
        assert_eq!(p.gpr().read_signed(4).unwrap(), -1);
        assert_eq!(p.gpr().read_signed(5).unwrap(), -14);

        let mut p = machine();
        p.upload_program(program(vec![ldi(1, 3), alu(AluOp::Div, 2, 1, 0), Operation::Stop]))
            .unwrap();
        let err = p.run().unwrap_err();
        assert_eq!(
            err,
            ExecError::Fault {
                pc: 1,
                cycle: 2,
                source: DataError::DivideByZero
            }
        );
        assert_eq!(p.pc(), 1);
        assert!(!p.is_halted());
    }

    #[test]
    fn infinite_loop_hits_cycle_limit() {
        let mut p = machine();
        p.set_max_cycles(50);
        p.upload_program(vec![
            Instruction::new(Operation::Nop),
            Instruction::labelled(
                "loop",
                Operation::Br { flag: CmpFlag::Always, target: "loop".into() },
            ),
        ])
        .unwrap();
        assert_eq!(p.run().unwrap(), RunOutcome::CycleLimit { cycles: 50 });
        assert_eq!(p.pc(), 1);
        assert_eq!(p.label_addr("loop"), Some(1));
    }

    #[test]
    fn counted_loop_branches_back() {
        // r1 counts down from 5, r2 accumulates
        let mut p = machine();
        p.upload_program(vec![
            Instruction::new(ldi(1, 5)),
            Instruction::new(ldi(3, 1)),
            Instruction::labelled("top", alu(AluOp::Add, 2, 2, 1)),
            Instruction::new(alu(AluOp::Sub, 1, 1, 3)),
            Instruction::new(Operation::Cmp { rs: 1, rt: 0 }),
            Instruction::new(Operation::Br { flag: CmpFlag::Ne, target: "top".into() }),
            Instruction::new(Operation::Br { flag: CmpFlag::Never, target: "top".into() }),
            Instruction::new(Operation::Stop),
        ])
        .unwrap();
        assert!(matches!(p.run().unwrap(), RunOutcome::Halted { .. }));
        assert_eq!(p.gpr().read_signed(2).unwrap(), 15);
        assert_eq!(p.gpr().read_signed(1).unwrap(), 0);
    }

    #[test]
    fn running_off_the_end_is_an_error() {
        let mut p = machine();
        p.upload_program(program(vec![Operation::Nop])).unwrap();
        assert_eq!(p.run(), Err(ExecError::PcOutOfRange { pc: 1, len: 1 }));
    }

    #[test]
    fn halted_processor_ignores_further_cycles() {
        let mut p = run_ops(vec![Operation::Stop, ldi(1, 9)]);
        p.advance_one_cycle().unwrap();
        assert_eq!(p.cycle(), 1);
        assert_eq!(p.gpr().read_unsigned(1).unwrap(), 0);

        p.restart();
        assert!(!p.is_halted());
        assert_eq!(p.run().unwrap(), RunOutcome::Halted { cycles: 1 });
    }

    #[test]
    fn restart_clears_run_state_and_keeps_data() {
        let mut p = Processor::new(
            ProcessorConfig { data_mem_size: 64, ..ProcessorConfig::default() },
            RecordingBackend::with_outcomes([1]),
        );
        p.upload_program(vec![
            Instruction::new(Operation::Br { flag: CmpFlag::Eq, target: "done".into() }),
            Instruction::new(ldi(1, 42)),
            Instruction::new(Operation::Store { op: StoreOp::Sw, rs: 1, rt: 0, offset: 8 }),
            Instruction::new(Operation::Smis { si: 0, qubits: vec![0] }),
            Instruction::new(Operation::Bundle {
                pi: 1,
                ops: vec![QuantumOp::single("measure", 0)],
            }),
            Instruction::new(Operation::Cmp { rs: 1, rt: 1 }),
            Instruction::labelled("done", Operation::Stop),
        ])
        .unwrap();
        assert_eq!(p.run().unwrap(), RunOutcome::Halted { cycles: 7 });
        assert!(p.flags().get(CmpFlag::Eq));
        assert_eq!(p.msmt_results()[0], 1);

        p.restart();
        assert_eq!(p.pc(), p.config().start_addr);
        assert_eq!(p.cycle(), 0);
        assert!(!p.is_halted());
        assert!(p.msmt_results().iter().all(|&m| m == 0));
        assert!(!p.flags().get(CmpFlag::Eq));
        assert!(p.flags().get(CmpFlag::Always));

        assert_eq!(p.gpr().read_unsigned(1).unwrap(), 42);
        assert_eq!(p.memory().read_word(8).unwrap(), 42);
        assert_eq!(p.qotr().read_sq_reg(0).unwrap(), &[0]);
        assert_eq!(p.instructions().len(), 7);

        // the stale eq flag from the previous run must not redirect the branch
        p.advance_one_cycle().unwrap();
        assert_eq!(p.pc(), 1);
    }

    #[test]
    #[should_panic(expected = "cell width must be 1..=64")]
    fn zero_register_width_is_refused() {
        let config = ProcessorConfig {
            gpr_width: 0,
            ..ProcessorConfig::default()
        };
        Processor::new(config, RecordingBackend::new());
    }

    #[test]
    fn measurement_results_start_at_zero() {
        let p = run_ops(vec![Operation::Fmr { rd: 1, qs: 6 }, Operation::Stop]);
        assert_eq!(p.gpr().read_unsigned(1).unwrap(), 0);
        assert!(p.msmt_results().iter().all(|&m| m == 0));
    }

    #[test]
    fn bundle_dispatches_to_backend_in_order() {
        let mut p = Processor::new(
            ProcessorConfig { data_mem_size: 64, ..ProcessorConfig::default() },
            RecordingBackend::with_outcomes([1, 0, 1]),
        );
        p.upload_program(program(vec![
            Operation::Smis { si: 0, qubits: vec![2] },
            Operation::Smit { ti: 1, pairs: vec![(0, 1)] },
            Operation::Bundle {
                pi: 1,
                ops: vec![
                    QuantumOp::single("h", 0),
                    QuantumOp::pair("cz", 1),
                    QuantumOp::qnop(),
                ],
            },
            Operation::Bundle {
                pi: 1,
                ops: vec![QuantumOp::single("measure", 0), QuantumOp::pair("measz", 1)],
            },
            Operation::Fmr { rd: 1, qs: 2 },
            Operation::Fmr { rd: 2, qs: 0 },
            Operation::Fmr { rd: 3, qs: 1 },
            Operation::Stop,
        ]))
        .unwrap();
        p.run().unwrap();

        assert_eq!(
            p.backend().calls,
            vec![
                BackendCall::Single { gate: "h".into(), qubit: 2 },
                BackendCall::Two { gate: "cz".into(), qubit_a: 0, qubit_b: 1 },
                BackendCall::Measure { qubit: 2 },
                BackendCall::Measure { qubit: 0 },
                BackendCall::Measure { qubit: 1 },
            ]
        );
        assert_eq!(p.gpr().read_unsigned(1).unwrap(), 1);
        assert_eq!(p.gpr().read_unsigned(2).unwrap(), 0);
        assert_eq!(p.gpr().read_unsigned(3).unwrap(), 1);
        assert_eq!(&p.msmt_results()[..3], &[0, 1, 1]);
    }

    #[test]
    fn unset_target_register_aborts_bundle_before_dispatch() {
        let mut p = machine();
        p.upload_program(program(vec![
            Operation::Smis { si: 0, qubits: vec![1] },
            Operation::Bundle {
                pi: 0,
                ops: vec![QuantumOp::single("x", 0), QuantumOp::single("x", 3)],
            },
            Operation::Stop,
        ]))
        .unwrap();
        assert!(matches!(
            p.run(),
            Err(ExecError::Fault {
                pc: 1,
                source: DataError::UndefinedTargetRegister { class: "s", index: 3 },
                ..
            })
        ));
        assert!(p.backend().calls.is_empty());
    }

    #[test]
    fn out_of_range_measurement_is_rejected() {
        let mut p = Processor::new(
            ProcessorConfig { data_mem_size: 64, ..ProcessorConfig::default() },
            RecordingBackend::with_outcomes([2]),
        );
        p.upload_program(program(vec![
            Operation::Smis { si: 0, qubits: vec![0] },
            Operation::Bundle { pi: 0, ops: vec![QuantumOp::single("measure", 0)] },
            Operation::Stop,
        ]))
        .unwrap();
        assert!(matches!(
            p.run(),
            Err(ExecError::Fault {
                source: DataError::InvalidMeasurement { qubit: 0, outcome: 2 },
                ..
            })
        ));
    }

    #[test]
    fn float_pipeline() {
        let p = run_ops(vec![
            ldi(1, 7),
            ldi(2, -2),
            Operation::FcvtSW { fd: 1, rs: 1 },
            Operation::FcvtSW { fd: 2, rs: 2 },
            Operation::Fpu { op: FpuOp::Div, fd: 3, fs: 1, ft: 2 },
            Operation::FcvtWS { rd: 3, fs: 3 },
            Operation::Fcmp { op: FcmpOp::Lt, rd: 4, fs: 2, ft: 1 },
            Operation::Fcmp { op: FcmpOp::Eq, rd: 5, fs: 2, ft: 1 },
            Operation::Fsw { fs: 3, rt: 0, offset: 4 },
            Operation::Flw { fd: 4, rt: 0, offset: 4 },
            Operation::Stop,
        ]);
        assert_eq!(p.fpr().read_f32(3).unwrap(), -3.5);
        assert_eq!(p.fpr().read_f32(4).unwrap(), -3.5);
        assert_eq!(p.gpr().read_signed(3).unwrap(), -3);
        assert_eq!(p.gpr().read_unsigned(4).unwrap(), 1);
        assert_eq!(p.gpr().read_unsigned(5).unwrap(), 0);
        // float compares leave the condition flags alone
        assert!(!p.flags().get(CmpFlag::Eq));
    }

    #[test]
    fn rejected_upload_leaves_state_untouched() {
        let mut p = machine();
        p.upload_program(program(vec![ldi(1, 42), Operation::Stop])).unwrap();
        p.run().unwrap();

        let bad = vec![
            Instruction::new(Operation::Br { flag: CmpFlag::Always, target: "nowhere".into() }),
            Instruction::new(Operation::Stop),
        ];
        assert_eq!(
            p.upload_program(bad),
            Err(LoadError::UndefinedLabel { index: 0, label: "nowhere".into() })
        );
        let dup = vec![
            Instruction::labelled("a", Operation::Nop),
            Instruction::labelled("a", Operation::Stop),
        ];
        assert_eq!(
            p.upload_program(dup),
            Err(LoadError::DuplicateLabel { label: "a".into() })
        );

        assert_eq!(p.instructions().len(), 2);
        assert_eq!(p.gpr().read_unsigned(1).unwrap(), 42);
        assert!(p.is_halted());
    }

    #[test]
    fn upload_resets_registers_but_keeps_memory() {
        let mut p = run_ops(vec![
            ldi(1, 0x55),
            Operation::Store { op: StoreOp::Sb, rs: 1, rt: 0, offset: 3 },
            Operation::Smis { si: 0, qubits: vec![0] },
            Operation::Stop,
        ]);
        p.upload_program(program(vec![Operation::Stop])).unwrap();
        assert_eq!(p.gpr().read_unsigned(1).unwrap(), 0);
        assert!(p.qotr().read_sq_reg(0).is_err());
        assert_eq!(p.memory().read_byte(3).unwrap(), 0x55);
        assert_eq!(p.cycle(), 0);
    }

    #[test]
    fn too_large_program_is_rejected() {
        let mut p = Processor::new(
            ProcessorConfig { insn_mem_size: 2, data_mem_size: 16, ..ProcessorConfig::default() },
            RecordingBackend::new(),
        );
        assert_eq!(
            p.upload_program(program(vec![Operation::Nop; 3])),
            Err(LoadError::ProgramTooLarge { len: 3, capacity: 2 })
        );
    }

    #[test]
    fn append_rejects_duplicate_labels_and_allows_forward_branches() {
        let mut p = machine();
        p.append_insn(Instruction::new(Operation::Br {
            flag: CmpFlag::Always,
            target: "end".into(),
        }))
        .unwrap();
        p.append_insn(Instruction::labelled("mid", ldi(1, 1))).unwrap();
        assert_eq!(
            p.append_insn(Instruction::labelled("mid", Operation::Nop)),
            Err(LoadError::DuplicateLabel { label: "mid".into() })
        );
        p.append_insn(Instruction::labelled("end", Operation::Stop)).unwrap();

        assert_eq!(p.run().unwrap(), RunOutcome::Halted { cycles: 2 });
        assert_eq!(p.gpr().read_unsigned(1).unwrap(), 0);
    }

    #[test]
    fn taken_branch_to_missing_label_fails() {
        let mut p = machine();
        p.append_insn(Instruction::new(Operation::Br {
            flag: CmpFlag::Never,
            target: "gone".into(),
        }))
        .unwrap();
        p.append_insn(Instruction::new(Operation::Br {
            flag: CmpFlag::Always,
            target: "gone".into(),
        }))
        .unwrap();
        assert_eq!(
            p.run(),
            Err(ExecError::UndefinedLabel { pc: 1, label: "gone".into() })
        );
    }

    #[test]
    fn add_and_compare_agree_with_host_arithmetic() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let a: i32 = rng.r#gen();
            let b: i32 = rng.r#gen();
            let p = run_ops(vec![
                ldi(1, a),
                ldi(2, b),
                alu(AluOp::Add, 3, 1, 2),
                alu(AluOp::Sub, 4, 1, 2),
                Operation::Cmp { rs: 1, rt: 2 },
                Operation::Stop,
            ]);
            assert_eq!(p.gpr().read_signed(3).unwrap(), a.wrapping_add(b) as i64);
            assert_eq!(p.gpr().read_signed(4).unwrap(), a.wrapping_sub(b) as i64);
            let f = p.flags();
            assert_eq!(f.get(CmpFlag::Lt), a < b);
            assert_eq!(f.get(CmpFlag::Ltu), (a as u32) < (b as u32));
            assert_eq!(f.get(CmpFlag::Eq), a == b);
            assert_eq!(f.get(CmpFlag::Geu), (a as u32) >= (b as u32));
        }
    }
}
