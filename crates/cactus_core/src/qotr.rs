//! Operation target registers.
//!
//! SMIS and SMIT load qubit lists into the single- and two-qubit banks;
//! quantum bundles read them back to find the qubits each micro-op drives.

use crate::DataError;
use std::collections::HashSet;
use std::hash::Hash;

/// Single-qubit (`s<N>`) and two-qubit (`t<N>`) operation target registers.
///
/// A register is unset until `SMIS`/`SMIT` loads it. A loaded register
/// holds a non-empty, duplicate-free list of at most `capacity` entries,
/// every qubit index below `num_qubits`.
pub struct TargetRegisters {
    sq_regs: Vec<Option<Vec<usize>>>,
    tq_regs: Vec<Option<Vec<(usize, usize)>>>,
    capacity: usize,
    num_qubits: usize,
}

impl TargetRegisters {
    pub fn new(num_sq: usize, num_tq: usize, capacity: usize, num_qubits: usize) -> Self {
        Self {
            sq_regs: vec![None; num_sq],
            tq_regs: vec![None; num_tq],
            capacity,
            num_qubits,
        }
    }

    pub fn clear(&mut self) {
        self.sq_regs.fill(None);
        self.tq_regs.fill(None);
    }

    fn check_qubit(&self, qubit: usize) -> Result<(), DataError> {
        if qubit >= self.num_qubits {
            return Err(DataError::QubitOutOfRange {
                qubit,
                num_qubits: self.num_qubits,
            });
        }
        Ok(())
    }

    fn check_list<T: Eq + Hash>(
        &self,
        class: &'static str,
        index: usize,
        entries: &[T],
    ) -> Result<(), DataError> {
        if entries.is_empty() {
            return Err(DataError::EmptyTargetList { class, index });
        }
        if entries.len() > self.capacity {
            return Err(DataError::TargetListTooLong {
                class,
                index,
                len: entries.len(),
                capacity: self.capacity,
            });
        }
        let mut seen = HashSet::with_capacity(entries.len());
        if !entries.iter().all(|e| seen.insert(e)) {
            return Err(DataError::DuplicateTarget { class, index });
        }
        Ok(())
    }

    fn slot<'a, T>(regs: &'a [T], class: &'static str, index: usize) -> Result<&'a T, DataError> {
        regs.get(index).ok_or(DataError::RegisterOutOfRange {
            class,
            index,
            count: regs.len(),
        })
    }

    pub fn set_sq_reg(&mut self, si: usize, qubits: &[usize]) -> Result<(), DataError> {
        Self::slot(&self.sq_regs, "s", si)?;
        self.check_list("s", si, qubits)?;
        for &q in qubits {
            self.check_qubit(q)?;
        }
        self.sq_regs[si] = Some(qubits.to_vec());
        Ok(())
    }

    pub fn read_sq_reg(&self, si: usize) -> Result<&[usize], DataError> {
        Self::slot(&self.sq_regs, "s", si)?
            .as_deref()
            .ok_or(DataError::UndefinedTargetRegister {
                class: "s",
                index: si,
            })
    }

    pub fn set_tq_reg(&mut self, ti: usize, pairs: &[(usize, usize)]) -> Result<(), DataError> {
        Self::slot(&self.tq_regs, "t", ti)?;
        self.check_list("t", ti, pairs)?;
        for &(a, b) in pairs {
            self.check_qubit(a)?;
            self.check_qubit(b)?;
            if a == b {
                return Err(DataError::DegeneratePair(a));
            }
        }
        self.tq_regs[ti] = Some(pairs.to_vec());
        Ok(())
    }

    pub fn read_tq_reg(&self, ti: usize) -> Result<&[(usize, usize)], DataError> {
        Self::slot(&self.tq_regs, "t", ti)?
            .as_deref()
            .ok_or(DataError::UndefinedTargetRegister {
                class: "t",
                index: ti,
            })
    }
}
