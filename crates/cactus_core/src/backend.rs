//! Qubit-state backends driven by quantum bundles.
//!
//! The processor never evolves qubit state itself. For every micro-operation
//! of a bundle it resolves the target register to qubit indices and calls
//! one of the three capabilities below. Calls are synchronous and issued in
//! bundle order.

use bitvec::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;

/// Capability surface of a qubit-state simulator.
pub trait QuantumBackend {
    /// Applies the named single-qubit gate to `qubit`.
    fn apply_single_qubit_gate(&mut self, gate: &str, qubit: usize);

    /// Applies the named two-qubit gate to the ordered pair (`qubit_a`, `qubit_b`).
    fn apply_two_qubit_gate(&mut self, gate: &str, qubit_a: usize, qubit_b: usize);

    /// Measures `qubit` and returns the outcome, 0 or 1.
    fn measure_qubit(&mut self, qubit: usize) -> u32;
}

impl<T: QuantumBackend + ?Sized> QuantumBackend for Box<T> {
    fn apply_single_qubit_gate(&mut self, gate: &str, qubit: usize) {
        (**self).apply_single_qubit_gate(gate, qubit)
    }

    fn apply_two_qubit_gate(&mut self, gate: &str, qubit_a: usize, qubit_b: usize) {
        (**self).apply_two_qubit_gate(gate, qubit_a, qubit_b)
    }

    fn measure_qubit(&mut self, qubit: usize) -> u32 {
        (**self).measure_qubit(qubit)
    }
}

impl<T: QuantumBackend + ?Sized> QuantumBackend for &mut T {
    fn apply_single_qubit_gate(&mut self, gate: &str, qubit: usize) {
        (**self).apply_single_qubit_gate(gate, qubit)
    }

    fn apply_two_qubit_gate(&mut self, gate: &str, qubit_a: usize, qubit_b: usize) {
        (**self).apply_two_qubit_gate(gate, qubit_a, qubit_b)
    }

    fn measure_qubit(&mut self, qubit: usize) -> u32 {
        (**self).measure_qubit(qubit)
    }
}

/// Ignores gates and measures every qubit as 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdealBackend;

impl QuantumBackend for IdealBackend {
    fn apply_single_qubit_gate(&mut self, gate: &str, qubit: usize) {
        log::debug!("apply {} on qubit {}", gate, qubit);
    }

    fn apply_two_qubit_gate(&mut self, gate: &str, qubit_a: usize, qubit_b: usize) {
        log::debug!("apply {} on qubit pair ({}, {})", gate, qubit_a, qubit_b);
    }

    fn measure_qubit(&mut self, qubit: usize) -> u32 {
        log::debug!("measure qubit {}: 0", qubit);
        0
    }
}

/// Computational-basis tracker for classical (permutation) circuits.
///
/// Each qubit is a single bit. Bit-flip gates toggle it, `cnot`/`cx`
/// toggles the target when the control is set, `swap` exchanges two bits
/// and every other gate leaves the bits untouched. Measurement reads the
/// bit back without disturbing it.
pub struct BitFlipBackend {
    bits: BitVec<u64, Lsb0>,
}

impl BitFlipBackend {
    pub fn new(num_qubits: usize) -> Self {
        Self {
            bits: bitvec![u64, Lsb0; 0; num_qubits],
        }
    }

    pub fn state(&self, qubit: usize) -> bool {
        self.bits[qubit]
    }

    pub fn reset(&mut self) {
        self.bits.fill(false);
    }
}

impl QuantumBackend for BitFlipBackend {
    fn apply_single_qubit_gate(&mut self, gate: &str, qubit: usize) {
        if matches!(gate, "x" | "y" | "x180" | "y180") {
            let flipped = !self.bits[qubit];
            self.bits.set(qubit, flipped);
        }
    }

    fn apply_two_qubit_gate(&mut self, gate: &str, qubit_a: usize, qubit_b: usize) {
        match gate {
            "cnot" | "cx" => {
                if self.bits[qubit_a] {
                    let flipped = !self.bits[qubit_b];
                    self.bits.set(qubit_b, flipped);
                }
            }
            "swap" => self.bits.swap(qubit_a, qubit_b),
            _ => {}
        }
    }

    fn measure_qubit(&mut self, qubit: usize) -> u32 {
        self.bits[qubit] as u32
    }
}

/// Ignores gates and draws every measurement from a seeded coin.
pub struct RandomBackend {
    rng: ChaCha8Rng,
    p_one: f64,
}

impl RandomBackend {
    /// `p_one` is the probability of measuring 1; it is clamped to `[0, 1]`
    /// and NaN counts as 0.
    pub fn new(seed: u64, p_one: f64) -> Self {
        let p_one = if p_one.is_nan() { 0.0 } else { p_one.clamp(0.0, 1.0) };
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            p_one,
        }
    }
}

impl QuantumBackend for RandomBackend {
    fn apply_single_qubit_gate(&mut self, _gate: &str, _qubit: usize) {}

    fn apply_two_qubit_gate(&mut self, _gate: &str, _qubit_a: usize, _qubit_b: usize) {}

    fn measure_qubit(&mut self, _qubit: usize) -> u32 {
        self.rng.gen_bool(self.p_one) as u32
    }
}

/// A backend call as observed by `RecordingBackend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Single { gate: String, qubit: usize },
    Two { gate: String, qubit_a: usize, qubit_b: usize },
    Measure { qubit: usize },
}

/// Records every call and replays scripted measurement outcomes.
///
/// Measurements pop the script front to back and return 0 once it runs out.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<BackendCall>,
    script: VecDeque<u32>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(outcomes: impl IntoIterator<Item = u32>) -> Self {
        Self {
            calls: Vec::new(),
            script: outcomes.into_iter().collect(),
        }
    }
}

impl QuantumBackend for RecordingBackend {
    fn apply_single_qubit_gate(&mut self, gate: &str, qubit: usize) {
        self.calls.push(BackendCall::Single {
            gate: gate.to_string(),
            qubit,
        });
    }

    fn apply_two_qubit_gate(&mut self, gate: &str, qubit_a: usize, qubit_b: usize) {
        self.calls.push(BackendCall::Two {
            gate: gate.to_string(),
            qubit_a,
            qubit_b,
        });
    }

    fn measure_qubit(&mut self, qubit: usize) -> u32 {
        self.calls.push(BackendCall::Measure { qubit });
        self.script.pop_front().unwrap_or(0)
    }
}
