//! Host configuration file.
//!
//! Every key is optional; missing keys keep the processor defaults.
//!
//! ```toml
//! [processor]
//! num_qubits = 17
//! max_cycles = 50000
//! data_mem_size = 65536
//!
//! [backend]
//! kind = "random"
//! seed = 7
//! p_one = 0.25
//! ```

use anyhow::{Context, Result, bail};
use cactus_core::ProcessorConfig;
use cactus_core::backend::{BitFlipBackend, IdealBackend, QuantumBackend, RandomBackend};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub processor: ProcessorSection,
    pub backend: BackendSection,
}

impl HostConfig {
    /// Loads a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: HostConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

/// Overrides for `ProcessorConfig` fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorSection {
    pub insn_mem_size: Option<usize>,
    pub data_mem_size: Option<usize>,
    pub num_gpr: Option<usize>,
    pub num_fpr: Option<usize>,
    pub num_sq_qotr: Option<usize>,
    pub num_tq_qotr: Option<usize>,
    pub qotr_capacity: Option<usize>,
    pub num_qubits: Option<usize>,
    pub max_cycles: Option<u64>,
    pub start_addr: Option<usize>,
}

impl ProcessorSection {
    /// Default processor configuration with this section's overrides applied.
    pub fn to_config(&self) -> ProcessorConfig {
        let mut cfg = ProcessorConfig::default();
        let set = |slot: &mut usize, v: Option<usize>| {
            if let Some(v) = v {
                *slot = v;
            }
        };
        set(&mut cfg.insn_mem_size, self.insn_mem_size);
        set(&mut cfg.data_mem_size, self.data_mem_size);
        set(&mut cfg.num_gpr, self.num_gpr);
        set(&mut cfg.num_fpr, self.num_fpr);
        set(&mut cfg.num_sq_qotr, self.num_sq_qotr);
        set(&mut cfg.num_tq_qotr, self.num_tq_qotr);
        set(&mut cfg.qotr_capacity, self.qotr_capacity);
        set(&mut cfg.num_qubits, self.num_qubits);
        set(&mut cfg.start_addr, self.start_addr);
        if let Some(max) = self.max_cycles {
            cfg.max_cycles = max;
        }
        cfg
    }
}

/// Qubit-state backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Every measurement reads 0.
    #[default]
    Ideal,
    /// Computational-basis bit tracking.
    Bitflip,
    /// Seeded coin flip per measurement.
    Random,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSection {
    pub kind: BackendKind,
    pub seed: u64,
    /// Probability of measuring 1 with the random backend.
    pub p_one: f64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            kind: BackendKind::Ideal,
            seed: 0,
            p_one: 0.5,
        }
    }
}

impl BackendSection {
    /// Builds the configured backend for `num_qubits` qubits.
    ///
    /// `stream` is mixed into the seed so that parallel shots draw
    /// independent outcome sequences. Fails if `p_one` is not a
    /// probability.
    pub fn build(&self, num_qubits: usize, stream: u64) -> Result<Box<dyn QuantumBackend + Send>> {
        if !(0.0..=1.0).contains(&self.p_one) {
            bail!("p_one must lie in [0, 1], got {}", self.p_one);
        }
        Ok(match self.kind {
            BackendKind::Ideal => Box::new(IdealBackend),
            BackendKind::Bitflip => Box::new(BitFlipBackend::new(num_qubits)),
            BackendKind::Random => {
                Box::new(RandomBackend::new(self.seed.wrapping_add(stream), self.p_one))
            }
        })
    }
}
