//! Shot statistics for repeated program runs.
//!
//! Collects the final measurement-result vector and the cycle count of
//! every shot and reports the outcome distribution together with cycle
//! count statistics.

use std::collections::HashMap;

/// Outcome histogram and cycle statistics over a batch of shots.
///
/// Outcomes are keyed by their bitstring, qubit 0 first.
pub struct ShotStats {
    pub min_cycles: u64,
    pub max_cycles: u64,
    pub sum_cycles: u64,
    pub count: u64,
    /// Shots stopped by the cycle bound instead of `STOP`.
    pub truncated: u64,
    pub outcomes: HashMap<String, u64>,
}

impl ShotStats {
    /// Creates an empty tracker. `min_cycles` starts at `u64::MAX` so the
    /// first shot becomes the minimum.
    pub fn new() -> Self {
        Self {
            min_cycles: u64::MAX,
            max_cycles: 0,
            sum_cycles: 0,
            count: 0,
            truncated: 0,
            outcomes: HashMap::new(),
        }
    }

    /// Records one shot.
    ///
    /// # Arguments
    ///
    /// * `msmt` - Final measurement result per qubit
    /// * `cycles` - Cycles executed by the shot
    /// * `halted` - Whether the shot reached `STOP`
    pub fn update(&mut self, msmt: &[u32], cycles: u64, halted: bool) {
        self.min_cycles = self.min_cycles.min(cycles);
        self.max_cycles = self.max_cycles.max(cycles);
        self.sum_cycles += cycles;
        self.count += 1;
        if !halted {
            self.truncated += 1;
        }

        let key: String = msmt
            .iter()
            .map(|&m| if m == 0 { '0' } else { '1' })
            .collect();
        *self.outcomes.entry(key).or_insert(0) += 1;
    }

    /// Folds the statistics of another batch into this one.
    pub fn merge(mut self, other: ShotStats) -> Self {
        self.min_cycles = self.min_cycles.min(other.min_cycles);
        self.max_cycles = self.max_cycles.max(other.max_cycles);
        self.sum_cycles += other.sum_cycles;
        self.count += other.count;
        self.truncated += other.truncated;
        for (key, n) in other.outcomes {
            *self.outcomes.entry(key).or_insert(0) += n;
        }
        self
    }

    pub fn avg_cycles(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum_cycles as f64 / self.count as f64
        }
    }

    /// Outcomes sorted by decreasing frequency, ties by bitstring.
    pub fn sorted_outcomes(&self) -> Vec<(&str, u64)> {
        let mut rows: Vec<(&str, u64)> = self
            .outcomes
            .iter()
            .map(|(k, &n)| (k.as_str(), n))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        rows
    }

    pub fn print_report(&self) {
        println!("\nShot Statistics");
        println!("Shots:     {}", self.count);
        if self.count == 0 {
            return;
        }
        println!("Truncated: {}", self.truncated);
        println!("Cycles:    min {} / avg {:.2} / max {}", self.min_cycles, self.avg_cycles(), self.max_cycles);

        println!("Outcomes (q0 first):");
        for (key, n) in self.sorted_outcomes() {
            let pct = 100.0 * n as f64 / self.count as f64;
            println!("  {}: {:>8} ({:6.2}%)", key, n, pct);
        }
    }
}

impl Default for ShotStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_and_cycles() {
        let mut stats = ShotStats::new();
        stats.update(&[0, 1, 0], 10, true);
        stats.update(&[0, 1, 0], 12, true);
        stats.update(&[1, 1, 0], 20, false);

        assert_eq!(stats.count, 3);
        assert_eq!(stats.truncated, 1);
        assert_eq!((stats.min_cycles, stats.max_cycles), (10, 20));
        assert_eq!(stats.avg_cycles(), 14.0);
        assert_eq!(stats.sorted_outcomes(), vec![("010", 2), ("110", 1)]);
    }

    #[test]
    fn merge_combines_batches() {
        let mut a = ShotStats::new();
        a.update(&[1], 5, true);
        let mut b = ShotStats::new();
        b.update(&[1], 7, true);
        b.update(&[0], 3, true);

        let merged = a.merge(b);
        assert_eq!(merged.count, 3);
        assert_eq!(merged.min_cycles, 3);
        assert_eq!(merged.max_cycles, 7);
        assert_eq!(merged.sorted_outcomes(), vec![("1", 2), ("0", 1)]);
        assert_eq!(ShotStats::default().avg_cycles(), 0.0);
    }
}
