//! Deterministic simulation testing for `acdb-core`.
//!
//! Grounded in the teacher's `vf_dst` crate: a seeded [`rng::DeterministicRng`]
//! drives a [`generator::ScriptGenerator`], and [`FuzzRunner`] feeds the
//! resulting script through a fresh `Coordinator`, asserting
//! `acdb_core::invariants::CoreProperties::all_hold()` after every processed
//! instruction. A failure reports its seed via `DST_SEED=<seed>` so the run
//! can be reproduced exactly (spec.md §8's property list, driven the way
//! `vf_dst::get_or_generate_seed`'s doc comment describes).

pub mod generator;
pub mod rng;

use acdb_core::invariants::{CoreProperties, PropertyChecker, PropertySummary};
use acdb_core::Coordinator;

pub use generator::{GeneratorConfig, GeneratorError, ScriptGenerator};
pub use rng::{get_or_generate_seed, DeterministicRng};

/// One invariant violation observed during a fuzz run.
#[derive(Debug, Clone)]
pub struct FuzzFailure {
    pub seed: u64,
    pub step: usize,
    pub summary: PropertySummary,
}

impl std::fmt::Display for FuzzFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "DST_SEED={} failed at step {}", self.seed, self.step)?;
        for failure in self.summary.failures() {
            writeln!(f, "  [{}] {}: {}", failure.tag, failure.name, failure.detail.as_deref().unwrap_or(""))?;
        }
        Ok(())
    }
}

/// Drives a seeded [`ScriptGenerator`] through a fresh [`Coordinator`],
/// checking [`CoreProperties`] after every instruction.
pub struct FuzzRunner {
    seed: u64,
    generator: ScriptGenerator,
    coordinator: Coordinator,
}

impl FuzzRunner {
    pub fn new(seed: u64, config: GeneratorConfig) -> Result<Self, GeneratorError> {
        Ok(Self { seed, generator: ScriptGenerator::new(seed, config)?, coordinator: Coordinator::new() })
    }

    /// Runs `steps` instructions, checking invariants after each one.
    /// Returns the first failure observed, if any.
    pub fn run(&mut self, steps: usize) -> Option<FuzzFailure> {
        for step in 0..steps {
            let instr = self.generator.generate(1).pop().expect("generate(1) returns exactly one instruction");
            // Operational errors (unknown tx, etc) are expected noise from a
            // generator that doesn't model every rejection rule; only a
            // genuine invariant violation is a fuzz failure.
            let _ = self.coordinator.process(instr);
            self.coordinator.drain_events();
            let summary = CoreProperties::check_all(&self.coordinator);
            if !summary.all_hold() {
                return Some(FuzzFailure { seed: self.seed, step, summary });
            }
        }
        None
    }

    #[must_use]
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzz_run_holds_invariants_across_many_seeds() {
        for seed in 0..20u64 {
            let mut runner = FuzzRunner::new(seed, GeneratorConfig::default()).unwrap();
            if let Some(failure) = runner.run(500) {
                panic!("{failure}");
            }
        }
    }

    #[test]
    fn same_seed_reaches_same_final_clock() {
        let mut a = FuzzRunner::new(99, GeneratorConfig::default()).unwrap();
        let mut b = FuzzRunner::new(99, GeneratorConfig::default()).unwrap();
        assert!(a.run(300).is_none());
        assert!(b.run(300).is_none());
        assert_eq!(a.coordinator().clock(), b.coordinator().clock());
    }
}
