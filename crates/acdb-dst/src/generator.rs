//! Seeded-random instruction scripts, weighted across the operations the
//! core understands, respecting which transactions and sites are
//! currently live so that the generated script is never trivially
//! rejected by the parser-level invariants (duplicate begin, unknown
//! transaction, etc).

use std::collections::BTreeSet;

use acdb_core::{Instruction, SiteId, TxId, VarId};

use crate::rng::DeterministicRng;

#[derive(Debug, Clone, thiserror::Error)]
pub enum GeneratorError {
    #[error("candidate transaction pool must be non-empty")]
    EmptyTransactionPool,
}

/// Configuration for [`ScriptGenerator`].
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Number of distinct transaction ids to draw from (`T1..=TN`).
    pub candidate_transactions: u32,
    /// Approximate fraction of new transactions that are read-only.
    pub read_only_fraction: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { candidate_transactions: 6, read_only_fraction: 0.2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Action {
    Begin,
    Read,
    Write,
    End,
    Fail,
    Recover,
}

const WEIGHTS: &[(Action, u32)] =
    &[(Action::Begin, 2), (Action::Read, 4), (Action::Write, 4), (Action::End, 3), (Action::Fail, 1), (Action::Recover, 1)];

/// Generates a seeded-random sequence of [`Instruction`]s, tracking which
/// transactions and sites are live so every generated instruction is at
/// least plausible (though the coordinator may still reject it for reasons
/// the generator doesn't model, e.g. locking).
pub struct ScriptGenerator {
    rng: DeterministicRng,
    config: GeneratorConfig,
    live_transactions: Vec<(TxId, bool)>,
    down_sites: BTreeSet<SiteId>,
}

impl ScriptGenerator {
    pub fn new(seed: u64, config: GeneratorConfig) -> Result<Self, GeneratorError> {
        if config.candidate_transactions == 0 {
            return Err(GeneratorError::EmptyTransactionPool);
        }
        Ok(Self { rng: DeterministicRng::new(seed), config, live_transactions: Vec::new(), down_sites: BTreeSet::new() })
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    /// Generates `count` instructions, updating internal live-state
    /// tracking as it goes.
    pub fn generate(&mut self, count: usize) -> Vec<Instruction> {
        (0..count).map(|_| self.next_instruction()).collect()
    }

    fn next_instruction(&mut self) -> Instruction {
        loop {
            let action = self.pick_action();
            if let Some(instr) = self.try_build(action) {
                return instr;
            }
        }
    }

    fn pick_action(&mut self) -> Action {
        let total: u32 = WEIGHTS.iter().map(|(_, w)| w).sum();
        let mut roll = self.rng.gen_range(0..total);
        for &(action, weight) in WEIGHTS {
            if roll < weight {
                return action;
            }
            roll -= weight;
        }
        unreachable!("weights cover the full range")
    }

    fn try_build(&mut self, action: Action) -> Option<Instruction> {
        match action {
            Action::Begin => {
                let id = self.rng.gen_range(1..self.config.candidate_transactions + 1);
                let tx = TxId::new(format!("T{id}"));
                if self.live_transactions.iter().any(|(t, _)| t == &tx) {
                    return None;
                }
                let read_only = self.rng.gen_bool(self.config.read_only_fraction);
                self.live_transactions.push((tx.clone(), read_only));
                Some(if read_only { Instruction::BeginRo(tx) } else { Instruction::Begin(tx) })
            }
            Action::End => {
                let tx = self.rng.choose(&self.live_transactions)?.0.clone();
                self.live_transactions.retain(|(t, _)| t != &tx);
                Some(Instruction::End(tx))
            }
            Action::Read => {
                let (tx, _) = self.rng.choose(&self.live_transactions)?.clone();
                let var = self.random_var();
                Some(Instruction::Read(tx, var))
            }
            Action::Write => {
                let writer = self.live_transactions.iter().filter(|(_, ro)| !ro).collect::<Vec<_>>();
                let (tx, _) = (*self.rng.choose(&writer)?).clone();
                let var = self.random_var();
                let val = self.rng.gen_range(-1000..1000);
                Some(Instruction::Write(tx, var, val))
            }
            Action::Fail => {
                let up: Vec<SiteId> = SiteId::all().filter(|s| !self.down_sites.contains(s)).collect();
                let site = *self.rng.choose(&up)?;
                self.down_sites.insert(site);
                Some(Instruction::Fail(site))
            }
            Action::Recover => {
                let down: Vec<SiteId> = self.down_sites.iter().copied().collect();
                let site = *self.rng.choose(&down)?;
                self.down_sites.remove(&site);
                Some(Instruction::Recover(site))
            }
        }
    }

    fn random_var(&mut self) -> VarId {
        VarId::new(self.rng.gen_range(VarId::MIN..VarId::MAX + 1)).expect("range matches VarId bounds")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_generates_same_script() {
        let mut a = ScriptGenerator::new(7, GeneratorConfig::default()).unwrap();
        let mut b = ScriptGenerator::new(7, GeneratorConfig::default()).unwrap();
        assert_eq!(a.generate(200), b.generate(200));
    }

    #[test]
    fn rejects_empty_transaction_pool() {
        let config = GeneratorConfig { candidate_transactions: 0, ..GeneratorConfig::default() };
        assert!(matches!(ScriptGenerator::new(1, config), Err(GeneratorError::EmptyTransactionPool)));
    }
}
