//! Bounded model checking of the per-variable lock manager's promotion,
//! sharing, and queueing rules (spec.md §4.1-§4.2), adapted from the
//! teacher's `vf_stateright::treiber_stack` pattern: a small, hashable state
//! machine that mirrors the production algorithm closely enough to be
//! exhaustively explored, rather than literally driving `acdb-core`'s types
//! (which carry data unrelated to lock shape and aren't `Hash`).
//!
//! Two transactions, two variables. Actions: acquire a read lock, acquire a
//! write lock (probe and grant collapsed into one atomic step, since this
//! model has no concurrent probing across sites to interleave with), and
//! release every lock a transaction holds (mirroring `end`, which always
//! releases across every variable at once).

use std::collections::{BTreeSet, HashSet};

use stateright::{Model, Property};

/// Transaction index: 0 or 1 (`T1`/`T2`).
pub type TxIdx = u8;
/// Variable index: 0 or 1.
pub type VarIdx = u8;

pub const TX_COUNT: TxIdx = 2;
pub const VAR_COUNT: VarIdx = 2;

/// The lock currently granted on one variable (spec.md §3, Lock record).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockEntry {
    Read(BTreeSet<TxIdx>),
    Write(TxIdx),
}

/// A queued request waiting on one variable (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueuedEntry {
    Read(TxIdx),
    Write(TxIdx),
}

impl QueuedEntry {
    fn tx(self) -> TxIdx {
        match self {
            QueuedEntry::Read(t) | QueuedEntry::Write(t) => t,
        }
    }
}

/// Lock state for one variable: current holder plus FIFO queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VarLock {
    pub current: Option<LockEntry>,
    pub queue: Vec<QueuedEntry>,
}

impl VarLock {
    fn has_queued_write_except(&self, except: Option<TxIdx>) -> bool {
        self.queue.iter().any(|q| matches!(q, QueuedEntry::Write(t) if Some(*t) != except))
    }

    /// Dedup rule from spec.md §3/§9: a read is suppressed by *any* prior
    /// queued entry for the tx; a write only by a prior queued write.
    fn enqueue(&mut self, req: QueuedEntry) {
        let dup = match req {
            QueuedEntry::Read(t) => self.queue.iter().any(|q| q.tx() == t),
            QueuedEntry::Write(t) => self.queue.iter().any(|q| matches!(q, QueuedEntry::Write(o) if *o == t)),
        };
        if !dup {
            self.queue.push(req);
        }
    }

    /// Queue advancement / promotion policy (spec.md §4.2).
    fn advance_queue(&mut self) {
        if self.current.is_none() {
            if self.queue.is_empty() {
                return;
            }
            match self.queue.remove(0) {
                QueuedEntry::Read(t) => self.current = Some(LockEntry::Read(BTreeSet::from([t]))),
                QueuedEntry::Write(t) => self.current = Some(LockEntry::Write(t)),
            }
        }
        loop {
            let Some(LockEntry::Read(holders)) = &self.current else { break };
            let Some(&head) = self.queue.first() else { break };
            match head {
                QueuedEntry::Read(t) => {
                    self.queue.remove(0);
                    if let Some(LockEntry::Read(holders)) = &mut self.current {
                        holders.insert(t);
                    }
                }
                QueuedEntry::Write(t) => {
                    let sole = holders.len() == 1 && holders.contains(&t);
                    if sole {
                        self.queue.remove(0);
                        self.current = Some(LockEntry::Write(t));
                    }
                    break;
                }
            }
        }
    }

    fn release(&mut self, tx: TxIdx) {
        match &mut self.current {
            Some(LockEntry::Read(holders)) => {
                holders.remove(&tx);
                if holders.is_empty() {
                    self.current = None;
                }
            }
            Some(LockEntry::Write(holder)) if *holder == tx => self.current = None,
            _ => {}
        }
        self.queue.retain(|q| q.tx() != tx);
        self.advance_queue();
    }
}

/// Model state: one [`VarLock`] per variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LockModelState {
    pub vars: [VarLock; VAR_COUNT as usize],
}

impl LockModelState {
    /// True iff any variable has both a read holder set and that set
    /// simultaneously empty while marked current (spec.md §8 invariant #2).
    fn read_lock_never_empty(&self) -> bool {
        self.vars.iter().all(|v| !matches!(&v.current, Some(LockEntry::Read(h)) if h.is_empty()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockAction {
    AcquireRead { tx: TxIdx, var: VarIdx },
    AcquireWrite { tx: TxIdx, var: VarIdx },
    Release { tx: TxIdx },
}

/// Model of the lock manager over [`TX_COUNT`] transactions and
/// [`VAR_COUNT`] variables, for exhaustive bounded model checking.
pub struct LockModel;

impl Model for LockModel {
    type State = LockModelState;
    type Action = LockAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![LockModelState::default()]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        for tx in 0..TX_COUNT {
            let holds_any = state.vars.iter().any(|v| match &v.current {
                Some(LockEntry::Read(h)) => h.contains(&tx),
                Some(LockEntry::Write(h)) => *h == tx,
                None => false,
            });
            if holds_any {
                actions.push(LockAction::Release { tx });
            }
            for var in 0..VAR_COUNT {
                actions.push(LockAction::AcquireRead { tx, var });
                actions.push(LockAction::AcquireWrite { tx, var });
            }
        }
    }

    fn next_state(&self, state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut next = state.clone();
        match action {
            LockAction::AcquireRead { tx, var } => {
                let lock = &mut next.vars[var as usize];
                match lock.current.clone() {
                    None => lock.current = Some(LockEntry::Read(BTreeSet::from([tx]))),
                    Some(LockEntry::Read(mut holders)) => {
                        if holders.contains(&tx) {
                            // read-your-own-lock, no-op
                        } else if !lock.has_queued_write_except(None) {
                            holders.insert(tx);
                            lock.current = Some(LockEntry::Read(holders));
                        } else {
                            lock.enqueue(QueuedEntry::Read(tx));
                        }
                    }
                    Some(LockEntry::Write(holder)) if holder == tx => {}
                    Some(LockEntry::Write(_)) => lock.enqueue(QueuedEntry::Read(tx)),
                }
            }
            LockAction::AcquireWrite { tx, var } => {
                let lock = &mut next.vars[var as usize];
                let granted = match lock.current.clone() {
                    None => true,
                    Some(LockEntry::Read(holders)) => {
                        if holders.len() == 1 && holders.contains(&tx) {
                            if lock.has_queued_write_except(Some(tx)) {
                                lock.enqueue(QueuedEntry::Write(tx));
                                false
                            } else {
                                true
                            }
                        } else {
                            lock.enqueue(QueuedEntry::Write(tx));
                            false
                        }
                    }
                    Some(LockEntry::Write(holder)) if holder == tx => true,
                    Some(LockEntry::Write(_)) => {
                        lock.enqueue(QueuedEntry::Write(tx));
                        false
                    }
                };
                if granted {
                    lock.current = Some(LockEntry::Write(tx));
                }
            }
            LockAction::Release { tx } => {
                for lock in &mut next.vars {
                    lock.release(tx);
                }
            }
        }
        Some(next)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::always("read lock holder set is never empty", |_model: &Self, state: &Self::State| {
                state.read_lock_never_empty()
            }),
            Property::always("queue has at most one queued request per (tx, kind)", |_model: &Self, state: &Self::State| {
                state.vars.iter().all(|v| {
                    let mut seen = HashSet::new();
                    v.queue.iter().all(|q| seen.insert(*q))
                })
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateright::Checker;

    #[test]
    fn model_checks_small_state_space() {
        LockModel.checker().spawn_bfs().join().assert_properties();
    }

    #[test]
    #[ignore] // slower multi-threaded exploration, run with --ignored
    fn model_checks_with_parallel_threads() {
        LockModel.checker().threads(num_cpus::get()).spawn_bfs().join().assert_properties();
    }

    #[test]
    fn sole_reader_write_promotes() {
        let mut state = LockModelState::default();
        state.vars[0].current = Some(LockEntry::Read(BTreeSet::from([0])));
        state.vars[0].enqueue(QueuedEntry::Write(0));
        state.vars[0].advance_queue();
        assert_eq!(state.vars[0].current, Some(LockEntry::Write(0)));
    }

    #[test]
    fn non_sole_reader_write_does_not_promote() {
        let mut state = LockModelState::default();
        state.vars[0].current = Some(LockEntry::Read(BTreeSet::from([0, 1])));
        state.vars[0].enqueue(QueuedEntry::Write(0));
        state.vars[0].advance_queue();
        assert_eq!(state.vars[0].current, Some(LockEntry::Read(BTreeSet::from([0, 1]))));
    }
}
