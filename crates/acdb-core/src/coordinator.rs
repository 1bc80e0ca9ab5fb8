//! The transaction manager: logical clock, transaction table, pending
//! operations, and the site fleet (spec.md §4.8-§4.10).

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CcError, Result};
use crate::ids::{SiteId, TxId, VarId};
use crate::instruction::Instruction;
use crate::lock::LockRecord;
use crate::pending::PendingOp;
use crate::site::{ReadOutcome, Site};
use crate::transaction::Transaction;

/// A record of something that happened while processing an instruction.
///
/// The coordinator never prints; it buffers these and the caller — the
/// driver in `acdb-cli` — drains and formats them. This keeps logging an
/// external collaborator per spec.md §1 while still satisfying the output
/// contract in spec.md §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Accepted { ts: u64, summary: String },
    Read { ts: u64, tx: TxId, var: VarId, result: Option<i64> },
    Write { ts: u64, tx: TxId, var: VarId, val: i64, success: bool },
    Commit { ts: u64, tx: TxId },
    Abort { ts: u64, tx: TxId },
    DeadlockVictim { ts: u64, tx: TxId },
    SiteFailed { ts: u64, site: SiteId },
    SiteRecovered { ts: u64, site: SiteId },
    Dump { site: SiteId, data: Vec<(VarId, i64)>, locks: Vec<(VarId, Option<LockRecord>)> },
}

/// Owns the transaction table, logical clock, pending set, and all ten
/// sites. The single entry point is [`Coordinator::process`].
#[derive(Debug, Clone)]
pub struct Coordinator {
    clock: u64,
    transactions: BTreeMap<TxId, Transaction>,
    pending: Vec<PendingOp>,
    sites: BTreeMap<SiteId, Site>,
    events: Vec<TraceEvent>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    #[must_use]
    pub fn new() -> Self {
        let sites = SiteId::all().map(|id| (id, Site::new(id))).collect();
        Self { clock: 0, transactions: BTreeMap::new(), pending: Vec::new(), sites, events: Vec::new() }
    }

    #[must_use]
    pub fn clock(&self) -> u64 {
        self.clock
    }

    #[must_use]
    pub fn sites(&self) -> &BTreeMap<SiteId, Site> {
        &self.sites
    }

    #[must_use]
    pub fn transactions(&self) -> &BTreeMap<TxId, Transaction> {
        &self.transactions
    }

    #[must_use]
    pub fn pending(&self) -> &[PendingOp] {
        &self.pending
    }

    /// Drains buffered trace events for the caller to print.
    pub fn drain_events(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Processes one instruction end to end (spec.md §4.8): deadlock
    /// detection, the instruction itself, a drain of the pending set, then
    /// the clock tick. The clock advances exactly once per call regardless
    /// of whether `instr` succeeded (spec.md §9, second open question).
    pub fn process(&mut self, instr: Instruction) -> Result<()> {
        if self.detect_and_resolve_deadlock() {
            self.drain_pending();
        }
        let result = self.apply(instr);
        self.drain_pending();
        self.clock += 1;
        result
    }

    fn apply(&mut self, instr: Instruction) -> Result<()> {
        match instr {
            Instruction::Begin(tx) => self.begin(tx, false),
            Instruction::BeginRo(tx) => self.begin(tx, true),
            Instruction::Read(tx, var) => self.enqueue_read(tx, var),
            Instruction::Write(tx, var, val) => self.enqueue_write(tx, var, val),
            Instruction::End(tx) => self.end(tx),
            Instruction::Fail(site) => self.fail_site(site),
            Instruction::Recover(site) => self.recover_site(site),
            Instruction::Dump => {
                self.dump();
                Ok(())
            }
        }
    }

    fn begin(&mut self, tx: TxId, read_only: bool) -> Result<()> {
        if self.transactions.contains_key(&tx) {
            return Err(CcError::DuplicateTransaction(tx));
        }
        let summary = format!("begin{}({tx})", if read_only { "RO" } else { "" });
        self.transactions.insert(tx.clone(), Transaction::new(tx, self.clock, read_only));
        self.events.push(TraceEvent::Accepted { ts: self.clock, summary });
        Ok(())
    }

    fn enqueue_read(&mut self, tx: TxId, var: VarId) -> Result<()> {
        if !self.transactions.contains_key(&tx) {
            return Err(CcError::UnknownTransaction(tx));
        }
        self.events.push(TraceEvent::Accepted { ts: self.clock, summary: format!("R({tx},{var})") });
        self.pending.push(PendingOp::Read { tx, var });
        Ok(())
    }

    fn enqueue_write(&mut self, tx: TxId, var: VarId, val: i64) -> Result<()> {
        if !self.transactions.contains_key(&tx) {
            return Err(CcError::UnknownTransaction(tx));
        }
        self.events.push(TraceEvent::Accepted { ts: self.clock, summary: format!("W({tx},{var},{val})") });
        self.pending.push(PendingOp::Write { tx, var, val });
        Ok(())
    }

    fn end(&mut self, tx: TxId) -> Result<()> {
        let txn = self.transactions.remove(&tx).ok_or_else(|| CcError::UnknownTransaction(tx.clone()))?;
        if txn.should_abort {
            for site in self.sites.values_mut() {
                site.abort(&txn.id);
            }
            self.events.push(TraceEvent::Abort { ts: self.clock, tx: txn.id });
        } else {
            for site in self.sites.values_mut() {
                site.commit(&txn.id, self.clock);
            }
            self.events.push(TraceEvent::Commit { ts: self.clock, tx: txn.id });
        }
        self.pending.retain(|op| op.tx() != &tx);
        Ok(())
    }

    fn fail_site(&mut self, site_id: SiteId) -> Result<()> {
        let site = self.sites.get_mut(&site_id).ok_or(CcError::UnknownSite(site_id))?;
        if !site.is_up() {
            return Err(CcError::SiteAlreadyDown(site_id));
        }
        site.fail(self.clock);
        self.events.push(TraceEvent::SiteFailed { ts: self.clock, site: site_id });
        for txn in self.transactions.values_mut() {
            if !txn.read_only && txn.touched_sites.contains(&site_id) {
                txn.should_abort = true;
            }
        }
        Ok(())
    }

    fn recover_site(&mut self, site_id: SiteId) -> Result<()> {
        let site = self.sites.get_mut(&site_id).ok_or(CcError::UnknownSite(site_id))?;
        if site.is_up() {
            return Err(CcError::SiteAlreadyUp(site_id));
        }
        site.recover(self.clock);
        self.events.push(TraceEvent::SiteRecovered { ts: self.clock, site: site_id });
        Ok(())
    }

    fn dump(&mut self) {
        let snapshots: Vec<_> =
            self.sites.iter().map(|(&id, s)| (id, s.data_snapshot(), s.lock_snapshot())).collect();
        for (site, data, locks) in snapshots {
            self.events.push(TraceEvent::Dump { site, data, locks });
        }
    }

    /// Retries every pending operation once (spec.md §4.9). Iterates a
    /// snapshot so that successes can be removed without disturbing the
    /// rest of the scan (spec.md §9).
    fn drain_pending(&mut self) {
        let ops = std::mem::take(&mut self.pending);
        let mut still_pending = Vec::with_capacity(ops.len());
        for op in ops {
            if !self.transactions.contains_key(op.tx()) {
                continue;
            }
            let done = match &op {
                PendingOp::Read { tx, var } => self.try_read(tx, *var),
                PendingOp::Write { tx, var, val } => self.try_write(tx, *var, *val),
            };
            if !done {
                still_pending.push(op);
            }
        }
        self.pending = still_pending;
    }

    fn try_read(&mut self, tx: &TxId, var: VarId) -> bool {
        let read_only = self.transactions[tx].read_only;
        let outcome = if read_only {
            let begin_ts = self.transactions[tx].begin_ts;
            self.sites
                .values()
                .filter(|s| s.is_up() && s.hosts(var))
                .find_map(|s| s.read_snapshot(var, begin_ts).value())
        } else {
            let mut hit_site = None;
            let result = self.sites.iter_mut().filter(|(_, s)| s.is_up() && s.hosts(var)).find_map(
                |(&id, s)| match s.read(tx, var) {
                    ReadOutcome::Success(v) => {
                        hit_site = Some(id);
                        Some(v)
                    }
                    ReadOutcome::Fail => None,
                },
            );
            if let (Some(site_id), Some(txn)) = (hit_site, self.transactions.get_mut(tx)) {
                txn.touched_sites.insert(site_id);
            }
            result
        };
        self.events.push(TraceEvent::Read { ts: self.clock, tx: tx.clone(), var, result: outcome });
        outcome.is_some()
    }

    fn try_write(&mut self, tx: &TxId, var: VarId, val: i64) -> bool {
        let site_ids: Vec<SiteId> =
            self.sites.iter().filter(|(_, s)| s.is_up() && s.hosts(var)).map(|(&id, _)| id).collect();

        let success = !site_ids.is_empty()
            && site_ids.iter().fold(true, |ok, &id| {
                let granted = self.sites.get_mut(&id).expect("site id from own site list").can_get_write_lock(tx, var);
                ok && granted
            });

        if success {
            for &id in &site_ids {
                self.sites.get_mut(&id).expect("site id from own site list").write(tx, var, val);
            }
            if let Some(txn) = self.transactions.get_mut(tx) {
                txn.touched_sites.extend(site_ids.iter().copied());
            }
        }
        self.events.push(TraceEvent::Write { ts: self.clock, tx: tx.clone(), var, val, success });
        success
    }

    /// Unions the waits-for graph of every up site, finds all transactions
    /// participating in any cycle, and aborts the one with the largest
    /// begin timestamp (spec.md §4.10). Returns whether a victim was
    /// aborted.
    fn detect_and_resolve_deadlock(&mut self) -> bool {
        let mut graph: BTreeMap<TxId, BTreeSet<TxId>> = BTreeMap::new();
        for site in self.sites.values().filter(|s| s.is_up()) {
            for (from, tos) in site.wait_for_graph() {
                graph.entry(from).or_default().extend(tos);
            }
        }

        let cyclic: BTreeSet<TxId> = graph.keys().filter(|tx| is_in_cycle(&graph, tx)).cloned().collect();
        let Some(victim) = cyclic.iter().filter_map(|tx| self.transactions.get(tx)).max_by_key(|t| t.begin_ts)
        else {
            return false;
        };
        let victim_id = victim.id.clone();

        for site in self.sites.values_mut() {
            site.abort(&victim_id);
        }
        self.transactions.remove(&victim_id);
        self.pending.retain(|op| op.tx() != &victim_id);
        self.events.push(TraceEvent::DeadlockVictim { ts: self.clock, tx: victim_id });
        true
    }
}

/// True iff `node` is reachable from itself via one or more edges —
/// equivalently, `node` participates in some cycle.
fn is_in_cycle(graph: &BTreeMap<TxId, BTreeSet<TxId>>, node: &TxId) -> bool {
    let mut visited: BTreeSet<TxId> = BTreeSet::new();
    let mut frontier: Vec<TxId> = graph.get(node).into_iter().flatten().cloned().collect();
    while let Some(n) = frontier.pop() {
        if &n == node {
            return true;
        }
        if visited.insert(n.clone()) {
            if let Some(next) = graph.get(&n) {
                frontier.extend(next.iter().cloned());
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(s: &str) -> TxId {
        TxId::from(s)
    }

    fn var(n: u8) -> VarId {
        VarId::new(n).unwrap()
    }

    fn site(n: u8) -> SiteId {
        SiteId::new(n).unwrap()
    }

    /// S1 — simple commit & read.
    #[test]
    fn s1_simple_commit_and_read() {
        let mut c = Coordinator::new();
        c.process(Instruction::Begin(tx("T1"))).unwrap();
        c.process(Instruction::Write(tx("T1"), var(1), 101)).unwrap();
        c.process(Instruction::End(tx("T1"))).unwrap();
        c.process(Instruction::Begin(tx("T2"))).unwrap();
        c.process(Instruction::Read(tx("T2"), var(1))).unwrap();
        let events = c.drain_events();
        let read = events
            .iter()
            .filter_map(|e| match e {
                TraceEvent::Read { tx, result: Some(v), .. } if tx.0 == "T2" => Some(*v),
                _ => None,
            })
            .last();
        assert_eq!(read, Some(101));
        c.process(Instruction::End(tx("T2"))).unwrap();
    }

    /// S2 — read-your-own-write.
    #[test]
    fn s2_read_your_own_write() {
        let mut c = Coordinator::new();
        c.process(Instruction::Begin(tx("T1"))).unwrap();
        c.process(Instruction::Write(tx("T1"), var(2), 22)).unwrap();
        c.process(Instruction::Read(tx("T1"), var(2))).unwrap();
        let events = c.drain_events();
        let read = events.iter().rev().find_map(|e| match e {
            TraceEvent::Read { result: Some(v), .. } => Some(*v),
            _ => None,
        });
        assert_eq!(read, Some(22));
    }

    /// S3 — site failure before commit aborts the touching writer.
    #[test]
    fn s3_fail_aborts_touching_writer() {
        let mut c = Coordinator::new();
        c.process(Instruction::Begin(tx("T1"))).unwrap();
        c.process(Instruction::Write(tx("T1"), var(6), 66)).unwrap();
        c.process(Instruction::Fail(site(2))).unwrap();
        c.process(Instruction::End(tx("T1"))).unwrap();
        let events = c.drain_events();
        assert!(events.iter().any(|e| matches!(e, TraceEvent::Abort { tx, .. } if tx.0 == "T1")));
        for (&id, s) in c.sites() {
            if id != site(2) {
                assert_eq!(s.data_snapshot().iter().find(|(v, _)| *v == var(6)).unwrap().1, 60);
            }
        }
    }

    /// S4 — recover leaves the replica unreadable until a fresh commit.
    #[test]
    fn s4_recover_then_unreadable_replica() {
        let mut c = Coordinator::new();
        c.process(Instruction::Fail(site(2))).unwrap();
        c.process(Instruction::Recover(site(2))).unwrap();
        c.process(Instruction::Begin(tx("T1"))).unwrap();
        c.process(Instruction::Read(tx("T1"), var(4))).unwrap();
        let events = c.drain_events();
        let read = events.iter().rev().find_map(|e| match e {
            TraceEvent::Read { result: Some(v), .. } => Some(*v),
            _ => None,
        });
        assert_eq!(read, Some(40));
    }

    /// S5 — snapshot reads ignore writes committed after the reader began.
    #[test]
    fn s5_snapshot_ignores_later_writes() {
        let mut c = Coordinator::new();
        c.process(Instruction::Begin(tx("T1"))).unwrap();
        c.process(Instruction::Write(tx("T1"), var(8), 88)).unwrap();
        c.process(Instruction::BeginRo(tx("T2"))).unwrap();
        c.process(Instruction::End(tx("T1"))).unwrap();
        c.process(Instruction::Read(tx("T2"), var(8))).unwrap();
        let events = c.drain_events();
        let read = events.iter().rev().find_map(|e| match e {
            TraceEvent::Read { result: Some(v), .. } => Some(*v),
            _ => None,
        });
        assert_eq!(read, Some(80));
    }

    /// S6 — deadlock resolves by aborting the youngest transaction.
    #[test]
    fn s6_deadlock_youngest_victim() {
        let mut c = Coordinator::new();
        c.process(Instruction::Begin(tx("T1"))).unwrap();
        c.process(Instruction::Begin(tx("T2"))).unwrap();
        c.process(Instruction::Write(tx("T1"), var(1), 1)).unwrap();
        c.process(Instruction::Write(tx("T2"), var(3), 3)).unwrap();
        c.process(Instruction::Write(tx("T1"), var(3), 31)).unwrap();
        c.process(Instruction::Write(tx("T2"), var(1), 13)).unwrap();
        // Next instruction boundary runs deadlock detection and should abort T2.
        c.process(Instruction::Dump).unwrap();
        let events = c.drain_events();
        assert!(events.iter().any(|e| matches!(e, TraceEvent::DeadlockVictim { tx, .. } if tx.0 == "T2")));
        assert!(c.transactions().contains_key(&tx("T1")));
        assert!(!c.transactions().contains_key(&tx("T2")));

        c.process(Instruction::End(tx("T1"))).unwrap();
        let x1 = c.sites()[&site(2)].data_snapshot().into_iter().find(|(v, _)| *v == var(1)).unwrap().1;
        let x3 = c.sites()[&site(4)].data_snapshot().into_iter().find(|(v, _)| *v == var(3)).unwrap().1;
        assert_eq!(x1, 1);
        assert_eq!(x3, 31);
    }

    #[test]
    fn duplicate_begin_is_an_error() {
        let mut c = Coordinator::new();
        c.process(Instruction::Begin(tx("T1"))).unwrap();
        assert_eq!(c.process(Instruction::Begin(tx("T1"))), Err(CcError::DuplicateTransaction(tx("T1"))));
    }

    #[test]
    fn clock_advances_even_on_error() {
        let mut c = Coordinator::new();
        let before = c.clock();
        let _ = c.process(Instruction::End(tx("ghost")));
        assert_eq!(c.clock(), before + 1);
    }
}
