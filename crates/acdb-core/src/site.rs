//! A single site's data manager: variables, lock tables, and the
//! read/write/commit/abort/fail/recover operations from spec.md §4.3-§4.7.

use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{SiteId, TxId, VarId};
use crate::lock::{LockRecord, QueuedRequest, VarLockManager};
use crate::value::Variable;

/// Outcome of a lock-based read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Success(i64),
    Fail,
}

impl ReadOutcome {
    #[must_use]
    pub fn value(self) -> Option<i64> {
        match self {
            ReadOutcome::Success(v) => Some(v),
            ReadOutcome::Fail => None,
        }
    }
}

/// One site in the ten-site cluster.
#[derive(Debug, Clone)]
pub struct Site {
    id: SiteId,
    up: bool,
    variables: BTreeMap<VarId, Variable>,
    locks: BTreeMap<VarId, VarLockManager>,
    fail_log: Vec<u64>,
    recover_log: Vec<u64>,
}

impl Site {
    /// Builds a site pre-populated with every variable it hosts (spec.md §3
    /// Placement), each seeded at `10 * i` for `xi` per spec.md §6.
    #[must_use]
    pub fn new(id: SiteId) -> Self {
        let mut variables = BTreeMap::new();
        let mut locks = BTreeMap::new();
        for n in VarId::MIN..=VarId::MAX {
            let var = VarId(n);
            let hosted = var.is_replicated() || var.home_site() == id;
            if hosted {
                variables.insert(var, Variable::initial(10 * i64::from(n)));
                locks.insert(var, VarLockManager::new());
            }
        }
        Self { id, up: true, variables, locks, fail_log: Vec::new(), recover_log: Vec::new() }
    }

    #[must_use]
    pub fn id(&self) -> SiteId {
        self.id
    }

    #[must_use]
    pub fn is_up(&self) -> bool {
        self.up
    }

    #[must_use]
    pub fn hosts(&self, var: VarId) -> bool {
        self.variables.contains_key(&var)
    }

    /// Lock-based read (spec.md §4.3). Caller must have already checked
    /// [`Site::is_up`] and [`Site::hosts`].
    pub fn read(&mut self, tx: &TxId, var: VarId) -> ReadOutcome {
        let variable = self.variables.get(&var).expect("read: variable not hosted at this site");
        if !variable.readable() {
            return ReadOutcome::Fail;
        }
        let latest = variable.latest_committed();
        let own_temp = variable.temp().filter(|t| &t.writer == tx).map(|t| t.value);

        let lm = self.locks.get_mut(&var).expect("lock manager missing for hosted variable");
        match lm.current().cloned() {
            None => {
                lm.grant_new_read(tx.clone());
                ReadOutcome::Success(latest)
            }
            Some(LockRecord::Read { holders }) => {
                if holders.contains(tx) {
                    ReadOutcome::Success(latest)
                } else if !lm.has_queued_write(None) {
                    lm.share_read(tx.clone());
                    ReadOutcome::Success(latest)
                } else {
                    lm.enqueue(QueuedRequest::Read(tx.clone()));
                    ReadOutcome::Fail
                }
            }
            Some(LockRecord::Write { holder }) if &holder == tx => {
                ReadOutcome::Success(own_temp.expect("write lock held but no temp value recorded"))
            }
            Some(LockRecord::Write { .. }) => {
                lm.enqueue(QueuedRequest::Read(tx.clone()));
                ReadOutcome::Fail
            }
        }
    }

    /// Multiversion snapshot read for read-only transactions (spec.md
    /// §4.3). Takes no locks.
    #[must_use]
    pub fn read_snapshot(&self, var: VarId, begin_ts: u64) -> ReadOutcome {
        let Some(variable) = self.variables.get(&var) else { return ReadOutcome::Fail };
        if !variable.readable() {
            return ReadOutcome::Fail;
        }
        let Some(candidate) = variable.commit_at_or_before(begin_ts) else { return ReadOutcome::Fail };
        if var.is_replicated() {
            let invalidated = self.fail_log.iter().any(|&f| candidate.commit_ts < f && f <= begin_ts);
            if invalidated {
                return ReadOutcome::Fail;
            }
        }
        ReadOutcome::Success(candidate.value)
    }

    /// Probe phase of the write path (spec.md §4.4).
    pub fn can_get_write_lock(&mut self, tx: &TxId, var: VarId) -> bool {
        let lm = self.locks.get_mut(&var).expect("lock manager missing for hosted variable");
        match lm.current().cloned() {
            None => true,
            Some(LockRecord::Read { holders }) => {
                if holders.len() == 1 && holders.contains(tx) {
                    if lm.has_queued_write(Some(tx)) {
                        lm.enqueue(QueuedRequest::Write(tx.clone()));
                        false
                    } else {
                        true
                    }
                } else {
                    lm.enqueue(QueuedRequest::Write(tx.clone()));
                    false
                }
            }
            Some(LockRecord::Write { holder }) if &holder == tx => true,
            Some(LockRecord::Write { .. }) => {
                lm.enqueue(QueuedRequest::Write(tx.clone()));
                false
            }
        }
    }

    /// Mutate phase of the write path. Always succeeds; callers must only
    /// invoke this after every relevant site's [`Site::can_get_write_lock`]
    /// returned true (spec.md §4.4).
    pub fn write(&mut self, tx: &TxId, var: VarId, val: i64) {
        let variable = self.variables.get_mut(&var).expect("write: variable not hosted at this site");
        variable.set_temp(val, tx.clone());
        self.locks.get_mut(&var).expect("lock manager missing for hosted variable").grant_write(tx.clone());
    }

    /// Commits `tx`'s locks and temp writes at this site (spec.md §4.5).
    pub fn commit(&mut self, tx: &TxId, commit_ts: u64) {
        for (var, lm) in &self.locks {
            debug_assert!(
                !lm.queue().iter().any(|r| r.tx() == tx),
                "tx {tx} has a queued request on {var} at commit time"
            );
        }
        for lm in self.locks.values_mut() {
            lm.release_holder(tx);
        }
        for variable in self.variables.values_mut() {
            if variable.temp().is_some_and(|t| &t.writer == tx) {
                variable.commit_temp(tx, commit_ts);
                variable.set_readable(true);
            }
        }
        for lm in self.locks.values_mut() {
            lm.advance_queue();
        }
    }

    /// Aborts `tx` at this site: releases locks, drops queued requests, and
    /// discards temp writes (spec.md §4.5).
    pub fn abort(&mut self, tx: &TxId) {
        for lm in self.locks.values_mut() {
            lm.release_holder(tx);
            lm.remove_queued_of(tx);
        }
        for variable in self.variables.values_mut() {
            variable.clear_temp_of(tx);
        }
        for lm in self.locks.values_mut() {
            lm.advance_queue();
        }
    }

    /// Fails this site (spec.md §4.6). Caller must have already checked
    /// [`Site::is_up`].
    pub fn fail(&mut self, ts: u64) {
        debug_assert!(self.up, "fail called on site {} which is already down", self.id);
        self.fail_log.push(ts);
        self.up = false;
        for lm in self.locks.values_mut() {
            lm.reset();
        }
    }

    /// Recovers this site (spec.md §4.6). Caller must have already checked
    /// `!`[`Site::is_up`].
    pub fn recover(&mut self, ts: u64) {
        debug_assert!(!self.up, "recover called on site {} which is already up", self.id);
        self.recover_log.push(ts);
        self.up = true;
        for (var, variable) in &mut self.variables {
            if var.is_replicated() {
                variable.set_readable(false);
            }
        }
    }

    /// This site's contribution to the global waits-for graph (spec.md
    /// §4.7).
    #[must_use]
    pub fn wait_for_graph(&self) -> BTreeMap<TxId, BTreeSet<TxId>> {
        let mut edges: Vec<(TxId, TxId)> = Vec::new();
        for lm in self.locks.values() {
            let queue: Vec<&QueuedRequest> = lm.queue().iter().collect();
            if let Some(current) = lm.current() {
                let left = GraphEntry::from_lock(current);
                for right in &queue {
                    edges.extend(blocks(&left, &GraphEntry::from_queued(right)));
                }
            }
            for i in 0..queue.len() {
                for j in (i + 1)..queue.len() {
                    let left = GraphEntry::from_queued(queue[i]);
                    let right = GraphEntry::from_queued(queue[j]);
                    edges.extend(blocks(&left, &right));
                }
            }
        }
        let mut graph: BTreeMap<TxId, BTreeSet<TxId>> = BTreeMap::new();
        for (from, to) in edges {
            graph.entry(from).or_default().insert(to);
        }
        graph
    }

    /// Committed value of every variable hosted here, for `dump`.
    #[must_use]
    pub fn data_snapshot(&self) -> Vec<(VarId, i64)> {
        self.variables.iter().map(|(&var, v)| (var, v.latest_committed())).collect()
    }

    /// Current lock (if any) of every variable hosted here, for `dump`.
    #[must_use]
    pub fn lock_snapshot(&self) -> Vec<(VarId, Option<LockRecord>)> {
        self.locks.iter().map(|(&var, lm)| (var, lm.current().cloned())).collect()
    }

    /// Every variable hosted here, with its commit history — used by the
    /// property checker, not by normal operation.
    pub fn variables(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.variables.iter().map(|(&var, v)| (var, v))
    }

    /// True iff every lock manager at this site has no current lock and no
    /// queued requests (spec.md §8, invariant 6).
    #[must_use]
    pub fn locks_empty(&self) -> bool {
        self.locks.values().all(|lm| lm.current().is_none() && lm.queue().is_empty())
    }
}

/// A uniform view of a current lock or queued request for the blocks
/// relation B(left, right) in spec.md §4.7.
enum GraphEntry {
    Read(BTreeSet<TxId>),
    Write(TxId),
}

impl GraphEntry {
    fn from_lock(l: &LockRecord) -> Self {
        match l {
            LockRecord::Read { holders } => GraphEntry::Read(holders.clone()),
            LockRecord::Write { holder } => GraphEntry::Write(holder.clone()),
        }
    }

    fn from_queued(q: &QueuedRequest) -> Self {
        match q {
            QueuedRequest::Read(tx) => GraphEntry::Read(BTreeSet::from([tx.clone()])),
            QueuedRequest::Write(tx) => GraphEntry::Write(tx.clone()),
        }
    }
}

/// Implements the B(left, right) blocks-relation from spec.md §4.7,
/// returning `(from, to)` edges meaning `from` waits for `to`.
fn blocks(left: &GraphEntry, right: &GraphEntry) -> Vec<(TxId, TxId)> {
    match (left, right) {
        (GraphEntry::Read(left_holders), GraphEntry::Write(right_tx)) => {
            let solely_right = left_holders.len() == 1 && left_holders.contains(right_tx);
            if solely_right {
                Vec::new()
            } else {
                left_holders.iter().filter(|h| *h != right_tx).map(|h| (h.clone(), right_tx.clone())).collect()
            }
        }
        (GraphEntry::Write(left_tx), GraphEntry::Read(right_holders)) => {
            if right_holders.contains(left_tx) {
                Vec::new()
            } else {
                let holder = right_holders.iter().next().expect("queued read has a holder").clone();
                vec![(holder, left_tx.clone())]
            }
        }
        (GraphEntry::Write(left_tx), GraphEntry::Write(right_tx)) => {
            if left_tx == right_tx {
                Vec::new()
            } else {
                vec![(right_tx.clone(), left_tx.clone())]
            }
        }
        (GraphEntry::Read(_), GraphEntry::Read(_)) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(s: &str) -> TxId {
        TxId::from(s)
    }

    #[test]
    fn new_site_hosts_replicated_and_home_variables() {
        let site = Site::new(SiteId(2));
        assert!(site.hosts(VarId(2)), "even variables are replicated everywhere");
        assert!(site.hosts(VarId(1)), "x1's home site is 2");
        assert!(!site.hosts(VarId(3)), "x3's home site is 4, not 2");
    }

    #[test]
    fn read_returns_latest_committed_when_unlocked() {
        let mut site = Site::new(SiteId(2));
        assert_eq!(site.read(&tx("T1"), VarId(2)), ReadOutcome::Success(20));
    }

    #[test]
    fn read_your_own_write() {
        let mut site = Site::new(SiteId(2));
        let t1 = tx("T1");
        assert!(site.can_get_write_lock(&t1, VarId(2)));
        site.write(&t1, VarId(2), 99);
        assert_eq!(site.read(&t1, VarId(2)), ReadOutcome::Success(99));
    }

    #[test]
    fn write_blocked_by_other_reader_enqueues() {
        let mut site = Site::new(SiteId(2));
        let t1 = tx("T1");
        let t2 = tx("T2");
        site.read(&t1, VarId(2));
        assert!(!site.can_get_write_lock(&t2, VarId(2)));
    }

    #[test]
    fn fail_clears_locks_but_keeps_data() {
        let mut site = Site::new(SiteId(2));
        let t1 = tx("T1");
        site.read(&t1, VarId(2));
        site.fail(5);
        assert!(!site.is_up());
        assert!(site.lock_snapshot().iter().all(|(_, l)| l.is_none()));
        assert_eq!(site.data_snapshot().iter().find(|(v, _)| *v == VarId(2)).unwrap().1, 20);
    }

    #[test]
    fn recover_marks_replicated_variables_unreadable() {
        let mut site = Site::new(SiteId(2));
        site.fail(1);
        site.recover(2);
        assert_eq!(site.read_snapshot(VarId(2), 100), ReadOutcome::Fail);
    }

    #[test]
    fn wait_for_graph_write_blocked_by_two_readers() {
        let mut site = Site::new(SiteId(2));
        let t1 = tx("T1");
        let t2 = tx("T2");
        let t3 = tx("T3");
        site.read(&t1, VarId(2));
        site.read(&t2, VarId(2));
        assert!(!site.can_get_write_lock(&t3, VarId(2)));
        let graph = site.wait_for_graph();
        assert_eq!(graph.get(&t1).unwrap(), &BTreeSet::from([t3.clone()]));
        assert_eq!(graph.get(&t2).unwrap(), &BTreeSet::from([t3]));
    }
}
