//! Per-variable lock manager: current lock plus a FIFO wait queue.
//!
//! Mirrors `original_source/Data_Manager.py`'s `VarLockManager`/`Lock`
//! classes, translated into a tagged-variant representation (spec.md §9:
//! "Inheritance of Lock is modeled as a tagged variant... no virtual
//! dispatch needed").

use std::collections::{BTreeSet, VecDeque};

use crate::ids::TxId;

/// The kind of a lock or queued request, ignoring holders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Read,
    Write,
}

/// The lock currently held on a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockRecord {
    Read { holders: BTreeSet<TxId> },
    Write { holder: TxId },
}

impl LockRecord {
    #[must_use]
    pub fn kind(&self) -> LockKind {
        match self {
            LockRecord::Read { .. } => LockKind::Read,
            LockRecord::Write { .. } => LockKind::Write,
        }
    }

    #[must_use]
    pub fn holders(&self) -> BTreeSet<TxId> {
        match self {
            LockRecord::Read { holders } => holders.clone(),
            LockRecord::Write { holder } => BTreeSet::from([holder.clone()]),
        }
    }
}

/// A waiting request for a lock, queued because it could not be granted
/// immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuedRequest {
    Read(TxId),
    Write(TxId),
}

impl QueuedRequest {
    #[must_use]
    pub fn tx(&self) -> &TxId {
        match self {
            QueuedRequest::Read(tx) | QueuedRequest::Write(tx) => tx,
        }
    }

    #[must_use]
    pub fn kind(&self) -> LockKind {
        match self {
            QueuedRequest::Read(_) => LockKind::Read,
            QueuedRequest::Write(_) => LockKind::Write,
        }
    }
}

/// Lock state for a single variable at a single site.
#[derive(Debug, Clone, Default)]
pub struct VarLockManager {
    current: Option<LockRecord>,
    queue: VecDeque<QueuedRequest>,
}

impl VarLockManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> Option<&LockRecord> {
        self.current.as_ref()
    }

    /// True iff any queued request is a write, optionally excluding one
    /// transaction (used when a write probes whether it would be blocked by
    /// some *other* pending write, per spec.md §4.4).
    #[must_use]
    pub fn has_queued_write(&self, except_tx: Option<&TxId>) -> bool {
        self.queue.iter().any(|r| {
            matches!(r, QueuedRequest::Write(tx) if except_tx != Some(tx))
        })
    }

    /// Applies the dedup rule from spec.md §3/§9: a read is suppressed by
    /// *any* existing queued entry for the same tx; a write is suppressed
    /// only by an existing queued write for the same tx.
    pub fn enqueue(&mut self, req: QueuedRequest) {
        let dup = match &req {
            QueuedRequest::Read(tx) => self.queue.iter().any(|r| r.tx() == tx),
            QueuedRequest::Write(tx) => {
                self.queue.iter().any(|r| matches!(r, QueuedRequest::Write(t) if t == tx))
            }
        };
        if !dup {
            self.queue.push_back(req);
        }
    }

    /// Adds `tx` to the holder set of a current read lock. Panics if the
    /// current lock is absent or a write — callers must only call this when
    /// they've already established the current lock is a compatible read
    /// (spec.md §4.1).
    pub fn share_read(&mut self, tx: TxId) {
        match &mut self.current {
            Some(LockRecord::Read { holders }) => {
                holders.insert(tx);
            }
            other => panic!("share_read called with current lock {other:?}, expected a read lock"),
        }
    }

    /// Installs a fresh read lock held solely by `tx`.
    pub fn grant_new_read(&mut self, tx: TxId) {
        debug_assert!(self.current.is_none(), "grant_new_read called with a lock already current");
        self.current = Some(LockRecord::Read { holders: BTreeSet::from([tx]) });
    }

    /// Installs a write lock by `tx`, replacing whatever was current. This
    /// is also how lock promotion happens when the prior current was a read
    /// lock solely held by `tx` (spec.md §4.4, §9).
    pub fn grant_write(&mut self, tx: TxId) {
        self.current = Some(LockRecord::Write { holder: tx });
    }

    /// Releases any current lock held by `tx`. No-op if `tx` holds nothing.
    pub fn release_holder(&mut self, tx: &TxId) {
        match &mut self.current {
            Some(LockRecord::Read { holders }) => {
                holders.remove(tx);
                if holders.is_empty() {
                    self.current = None;
                }
            }
            Some(LockRecord::Write { holder }) if holder == tx => {
                self.current = None;
            }
            _ => {}
        }
    }

    /// Removes every queued request by `tx` (used on abort).
    pub fn remove_queued_of(&mut self, tx: &TxId) {
        self.queue.retain(|r| r.tx() != tx);
    }

    /// Clears current and queue entirely — a site failure discards all lock
    /// state but not the underlying data (spec.md §4.6).
    pub fn reset(&mut self) {
        self.current = None;
        self.queue.clear();
    }

    #[must_use]
    pub fn queue(&self) -> &VecDeque<QueuedRequest> {
        &self.queue
    }

    /// Queue advancement / promotion policy (spec.md §4.2). Called after
    /// any release.
    pub fn advance_queue(&mut self) {
        if self.current.is_none() {
            match self.queue.pop_front() {
                Some(QueuedRequest::Read(tx)) => self.current = Some(LockRecord::Read { holders: BTreeSet::from([tx]) }),
                Some(QueuedRequest::Write(tx)) => self.current = Some(LockRecord::Write { holder: tx }),
                None => return,
            }
        }

        loop {
            if !matches!(self.current, Some(LockRecord::Read { .. })) {
                break;
            }
            let Some(head) = self.queue.front().cloned() else { break };
            match head {
                QueuedRequest::Read(tx) => {
                    self.queue.pop_front();
                    if let Some(LockRecord::Read { holders }) = &mut self.current {
                        holders.insert(tx);
                    }
                }
                QueuedRequest::Write(tx) => {
                    let sole_holder = matches!(
                        &self.current,
                        Some(LockRecord::Read { holders }) if holders.len() == 1 && holders.contains(&tx)
                    );
                    if sole_holder {
                        self.queue.pop_front();
                        self.current = Some(LockRecord::Write { holder: tx });
                    }
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(s: &str) -> TxId {
        TxId::from(s)
    }

    #[test]
    fn dedup_read_suppressed_by_any_prior_entry() {
        let mut lm = VarLockManager::new();
        lm.enqueue(QueuedRequest::Write(tx("T1")));
        lm.enqueue(QueuedRequest::Read(tx("T1")));
        assert_eq!(lm.queue().len(), 1, "read request for T1 should be suppressed by its queued write");
    }

    #[test]
    fn dedup_write_suppressed_only_by_prior_write() {
        let mut lm = VarLockManager::new();
        lm.enqueue(QueuedRequest::Read(tx("T1")));
        lm.enqueue(QueuedRequest::Write(tx("T1")));
        assert_eq!(lm.queue().len(), 2, "a queued read for T1 must not suppress T1's write request");
    }

    #[test]
    fn advance_queue_pops_into_empty_current() {
        let mut lm = VarLockManager::new();
        lm.enqueue(QueuedRequest::Read(tx("T1")));
        lm.advance_queue();
        assert_eq!(lm.current().unwrap().kind(), LockKind::Read);
        assert!(lm.current().unwrap().holders().contains(&tx("T1")));
    }

    #[test]
    fn advance_queue_coalesces_reads_until_a_write() {
        let mut lm = VarLockManager::new();
        lm.grant_new_read(tx("T1"));
        lm.enqueue(QueuedRequest::Read(tx("T2")));
        lm.enqueue(QueuedRequest::Write(tx("T3")));
        lm.enqueue(QueuedRequest::Read(tx("T4")));
        lm.advance_queue();
        let holders = lm.current().unwrap().holders();
        assert_eq!(holders, BTreeSet::from([tx("T1"), tx("T2")]));
        assert_eq!(lm.queue().len(), 2, "write and the read behind it stay queued");
    }

    #[test]
    fn advance_queue_promotes_sole_reader_write() {
        let mut lm = VarLockManager::new();
        lm.grant_new_read(tx("T1"));
        lm.enqueue(QueuedRequest::Write(tx("T1")));
        lm.advance_queue();
        assert_eq!(lm.current(), Some(&LockRecord::Write { holder: tx("T1") }));
    }

    #[test]
    fn advance_queue_does_not_promote_write_by_non_sole_holder() {
        let mut lm = VarLockManager::new();
        lm.grant_new_read(tx("T1"));
        lm.share_read(tx("T2"));
        lm.enqueue(QueuedRequest::Write(tx("T1")));
        lm.advance_queue();
        assert_eq!(lm.current().unwrap().kind(), LockKind::Read);
        assert_eq!(lm.queue().len(), 1, "write stays queued since holders aren't just {T1}");
    }
}
