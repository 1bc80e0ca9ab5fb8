//! Variable state: commit history, pending temp write, and readability.

use crate::ids::TxId;

/// One entry in a variable's chronological commit history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub value: i64,
    pub commit_ts: u64,
}

/// An uncommitted write, visible only to its writer (read-your-own-write).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempWrite {
    pub value: i64,
    pub writer: TxId,
}

/// A single site's copy of a variable.
///
/// `readable` starts `true` and is the per-(site, variable) flag from
/// spec.md §9's first open question: it is cleared on recovery for
/// replicated variables and set again the next time this site commits a
/// write to the variable. Non-replicated variables never have it cleared,
/// since a non-replicated variable has only one home site and recovering it
/// has no "other copy" to prefer instead.
#[derive(Debug, Clone)]
pub struct Variable {
    history: Vec<CommitRecord>,
    temp: Option<TempWrite>,
    readable: bool,
}

impl Variable {
    /// A freshly initialized variable with its `10 * i` seed commit at ts 0
    /// (spec.md §6, Initial data).
    #[must_use]
    pub fn initial(seed_value: i64) -> Self {
        Self {
            history: vec![CommitRecord { value: seed_value, commit_ts: 0 }],
            temp: None,
            readable: true,
        }
    }

    #[must_use]
    pub fn readable(&self) -> bool {
        self.readable
    }

    pub fn set_readable(&mut self, readable: bool) {
        self.readable = readable;
    }

    /// The latest committed value. Panics if the history is empty, which
    /// would violate the append-only/non-empty invariant (spec.md §3).
    #[must_use]
    pub fn latest_committed(&self) -> i64 {
        self.history.last().expect("commit history is never empty").value
    }

    #[must_use]
    pub fn temp(&self) -> Option<&TempWrite> {
        self.temp.as_ref()
    }

    pub fn set_temp(&mut self, value: i64, writer: TxId) {
        self.temp = Some(TempWrite { value, writer });
    }

    /// Discards the temp value if it belongs to `tx` (abort path).
    pub fn clear_temp_of(&mut self, tx: &TxId) {
        if self.temp.as_ref().is_some_and(|t| &t.writer == tx) {
            self.temp = None;
        }
    }

    /// Materializes the current temp value into the commit history and
    /// clears it. Panics if there is no temp value, or it isn't `tx`'s —
    /// callers only invoke this for variables they've confirmed `tx` wrote.
    pub fn commit_temp(&mut self, tx: &TxId, commit_ts: u64) {
        let temp = self.temp.take().expect("commit_temp called with no temp value");
        debug_assert_eq!(&temp.writer, tx, "commit_temp called for wrong transaction");
        debug_assert!(
            self.history.last().is_none_or(|c| c.commit_ts < commit_ts),
            "commit history must be strictly increasing in commit_ts"
        );
        self.history.push(CommitRecord { value: temp.value, commit_ts });
    }

    /// Newest-to-oldest scan for the first commit at or before `begin_ts`,
    /// used by snapshot reads (spec.md §4.3).
    #[must_use]
    pub fn commit_at_or_before(&self, begin_ts: u64) -> Option<&CommitRecord> {
        self.history.iter().rev().find(|c| c.commit_ts <= begin_ts)
    }

    #[must_use]
    pub fn history(&self) -> &[CommitRecord] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_variable_has_seed_commit() {
        let v = Variable::initial(70);
        assert_eq!(v.latest_committed(), 70);
        assert_eq!(v.history().len(), 1);
        assert_eq!(v.history()[0].commit_ts, 0);
    }

    #[test]
    fn commit_temp_appends_and_clears() {
        let mut v = Variable::initial(10);
        let t1 = TxId::from("T1");
        v.set_temp(99, t1.clone());
        v.commit_temp(&t1, 5);
        assert_eq!(v.latest_committed(), 99);
        assert!(v.temp().is_none());
    }

    #[test]
    fn clear_temp_of_ignores_other_writer() {
        let mut v = Variable::initial(10);
        let t1 = TxId::from("T1");
        let t2 = TxId::from("T2");
        v.set_temp(99, t1);
        v.clear_temp_of(&t2);
        assert!(v.temp().is_some());
    }

    #[test]
    fn commit_at_or_before_picks_newest_eligible() {
        let mut v = Variable::initial(10);
        v.set_temp(20, TxId::from("T1"));
        v.commit_temp(&TxId::from("T1"), 5);
        v.set_temp(30, TxId::from("T1"));
        v.commit_temp(&TxId::from("T1"), 10);

        assert_eq!(v.commit_at_or_before(0).unwrap().value, 10);
        assert_eq!(v.commit_at_or_before(7).unwrap().value, 20);
        assert_eq!(v.commit_at_or_before(10).unwrap().value, 30);
    }
}
