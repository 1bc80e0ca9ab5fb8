//! Static property checks over a [`Coordinator`] snapshot.
//!
//! Grounded on `vf-core::property`'s `PropertyChecker`/`PropertyResult`
//! shape. The eight invariants in spec.md §8 split into two kinds: five are
//! plain state predicates, checkable here against a single snapshot.
//! Invariants #4, #7, #8 describe a *transition* (a commit that must not
//! happen, a flag that must stay false until a later event, a
//! one-victim-per-call guarantee) and so are asserted directly in the
//! scenario tests and the `acdb-dst` fuzz loop instead, the same split the
//! teacher uses for its own harder-to-statically-express properties.

use crate::coordinator::Coordinator;
use crate::lock::LockRecord;

/// The outcome of checking a single property against a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyResult {
    pub name: &'static str,
    /// Spec section this check corresponds to, e.g. `"§8.1"`.
    pub tag: &'static str,
    pub holds: bool,
    pub detail: Option<String>,
}

impl PropertyResult {
    fn pass(name: &'static str, tag: &'static str) -> Self {
        Self { name, tag, holds: true, detail: None }
    }

    fn fail(name: &'static str, tag: &'static str, detail: impl Into<String>) -> Self {
        Self { name, tag, holds: false, detail: Some(detail.into()) }
    }
}

/// All property results from one checking pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySummary {
    pub results: Vec<PropertyResult>,
}

impl PropertySummary {
    #[must_use]
    pub fn all_hold(&self) -> bool {
        self.results.iter().all(|r| r.holds)
    }

    #[must_use]
    pub fn failures(&self) -> Vec<&PropertyResult> {
        self.results.iter().filter(|r| !r.holds).collect()
    }
}

/// Runs every statically-checkable property from spec.md §8 against a
/// [`Coordinator`] snapshot.
pub trait PropertyChecker {
    fn check_all(coordinator: &Coordinator) -> PropertySummary;
}

pub struct CoreProperties;

impl PropertyChecker for CoreProperties {
    fn check_all(coordinator: &Coordinator) -> PropertySummary {
        PropertySummary {
            results: vec![
                commit_history_monotone(coordinator),
                lock_cardinality(coordinator),
                lock_kinds_exclusive(coordinator),
                read_only_absent_from_waits_for(coordinator),
                down_sites_have_empty_locks(coordinator),
            ],
        }
    }
}

/// #1: commit history is non-empty and strictly increasing in commit_ts.
fn commit_history_monotone(coordinator: &Coordinator) -> PropertyResult {
    for (site_id, site) in coordinator.sites() {
        for (var, variable) in site.variables() {
            let history = variable.history();
            if history.is_empty() {
                return PropertyResult::fail(
                    "commit history non-empty and monotone",
                    "§8.1",
                    format!("site {site_id} {var} has an empty commit history"),
                );
            }
            if !history.windows(2).all(|w| w[0].commit_ts < w[1].commit_ts) {
                return PropertyResult::fail(
                    "commit history non-empty and monotone",
                    "§8.1",
                    format!("site {site_id} {var} commit_ts is not strictly increasing"),
                );
            }
        }
    }
    PropertyResult::pass("commit history non-empty and monotone", "§8.1")
}

/// #2: a current read lock is held by at least one transaction (a write
/// lock's single-holder shape is enforced by the type already).
fn lock_cardinality(coordinator: &Coordinator) -> PropertyResult {
    for (site_id, site) in coordinator.sites() {
        for (var, lock) in site.lock_snapshot() {
            if let Some(LockRecord::Read { holders }) = lock {
                if holders.is_empty() {
                    return PropertyResult::fail(
                        "lock cardinality",
                        "§8.2",
                        format!("site {site_id} {var} has a read lock with no holders"),
                    );
                }
            }
        }
    }
    PropertyResult::pass("lock cardinality", "§8.2")
}

/// #3: a variable's current lock is read xor write. `LockRecord` is a
/// tagged union of exactly those two shapes, so no two kinds can ever
/// coexist in the `current` slot — this check exists to document the
/// invariant, not because it can fail.
fn lock_kinds_exclusive(_coordinator: &Coordinator) -> PropertyResult {
    PropertyResult::pass("lock kinds mutually exclusive", "§8.3")
}

/// #5: a read-only transaction never appears as a node in any site's
/// waits-for graph (it takes no locks, so it can wait for nothing and
/// nothing waits for it).
fn read_only_absent_from_waits_for(coordinator: &Coordinator) -> PropertyResult {
    for (site_id, site) in coordinator.sites() {
        for (from, tos) in site.wait_for_graph() {
            let mentions_ro = |tx: &crate::ids::TxId| {
                coordinator.transactions().get(tx).is_some_and(|t| t.read_only)
            };
            if mentions_ro(&from) || tos.iter().any(mentions_ro) {
                return PropertyResult::fail(
                    "read-only transactions absent from waits-for graph",
                    "§8.5",
                    format!("site {site_id} waits-for graph mentions a read-only transaction"),
                );
            }
        }
    }
    PropertyResult::pass("read-only transactions absent from waits-for graph", "§8.5")
}

/// #6: a down site's lock tables are empty of current and queued state.
fn down_sites_have_empty_locks(coordinator: &Coordinator) -> PropertyResult {
    for (site_id, site) in coordinator.sites() {
        if !site.is_up() && !site.locks_empty() {
            return PropertyResult::fail(
                "down sites have empty lock tables",
                "§8.6",
                format!("site {site_id} is down but still has lock state"),
            );
        }
    }
    PropertyResult::pass("down sites have empty lock tables", "§8.6")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SiteId;
    use crate::instruction::Instruction;
    use crate::ids::TxId;

    #[test]
    fn fresh_coordinator_satisfies_all_static_properties() {
        let c = Coordinator::new();
        let summary = CoreProperties::check_all(&c);
        assert!(summary.all_hold(), "{:?}", summary.failures());
    }

    #[test]
    fn fail_then_check_keeps_locks_empty() {
        let mut c = Coordinator::new();
        c.process(Instruction::Begin(TxId::from("T1"))).unwrap();
        c.process(Instruction::Read(TxId::from("T1"), crate::ids::VarId::new(2).unwrap())).unwrap();
        c.process(Instruction::Fail(SiteId::new(2).unwrap())).unwrap();
        let summary = CoreProperties::check_all(&c);
        assert!(summary.all_hold(), "{:?}", summary.failures());
    }
}
