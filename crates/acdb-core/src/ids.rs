//! Identifier newtypes.
//!
//! Bare `u8`/`String` would work just as well, but wrapping them keeps the
//! placement formula (spec.md §3) and the 1..=10 / 1..=20 ranges from being
//! confused with arbitrary integers at call sites.

use std::fmt;

/// A variable id, `x1..=x20`. The wrapped value is the variable's number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub u8);

/// A site id, `1..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SiteId(pub u8);

/// A transaction id, e.g. `T1`. Arbitrary per spec.md §6, so this wraps a
/// `String` rather than a number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId(pub String);

impl VarId {
    /// Lowest valid variable number.
    pub const MIN: u8 = 1;
    /// Highest valid variable number.
    pub const MAX: u8 = 20;

    #[must_use]
    pub fn new(n: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&n).then_some(Self(n))
    }

    /// True for even-indexed variables, which are replicated to every site
    /// (spec.md §3, Placement).
    #[must_use]
    pub fn is_replicated(self) -> bool {
        self.0 % 2 == 0
    }

    /// The single site that hosts this variable if it is not replicated.
    ///
    /// `site_id = (2k+1) mod 10 + 1` per spec.md §3. Panics if called on a
    /// replicated variable — callers must check [`VarId::is_replicated`]
    /// first.
    #[must_use]
    pub fn home_site(self) -> SiteId {
        debug_assert!(!self.is_replicated(), "x{} is replicated, has no single home site", self.0);
        SiteId(self.0 % 10 + 1)
    }
}

impl SiteId {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    #[must_use]
    pub fn new(n: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&n).then_some(Self(n))
    }

    /// All ten site ids in order, 1..=10.
    pub fn all() -> impl Iterator<Item = SiteId> {
        (Self::MIN..=Self::MAX).map(SiteId)
    }
}

impl TxId {
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TxId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replication_follows_parity() {
        assert!(VarId::new(2).unwrap().is_replicated());
        assert!(!VarId::new(7).unwrap().is_replicated());
    }

    #[test]
    fn home_site_formula() {
        assert_eq!(VarId::new(1).unwrap().home_site(), SiteId(2));
        assert_eq!(VarId::new(3).unwrap().home_site(), SiteId(4));
        assert_eq!(VarId::new(11).unwrap().home_site(), SiteId(2));
        assert_eq!(VarId::new(19).unwrap().home_site(), SiteId(10));
    }

    #[test]
    fn out_of_range_ids_rejected() {
        assert!(VarId::new(0).is_none());
        assert!(VarId::new(21).is_none());
        assert!(SiteId::new(0).is_none());
        assert!(SiteId::new(11).is_none());
    }
}
