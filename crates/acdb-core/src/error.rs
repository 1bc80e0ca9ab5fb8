//! Invalid-command errors surfaced to the driver.
//!
//! These correspond to spec.md §7's "Invalid-command" error kind: malformed
//! or inapplicable instructions. Internal invariant violations (the other
//! error kind) are not represented here — they are `debug_assert!`/`panic!`
//! in the modules where the invariant is checked, since they indicate a bug
//! in this crate rather than bad input.

use crate::ids::{SiteId, TxId, VarId};

/// An instruction could not be applied.
///
/// Returned by [`crate::coordinator::Coordinator::process`]. The logical
/// clock still advances when this is returned (spec.md §4.8 step 4); no
/// core state is mutated before the error is produced.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CcError {
    #[error("unknown transaction: {0}")]
    UnknownTransaction(TxId),

    #[error("transaction {0} already exists")]
    DuplicateTransaction(TxId),

    #[error("site id out of range: {0}")]
    UnknownSite(SiteId),

    #[error("site {0} is already down")]
    SiteAlreadyDown(SiteId),

    #[error("site {0} is already up")]
    SiteAlreadyUp(SiteId),

    #[error("variable id out of range: {0}")]
    UnknownVariable(VarId),

    #[error("unrecognized instruction: {0}")]
    UnknownCommand(String),

    #[error("malformed instruction: {0}")]
    Malformed(String),
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, CcError>;
