//! Pending operations awaiting a site that can serve them (spec.md §3, §4.9).

use crate::ids::{TxId, VarId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOp {
    Read { tx: TxId, var: VarId },
    Write { tx: TxId, var: VarId, val: i64 },
}

impl PendingOp {
    #[must_use]
    pub fn tx(&self) -> &TxId {
        match self {
            PendingOp::Read { tx, .. } | PendingOp::Write { tx, .. } => tx,
        }
    }
}
