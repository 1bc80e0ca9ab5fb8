//! Core algorithms for a replicated, distributed-database concurrency
//! control simulator: strict two-phase locking with available-copies
//! replication, multiversion snapshot reads, global deadlock detection, and
//! site failure/recovery.
//!
//! This crate has no I/O. Parsing instruction text, driving a file or
//! stdin, and printing a human-readable trace are the responsibility of the
//! CLI crate built on top of it; this crate only ever sees already-parsed
//! [`instruction::Instruction`] values and produces [`coordinator::TraceEvent`]s
//! for its caller to format.

pub mod coordinator;
pub mod error;
pub mod ids;
pub mod instruction;
pub mod invariants;
pub mod lock;
pub mod pending;
pub mod site;
pub mod transaction;
pub mod value;

pub use coordinator::{Coordinator, TraceEvent};
pub use error::{CcError, Result};
pub use ids::{SiteId, TxId, VarId};
pub use instruction::Instruction;
