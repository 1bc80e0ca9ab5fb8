//! The instruction parser, file/stdin driver, and trace logger that sit
//! outside `acdb-core` per spec.md §1's scoping: these are the external
//! collaborators the core simulator treats as interface-only.

pub mod driver;
pub mod format;
pub mod parser;
