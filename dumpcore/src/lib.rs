//! Core-dump capture for exercise verification.
//!
//! Runs a process that is expected to crash, predicts where the OS wrote its
//! core file, and moves that file into a caller-chosen directory. The crate
//! keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (pattern substitution, pid validation).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (process execution, filesystem moves,
//!   config lookup, terminal output). Each sits behind a trait so tests can fake it.
//!
//! [`dump`] chains the two into the capture pipeline; [`exercise`] runs
//! shell-script submissions for the sibling exercise type.

pub mod core;
pub mod dump;
pub mod error;
pub mod exercise;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
