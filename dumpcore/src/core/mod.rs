//! Deterministic, pure logic of the core-dump pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod pattern;
pub mod pid;
pub mod types;
