//! I/O helpers for the core-dump pipeline.

pub mod config;
pub mod core_config;
pub mod launcher;
pub mod process;
pub mod progress;
pub mod relocate;
