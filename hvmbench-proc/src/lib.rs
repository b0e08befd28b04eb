#![warn(missing_docs)]
//! Process capability layer for hvm-bench.
//!
//! Benchmark children are untrusted: they can hang, fork, or ignore SIGTERM.
//! This crate owns the three primitives the rest of the harness builds on:
//! - spawning a child in its own process group,
//! - waiting on it with a hard deadline,
//! - killing the entire group when the deadline passes.
//!
//! A signal-driven group registry guarantees that a user interrupt kills every
//! in-flight child before the harness exits.

mod control;
mod registry;

pub use control::{
    run_with_deadline, ProcError, ProcessControl, ProcessSpec, RunOutcome, SpawnedChild,
    UnixProcess,
};
pub use registry::{cancellation_requested, install_signal_handlers};
