#![warn(missing_docs)]
//! Benchmark matrix orchestration for hvm-bench.
//!
//! This crate is the engine: it resolves revisions, builds each one per
//! runtime kind (with a single-flight cache), runs every benchmark file
//! against every built artifact under a hard timeout, and assembles the
//! outcomes into a sparse [`ResultMatrix`].
//!
//! Repository access and build/run command lines are collaborator traits
//! ([`RepoAccess`], [`Toolchain`]) implemented by the CLI crate; process
//! mechanics come from `hvmbench-proc`.

mod builder;
mod executor;
mod matrix;
mod revision;
mod scheduler;

pub use builder::{BuildArtifact, BuildStatus, Builder, Toolchain};
pub use executor::Executor;
pub use matrix::{
    Backend, BenchmarkFile, CellKey, ExecutionResult, Mode, ResultMatrix, RuntimeKind,
    RuntimeTable,
};
pub use revision::{resolve_revisions, RepoAccess, RepoError, Revision};
pub use scheduler::MatrixScheduler;
