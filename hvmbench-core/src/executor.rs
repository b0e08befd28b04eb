//! Single-cell execution: run one benchmark against one built artifact under
//! a hard wall-clock deadline.

use std::time::Duration;

use hvmbench_proc::{run_with_deadline, ProcessControl, RunOutcome};
use tempfile::TempDir;

use crate::builder::Toolchain;
use crate::matrix::{BenchmarkFile, ExecutionResult, RuntimeKind};

/// Tail of the child's stderr carried into `Crashed` results.
const STDERR_LIMIT: usize = 4096;

/// Runs benchmark processes. Each run gets a fresh scratch directory as its
/// working directory, so concurrent cells cannot cross-talk through file I/O.
pub struct Executor<'t> {
    toolchain: &'t dyn Toolchain,
    proc: &'t dyn ProcessControl,
    timeout: Duration,
}

impl<'t> Executor<'t> {
    /// Create an executor with the per-run timeout.
    pub fn new(toolchain: &'t dyn Toolchain, proc: &'t dyn ProcessControl, timeout: Duration) -> Self {
        Self {
            toolchain,
            proc,
            timeout,
        }
    }

    /// Execute one cell: stage (for compiled kinds), spawn, and classify.
    /// Never panics or propagates: every failure mode maps to a result variant.
    pub fn run(
        &self,
        artifact: &std::path::Path,
        kind: RuntimeKind,
        bench: &BenchmarkFile,
    ) -> ExecutionResult {
        let scratch = match TempDir::with_prefix("hvm-bench-run-") {
            Ok(dir) => dir,
            Err(e) => {
                return ExecutionResult::Crashed {
                    code: None,
                    stderr: format!("failed to create scratch dir: {e}"),
                }
            }
        };

        let spec = match self.toolchain.prepare(artifact, kind, bench, scratch.path()) {
            Ok(spec) => spec.current_dir(scratch.path()),
            Err(reason) => return ExecutionResult::BuildFailed(reason),
        };

        tracing::debug!(bench = %bench.name, %kind, cmd = %spec.display(), "running cell");

        match run_with_deadline(self.proc, &spec, self.timeout) {
            Ok(RunOutcome::Exited {
                success: true,
                elapsed,
                ..
            }) => ExecutionResult::Success(elapsed),
            Ok(RunOutcome::Exited {
                code, mut stderr, ..
            }) => {
                if hvmbench_proc::cancellation_requested() {
                    return ExecutionResult::Skipped("cancelled".to_string());
                }
                if stderr.len() > STDERR_LIMIT {
                    let mut cut = STDERR_LIMIT;
                    while !stderr.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    stderr.truncate(cut);
                }
                ExecutionResult::Crashed {
                    code,
                    stderr: stderr.trim_end().to_string(),
                }
            }
            Ok(RunOutcome::TimedOut) => ExecutionResult::Timeout,
            Err(e) => ExecutionResult::Crashed {
                code: None,
                stderr: e.to_string(),
            },
        }
    }
}
