//! Matrix scheduling: enumerate every in-scope cell, drive builds and runs,
//! and assemble the sparse result matrix.
//!
//! Enumeration order is logical (mode → file → backend → revision) and the
//! matrix is keyed, so the output is identical whether cells run serially or
//! on a bounded worker pool.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::builder::{BuildStatus, Builder};
use crate::executor::Executor;
use crate::matrix::{
    BenchmarkFile, CellKey, ExecutionResult, Mode, ResultMatrix, RuntimeKind, RuntimeTable,
};
use crate::revision::Revision;

/// Drives the full {file} × {mode} × {backend} × {revision} matrix.
pub struct MatrixScheduler<'t> {
    builder: Builder<'t>,
    executor: Executor<'t>,
    table: &'t RuntimeTable,
    jobs: usize,
}

struct Cell<'a> {
    key: CellKey,
    kind: RuntimeKind,
    revision: &'a Revision,
    file: &'a BenchmarkFile,
}

impl<'t> MatrixScheduler<'t> {
    /// Create a scheduler. `jobs` bounds cell-level parallelism; 1 is serial.
    pub fn new(
        builder: Builder<'t>,
        executor: Executor<'t>,
        table: &'t RuntimeTable,
        jobs: usize,
    ) -> Self {
        Self {
            builder,
            executor,
            table,
            jobs: jobs.max(1),
        }
    }

    /// Execute every in-scope cell. Every enumerated cell receives exactly one
    /// entry; cells are independent and a failure in one never aborts another.
    pub fn execute(&self, revisions: &[Revision], files: &[BenchmarkFile]) -> ResultMatrix {
        let cells = self.enumerate(revisions, files);

        let pb = ProgressBar::new(cells.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let run_cell = |cell: &Cell<'_>| -> (CellKey, ExecutionResult) {
            pb.set_message(format!("{} {}", cell.file.name, cell.kind));
            let result = self.run_one(cell);
            pb.inc(1);
            (cell.key.clone(), result)
        };

        let outcomes: Vec<(CellKey, ExecutionResult)> = if self.jobs == 1 {
            cells.iter().map(run_cell).collect()
        } else {
            match ThreadPoolBuilder::new().num_threads(self.jobs).build() {
                Ok(pool) => pool.install(|| cells.par_iter().map(run_cell).collect()),
                Err(e) => {
                    tracing::warn!(error = %e, "worker pool unavailable, running serially");
                    cells.iter().map(run_cell).collect()
                }
            }
        };

        pb.finish_and_clear();

        let mut matrix = ResultMatrix::new();
        for (key, result) in outcomes {
            matrix.record(key, result);
        }
        matrix
    }

    /// Full logical enumeration: every combination the table allows is
    /// visited, so "missing" cells can only come from kinds a mode omits.
    fn enumerate<'a>(
        &self,
        revisions: &'a [Revision],
        files: &'a [BenchmarkFile],
    ) -> Vec<Cell<'a>> {
        let mut cells = Vec::new();
        for mode in Mode::ALL {
            for file in files {
                for &backend in self.table.backends(mode) {
                    for revision in revisions {
                        let kind = RuntimeKind { mode, backend };
                        cells.push(Cell {
                            key: CellKey {
                                file: file.name.clone(),
                                mode,
                                backend,
                                revision: revision.resolved_id.clone(),
                            },
                            kind,
                            revision,
                            file,
                        });
                    }
                }
            }
        }
        cells
    }

    fn run_one(&self, cell: &Cell<'_>) -> ExecutionResult {
        if hvmbench_proc::cancellation_requested() {
            return ExecutionResult::Skipped("cancelled".to_string());
        }

        let artifact = self.builder.build(cell.revision, cell.kind);

        // An interrupt during the build kills its children; don't start the
        // run or mis-report the aborted build.
        if hvmbench_proc::cancellation_requested() {
            return ExecutionResult::Skipped("cancelled".to_string());
        }

        match &artifact.status {
            BuildStatus::Failed(reason) => ExecutionResult::BuildFailed(reason.clone()),
            BuildStatus::Ok(exe) => self.executor.run(exe, cell.kind, cell.file),
        }
    }
}
