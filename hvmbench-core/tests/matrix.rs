//! End-to-end orchestration tests: fake collaborators drive the scheduler and
//! the rendered report is checked, without any real builds or git.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hvmbench_core::{
    Backend, BenchmarkFile, Builder, CellKey, ExecutionResult, Executor, MatrixScheduler, Mode,
    Revision, RuntimeKind, RuntimeTable, Toolchain,
};
use hvmbench_proc::{ProcError, ProcessControl, ProcessSpec, RunOutcome, SpawnedChild};

/// Toolchain that always builds and encodes the cell into the prepared
/// command line.
struct FakeToolchain;

impl Toolchain for FakeToolchain {
    fn build(
        &self,
        revision: &Revision,
        kind: RuntimeKind,
        _timeout: Duration,
    ) -> Result<PathBuf, String> {
        if kind.backend == Backend::Cuda && revision.resolved_id == "bbb" {
            return Err("nvcc not found in PATH".to_string());
        }
        Ok(PathBuf::from(format!("hvm-{}-{kind}", revision.resolved_id)))
    }

    fn prepare(
        &self,
        artifact: &Path,
        _kind: RuntimeKind,
        bench: &BenchmarkFile,
        _scratch: &Path,
    ) -> Result<ProcessSpec, String> {
        Ok(ProcessSpec::new(artifact).arg(&bench.name))
    }
}

/// Process control with scripted outcomes: benchmark "hang" times out,
/// everything else succeeds in a fixed 250ms.
struct FakeProc;

struct FakeChild(Option<RunOutcome>);

impl SpawnedChild for FakeChild {
    fn wait_deadline(&mut self, _timeout: Duration) -> Result<RunOutcome, ProcError> {
        Ok(self.0.take().expect("waited twice"))
    }

    fn kill_tree(&mut self) {}
}

impl ProcessControl for FakeProc {
    fn spawn(&self, spec: &ProcessSpec) -> Result<Box<dyn SpawnedChild>, ProcError> {
        let hang = spec.args.iter().any(|a| a == "hang");
        let outcome = if hang {
            RunOutcome::TimedOut
        } else {
            RunOutcome::Exited {
                code: Some(0),
                success: true,
                elapsed: Duration::from_millis(250),
                stdout: String::new(),
                stderr: String::new(),
            }
        };
        Ok(Box::new(FakeChild(Some(outcome))))
    }
}

fn rev(name: &str, id: &str) -> Revision {
    Revision {
        name: name.to_string(),
        resolved_id: id.to_string(),
        checkout: PathBuf::from("/checkouts").join(id),
    }
}

#[test]
fn full_matrix_flows_into_a_stable_report() {
    let table = RuntimeTable::default();
    let toolchain = FakeToolchain;
    let proc = FakeProc;

    let scheduler = MatrixScheduler::new(
        Builder::new(&toolchain, Duration::from_secs(5)),
        Executor::new(&toolchain, &proc, Duration::from_secs(5)),
        &table,
        2,
    );

    let revisions = vec![rev("main", "aaa"), rev("a43dcfa57c9d", "bbb")];
    let files = vec![
        BenchmarkFile::new("hang", "/suite/hang.hvm"),
        BenchmarkFile::new("sum_rec", "/suite/sum_rec.hvm"),
    ];

    let matrix = scheduler.execute(&revisions, &files);

    // 2 files x 5 legal kinds x 2 revisions.
    assert_eq!(matrix.len(), 20);

    // The cuda build failure on "bbb" is recorded per cell, siblings ran.
    let failed = CellKey {
        file: "sum_rec".to_string(),
        mode: Mode::Compiled,
        backend: Backend::Cuda,
        revision: "bbb".to_string(),
    };
    assert!(matches!(
        matrix.get(&failed),
        Some(ExecutionResult::BuildFailed(_))
    ));

    let sibling = CellKey {
        file: "sum_rec".to_string(),
        mode: Mode::Compiled,
        backend: Backend::C,
        revision: "bbb".to_string(),
    };
    assert!(matches!(
        matrix.get(&sibling),
        Some(ExecutionResult::Success(_))
    ));

    let text = hvmbench_report::render(&matrix, &revisions, &files, &table);

    // interpreted first, then compiled; revision columns carry display names.
    let interpreted_at = text.find("interpreted").unwrap();
    let compiled_at = text.find("compiled").unwrap();
    assert!(interpreted_at < compiled_at);
    assert!(text.contains("a43dcfa57c9d"));

    // Timeouts and build failures render as sentinels, successes as durations.
    assert!(text.contains("TIMEOUT"));
    assert!(text.contains("BUILD-FAIL"));
    assert!(text.contains("250.00ms"));

    // Rendering is a pure function of the matrix.
    assert_eq!(
        text,
        hvmbench_report::render(&matrix, &revisions, &files, &table)
    );
}
