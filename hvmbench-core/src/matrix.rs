//! Core data model: runtime kinds, benchmark files, cell results, and the
//! sparse result matrix.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Execution mode: whether the benchmark runs under the interpreter or is
/// compiled to a standalone binary first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Run the program directly under the runtime's interpreter.
    Interpreted,
    /// Generate backend source, compile it, run the produced binary.
    Compiled,
}

impl Mode {
    /// All modes, in report order.
    pub const ALL: [Mode; 2] = [Mode::Interpreted, Mode::Compiled];

    /// Section title used in the report.
    pub fn title(self) -> &'static str {
        match self {
            Mode::Interpreted => "interpreted",
            Mode::Compiled => "compiled",
        }
    }
}

/// Execution backend of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Single-threaded C backend.
    C,
    /// GPU-accelerated CUDA backend.
    Cuda,
    /// Reference Rust interpreter.
    Rust,
}

impl Backend {
    /// Row label used in the report.
    pub fn name(self) -> &'static str {
        match self {
            Backend::C => "c",
            Backend::Cuda => "cuda",
            Backend::Rust => "rust",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One way of executing a benchmark: a (mode, backend) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuntimeKind {
    /// Execution mode.
    pub mode: Mode,
    /// Execution backend.
    pub backend: Backend,
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.mode.title(), self.backend)
    }
}

/// Which backends are legal under which mode. This is configuration, not
/// logic: the scheduler never enumerates a pair the table omits, which is the
/// one legitimate source of absent matrix cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeTable {
    interpreted: Vec<Backend>,
    compiled: Vec<Backend>,
}

impl RuntimeTable {
    /// Build a table from explicit backend lists (report row order).
    pub fn new(interpreted: Vec<Backend>, compiled: Vec<Backend>) -> Self {
        Self {
            interpreted,
            compiled,
        }
    }

    /// Backends valid under `mode`, in row order.
    pub fn backends(&self, mode: Mode) -> &[Backend] {
        match mode {
            Mode::Interpreted => &self.interpreted,
            Mode::Compiled => &self.compiled,
        }
    }

    /// Whether `kind` is a legal combination.
    pub fn is_valid(&self, kind: RuntimeKind) -> bool {
        self.backends(kind.mode).contains(&kind.backend)
    }

    /// All legal kinds, mode-major, in row order.
    pub fn kinds(&self) -> impl Iterator<Item = RuntimeKind> + '_ {
        Mode::ALL.into_iter().flat_map(move |mode| {
            self.backends(mode)
                .iter()
                .map(move |&backend| RuntimeKind { mode, backend })
        })
    }
}

impl Default for RuntimeTable {
    /// The hvm sets: every backend interprets, only C and CUDA compile.
    fn default() -> Self {
        Self {
            interpreted: vec![Backend::C, Backend::Cuda, Backend::Rust],
            compiled: vec![Backend::C, Backend::Cuda],
        }
    }
}

/// One benchmark program from the suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkFile {
    /// Display name (file stem); grouping key in the report.
    pub name: String,
    /// Absolute path to the program source.
    pub path: PathBuf,
}

impl BenchmarkFile {
    /// Construct a benchmark file entry.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Outcome of one matrix cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The benchmark process exited zero within the deadline.
    Success(Duration),
    /// The deadline passed; the process group was killed.
    Timeout,
    /// Non-zero exit (or spawn failure) before the deadline.
    Crashed {
        /// Exit code when the child exited normally.
        code: Option<i32>,
        /// Captured error output, possibly empty.
        stderr: String,
    },
    /// The artifact (or the cell's staging step) could not be built.
    BuildFailed(String),
    /// The cell was deliberately not run.
    Skipped(String),
}

/// Identity of one matrix cell. Logical report order is derived from these
/// keys, never from completion order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CellKey {
    /// Benchmark file name.
    pub file: String,
    /// Execution mode.
    pub mode: Mode,
    /// Execution backend.
    pub backend: Backend,
    /// Resolved revision id.
    pub revision: String,
}

/// Sparse mapping from cell keys to outcomes. Absence of a key is distinct
/// from a recorded failure: absent cells render as a placeholder and must
/// never crash the aggregator.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResultMatrix {
    cells: BTreeMap<CellKey, ExecutionResult>,
}

impl ResultMatrix {
    /// Empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one cell outcome. Cells arriving in any order produce the same
    /// matrix; a duplicate key keeps the latest entry.
    pub fn record(&mut self, key: CellKey, result: ExecutionResult) {
        self.cells.insert(key, result);
    }

    /// Look up a cell.
    pub fn get(&self, key: &CellKey) -> Option<&ExecutionResult> {
        self.cells.get(key)
    }

    /// Number of recorded cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate recorded cells in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&CellKey, &ExecutionResult)> {
        self.cells.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(file: &str, mode: Mode, backend: Backend, rev: &str) -> CellKey {
        CellKey {
            file: file.to_string(),
            mode,
            backend,
            revision: rev.to_string(),
        }
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = key("sum_rec", Mode::Interpreted, Backend::Rust, "aaa");
        let b = key("sum_rec", Mode::Interpreted, Backend::C, "aaa");

        let mut forward = ResultMatrix::new();
        forward.record(a.clone(), ExecutionResult::Timeout);
        forward.record(b.clone(), ExecutionResult::Success(Duration::from_secs(1)));

        let mut backward = ResultMatrix::new();
        backward.record(b, ExecutionResult::Success(Duration::from_secs(1)));
        backward.record(a, ExecutionResult::Timeout);

        assert_eq!(forward, backward);
    }

    #[test]
    fn absence_is_distinct_from_failure() {
        let mut matrix = ResultMatrix::new();
        let recorded = key("a", Mode::Compiled, Backend::C, "rev");
        let absent = key("a", Mode::Compiled, Backend::Cuda, "rev");

        matrix.record(recorded.clone(), ExecutionResult::BuildFailed("no cc".into()));

        assert!(matrix.get(&recorded).is_some());
        assert!(matrix.get(&absent).is_none());
    }

    #[test]
    fn default_table_matches_hvm_sets() {
        let table = RuntimeTable::default();
        assert_eq!(
            table.backends(Mode::Interpreted),
            &[Backend::C, Backend::Cuda, Backend::Rust]
        );
        assert_eq!(table.backends(Mode::Compiled), &[Backend::C, Backend::Cuda]);
        assert!(!table.is_valid(RuntimeKind {
            mode: Mode::Compiled,
            backend: Backend::Rust
        }));
        assert_eq!(table.kinds().count(), 5);
    }
}
