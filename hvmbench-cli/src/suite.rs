//! Benchmark suite discovery.
//!
//! The suite is the fixed, ordered set of programs in the programs directory.
//! Order (by file name) is the grouping order of the report.

use std::path::Path;

use anyhow::Context;
use hvmbench_core::BenchmarkFile;
use regex::Regex;

/// Discover the benchmark suite in `dir`, sorted by name. Paths are
/// canonicalized because benchmark processes run in isolated scratch
/// directories, not the invocation's working directory.
pub fn discover_suite(dir: &Path) -> anyhow::Result<Vec<BenchmarkFile>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("benchmark programs directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let path = path
            .canonicalize()
            .with_context(|| format!("benchmark program {}", path.display()))?;
        files.push(BenchmarkFile::new(name, path));
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    files.dedup_by(|b, a| {
        if a.name == b.name {
            tracing::warn!(name = %b.name, "duplicate benchmark name, keeping first");
            true
        } else {
            false
        }
    });

    Ok(files)
}

/// Keep only benchmarks whose name matches `filter`.
pub fn filter_suite(files: Vec<BenchmarkFile>, filter: &Regex) -> Vec<BenchmarkFile> {
    files
        .into_iter()
        .filter(|file| filter.is_match(&file.name))
        .collect()
}
