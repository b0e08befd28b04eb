//! Table rendering.
//!
//! Rendering is a pure function of the matrix and the logical orderings, so
//! the same inputs always produce byte-identical text; absence of a cell is
//! rendered, never an error.

use std::fmt::Write;
use std::time::Duration;

use hvmbench_core::{
    BenchmarkFile, CellKey, ExecutionResult, Mode, ResultMatrix, Revision, RuntimeTable,
};

const GUTTER: &str = "  ";

const SENTINEL_TIMEOUT: &str = "TIMEOUT";
const SENTINEL_CRASH: &str = "CRASH";
const SENTINEL_BUILD_FAIL: &str = "BUILD-FAIL";
const SENTINEL_SKIP: &str = "SKIP";
const SENTINEL_ABSENT: &str = "-";

/// Format a wall-clock duration for a table cell.
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos >= 1_000_000_000 {
        format!("{:.3}s", duration.as_secs_f64())
    } else if nanos >= 1_000_000 {
        format!("{:.2}ms", nanos as f64 / 1e6)
    } else if nanos >= 1_000 {
        format!("{:.2}us", nanos as f64 / 1e3)
    } else {
        format!("{nanos}ns")
    }
}

fn cell_text(result: Option<&ExecutionResult>) -> String {
    match result {
        None => SENTINEL_ABSENT.to_string(),
        Some(ExecutionResult::Success(elapsed)) => format_duration(*elapsed),
        Some(ExecutionResult::Timeout) => SENTINEL_TIMEOUT.to_string(),
        Some(ExecutionResult::Crashed { .. }) => SENTINEL_CRASH.to_string(),
        Some(ExecutionResult::BuildFailed(_)) => SENTINEL_BUILD_FAIL.to_string(),
        Some(ExecutionResult::Skipped(_)) => SENTINEL_SKIP.to_string(),
    }
}

/// One mode block as rows of cells, before alignment.
struct Block {
    /// header row, then data rows; `groups[i]` marks the last row of a group.
    rows: Vec<Vec<String>>,
    group_ends: Vec<usize>,
}

fn build_block(
    mode: Mode,
    matrix: &ResultMatrix,
    revisions: &[Revision],
    files: &[BenchmarkFile],
    table: &RuntimeTable,
) -> Block {
    let mut header = vec!["file".to_string(), "runtime".to_string()];
    header.extend(revisions.iter().map(|rev| rev.name.clone()));

    let mut rows = vec![header];
    let mut group_ends = Vec::new();

    for file in files {
        for (i, &backend) in table.backends(mode).iter().enumerate() {
            // File name labels the group's first row only.
            let label = if i == 0 { file.name.clone() } else { String::new() };
            let mut row = vec![label, backend.name().to_string()];

            for revision in revisions {
                let key = CellKey {
                    file: file.name.clone(),
                    mode,
                    backend,
                    revision: revision.resolved_id.clone(),
                };
                row.push(cell_text(matrix.get(&key)));
            }
            rows.push(row);
        }
        group_ends.push(rows.len() - 1);
    }

    Block { rows, group_ends }
}

fn render_block(block: &Block, out: &mut String) {
    let columns = block.rows[0].len();

    // Per-column widths over the whole block, header included.
    let widths: Vec<usize> = (0..columns)
        .map(|col| {
            block
                .rows
                .iter()
                .map(|row| row[col].len())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line_width = widths.iter().sum::<usize>() + GUTTER.len() * (columns - 1);

    for (i, row) in block.rows.iter().enumerate() {
        let line = row
            .iter()
            .enumerate()
            .map(|(col, text)| {
                // Labels left-aligned, value columns right-aligned.
                if col < 2 {
                    format!("{text:<width$}", width = widths[col])
                } else {
                    format!("{text:>width$}", width = widths[col])
                }
            })
            .collect::<Vec<_>>()
            .join(GUTTER);

        let _ = writeln!(out, "{}", line.trim_end());

        if i == 0 {
            let _ = writeln!(out, "{}", "=".repeat(line_width));
        } else if block.group_ends.contains(&i) {
            let _ = writeln!(out, "{}", "-".repeat(line_width));
        }
    }
}

/// Render the full report: one table block per mode, `interpreted` first.
/// Rendering the same matrix twice yields byte-identical text.
pub fn render(
    matrix: &ResultMatrix,
    revisions: &[Revision],
    files: &[BenchmarkFile],
    table: &RuntimeTable,
) -> String {
    let mut out = String::new();

    for mode in Mode::ALL {
        if table.backends(mode).is_empty() {
            continue;
        }

        if !out.is_empty() {
            out.push('\n');
        }

        let title = mode.title();
        let _ = writeln!(out, "{title}");
        let _ = writeln!(out, "{}", "=".repeat(title.len()));
        out.push('\n');

        let block = build_block(mode, matrix, revisions, files, table);
        render_block(&block, &mut out);
    }

    out
}
