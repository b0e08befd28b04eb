//! HVM toolchain provider: how artifacts are built and benchmark invocations
//! are prepared for each runtime kind.
//!
//! Building a revision is `cargo build --release` in its checkout. Interpreted
//! kinds run the built binary directly (`run`, `run-c`, `run-cu`). Compiled
//! kinds stage first: the binary generates backend source (`gen-c`, `gen-cu`),
//! which is compiled with `gcc`/`nvcc` into the executable that actually gets
//! timed.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use hvmbench_core::{Backend, BenchmarkFile, Mode, Revision, RuntimeKind, Toolchain};
use hvmbench_proc::{run_with_deadline, ProcessSpec, RunOutcome, UnixProcess};

/// How much of a failing step's stderr is carried into the reason.
const REASON_LIMIT: usize = 500;

/// Real toolchain: cargo for the runtime, gcc/nvcc for staged compilation.
pub struct HvmToolchain {
    bin_dir: PathBuf,
    stage_timeout: Duration,
    proc: UnixProcess,
}

impl HvmToolchain {
    /// Create a toolchain staging artifacts under `bin_dir`. `stage_timeout`
    /// bounds codegen and compilation steps.
    pub fn new(bin_dir: PathBuf, stage_timeout: Duration) -> Self {
        Self {
            bin_dir,
            stage_timeout,
            proc: UnixProcess,
        }
    }

    /// Run one untimed step to completion, mapping every failure mode to a
    /// captured reason.
    fn step(&self, what: &str, spec: ProcessSpec, timeout: Duration) -> Result<String, String> {
        match run_with_deadline(&self.proc, &spec, timeout) {
            Ok(RunOutcome::Exited {
                success: true,
                stdout,
                ..
            }) => Ok(stdout),
            Ok(RunOutcome::Exited { code, stderr, .. }) => Err(format!(
                "{what} exited with status {}: {}",
                code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                tail(&stderr),
            )),
            Ok(RunOutcome::TimedOut) => {
                Err(format!("{what} timed out after {}s", timeout.as_secs()))
            }
            Err(e) => Err(format!("{what}: {e}")),
        }
    }
}

fn tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= REASON_LIMIT {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - REASON_LIMIT;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

/// Whether `tool` is runnable from PATH.
fn tool_available(tool: &str) -> bool {
    Command::new(tool)
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

fn run_subcommand(backend: Backend) -> &'static str {
    match backend {
        Backend::Rust => "run",
        Backend::C => "run-c",
        Backend::Cuda => "run-cu",
    }
}

fn gen_subcommand(backend: Backend) -> Result<&'static str, String> {
    match backend {
        Backend::C => Ok("gen-c"),
        Backend::Cuda => Ok("gen-cu"),
        Backend::Rust => Err("compiled mode is not supported for the rust backend".to_string()),
    }
}

/// Compiler invocation for one staged backend: (program, fixed args, suffix).
fn compile_plan(backend: Backend) -> Result<(&'static str, &'static [&'static str], &'static str), String> {
    match backend {
        Backend::C => Ok(("gcc", &["-lm", "-O2"], ".c")),
        Backend::Cuda => Ok(("nvcc", &["-w", "-O3"], ".cu")),
        Backend::Rust => Err("compiled mode is not supported for the rust backend".to_string()),
    }
}

impl Toolchain for HvmToolchain {
    fn build(
        &self,
        revision: &Revision,
        kind: RuntimeKind,
        timeout: Duration,
    ) -> Result<PathBuf, String> {
        // Fail fast when the backend's staging compiler is missing; nothing
        // built for this kind could ever run a cell.
        if kind.mode == Mode::Compiled {
            let (compiler, _, _) = compile_plan(kind.backend)?;
            if !tool_available(compiler) {
                return Err(format!("{compiler} not found in PATH"));
            }
        }

        let spec = ProcessSpec::new("cargo")
            .args(["build", "--release"])
            .current_dir(&revision.checkout);
        self.step("cargo build", spec, timeout)?;

        let built = revision.checkout.join("target/release/hvm");
        let staged_dir = self
            .bin_dir
            .join(&revision.resolved_id[..revision.resolved_id.len().min(12)]);
        std::fs::create_dir_all(&staged_dir).map_err(|e| format!("staging dir: {e}"))?;

        // Stage a copy per kind: the cache key is (revision, kind), and a
        // later build of another revision must not invalidate this artifact.
        let staged = staged_dir.join(format!("hvm-{}-{}", kind.mode.title(), kind.backend));
        std::fs::copy(&built, &staged)
            .map_err(|e| format!("staging {}: {e}", built.display()))?;

        Ok(staged)
    }

    fn prepare(
        &self,
        artifact: &Path,
        kind: RuntimeKind,
        bench: &BenchmarkFile,
        scratch: &Path,
    ) -> Result<ProcessSpec, String> {
        match kind.mode {
            Mode::Interpreted => Ok(ProcessSpec::new(artifact)
                .arg(run_subcommand(kind.backend))
                .arg(&bench.path)),

            Mode::Compiled => {
                let gen = gen_subcommand(kind.backend)?;
                let (compiler, args, suffix) = compile_plan(kind.backend)?;

                let source = self.step(
                    gen,
                    ProcessSpec::new(artifact).arg(gen).arg(&bench.path),
                    self.stage_timeout,
                )?;

                let source_file = scratch.join(format!("{}{suffix}", bench.name));
                std::fs::write(&source_file, source)
                    .map_err(|e| format!("writing generated source: {e}"))?;

                let binary = scratch.join(&bench.name);
                self.step(
                    compiler,
                    ProcessSpec::new(compiler)
                        .arg(&source_file)
                        .args(args.iter().copied())
                        .arg("-o")
                        .arg(&binary),
                    self.stage_timeout,
                )?;

                Ok(ProcessSpec::new(binary))
            }
        }
    }
}
