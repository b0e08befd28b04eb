#![warn(missing_docs)]
//! hvm-bench CLI
//!
//! Wires the collaborators together: parses the `bench` command, loads
//! `bench.toml`, resolves revisions through git, and hands the matrix to the
//! scheduler. Only resolution-phase errors are fatal; every matrix-phase
//! failure ends up as a sentinel in the rendered report.

mod config;
mod git;
mod suite;
mod toolchain;

pub use config::{BenchConfig, MatrixConfig, RunnerConfig};
pub use git::GitRepo;
pub use suite::{discover_suite, filter_suite};
pub use toolchain::HvmToolchain;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use regex::Regex;

use hvmbench_core::{
    resolve_revisions, Builder, Executor, MatrixScheduler, Revision, RuntimeTable,
};
use hvmbench_proc::{cancellation_requested, install_signal_handlers, UnixProcess};

/// Clap's default for `--timeout`, used to detect explicit overrides.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// hvm-bench CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "hvm-bench")]
#[command(version, about = "Benchmark HVM revisions across interpreted and compiled runtimes")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Benchmark a set of revisions and print a comparison table.
    Bench(BenchArgs),
}

/// Arguments for the `bench` subcommand.
#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Path to a local hvm repository to benchmark.
    #[arg(long, default_value = "./hvm")]
    pub repo_dir: PathBuf,

    /// Revisions to benchmark (branches, tags, or commit ids; repeatable).
    #[arg(short, long, required = true)]
    pub revs: Vec<String>,

    /// Per-run timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Build/staging timeout in seconds (bench.toml value when omitted).
    #[arg(long)]
    pub build_timeout: Option<u64>,

    /// Also benchmark the working tree of --repo-dir as a trailing "(local)"
    /// column.
    #[arg(long)]
    pub local: bool,

    /// Number of matrix cells to run in parallel.
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Directory containing the benchmark programs.
    #[arg(long)]
    pub programs_dir: Option<PathBuf>,

    /// Only run benchmarks whose name matches this regex.
    #[arg(long)]
    pub filter: Option<String>,

    /// Path to bench.toml (discovered by walking up from cwd when omitted).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse arguments and run. Entry point for the `hvm-bench` binary.
pub fn run() -> anyhow::Result<()> {
    run_with_cli(Cli::parse())
}

/// Run with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Bench(args) => bench(args),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "hvmbench=debug" } else { "hvmbench=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn bench(args: BenchArgs) -> anyhow::Result<()> {
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => BenchConfig::load(path)
            .with_context(|| format!("config file {}", path.display()))?,
        None => BenchConfig::discover().unwrap_or_default(),
    };

    if !args.repo_dir.exists() {
        anyhow::bail!("repository directory {:?} does not exist", args.repo_dir);
    }

    let timeout = effective_timeout(&args, &config)?;
    let build_timeout = match args.build_timeout {
        Some(secs) => Duration::from_secs(secs),
        None => BenchConfig::parse_duration(&config.runner.build_timeout)
            .context("runner.build_timeout in bench.toml")?,
    };
    let jobs = args.jobs.or(config.runner.jobs).unwrap_or(1);
    let programs_dir = args
        .programs_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.runner.programs_dir));

    install_signal_handlers();

    // Everything materialized for this invocation (checkouts, staged
    // binaries) lives here and is removed on exit.
    let workdir = tempfile::TempDir::with_prefix("hvm-bench-").context("temp dir")?;

    let repo = GitRepo::open(&args.repo_dir, workdir.path().join("checkouts"))?;
    let mut revisions = resolve_revisions(&repo, &args.revs)?;
    if args.local {
        revisions.push(local_revision(&args.repo_dir)?);
    }

    let mut files = discover_suite(&programs_dir)?;
    if let Some(pattern) = &args.filter {
        let filter = Regex::new(pattern).context("invalid --filter regex")?;
        files = filter_suite(files, &filter);
    }
    if files.is_empty() {
        tracing::warn!(dir = %programs_dir.display(), "no benchmark programs found");
    }

    let table = RuntimeTable::new(
        config.matrix.interpreted.clone(),
        config.matrix.compiled.clone(),
    );

    tracing::info!(
        revisions = revisions.len(),
        benchmarks = files.len(),
        kinds = table.kinds().count(),
        jobs,
        "running benchmark matrix"
    );

    let proc = UnixProcess;
    let toolchain = HvmToolchain::new(workdir.path().join("bin"), build_timeout);
    let scheduler = MatrixScheduler::new(
        Builder::new(&toolchain, build_timeout),
        Executor::new(&toolchain, &proc, timeout),
        &table,
        jobs,
    );

    let matrix = scheduler.execute(&revisions, &files);

    print!("{}", hvmbench_report::render(&matrix, &revisions, &files, &table));

    if cancellation_requested() {
        // Children are already dead; report what completed and signal the
        // interruption upward.
        std::process::exit(130);
    }

    Ok(())
}

/// CLI wins when explicitly set (detected against the clap default, as the
/// config file cannot distinguish the two); otherwise bench.toml applies.
fn effective_timeout(args: &BenchArgs, config: &BenchConfig) -> anyhow::Result<Duration> {
    if args.timeout != DEFAULT_TIMEOUT_SECS {
        return Ok(Duration::from_secs(args.timeout));
    }
    BenchConfig::parse_duration(&config.runner.timeout).context("runner.timeout in bench.toml")
}

/// The working tree of the target repository as a pseudo-revision.
fn local_revision(repo_dir: &Path) -> anyhow::Result<Revision> {
    let checkout = repo_dir
        .canonicalize()
        .with_context(|| format!("repository directory {}", repo_dir.display()))?;
    Ok(Revision {
        name: "(local)".to_string(),
        resolved_id: "(local)".to_string(),
        checkout,
    })
}
