//! Artifact building with a per-invocation single-flight cache.
//!
//! Build failures are data: they are captured into the artifact's status and
//! surfaced per cell, never raised out of the matrix.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use fxhash::FxHashMap;

use hvmbench_proc::ProcessSpec;

use crate::matrix::{BenchmarkFile, RuntimeKind};
use crate::revision::Revision;

/// Build/run command provider for one concrete runtime. Implemented by the
/// CLI crate (cargo, gcc, nvcc); faked in tests.
pub trait Toolchain: Send + Sync {
    /// Produce the runnable artifact for `revision` under `kind`, bounded by
    /// `timeout`. An `Err` is a captured reason (non-zero build, missing
    /// toolchain, build timeout), not an abort.
    fn build(
        &self,
        revision: &Revision,
        kind: RuntimeKind,
        timeout: Duration,
    ) -> Result<PathBuf, String>;

    /// Prepare the timed invocation for one cell. For compiled kinds this
    /// stages codegen + compilation in `scratch` first (untimed, bounded by
    /// the build timeout); an `Err` is the cell's build failure.
    fn prepare(
        &self,
        artifact: &Path,
        kind: RuntimeKind,
        bench: &BenchmarkFile,
        scratch: &Path,
    ) -> Result<ProcessSpec, String>;
}

/// Whether a build produced a runnable artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// Path to the runnable executable.
    Ok(PathBuf),
    /// Captured failure reason.
    Failed(String),
}

/// One cached build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    /// Resolved revision id this artifact was built from.
    pub revision_id: String,
    /// Runtime kind the artifact serves.
    pub kind: RuntimeKind,
    /// Outcome of the build step.
    pub status: BuildStatus,
}

type BuildKey = (String, RuntimeKind);

/// Builds artifacts at most once per `(revision, kind)` key. The first caller
/// runs the toolchain; concurrent requesters for the same key block on the
/// same latch and reuse the result.
pub struct Builder<'t> {
    toolchain: &'t dyn Toolchain,
    build_timeout: Duration,
    cache: Mutex<FxHashMap<BuildKey, Arc<OnceLock<BuildArtifact>>>>,
}

impl<'t> Builder<'t> {
    /// Create a builder over `toolchain` with the given build timeout.
    pub fn new(toolchain: &'t dyn Toolchain, build_timeout: Duration) -> Self {
        Self {
            toolchain,
            build_timeout,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    /// Build (or fetch from cache) the artifact for `(revision, kind)`.
    pub fn build(&self, revision: &Revision, kind: RuntimeKind) -> BuildArtifact {
        let key = (revision.resolved_id.clone(), kind);
        let latch = {
            let mut cache = self.cache.lock().expect("build cache poisoned");
            Arc::clone(
                cache
                    .entry(key)
                    .or_insert_with(|| Arc::new(OnceLock::new())),
            )
        };

        latch
            .get_or_init(|| {
                tracing::info!(rev = %revision.name, %kind, "building artifact");
                let status = match self.toolchain.build(revision, kind, self.build_timeout) {
                    Ok(path) => BuildStatus::Ok(path),
                    Err(reason) => {
                        tracing::warn!(rev = %revision.name, %kind, %reason, "build failed");
                        BuildStatus::Failed(reason)
                    }
                };
                BuildArtifact {
                    revision_id: revision.resolved_id.clone(),
                    kind,
                    status,
                }
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{Backend, Mode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingToolchain {
        builds: AtomicUsize,
        fail_kind: Option<RuntimeKind>,
    }

    impl CountingToolchain {
        fn new() -> Self {
            Self {
                builds: AtomicUsize::new(0),
                fail_kind: None,
            }
        }

        fn failing_for(kind: RuntimeKind) -> Self {
            Self {
                builds: AtomicUsize::new(0),
                fail_kind: Some(kind),
            }
        }
    }

    impl Toolchain for CountingToolchain {
        fn build(
            &self,
            revision: &Revision,
            kind: RuntimeKind,
            _timeout: Duration,
        ) -> Result<PathBuf, String> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if self.fail_kind == Some(kind) {
                return Err("simulated build failure".to_string());
            }
            Ok(PathBuf::from(format!(
                "/bin/{}-{kind}",
                revision.resolved_id
            )))
        }

        fn prepare(
            &self,
            artifact: &Path,
            _kind: RuntimeKind,
            _bench: &BenchmarkFile,
            _scratch: &Path,
        ) -> Result<ProcessSpec, String> {
            Ok(ProcessSpec::new(artifact))
        }
    }

    fn rev(id: &str) -> Revision {
        Revision {
            name: id.to_string(),
            resolved_id: id.to_string(),
            checkout: PathBuf::from("/checkouts").join(id),
        }
    }

    const INTERPRETED_C: RuntimeKind = RuntimeKind {
        mode: Mode::Interpreted,
        backend: Backend::C,
    };
    const COMPILED_C: RuntimeKind = RuntimeKind {
        mode: Mode::Compiled,
        backend: Backend::C,
    };

    #[test]
    fn second_build_is_a_cache_hit() {
        let toolchain = CountingToolchain::new();
        let builder = Builder::new(&toolchain, Duration::from_secs(1));
        let revision = rev("aaa");

        let first = builder.build(&revision, INTERPRETED_C);
        let second = builder.build(&revision, INTERPRETED_C);

        assert_eq!(first, second);
        assert_eq!(toolchain.builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_keys_build_separately() {
        let toolchain = CountingToolchain::new();
        let builder = Builder::new(&toolchain, Duration::from_secs(1));

        builder.build(&rev("aaa"), INTERPRETED_C);
        builder.build(&rev("aaa"), COMPILED_C);
        builder.build(&rev("bbb"), INTERPRETED_C);

        assert_eq!(toolchain.builds.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn failure_is_captured_not_raised() {
        let toolchain = CountingToolchain::failing_for(COMPILED_C);
        let builder = Builder::new(&toolchain, Duration::from_secs(1));

        let artifact = builder.build(&rev("aaa"), COMPILED_C);
        match artifact.status {
            BuildStatus::Failed(reason) => assert!(reason.contains("simulated")),
            BuildStatus::Ok(_) => panic!("expected failure"),
        }

        // Failures are cached too.
        builder.build(&rev("aaa"), COMPILED_C);
        assert_eq!(toolchain.builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_requesters_share_one_build() {
        let toolchain = CountingToolchain::new();
        let builder = Builder::new(&toolchain, Duration::from_secs(1));
        let revision = rev("aaa");

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| builder.build(&revision, INTERPRETED_C));
            }
        });

        assert_eq!(toolchain.builds.load(Ordering::SeqCst), 1);
    }
}
