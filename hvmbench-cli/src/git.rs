//! Git-backed repository access.
//!
//! Resolution prefers local refs and falls back to fetching the name from
//! `origin`. Checkouts are cheap local clones under the invocation's
//! temporary directory, one per resolved revision, so builds for different
//! revisions never share a working tree.

use std::path::{Path, PathBuf};
use std::process::Command;

use hvmbench_core::{RepoAccess, RepoError};

/// A local git repository plus a directory to materialize checkouts into.
#[derive(Debug)]
pub struct GitRepo {
    repo_dir: PathBuf,
    checkouts_dir: PathBuf,
}

impl GitRepo {
    /// Open `repo_dir`, validating that it is a git repository.
    pub fn open(repo_dir: &Path, checkouts_dir: PathBuf) -> Result<Self, RepoError> {
        let repo = Self {
            repo_dir: repo_dir.to_path_buf(),
            checkouts_dir,
        };

        // Any failure here (missing dir, not a repo, git itself absent) is
        // the same fatal class for the user.
        repo.git(&["rev-parse", "--git-dir"])
            .map_err(|_| RepoError::RepoNotFound(repo_dir.to_path_buf()))?;

        std::fs::create_dir_all(&repo.checkouts_dir)
            .map_err(|_| RepoError::RepoNotFound(repo_dir.to_path_buf()))?;

        Ok(repo)
    }

    /// Run git inside the target repository, returning trimmed stdout on
    /// success and stderr as the error reason.
    fn git(&self, args: &[&str]) -> Result<String, String> {
        run_git(args, Some(&self.repo_dir))
    }

    fn rev_parse(&self, name: &str) -> Result<String, String> {
        self.git(&["rev-parse", "--verify", "--quiet", &format!("{name}^{{commit}}")])
    }
}

fn run_git(args: &[&str], cwd: Option<&Path>) -> Result<String, String> {
    let mut command = Command::new("git");
    if let Some(dir) = cwd {
        command.arg("-C").arg(dir);
    }
    let output = command
        .args(args)
        .output()
        .map_err(|e| format!("failed to run git: {e}"))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}

impl RepoAccess for GitRepo {
    fn resolve_id(&self, name: &str) -> Result<String, RepoError> {
        if let Ok(id) = self.rev_parse(name) {
            return Ok(id);
        }

        // Not known locally: fetch the name from origin and retry. The fetch
        // also lands the objects for later checkout clones.
        tracing::info!(name, "revision not found locally, fetching from origin");
        let fetched = self.git(&["fetch", "origin", name]).is_ok();

        self.rev_parse(name)
            .or_else(|e| {
                if fetched {
                    // Fetched but still unnamed locally (e.g. a raw commit id):
                    // the fetch head is what origin resolved the name to.
                    self.rev_parse("FETCH_HEAD").map_err(|_| e)
                } else {
                    Err(e)
                }
            })
            .map_err(|reason| RepoError::UnresolvableRevision {
                name: name.to_string(),
                reason: if reason.is_empty() {
                    "not found in local or remote repository".to_string()
                } else {
                    reason
                },
            })
    }

    fn checkout(&self, id: &str) -> Result<PathBuf, RepoError> {
        let dest = self.checkouts_dir.join(&id[..id.len().min(12)]);
        if dest.exists() {
            return Ok(dest);
        }

        let fail = |reason: String| RepoError::CheckoutFailed {
            id: id.to_string(),
            reason,
        };

        // Local clone: objects are shared via hardlinks, so this is cheap
        // even for large histories.
        run_git(
            &[
                "clone",
                "--no-checkout",
                &self.repo_dir.to_string_lossy(),
                &dest.to_string_lossy(),
            ],
            None,
        )
        .map_err(&fail)?;

        run_git(&["checkout", "--detach", id], Some(&dest)).map_err(&fail)?;

        Ok(dest)
    }
}
