//! Revision resolution.
//!
//! Turns user-supplied revision names into concrete, checked-out revisions.
//! Git mechanics live behind [`RepoAccess`]; this module owns ordering,
//! deduplication, and the fatal error taxonomy of the resolution phase.

use std::path::PathBuf;

use fxhash::FxHashSet;
use thiserror::Error;

/// Errors from the resolution phase. These are the only fatal errors in the
/// harness: everything after resolution is recorded per cell instead.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The repository directory is missing or not a git repository.
    #[error("repository not found at {0}")]
    RepoNotFound(PathBuf),

    /// A revision name exists neither locally nor on the remote.
    #[error("cannot resolve revision {name:?}: {reason}")]
    UnresolvableRevision {
        /// The name as the user supplied it.
        name: String,
        /// Underlying git diagnostic.
        reason: String,
    },

    /// Materializing a checkout for a resolved id failed.
    #[error("failed to check out {id}: {reason}")]
    CheckoutFailed {
        /// Resolved commit id.
        id: String,
        /// Underlying git diagnostic.
        reason: String,
    },
}

/// A resolved, materialized revision of the target repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    /// Display name, as the user supplied it (first-seen name on duplicates).
    pub name: String,
    /// Immutable resolved commit id.
    pub resolved_id: String,
    /// Directory holding this revision's source tree.
    pub checkout: PathBuf,
}

/// Repository access collaborator: name → id and id → checkout. The
/// implementation may fetch remote refs as a side effect of `resolve_id`.
pub trait RepoAccess {
    /// Resolve a revision name to an immutable commit id.
    fn resolve_id(&self, name: &str) -> Result<String, RepoError>;

    /// Materialize a source tree for a resolved id.
    fn checkout(&self, id: &str) -> Result<PathBuf, RepoError>;
}

/// Resolve `names` in order, deduplicating by resolved id. Two names that
/// resolve to the same commit yield one revision carrying the first-seen name.
/// Each distinct name is resolved exactly once.
pub fn resolve_revisions(
    repo: &dyn RepoAccess,
    names: &[String],
) -> Result<Vec<Revision>, RepoError> {
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut revisions = Vec::with_capacity(names.len());

    for name in names {
        let resolved_id = repo.resolve_id(name)?;
        if !seen.insert(resolved_id.clone()) {
            tracing::debug!(name, id = %resolved_id, "revision already resolved, skipping");
            continue;
        }

        let checkout = repo.checkout(&resolved_id)?;
        tracing::info!(name, id = %resolved_id, "resolved revision");

        revisions.push(Revision {
            name: name.clone(),
            resolved_id,
            checkout,
        });
    }

    Ok(revisions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// Fake repository: a name → id table, recording resolution calls.
    struct FakeRepo {
        ids: BTreeMap<&'static str, &'static str>,
        resolved: RefCell<Vec<String>>,
    }

    impl FakeRepo {
        fn new(ids: &[(&'static str, &'static str)]) -> Self {
            Self {
                ids: ids.iter().copied().collect(),
                resolved: RefCell::new(Vec::new()),
            }
        }
    }

    impl RepoAccess for FakeRepo {
        fn resolve_id(&self, name: &str) -> Result<String, RepoError> {
            self.resolved.borrow_mut().push(name.to_string());
            self.ids
                .get(name)
                .map(|id| id.to_string())
                .ok_or_else(|| RepoError::UnresolvableRevision {
                    name: name.to_string(),
                    reason: "unknown ref".to_string(),
                })
        }

        fn checkout(&self, id: &str) -> Result<PathBuf, RepoError> {
            Ok(PathBuf::from(format!("/checkouts/{id}")))
        }
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn preserves_input_order() {
        let repo = FakeRepo::new(&[("main", "aaa"), ("dev", "bbb")]);
        let revisions = resolve_revisions(&repo, &names(&["dev", "main"])).unwrap();

        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[0].name, "dev");
        assert_eq!(revisions[1].name, "main");
    }

    #[test]
    fn dedups_by_id_keeping_first_seen_name() {
        // "main" and "HEAD" point at the same commit.
        let repo = FakeRepo::new(&[("main", "aaa"), ("HEAD", "aaa"), ("dev", "bbb")]);
        let revisions = resolve_revisions(&repo, &names(&["main", "HEAD", "dev"])).unwrap();

        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[0].name, "main");
        assert_eq!(revisions[0].resolved_id, "aaa");
        assert_eq!(revisions[1].name, "dev");
    }

    #[test]
    fn resolves_each_name_exactly_once() {
        let repo = FakeRepo::new(&[("main", "aaa"), ("dev", "bbb")]);
        resolve_revisions(&repo, &names(&["main", "dev"])).unwrap();

        assert_eq!(*repo.resolved.borrow(), vec!["main", "dev"]);
    }

    #[test]
    fn unknown_name_is_fatal_and_names_the_revision() {
        let repo = FakeRepo::new(&[("main", "aaa")]);
        let err = resolve_revisions(&repo, &names(&["main", "nope"])).unwrap_err();

        match err {
            RepoError::UnresolvableRevision { name, .. } => assert_eq!(name, "nope"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
