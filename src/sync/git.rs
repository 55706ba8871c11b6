//! git2 helpers for mirror management. All functions here block and must be
//! called under `tokio::task::spawn_blocking`.

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Direction, ErrorClass, ErrorCode, Remote, Repository};
use std::path::Path;

/// Sync-layer git failures, split by retry semantics.
#[derive(Debug, thiserror::Error)]
pub enum GitSyncError {
    /// Network/host trouble — worth retrying with backoff.
    #[error("remote unreachable: {0}")]
    Unreachable(String),
    /// Repository deleted or renamed — terminal until re-registered.
    #[error("repository not found: {0}")]
    NotFound(String),
    /// Credentials rejected — terminal until re-registered.
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("git operation failed: {0}")]
    Other(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitSyncError {
    /// Permanent failures must not be retried; the sync engine records a
    /// terminal reason instead.
    pub fn is_permanent(&self) -> bool {
        matches!(self, GitSyncError::NotFound(_) | GitSyncError::Auth(_))
    }

    fn from_git(err: git2::Error) -> Self {
        match (err.class(), err.code()) {
            (_, ErrorCode::Auth) | (_, ErrorCode::Certificate) => {
                GitSyncError::Auth(err.message().to_string())
            }
            (ErrorClass::Net, ErrorCode::NotFound) | (ErrorClass::Http, ErrorCode::NotFound) => {
                GitSyncError::NotFound(err.message().to_string())
            }
            (ErrorClass::Net, _) | (ErrorClass::Http, _) | (ErrorClass::Ssh, _) => {
                GitSyncError::Unreachable(err.message().to_string())
            }
            _ => GitSyncError::Other(err.message().to_string()),
        }
    }
}

/// Clone `remote` into `mirror` on first sync, or fetch and check out the
/// remote's current head on subsequent syncs. Returns the checked-out
/// revision. On any failure the existing mirror contents are left as-is.
pub fn sync_mirror(remote: &str, mirror: &Path) -> Result<String, GitSyncError> {
    if mirror.join(".git").exists() {
        let repo = Repository::open(mirror).map_err(GitSyncError::from_git)?;
        fetch_and_checkout(&repo)
    } else {
        if let Some(parent) = mirror.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let repo = RepoBuilder::new()
            .clone(remote, mirror)
            .map_err(GitSyncError::from_git)?;
        head_revision(&repo)
    }
}

/// Current HEAD commit of an existing mirror.
pub fn head_revision(repo: &Repository) -> Result<String, GitSyncError> {
    let commit = repo
        .head()
        .and_then(|h| h.peel_to_commit())
        .map_err(GitSyncError::from_git)?;
    Ok(commit.id().to_string())
}

/// Probe the remote's HEAD commit without fetching — the staleness check.
pub fn remote_head(remote_url: &str) -> Result<Option<String>, GitSyncError> {
    let mut remote = Remote::create_detached(remote_url).map_err(GitSyncError::from_git)?;
    remote
        .connect(Direction::Fetch)
        .map_err(GitSyncError::from_git)?;
    let heads = remote.list().map_err(GitSyncError::from_git)?;
    Ok(heads
        .iter()
        .find(|h| h.name() == "HEAD")
        .map(|h| h.oid().to_string()))
}

fn fetch_and_checkout(repo: &Repository) -> Result<String, GitSyncError> {
    let mut remote = repo
        .find_remote("origin")
        .map_err(GitSyncError::from_git)?;
    remote
        .fetch(
            &["+refs/heads/*:refs/remotes/origin/*"],
            None,
            None,
        )
        .map_err(GitSyncError::from_git)?;

    let oid = default_branch_target(repo)?;
    repo.set_head_detached(oid).map_err(GitSyncError::from_git)?;
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_head(Some(&mut checkout))
        .map_err(GitSyncError::from_git)?;
    Ok(oid.to_string())
}

/// Resolve the remote default branch after a fetch: `origin/HEAD` when the
/// remote advertises one, otherwise `origin/main`/`origin/master`, otherwise
/// the first remote-tracking branch.
fn default_branch_target(repo: &Repository) -> Result<git2::Oid, GitSyncError> {
    for name in [
        "refs/remotes/origin/HEAD",
        "refs/remotes/origin/main",
        "refs/remotes/origin/master",
    ] {
        if let Ok(reference) = repo.find_reference(name) {
            if let Ok(commit) = reference.peel_to_commit() {
                return Ok(commit.id());
            }
        }
    }
    let refs = repo.references_glob("refs/remotes/origin/*").map_err(GitSyncError::from_git)?;
    for reference in refs.flatten() {
        if let Ok(commit) = reference.peel_to_commit() {
            return Ok(commit.id());
        }
    }
    Err(GitSyncError::Other(
        "fetched mirror has no remote-tracking branches".to_string(),
    ))
}
