//! Sync engine — keeps each registered repository mirrored locally.
//!
//! The engine only ever writes within an entry's own `local_path`; a failed
//! sync never destroys the last known-good mirror or revision.

pub mod git;

use anyhow::{Context as _, Result};
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::detect::snapshot::RepoSnapshot;
use crate::index::{RepoIndex, SyncStatus};
use crate::retry::{retry_with_backoff, RetryConfig};
use git::GitSyncError;

/// Result of one sync attempt against one repository.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub repo_id: String,
    pub status: SyncStatus,
    pub previous_revision: Option<String>,
    pub new_revision: Option<String>,
    pub failure_reason: Option<String>,
}

impl SyncOutcome {
    /// An empty diff (unchanged revision) signals downstream stages to skip
    /// redundant detector runs.
    pub fn changed(&self) -> bool {
        self.status == SyncStatus::Synced && self.previous_revision != self.new_revision
    }
}

pub struct SyncEngine {
    retry: RetryConfig,
    max_file_bytes: u64,
}

impl SyncEngine {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            retry: RetryConfig {
                max_attempts: config.sync.max_attempts,
                initial_delay: Duration::from_millis(config.sync.initial_delay_ms),
                max_delay: Duration::from_millis(config.sync.max_delay_ms),
                multiplier: 2.0,
            },
            max_file_bytes: config.detect.max_file_bytes,
        }
    }

    /// Sync one registered repository.
    ///
    /// Transient failures retry with exponential backoff up to the attempt
    /// ceiling, then mark the entry `failed` while preserving the previous
    /// good mirror and revision. Permanent failures (deleted remote, revoked
    /// auth) record a terminal reason immediately and are not retried until
    /// the entry is explicitly re-registered.
    pub async fn sync(&self, index: &RepoIndex, repo_id: &str) -> Result<SyncOutcome> {
        let entry = index
            .get(repo_id)
            .with_context(|| format!("unknown repository {repo_id}"))?;
        let previous = entry.last_synced_revision.clone();

        if entry.sync_status == SyncStatus::Failed {
            debug!(repo = repo_id, "skipping failed entry (re-register to retry)");
            return Ok(SyncOutcome {
                repo_id: repo_id.to_string(),
                status: SyncStatus::Failed,
                previous_revision: previous,
                new_revision: None,
                failure_reason: entry.failure_reason.clone(),
            });
        }

        let remote = entry.remote.clone();
        let mirror = entry.local_path.clone();
        let result = retry_with_backoff(
            &self.retry,
            |e: &GitSyncError| e.is_permanent(),
            || {
                let remote = remote.clone();
                let mirror = mirror.clone();
                async move {
                    tokio::task::spawn_blocking(move || git::sync_mirror(&remote, &mirror))
                        .await
                        .map_err(|e| GitSyncError::Other(format!("sync task panicked: {e}")))?
                }
            },
        )
        .await;

        let mut updated = entry.clone();
        match result {
            Ok(revision) => {
                let metrics = {
                    let mirror = entry.local_path.clone();
                    let revision = revision.clone();
                    let cap = self.max_file_bytes;
                    tokio::task::spawn_blocking(move || {
                        RepoSnapshot::collect(&mirror, &revision, cap).size_metrics()
                    })
                    .await
                    .context("size metrics task panicked")?
                };
                updated.sync_status = SyncStatus::Synced;
                updated.last_synced_revision = Some(revision.clone());
                updated.last_synced_at = Some(Utc::now().to_rfc3339());
                updated.failure_reason = None;
                updated.size_metrics = metrics;
                index.upsert(updated);
                info!(
                    repo = repo_id,
                    revision = %revision,
                    changed = previous.as_deref() != Some(revision.as_str()),
                    "sync complete"
                );
                Ok(SyncOutcome {
                    repo_id: repo_id.to_string(),
                    status: SyncStatus::Synced,
                    previous_revision: previous,
                    new_revision: Some(revision),
                    failure_reason: None,
                })
            }
            Err(e) => {
                let reason = e.to_string();
                updated.sync_status = SyncStatus::Failed;
                updated.failure_reason = Some(reason.clone());
                // last_synced_revision and the mirror stay untouched — the
                // last known-good state remains readable for audit.
                index.upsert(updated);
                warn!(repo = repo_id, reason = %reason, "sync failed");
                Ok(SyncOutcome {
                    repo_id: repo_id.to_string(),
                    status: SyncStatus::Failed,
                    previous_revision: previous,
                    new_revision: None,
                    failure_reason: Some(reason),
                })
            }
        }
    }

    /// Probe the remote head and mark a synced entry `stale` when the remote
    /// has moved past `last_synced_revision`. Returns whether the entry is
    /// now stale. Probe failures leave the entry untouched.
    pub async fn refresh(&self, index: &RepoIndex, repo_id: &str) -> Result<bool> {
        let entry = index
            .get(repo_id)
            .with_context(|| format!("unknown repository {repo_id}"))?;
        if entry.sync_status != SyncStatus::Synced {
            return Ok(entry.sync_status == SyncStatus::Stale);
        }

        let remote = entry.remote.clone();
        let head = tokio::task::spawn_blocking(move || git::remote_head(&remote))
            .await
            .context("refresh task panicked")?;

        match head {
            Ok(Some(remote_revision)) => {
                if entry.last_synced_revision.as_deref() != Some(remote_revision.as_str()) {
                    let mut updated = entry;
                    updated.sync_status = SyncStatus::Stale;
                    index.upsert(updated);
                    debug!(repo = repo_id, remote_revision = %remote_revision, "entry marked stale");
                    return Ok(true);
                }
                Ok(false)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                debug!(repo = repo_id, err = %e, "staleness probe failed — keeping current state");
                Ok(false)
            }
        }
    }
}
