//! Pipeline orchestration — bounded fan-out over independent repositories.
//!
//! Sync and detection both parallelize across repositories behind separate
//! semaphores; repositories share no mutable state, so the only coordination
//! points are single-entry index upserts. Within one repository all findings
//! for a revision are recorded before scoring reads them (a per-repo join,
//! not a global barrier); cross-repository ranking happens only after every
//! targeted repository has reached a terminal state, tolerating permanently
//! failed entries.

use anyhow::{Context as _, Result};
use chrono::Utc;
use futures_util::future;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::detect::{self, snapshot::RepoSnapshot};
use crate::findings::RevisionFindings;
use crate::index::SyncStatus;
use crate::registry;
use crate::scoring::{self, ScoreError};
use crate::sync::SyncEngine;
use crate::PipelineContext;

// ─── Run records ─────────────────────────────────────────────────────────────

/// Terminal outcome for one repository in one run. Every targeted repository
/// produces exactly one record — a failed sync or an unscorable tree is an
/// explicit row, never a missing one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum RunOutcome {
    Scored { grade: String, weighted_total: f64 },
    Unscorable,
    SyncFailed { reason: String },
    NotSynced,
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoRunRecord {
    pub repo_id: String,
    pub revision: Option<String>,
    pub outcome: RunOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub records: Vec<RepoRunRecord>,
}

impl RunSummary {
    pub fn scored_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, RunOutcome::Scored { .. }))
            .count()
    }
}

// ─── Registration ────────────────────────────────────────────────────────────

/// Load the registry file and register every entry into the index. New
/// entries start `pending`; previously failed entries come back into
/// rotation. The updated index is persisted immediately.
pub fn register_all(ctx: &PipelineContext) -> Result<usize> {
    let path = ctx.config.registry_path();
    let entries = registry::load_registry(&path)?;
    let mirrors = ctx.config.mirrors_dir();
    for entry in &entries {
        ctx.index
            .register(&entry.id, &entry.remote, mirrors.join(entry.dir_name()));
    }
    ctx.index.persist()?;
    info!(count = entries.len(), "registry loaded");
    Ok(entries.len())
}

/// Recompute mirror paths for entries loaded from a persisted index —
/// `local_path` is transient and derived from the data directory.
pub fn restore_local_paths(ctx: &PipelineContext) {
    let mirrors = ctx.config.mirrors_dir();
    for mut entry in ctx.index.list(None) {
        if entry.local_path.as_os_str().is_empty() {
            entry.local_path = mirrors.join(registry::repo_dir_name(&entry.id));
            ctx.index.upsert(entry);
        }
    }
}

// ─── Sync fan-out ────────────────────────────────────────────────────────────

/// Sync every registered repository through a bounded worker pool. Per-repo
/// failures are recorded in the index, never raised.
pub async fn sync_all(ctx: &PipelineContext, show_progress: bool) -> Result<Vec<crate::sync::SyncOutcome>> {
    let ids: Vec<String> = ctx.index.list(None).into_iter().map(|e| e.id).collect();
    let engine = Arc::new(SyncEngine::from_config(&ctx.config));
    let semaphore = Arc::new(tokio::sync::Semaphore::new(ctx.config.sync.max_concurrent));
    let bar = progress_bar(ids.len() as u64, "syncing", show_progress);

    let mut tasks = Vec::new();
    for id in ids {
        let ctx = ctx.clone();
        let engine = Arc::clone(&engine);
        let semaphore = Arc::clone(&semaphore);
        let bar = bar.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("sync semaphore closed");
            let outcome = engine.sync(&ctx.index, &id).await;
            bar.inc(1);
            outcome
        }));
    }

    let mut outcomes = Vec::new();
    for task in future::join_all(tasks).await {
        match task {
            Ok(Ok(outcome)) => outcomes.push(outcome),
            Ok(Err(e)) => warn!(err = %e, "sync task error"),
            Err(e) => warn!(err = %e, "sync task panicked"),
        }
    }
    bar.finish_and_clear();
    ctx.index.persist()?;
    Ok(outcomes)
}

/// Sync one repository by id.
pub async fn sync_one(ctx: &PipelineContext, repo_id: &str) -> Result<crate::sync::SyncOutcome> {
    let engine = SyncEngine::from_config(&ctx.config);
    let outcome = engine.sync(&ctx.index, repo_id).await?;
    ctx.index.persist()?;
    Ok(outcome)
}

/// Probe every synced entry's remote head and mark moved entries `stale`.
/// Returns how many entries are now stale. Probe failures leave entries
/// untouched — staleness is advisory, never destructive.
pub async fn refresh_all(ctx: &PipelineContext) -> Result<usize> {
    let engine = SyncEngine::from_config(&ctx.config);
    let mut stale = 0usize;
    for entry in ctx.index.list(Some(SyncStatus::Synced)) {
        if engine.refresh(&ctx.index, &entry.id).await? {
            stale += 1;
        }
    }
    ctx.index.persist()?;
    Ok(stale)
}

// ─── Detection + scoring ─────────────────────────────────────────────────────

/// Run the full detector battery and score one repository.
///
/// The whole pass runs under the per-repo time budget; on expiry nothing is
/// recorded for this `(repo, revision)` and the previous score stands.
pub async fn analyze_repo(ctx: &PipelineContext, repo_id: &str) -> Result<RepoRunRecord> {
    let Some(entry) = ctx.index.get(repo_id) else {
        anyhow::bail!("unknown repository {repo_id}");
    };

    if entry.sync_status != SyncStatus::Synced {
        return Ok(RepoRunRecord {
            repo_id: repo_id.to_string(),
            revision: entry.last_synced_revision.clone(),
            outcome: match entry.sync_status {
                SyncStatus::Failed => RunOutcome::SyncFailed {
                    reason: entry
                        .failure_reason
                        .clone()
                        .unwrap_or_else(|| "sync failed".to_string()),
                },
                _ => RunOutcome::NotSynced,
            },
        });
    }

    let revision = entry
        .last_synced_revision
        .clone()
        .context("synced entry has no revision")?;

    // Skip the battery when this revision is already scored under the
    // current methodology — the empty-diff signal from sync.
    if let Some(existing) = ctx.scores.latest(repo_id, &ctx.config.scoring.version) {
        if existing.revision == revision
            && existing.methodology_version == ctx.config.scoring.version
        {
            return Ok(RepoRunRecord {
                repo_id: repo_id.to_string(),
                revision: Some(revision),
                outcome: RunOutcome::Scored {
                    grade: existing.grade.as_str().to_string(),
                    weighted_total: existing.weighted_total,
                },
            });
        }
    }

    let budget = Duration::from_secs(ctx.config.detect.repo_time_budget_secs);
    let detectors = Arc::clone(&ctx.detectors);
    let local_path = entry.local_path.clone();
    let max_file_bytes = ctx.config.detect.max_file_bytes;
    let repo = repo_id.to_string();
    let rev = revision.clone();

    let pass = tokio::time::timeout(
        budget,
        tokio::task::spawn_blocking(move || {
            let snapshot = RepoSnapshot::collect(&local_path, &rev, max_file_bytes);
            let reports = detect::run_all(&detectors, &snapshot, &repo);
            (snapshot.tree_fingerprint(), reports)
        }),
    )
    .await;

    let (fingerprint, reports) = match pass {
        Ok(joined) => joined.context("detector task panicked")?,
        Err(_) => {
            warn!(repo = repo_id, budget_secs = budget.as_secs(), "detector pass timed out — nothing recorded");
            return Ok(RepoRunRecord {
                repo_id: repo_id.to_string(),
                revision: Some(revision),
                outcome: RunOutcome::TimedOut,
            });
        }
    };

    // Per-repo join: findings are fully recorded before scoring reads them.
    let revision_findings =
        RevisionFindings::new(repo_id.to_string(), revision.clone(), fingerprint, reports);
    ctx.findings.record(&revision_findings)?;
    let stored = ctx
        .findings
        .load(repo_id, &revision)?
        .context("findings vanished after record")?;

    match scoring::score(&ctx.config.scoring, repo_id, &revision, &stored.reports) {
        Ok(score) => {
            let outcome = RunOutcome::Scored {
                grade: score.grade.as_str().to_string(),
                weighted_total: score.weighted_total,
            };
            ctx.scores.append(score);
            Ok(RepoRunRecord {
                repo_id: repo_id.to_string(),
                revision: Some(revision),
                outcome,
            })
        }
        Err(ScoreError::NoEvidence { .. }) => {
            info!(repo = repo_id, revision = %revision, "unscorable: no applicable detector");
            Ok(RepoRunRecord {
                repo_id: repo_id.to_string(),
                revision: Some(revision),
                outcome: RunOutcome::Unscorable,
            })
        }
    }
}

/// Analyze every synced repository through a bounded pool; unsynced and
/// failed entries still produce explicit records.
pub async fn analyze_all(ctx: &PipelineContext, show_progress: bool) -> Result<Vec<RepoRunRecord>> {
    let ids: Vec<String> = ctx.index.list(None).into_iter().map(|e| e.id).collect();
    let semaphore = Arc::new(tokio::sync::Semaphore::new(ctx.config.detect.max_concurrent));
    let bar = progress_bar(ids.len() as u64, "analyzing", show_progress);

    let mut tasks = Vec::new();
    for id in ids {
        let ctx = ctx.clone();
        let semaphore = Arc::clone(&semaphore);
        let bar = bar.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("detect semaphore closed");
            let record = analyze_repo(&ctx, &id).await;
            bar.inc(1);
            record
        }));
    }

    let mut records = Vec::new();
    for task in future::join_all(tasks).await {
        match task {
            Ok(Ok(record)) => records.push(record),
            Ok(Err(e)) => warn!(err = %e, "analyze task error"),
            Err(e) => warn!(err = %e, "analyze task panicked"),
        }
    }
    bar.finish_and_clear();
    ctx.scores.persist()?;
    records.sort_by(|a, b| a.repo_id.cmp(&b.repo_id));
    Ok(records)
}

/// The full pipeline: sync everything, analyze everything, then summarize.
/// The summary is the one global barrier — it is only produced once every
/// repository has reached a terminal state for this run.
pub async fn run_full(ctx: &PipelineContext, show_progress: bool) -> Result<RunSummary> {
    let run_id = Uuid::new_v4().to_string();
    let started_at = Utc::now().to_rfc3339();
    info!(run_id = %run_id, repos = ctx.index.len(), "pipeline run started");

    sync_all(ctx, show_progress).await?;
    let records = analyze_all(ctx, show_progress).await?;

    let summary = RunSummary {
        run_id,
        started_at,
        finished_at: Utc::now().to_rfc3339(),
        records,
    };
    info!(
        scored = summary.scored_count(),
        total = summary.records.len(),
        "pipeline run finished"
    );
    Ok(summary)
}

// ─── Rescoring ───────────────────────────────────────────────────────────────

/// Recompute scores for every recorded revision of every repository under a
/// different methodology version, appending new records. Stored findings
/// are the source of truth — no re-sync, no re-detection.
pub async fn rescore_all(
    ctx: &PipelineContext,
    methodology: &crate::scoring::methodology::Methodology,
) -> Result<usize> {
    let mut appended = 0usize;
    for entry in ctx.index.list(None) {
        for revision in ctx.findings.revisions(&entry.id) {
            let Some(stored) = ctx.findings.load(&entry.id, &revision)? else {
                continue;
            };
            match scoring::score(methodology, &entry.id, &revision, &stored.reports) {
                Ok(score) => {
                    if ctx.scores.append(score) {
                        appended += 1;
                    }
                }
                Err(ScoreError::NoEvidence { .. }) => {
                    info!(repo = %entry.id, revision = %revision, "still unscorable under new methodology");
                }
            }
        }
    }
    ctx.scores.persist()?;
    info!(appended, methodology = %methodology.version, "rescore complete");
    Ok(appended)
}

// ─── Ranking ─────────────────────────────────────────────────────────────────

/// One leaderboard row. Unscorable and failed repositories appear with an
/// explicit status so the ranking never understates the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankRow {
    pub rank: Option<usize>,
    pub repo_id: String,
    pub revision: Option<String>,
    pub grade: Option<String>,
    pub weighted_total: Option<f64>,
    pub status: String,
}

/// Ranked leaderboard over every tracked repository, computed from persisted
/// state only. Scored repositories sort by weighted total (ties broken by
/// id for stable output); the rest trail with explicit statuses.
pub fn rank(ctx: &PipelineContext) -> Vec<RankRow> {
    let version = &ctx.config.scoring.version;
    let mut scored: Vec<RankRow> = Vec::new();
    let mut unscored: Vec<RankRow> = Vec::new();

    for entry in ctx.index.list(None) {
        match ctx.scores.latest(&entry.id, version) {
            Some(score) => scored.push(RankRow {
                rank: None,
                repo_id: entry.id,
                revision: Some(score.revision),
                grade: Some(score.grade.as_str().to_string()),
                weighted_total: Some(score.weighted_total),
                status: "scored".to_string(),
            }),
            None => unscored.push(RankRow {
                rank: None,
                repo_id: entry.id.clone(),
                revision: entry.last_synced_revision.clone(),
                grade: None,
                weighted_total: None,
                status: match entry.sync_status {
                    SyncStatus::Failed => "sync-failed".to_string(),
                    SyncStatus::Synced => "unscorable".to_string(),
                    other => other.as_str().to_string(),
                },
            }),
        }
    }

    scored.sort_by(|a, b| {
        b.weighted_total
            .partial_cmp(&a.weighted_total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.repo_id.cmp(&b.repo_id))
    });
    for (i, row) in scored.iter_mut().enumerate() {
        row.rank = Some(i + 1);
    }
    unscored.sort_by(|a, b| a.repo_id.cmp(&b.repo_id));
    scored.extend(unscored);
    scored
}

fn progress_bar(len: u64, message: &'static str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(message);
    bar
}
