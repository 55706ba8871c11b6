//! Repo index — the durable catalog of tracked repositories and their sync
//! state.
//!
//! One entry per repository, keyed by repo id. All mutations are single-entry
//! upserts, so concurrent workers touching different entries never contend.
//! Entries are never deleted, only marked `failed`/`stale` — the history of
//! tracking is preserved.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

// ─── Entry types ─────────────────────────────────────────────────────────────

/// Sync lifecycle state: `pending → synced ⇄ stale → failed`, with `failed`
/// reachable from any state. `synced` is the only state the detector
/// framework may read from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Synced,
    Stale,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Stale => "stale",
            SyncStatus::Failed => "failed",
        }
    }

    /// Whether `self → to` is a legal lifecycle transition.
    pub fn can_transition(&self, to: SyncStatus) -> bool {
        use SyncStatus::*;
        match (self, to) {
            // failed is terminal until explicit re-registration.
            (Failed, Pending) => true,
            (Failed, _) => false,
            // failed is reachable from any live state.
            (_, Failed) => true,
            (Pending, Synced) => true,
            (Synced, Stale) | (Stale, Synced) => true,
            // Re-syncing an already-synced entry is a self-transition.
            (a, b) => a == &b,
        }
    }
}

/// Size and shape metadata captured at sync time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SizeMetrics {
    pub file_count: u64,
    pub total_bytes: u64,
    /// Line counts per recognized language tag, e.g. `{"rust": 1204}`.
    #[serde(default)]
    pub lines_by_language: BTreeMap<String, u64>,
}

/// One tracked repository.
///
/// `local_path` is transient (recomputed from the data directory at load
/// time) and exclusively managed by the sync engine; nothing else writes to
/// the mirror. Whenever `sync_status` is `synced`, the mirror is checked out
/// at `last_synced_revision`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoEntry {
    pub id: String,
    pub remote: String,
    #[serde(skip)]
    pub local_path: PathBuf,
    pub last_synced_revision: Option<String>,
    pub last_synced_at: Option<String>,
    pub sync_status: SyncStatus,
    #[serde(default)]
    pub size_metrics: SizeMetrics,
    /// Terminal reason recorded on permanent failure; cleared on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Unknown fields from newer writers, preserved verbatim on rewrite.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RepoEntry {
    pub fn new(id: String, remote: String, local_path: PathBuf) -> Self {
        Self {
            id,
            remote,
            local_path,
            last_synced_revision: None,
            last_synced_at: None,
            sync_status: SyncStatus::Pending,
            size_metrics: SizeMetrics::default(),
            failure_reason: None,
            extra: serde_json::Map::new(),
        }
    }
}

// ─── Index ───────────────────────────────────────────────────────────────────

/// The persisted `repo_id → RepoEntry` catalog.
///
/// Interior mutability is per-map behind one `RwLock`; every mutation is a
/// whole-entry upsert keyed by repo id.
pub struct RepoIndex {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, RepoEntry>>,
}

impl RepoIndex {
    /// Load the index from disk; a missing file yields an empty index.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read index {}", path.display()))?;
            serde_json::from_str::<BTreeMap<String, RepoEntry>>(&raw)
                .with_context(|| format!("corrupt index {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        debug!(entries = entries.len(), path = %path.display(), "index loaded");
        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
        })
    }

    /// Register a repository, creating a `pending` entry if absent.
    ///
    /// Re-registering an existing entry is how a `failed` repository is
    /// explicitly brought back into rotation: its status resets to `pending`
    /// while the last known-good revision is kept.
    pub fn register(&self, id: &str, remote: &str, local_path: PathBuf) {
        let mut entries = self.entries.write().unwrap();
        match entries.get_mut(id) {
            Some(entry) => {
                entry.remote = remote.to_string();
                entry.local_path = local_path;
                if entry.sync_status == SyncStatus::Failed {
                    entry.sync_status = SyncStatus::Pending;
                    entry.failure_reason = None;
                    debug!(repo = id, "failed entry re-registered");
                }
            }
            None => {
                entries.insert(
                    id.to_string(),
                    RepoEntry::new(id.to_string(), remote.to_string(), local_path),
                );
                debug!(repo = id, "repo registered");
            }
        }
    }

    /// Replace an entry wholesale. Illegal lifecycle transitions are
    /// rejected with a warning and leave the stored entry untouched.
    pub fn upsert(&self, entry: RepoEntry) {
        let mut entries = self.entries.write().unwrap();
        if let Some(existing) = entries.get(&entry.id) {
            if !existing.sync_status.can_transition(entry.sync_status) {
                warn!(
                    repo = %entry.id,
                    from = existing.sync_status.as_str(),
                    to = entry.sync_status.as_str(),
                    "illegal sync state transition rejected"
                );
                return;
            }
        }
        entries.insert(entry.id.clone(), entry);
    }

    pub fn get(&self, id: &str) -> Option<RepoEntry> {
        self.entries.read().unwrap().get(id).cloned()
    }

    /// All entries, optionally filtered by status.
    pub fn list(&self, status: Option<SyncStatus>) -> Vec<RepoEntry> {
        self.entries
            .read()
            .unwrap()
            .values()
            .filter(|e| status.map_or(true, |s| e.sync_status == s))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Write the index to disk atomically (write-then-rename). Unknown
    /// fields carried in `extra` survive the rewrite.
    pub fn persist(&self) -> Result<()> {
        let entries = self.entries.read().unwrap();
        let json = serde_json::to_string_pretty(&*entries)?;
        drop(entries);
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("cannot write index {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("cannot replace index {}", self.path.display()))?;
        Ok(())
    }
}
