//! Score store — the durable `legitimacy-scores.json` mapping.
//!
//! Append-only across revisions and methodology versions per repository:
//! superseding never overwrites, so every historical grade remains
//! reproducible from its stored record.

use anyhow::{Context as _, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

use super::Score;

pub struct ScoreStore {
    path: PathBuf,
    records: RwLock<BTreeMap<String, Vec<Score>>>,
}

impl ScoreStore {
    /// Load the store from disk; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let records = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read scores {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("corrupt scores {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            records: RwLock::new(records),
        })
    }

    /// Append a score unless an identical `(revision, methodology)` record
    /// already exists — re-scoring at the same revision under the same
    /// table is idempotent.
    pub fn append(&self, score: Score) -> bool {
        let mut records = self.records.write().unwrap();
        let history = records.entry(score.repo_id.clone()).or_default();
        let duplicate = history.iter().any(|s| {
            s.revision == score.revision && s.methodology_version == score.methodology_version
        });
        if duplicate {
            debug!(
                repo = %score.repo_id,
                revision = %score.revision,
                methodology = %score.methodology_version,
                "score already recorded"
            );
            return false;
        }
        history.push(score);
        true
    }

    /// Latest recorded score per repository, preferring the given
    /// methodology version when present.
    pub fn latest(&self, repo_id: &str, methodology_version: &str) -> Option<Score> {
        let records = self.records.read().unwrap();
        let history = records.get(repo_id)?;
        history
            .iter()
            .rev()
            .find(|s| s.methodology_version == methodology_version)
            .or_else(|| history.last())
            .cloned()
    }

    pub fn history(&self, repo_id: &str) -> Vec<Score> {
        self.records
            .read()
            .unwrap()
            .get(repo_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn persist(&self) -> Result<()> {
        let records = self.records.read().unwrap();
        let json = serde_json::to_string_pretty(&*records)?;
        drop(records);
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("cannot write scores {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("cannot replace scores {}", self.path.display()))?;
        Ok(())
    }
}
