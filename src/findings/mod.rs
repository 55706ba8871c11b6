//! Finding store — normalized detector output per `(repo, revision)`.
//!
//! Findings are immutable once recorded for a `(repo_id, revision,
//! detector)` triple: re-recording identical content is a no-op, and a new
//! revision lands in a new file while old revisions are retained for audit
//! and trend analysis.

use anyhow::{Context as _, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::detect::DetectorReport;
use crate::registry::repo_dir_name;

/// All detector reports for one repository at one revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionFindings {
    pub repo_id: String,
    pub revision: String,
    pub recorded_at: String,
    /// Fingerprint of the analyzed tree shape, for audit: identical
    /// `(revision, fingerprint)` pairs must carry identical reports.
    #[serde(default)]
    pub tree_fingerprint: String,
    pub reports: Vec<DetectorReport>,
}

impl RevisionFindings {
    pub fn new(
        repo_id: String,
        revision: String,
        tree_fingerprint: String,
        reports: Vec<DetectorReport>,
    ) -> Self {
        Self {
            repo_id,
            revision,
            recorded_at: Utc::now().to_rfc3339(),
            tree_fingerprint,
            reports,
        }
    }
}

/// What `record` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// Identical content already on disk — the idempotent no-op.
    Unchanged,
    /// Different content for the same `(repo, revision)` — the stored
    /// findings win, because findings are immutable once recorded.
    KeptExisting,
}

pub struct FindingStore {
    dir: PathBuf,
}

impl FindingStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, repo_id: &str, revision: &str) -> PathBuf {
        self.dir.join(repo_dir_name(repo_id)).join(format!("{revision}.json"))
    }

    /// Record findings for one revision. Comparison ignores `recorded_at` so
    /// a re-run at the same revision with identical evidence is a no-op.
    pub fn record(&self, findings: &RevisionFindings) -> Result<RecordOutcome> {
        let path = self.path_for(&findings.repo_id, &findings.revision);

        if let Some(existing) = self.load(&findings.repo_id, &findings.revision)? {
            let same = serde_json::to_string(&existing.reports)?
                == serde_json::to_string(&findings.reports)?;
            if same {
                debug!(repo = %findings.repo_id, revision = %findings.revision, "findings unchanged");
                return Ok(RecordOutcome::Unchanged);
            }
            warn!(
                repo = %findings.repo_id,
                revision = %findings.revision,
                "divergent findings for an already-recorded revision — keeping existing"
            );
            return Ok(RecordOutcome::KeptExisting);
        }

        std::fs::create_dir_all(path.parent().expect("findings path has a parent"))
            .with_context(|| format!("cannot create {}", path.display()))?;
        let json = serde_json::to_string_pretty(findings)?;
        std::fs::write(&path, json)
            .with_context(|| format!("cannot write findings {}", path.display()))?;
        debug!(repo = %findings.repo_id, revision = %findings.revision, "findings recorded");
        Ok(RecordOutcome::Recorded)
    }

    pub fn load(&self, repo_id: &str, revision: &str) -> Result<Option<RevisionFindings>> {
        let path = self.path_for(repo_id, revision);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read findings {}", path.display()))?;
        let findings = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt findings {}", path.display()))?;
        Ok(Some(findings))
    }

    /// Revisions recorded for a repository, sorted for stable output.
    pub fn revisions(&self, repo_id: &str) -> Vec<String> {
        let dir = self.dir.join(repo_dir_name(repo_id));
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut revisions: Vec<String> = entries
            .flatten()
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_suffix(".json"))
                    .map(String::from)
            })
            .collect();
        revisions.sort();
        revisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{DetectorCategory, DetectorReport, Finding, Severity};

    fn report(detector: &str, severity: Severity) -> DetectorReport {
        DetectorReport {
            detector: detector.to_string(),
            category: DetectorCategory::PlaceholderGrep,
            weight: 1.0,
            skipped: false,
            findings: vec![Finding {
                repo_id: "r".into(),
                revision: "rev1".into(),
                detector: detector.to_string(),
                severity,
                confidence: 0.8,
                message: "m".into(),
                evidence: None,
            }],
        }
    }

    #[test]
    fn record_is_idempotent_for_same_revision() {
        let dir = tempfile::tempdir().unwrap();
        let store = FindingStore::new(dir.path().to_path_buf());
        let findings =
            RevisionFindings::new("github.com/a/one".into(), "rev1".into(), "fp".into(), vec![report("d", Severity::Low)]);

        assert_eq!(store.record(&findings).unwrap(), RecordOutcome::Recorded);
        // Re-record with a different timestamp but identical reports.
        let again =
            RevisionFindings::new("github.com/a/one".into(), "rev1".into(), "fp".into(), vec![report("d", Severity::Low)]);
        assert_eq!(store.record(&again).unwrap(), RecordOutcome::Unchanged);
        assert_eq!(store.revisions("github.com/a/one"), vec!["rev1"]);
    }

    #[test]
    fn divergent_rerecord_keeps_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FindingStore::new(dir.path().to_path_buf());
        let first =
            RevisionFindings::new("r".into(), "rev1".into(), "fp".into(), vec![report("d", Severity::Low)]);
        store.record(&first).unwrap();

        let divergent =
            RevisionFindings::new("r".into(), "rev1".into(), "fp".into(), vec![report("d", Severity::High)]);
        assert_eq!(store.record(&divergent).unwrap(), RecordOutcome::KeptExisting);

        let stored = store.load("r", "rev1").unwrap().unwrap();
        assert_eq!(stored.reports[0].findings[0].severity, Severity::Low);
    }

    #[test]
    fn new_revision_is_disjoint_and_old_is_retained() {
        let dir = tempfile::tempdir().unwrap();
        let store = FindingStore::new(dir.path().to_path_buf());
        store
            .record(&RevisionFindings::new("r".into(), "rev1".into(), "fp".into(), vec![report("d", Severity::Low)]))
            .unwrap();
        store
            .record(&RevisionFindings::new("r".into(), "rev2".into(), "fp".into(), vec![report("d", Severity::High)]))
            .unwrap();
        assert_eq!(store.revisions("r"), vec!["rev1", "rev2"]);
        assert!(store.load("r", "rev1").unwrap().is_some());
    }
}
