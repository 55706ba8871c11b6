//! Detector framework — a flat registry of independent static analyzers.
//!
//! Each detector is a registered capability value (name, category,
//! applicability predicate, weight, run function), not a trait hierarchy;
//! new detectors are additive registrations. Detectors are pure over a
//! [`snapshot::RepoSnapshot`]: the same tree always yields the same
//! findings. A detector that errors or panics is converted into an
//! `info`-severity internal-error finding at the framework boundary and
//! never aborts its siblings.

pub mod snapshot;

pub mod circuit;
pub mod coverage;
pub mod demo;
pub mod dependency;
pub mod deployment;
pub mod docs;
pub mod placeholder;
pub mod primitives;
pub mod structure;

use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

use snapshot::RepoSnapshot;

/// Longest literal excerpt carried in evidence. Findings hold bounded
/// snippets, never whole-file copies.
pub const MAX_EXCERPT_CHARS: usize = 160;

// ─── Finding types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Detector category. Each category maps to exactly one scoring dimension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DetectorCategory {
    DependencyScan,
    CircuitReview,
    PrimitiveVerification,
    PlaceholderGrep,
    TestCoverage,
    DeploymentCheck,
    DocScan,
    DemoCheck,
    StructureAudit,
}

impl DetectorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorCategory::DependencyScan => "dependency-scan",
            DetectorCategory::CircuitReview => "circuit-review",
            DetectorCategory::PrimitiveVerification => "primitive-verification",
            DetectorCategory::PlaceholderGrep => "placeholder-grep",
            DetectorCategory::TestCoverage => "test-coverage",
            DetectorCategory::DeploymentCheck => "deployment-check",
            DetectorCategory::DocScan => "doc-scan",
            DetectorCategory::DemoCheck => "demo-check",
            DetectorCategory::StructureAudit => "structure-audit",
        }
    }
}

/// Bounded pointer into the analyzed tree: path, line range, short excerpt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub excerpt: String,
}

impl Evidence {
    /// Build evidence for a single line, truncating the excerpt.
    pub fn line(path: &str, line_no: u32, text: &str) -> Self {
        Self {
            path: path.to_string(),
            line_start: line_no,
            line_end: line_no,
            excerpt: truncate_excerpt(text),
        }
    }
}

/// One raw detector observation, before the framework stamps identity.
#[derive(Debug, Clone)]
pub struct Hit {
    pub severity: Severity,
    /// 0.0–1.0 — heuristic detectors must express ambiguity here; pattern
    /// matches are never presented as proof.
    pub confidence: f64,
    pub message: String,
    pub evidence: Option<Evidence>,
}

impl Hit {
    pub fn new(severity: Severity, confidence: f64, message: impl Into<String>) -> Self {
        Self {
            severity,
            confidence: confidence.clamp(0.0, 1.0),
            message: message.into(),
            evidence: None,
        }
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = Some(evidence);
        self
    }
}

/// One immutable piece of evidence, keyed by `(repo, revision, detector)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub repo_id: String,
    pub revision: String,
    pub detector: String,
    pub severity: Severity,
    pub confidence: f64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
}

// ─── Detector registry ───────────────────────────────────────────────────────

/// A named, versioned analysis unit. Immutable configuration registered once
/// at process start; holds no per-run state.
pub struct Detector {
    pub name: &'static str,
    pub category: DetectorCategory,
    /// Contribution of this detector's sub-score inside its dimension.
    pub weight: f64,
    /// Whether the detector runs at all for this tree. Inapplicability is
    /// distinct from running-and-finding-nothing and never penalizes.
    pub applies: fn(&RepoSnapshot) -> bool,
    pub run: fn(&RepoSnapshot) -> anyhow::Result<Vec<Hit>>,
}

/// The built-in detector set.
pub fn builtin_registry() -> Vec<Detector> {
    vec![
        dependency::detector(),
        circuit::detector(),
        primitives::detector(),
        placeholder::detector(),
        coverage::detector(),
        deployment::detector(),
        docs::detector(),
        demo::detector(),
        structure::detector(),
    ]
}

// ─── Execution ───────────────────────────────────────────────────────────────

/// Outcome of one detector against one repository snapshot. `skipped`
/// records inapplicability so scoring can exclude the detector from its
/// dimension's denominator instead of treating absence as perfection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorReport {
    pub detector: String,
    pub category: DetectorCategory,
    pub weight: f64,
    pub skipped: bool,
    pub findings: Vec<Finding>,
}

/// Run every registered detector against one snapshot.
///
/// Isolation is the core robustness property: a detector that returns an
/// error or panics contributes a single `info`-severity internal-error
/// finding naming it, and every sibling still runs.
pub fn run_all(
    detectors: &[Detector],
    snapshot: &RepoSnapshot,
    repo_id: &str,
) -> Vec<DetectorReport> {
    detectors
        .iter()
        .map(|d| run_one(d, snapshot, repo_id))
        .collect()
}

fn run_one(detector: &Detector, snapshot: &RepoSnapshot, repo_id: &str) -> DetectorReport {
    if !(detector.applies)(snapshot) {
        debug!(repo = repo_id, detector = detector.name, "not applicable — skipped");
        return DetectorReport {
            detector: detector.name.to_string(),
            category: detector.category,
            weight: detector.weight,
            skipped: true,
            findings: Vec::new(),
        };
    }

    let outcome = catch_unwind(AssertUnwindSafe(|| (detector.run)(snapshot)));
    let findings = match outcome {
        Ok(Ok(hits)) => hits
            .into_iter()
            .map(|hit| Finding {
                repo_id: repo_id.to_string(),
                revision: snapshot.revision.clone(),
                detector: detector.name.to_string(),
                severity: hit.severity,
                confidence: hit.confidence,
                message: hit.message,
                evidence: hit.evidence,
            })
            .collect(),
        Ok(Err(e)) => {
            warn!(repo = repo_id, detector = detector.name, err = %e, "detector error — isolated");
            vec![internal_error_finding(repo_id, snapshot, detector, &e.to_string())]
        }
        Err(panic) => {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(repo = repo_id, detector = detector.name, err = %msg, "detector panicked — isolated");
            vec![internal_error_finding(repo_id, snapshot, detector, &msg)]
        }
    };

    DetectorReport {
        detector: detector.name.to_string(),
        category: detector.category,
        weight: detector.weight,
        skipped: false,
        findings,
    }
}

fn internal_error_finding(
    repo_id: &str,
    snapshot: &RepoSnapshot,
    detector: &Detector,
    message: &str,
) -> Finding {
    Finding {
        repo_id: repo_id.to_string(),
        revision: snapshot.revision.clone(),
        detector: detector.name.to_string(),
        severity: Severity::Info,
        confidence: 1.0,
        message: format!("detector '{}' internal error: {}", detector.name, truncate_excerpt(message)),
        evidence: None,
    }
}

fn truncate_excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_EXCERPT_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX_EXCERPT_CHARS).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(files: &[(&str, &str)]) -> (tempfile::TempDir, RepoSnapshot) {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        let snap = RepoSnapshot::collect(dir.path(), "rev0", 1_048_576);
        (dir, snap)
    }

    fn always(_: &RepoSnapshot) -> bool {
        true
    }

    #[test]
    fn erroring_detector_is_isolated_as_info_finding() {
        fn boom(_: &RepoSnapshot) -> anyhow::Result<Vec<Hit>> {
            anyhow::bail!("malformed manifest")
        }
        fn fine(_: &RepoSnapshot) -> anyhow::Result<Vec<Hit>> {
            Ok(vec![Hit::new(Severity::Low, 0.9, "ok path")])
        }
        let detectors = vec![
            Detector {
                name: "broken",
                category: DetectorCategory::DependencyScan,
                weight: 1.0,
                applies: always,
                run: boom,
            },
            Detector {
                name: "healthy",
                category: DetectorCategory::DocScan,
                weight: 1.0,
                applies: always,
                run: fine,
            },
        ];
        let (_dir, snap) = snapshot_with(&[("Cargo.toml", "[package]")]);
        let reports = run_all(&detectors, &snap, "repo-x");

        let broken = &reports[0];
        assert!(!broken.skipped);
        assert_eq!(broken.findings.len(), 1);
        assert_eq!(broken.findings[0].severity, Severity::Info);
        assert!(broken.findings[0].message.contains("broken"));

        // Sibling is unaffected.
        let healthy = &reports[1];
        assert_eq!(healthy.findings.len(), 1);
        assert_eq!(healthy.findings[0].severity, Severity::Low);
    }

    #[test]
    fn panicking_detector_is_isolated() {
        fn panics(_: &RepoSnapshot) -> anyhow::Result<Vec<Hit>> {
            panic!("index out of bounds")
        }
        let detectors = vec![Detector {
            name: "panicky",
            category: DetectorCategory::CircuitReview,
            weight: 1.0,
            applies: always,
            run: panics,
        }];
        let (_dir, snap) = snapshot_with(&[("main.nr", "fn main() {}")]);
        let reports = run_all(&detectors, &snap, "repo-x");
        assert_eq!(reports[0].findings.len(), 1);
        assert_eq!(reports[0].findings[0].severity, Severity::Info);
        assert!(reports[0].findings[0].message.contains("panicky"));
    }

    #[test]
    fn inapplicable_detector_is_skipped_not_run() {
        fn never(_: &RepoSnapshot) -> bool {
            false
        }
        fn must_not_run(_: &RepoSnapshot) -> anyhow::Result<Vec<Hit>> {
            panic!("applicability must gate execution")
        }
        let detectors = vec![Detector {
            name: "gated",
            category: DetectorCategory::CircuitReview,
            weight: 1.0,
            applies: never,
            run: must_not_run,
        }];
        let (_dir, snap) = snapshot_with(&[("README.md", "x")]);
        let reports = run_all(&detectors, &snap, "repo-x");
        assert!(reports[0].skipped);
        assert!(reports[0].findings.is_empty());
    }

    #[test]
    fn detector_runs_are_deterministic() {
        let registry = builtin_registry();
        let (_dir, snap) = snapshot_with(&[
            ("Cargo.toml", "[dependencies]\nark-groth16 = \"0.4\"\n"),
            ("src/lib.rs", "fn verify() -> bool { true } // TODO mock\n"),
        ]);
        let a = run_all(&registry, &snap, "repo-x");
        let b = run_all(&registry, &snap, "repo-x");
        let ja = serde_json::to_string(&a).unwrap();
        let jb = serde_json::to_string(&b).unwrap();
        assert_eq!(ja, jb, "same snapshot must produce byte-identical reports");
    }

    #[test]
    fn excerpts_are_bounded() {
        let long = "x".repeat(4_000);
        let ev = Evidence::line("a.rs", 1, &long);
        assert!(ev.excerpt.chars().count() <= MAX_EXCERPT_CHARS + 1);
    }
}
