//! Scoring engine — aggregates findings into per-dimension sub-scores, a
//! weighted total, and a letter grade.
//!
//! The computation is a pure function of the detector reports and the
//! methodology table: no clock, no randomness, no hidden state. Re-running
//! it against stored findings under any methodology version reproduces that
//! version's grades exactly.

pub mod methodology;
pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::detect::{DetectorReport, Severity};
use methodology::{dimension_for, Methodology};

/// Data-integrity error: a repository with zero applicable detectors across
/// every dimension must be visibly unscorable, never ranked by default.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("no evidence for {repo_id}@{revision}: no detector was applicable")]
    NoEvidence { repo_id: String, revision: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Pure threshold lookup on the weighted total.
    pub fn from_total(total: f64) -> Self {
        if total >= 85.0 {
            Grade::A
        } else if total >= 70.0 {
            Grade::B
        } else if total >= 55.0 {
            Grade::C
        } else if total >= 40.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

/// The aggregate for one `(repo, revision)` under one methodology version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub repo_id: String,
    pub revision: String,
    /// Only dimensions with at least one applicable detector appear here.
    pub dimension_scores: BTreeMap<String, f64>,
    pub weighted_total: f64,
    pub grade: Grade,
    pub methodology_version: String,
    pub scored_at: String,
}

/// Compute the Score for one repository revision.
///
/// Sub-scores are saturating and monotonic: every finding subtracts
/// `penalty(severity) × confidence` from its detector's 100-point budget
/// (clamped at zero), dimensions weight-average their applicable detectors,
/// and a confident critical/high finding additionally caps its dimension.
/// Inapplicable detectors are excluded from the denominator rather than
/// counted as perfect or failed.
pub fn score(
    methodology: &Methodology,
    repo_id: &str,
    revision: &str,
    reports: &[DetectorReport],
) -> Result<Score, ScoreError> {
    // dimension → (Σ weight·subscore, Σ weight, cap)
    let mut accum: BTreeMap<&'static str, (f64, f64, f64)> = BTreeMap::new();

    for report in reports.iter().filter(|r| !r.skipped) {
        let dimension = dimension_for(report.category);
        let sub = detector_subscore(methodology, report);
        let entry = accum.entry(dimension).or_insert((0.0, 0.0, 100.0));
        entry.0 += sub * report.weight;
        entry.1 += report.weight;

        for finding in &report.findings {
            if finding.confidence < methodology.caps.min_confidence {
                continue;
            }
            let cap = match finding.severity {
                Severity::Critical => methodology.caps.critical,
                Severity::High => methodology.caps.high,
                _ => continue,
            };
            entry.2 = entry.2.min(cap);
        }
    }

    if accum.is_empty() {
        return Err(ScoreError::NoEvidence {
            repo_id: repo_id.to_string(),
            revision: revision.to_string(),
        });
    }

    let mut dimension_scores = BTreeMap::new();
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for (dimension, (sum, weights, cap)) in accum {
        let mean = if weights > 0.0 { sum / weights } else { 0.0 };
        let value = mean.min(cap).clamp(0.0, 100.0);
        dimension_scores.insert(dimension.to_string(), round2(value));
        let w = methodology.weight_of(dimension);
        weighted_sum += w * value;
        weight_sum += w;
    }

    // Dimensions with no applicable detector (innovation always, others for
    // unusual trees) drop out of the denominator entirely.
    let weighted_total = if weight_sum > 0.0 {
        round2(weighted_sum / weight_sum)
    } else {
        return Err(ScoreError::NoEvidence {
            repo_id: repo_id.to_string(),
            revision: revision.to_string(),
        });
    };

    Ok(Score {
        repo_id: repo_id.to_string(),
        revision: revision.to_string(),
        dimension_scores,
        weighted_total,
        grade: Grade::from_total(weighted_total),
        methodology_version: methodology.version.clone(),
        scored_at: chrono::Utc::now().to_rfc3339(),
    })
}

fn detector_subscore(methodology: &Methodology, report: &DetectorReport) -> f64 {
    let penalty: f64 = report
        .findings
        .iter()
        .map(|f| methodology.penalties.for_severity(f.severity) * f.confidence)
        .sum();
    (100.0 - penalty).clamp(0.0, 100.0)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
