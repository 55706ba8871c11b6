//! Scoring methodology — the versioned weight table and aggregation rule.
//!
//! Everything here is configuration, not hardcoded policy: the table ships
//! with documented v1 defaults, can be overridden in `reposcout.toml` or a
//! standalone TOML file for rescoring, and its version string travels with
//! every Score so historical grades stay reproducible after the table
//! changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::detect::{DetectorCategory, Severity};

/// The fixed dimension set published in the report format.
pub const DIMENSIONS: &[&str] = &[
    "zk_implementation",
    "solana_integration",
    "documentation",
    "demo",
    "testing",
    "innovation",
    "completeness",
];

/// Which dimension a detector category feeds. Every category maps to
/// exactly one dimension; `innovation` deliberately has no feeder.
pub fn dimension_for(category: DetectorCategory) -> &'static str {
    match category {
        DetectorCategory::DependencyScan
        | DetectorCategory::CircuitReview
        | DetectorCategory::PrimitiveVerification
        | DetectorCategory::PlaceholderGrep => "zk_implementation",
        DetectorCategory::DeploymentCheck => "solana_integration",
        DetectorCategory::TestCoverage => "testing",
        DetectorCategory::DocScan => "documentation",
        DetectorCategory::DemoCheck => "demo",
        DetectorCategory::StructureAudit => "completeness",
    }
}

/// Points subtracted per finding, scaled by its confidence.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SeverityPenalties {
    pub info: f64,
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for SeverityPenalties {
    fn default() -> Self {
        Self {
            info: 0.0,
            low: 12.0,
            medium: 30.0,
            high: 60.0,
            critical: 90.0,
        }
    }
}

impl SeverityPenalties {
    pub fn for_severity(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Info => self.info,
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }
}

/// Ceilings applied to a dimension when severe findings are present: one
/// confident critical finding caps the dimension regardless of how well the
/// sibling detectors scored.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SeverityCaps {
    pub critical: f64,
    pub high: f64,
    /// Findings below this confidence do not trigger a cap (their penalty
    /// still applies, scaled).
    pub min_confidence: f64,
}

impl Default for SeverityCaps {
    fn default() -> Self {
        Self {
            critical: 35.0,
            high: 55.0,
            min_confidence: 0.5,
        }
    }
}

/// The versioned methodology: dimension weights plus aggregation constants.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Methodology {
    pub version: String,
    /// `dimension name → weight`; must cover only known dimensions, all
    /// positive, summing to 1.
    pub weights: BTreeMap<String, f64>,
    pub penalties: SeverityPenalties,
    pub caps: SeverityCaps,
}

impl Default for Methodology {
    fn default() -> Self {
        let weights = BTreeMap::from(
            [
                ("zk_implementation", 0.25),
                ("solana_integration", 0.20),
                ("documentation", 0.15),
                ("demo", 0.15),
                ("testing", 0.10),
                ("innovation", 0.10),
                ("completeness", 0.05),
            ]
            .map(|(k, v)| (k.to_string(), v)),
        );
        Self {
            version: "v1".to_string(),
            weights,
            penalties: SeverityPenalties::default(),
            caps: SeverityCaps::default(),
        }
    }
}

impl Methodology {
    /// Load a standalone methodology table (used by `rescore`).
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read methodology {}: {e}", path.display()))?;
        let methodology: Methodology = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("malformed methodology {}: {e}", path.display()))?;
        methodology.validate()?;
        Ok(methodology)
    }

    /// Configuration-error validation: unknown dimensions, non-positive
    /// weights, or a table that doesn't sum to 1 are all fatal at startup.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.version.trim().is_empty() {
            anyhow::bail!("methodology version must not be empty");
        }
        if self.weights.is_empty() {
            anyhow::bail!("methodology weight table is empty");
        }
        for (dimension, weight) in &self.weights {
            if !DIMENSIONS.contains(&dimension.as_str()) {
                anyhow::bail!("unknown dimension in weight table: {dimension}");
            }
            if *weight <= 0.0 || !weight.is_finite() {
                anyhow::bail!("weight for {dimension} must be positive, got {weight}");
            }
        }
        let sum: f64 = self.weights.values().sum();
        if (sum - 1.0).abs() > 1e-6 {
            anyhow::bail!("dimension weights must sum to 1.0, got {sum}");
        }
        if !(0.0..=1.0).contains(&self.caps.min_confidence) {
            anyhow::bail!("caps.min_confidence must be in 0..=1");
        }
        Ok(())
    }

    pub fn weight_of(&self, dimension: &str) -> f64 {
        self.weights.get(dimension).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid() {
        Methodology::default().validate().unwrap();
    }

    #[test]
    fn every_category_maps_to_a_known_dimension() {
        use DetectorCategory::*;
        for category in [
            DependencyScan,
            CircuitReview,
            PrimitiveVerification,
            PlaceholderGrep,
            TestCoverage,
            DeploymentCheck,
            DocScan,
            DemoCheck,
            StructureAudit,
        ] {
            assert!(DIMENSIONS.contains(&dimension_for(category)));
        }
    }

    #[test]
    fn rejects_unknown_dimension() {
        let mut m = Methodology::default();
        m.weights.insert("vibes".into(), 0.1);
        assert!(m.validate().is_err());
    }

    #[test]
    fn rejects_bad_sum() {
        let mut m = Methodology::default();
        m.weights.insert("demo".into(), 0.5);
        assert!(m.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_weight() {
        let mut m = Methodology::default();
        m.weights.insert("demo".into(), 0.0);
        assert!(m.validate().is_err());
    }
}
