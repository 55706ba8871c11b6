use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::scoring::methodology::Methodology;

const DEFAULT_SYNC_CONCURRENCY: usize = 8;
const DEFAULT_DETECT_CONCURRENCY: usize = 4;
const DEFAULT_MAX_ATTEMPTS: u32 = 4;
const DEFAULT_INITIAL_DELAY_MS: u64 = 500;
const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
const DEFAULT_REPO_TIME_BUDGET_SECS: u64 = 120;
const DEFAULT_MAX_FILE_BYTES: u64 = 1_048_576;

// ─── SyncConfig ──────────────────────────────────────────────────────────────

/// Sync engine configuration (`[sync]` in reposcout.toml).
///
/// Rate limiting against remote hosts is a sync concern: the fetch fan-out is
/// bounded by `max_concurrent`, independent of detector parallelism.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum concurrent remote fetches (default: 8).
    pub max_concurrent: usize,
    /// Retry attempts per repository for transient failures, including the
    /// first try (default: 4).
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds (default: 500).
    pub initial_delay_ms: u64,
    /// Upper bound on the backoff delay, in milliseconds (default: 30000).
    pub max_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_SYNC_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

// ─── DetectConfig ────────────────────────────────────────────────────────────

/// Detector framework configuration (`[detect]` in reposcout.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Maximum repositories analyzed in parallel (default: 4). Detection is
    /// purely local filesystem work, so this only bounds CPU/IO pressure.
    pub max_concurrent: usize,
    /// Per-repository time budget for the whole detector pass, in seconds
    /// (default: 120). Expiry cancels the pass without recording partial
    /// findings.
    pub repo_time_budget_secs: u64,
    /// Files larger than this are treated as binary blobs and never read
    /// into detector memory (default: 1 MiB).
    pub max_file_bytes: u64,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_DETECT_CONCURRENCY,
            repo_time_budget_secs: DEFAULT_REPO_TIME_BUDGET_SECS,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

// ─── PipelineConfig ──────────────────────────────────────────────────────────

/// Top-level configuration for the pipeline.
///
/// Loaded from `<data_dir>/reposcout.toml` when present; every section has
/// full defaults so a missing file is not an error. A malformed file or an
/// invalid methodology table is fatal at startup — configuration errors are
/// the one class of error that halts the process before any work starts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Data directory holding the registry, index, findings, scores, and
    /// mirrors. Not itself read from the config file.
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub sync: SyncConfig,
    pub detect: DetectConfig,
    /// Versioned scoring methodology: dimension weights, severity penalties,
    /// and caps. Treated as configuration, never a hardcoded literal.
    pub scoring: Methodology,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::new(),
            sync: SyncConfig::default(),
            detect: DetectConfig::default(),
            scoring: Methodology::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration for `data_dir`, merging `reposcout.toml` when it
    /// exists. Validates the methodology table and fails fast on any error.
    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let config_path = data_dir.join("reposcout.toml");
        let mut config = if config_path.exists() {
            let raw = std::fs::read_to_string(&config_path)?;
            let parsed: PipelineConfig = toml::from_str(&raw).map_err(|e| {
                anyhow::anyhow!("malformed config {}: {e}", config_path.display())
            })?;
            info!(path = %config_path.display(), "loaded config file");
            parsed
        } else {
            Self::default()
        };
        config.data_dir = data_dir.to_path_buf();
        config.scoring.validate()?;
        Ok(config)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("registry.txt")
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("repo-index.json")
    }

    pub fn scores_path(&self) -> PathBuf {
        self.data_dir.join("legitimacy-scores.json")
    }

    pub fn findings_dir(&self) -> PathBuf {
        self.data_dir.join("findings")
    }

    pub fn mirrors_dir(&self) -> PathBuf {
        self.data_dir.join("mirrors")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.sync.max_attempts, 4);
        assert!(config.scoring.validate().is_ok());
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load(dir.path()).unwrap();
        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.detect.max_file_bytes, DEFAULT_MAX_FILE_BYTES);
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("reposcout.toml"), "[sync\nbroken").unwrap();
        assert!(PipelineConfig::load(dir.path()).is_err());
    }

    #[test]
    fn load_rejects_invalid_weight_table() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("reposcout.toml"),
            r#"
[scoring]
version = "v9"

[scoring.weights]
zk_implementation = 1.5
"#,
        )
        .unwrap();
        assert!(PipelineConfig::load(dir.path()).is_err());
    }

    #[test]
    fn section_overrides_merge_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("reposcout.toml"),
            "[sync]\nmax_concurrent = 2\n",
        )
        .unwrap();
        let config = PipelineConfig::load(dir.path()).unwrap();
        assert_eq!(config.sync.max_concurrent, 2);
        // Untouched sections keep their defaults.
        assert_eq!(config.sync.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.scoring.version, "v1");
    }
}
