pub mod config;
pub mod registry;
pub mod index;
pub mod retry;
pub mod sync;
pub mod detect;
pub mod findings;
pub mod scoring;
pub mod pipeline;

use std::sync::Arc;

use config::PipelineConfig;
use detect::Detector;
use findings::FindingStore;
use index::RepoIndex;
use scoring::store::ScoreStore;

/// Shared pipeline state passed explicitly to every command and worker task.
///
/// Nothing in the crate reaches into module-level globals — every reader and
/// writer receives this context, and each store coordinates its own interior
/// mutability per entry.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<PipelineConfig>,
    /// Durable catalog of tracked repositories and their sync state.
    pub index: Arc<RepoIndex>,
    /// Normalized detector output per `(repo, revision)`.
    pub findings: Arc<FindingStore>,
    /// Append-only score history per repository.
    pub scores: Arc<ScoreStore>,
    /// Flat detector registry, built once at startup. Detectors are
    /// immutable configuration and hold no per-run state.
    pub detectors: Arc<Vec<Detector>>,
}

impl PipelineContext {
    /// Build the full context from a loaded configuration.
    ///
    /// Loads the persisted index and score history from the data directory
    /// (empty stores if this is the first run) and registers the built-in
    /// detector set.
    pub fn initialize(config: PipelineConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(config.mirrors_dir())?;
        std::fs::create_dir_all(config.findings_dir())?;

        let index = RepoIndex::load(&config.index_path())?;
        let scores = ScoreStore::load(&config.scores_path())?;
        let findings = FindingStore::new(config.findings_dir());

        Ok(Self {
            config: Arc::new(config),
            index: Arc::new(index),
            findings: Arc::new(findings),
            scores: Arc::new(scores),
            detectors: Arc::new(detect::builtin_registry()),
        })
    }
}
