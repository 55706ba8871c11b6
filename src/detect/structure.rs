//! structure-audit — does the tree look like a complete project or a
//! skeleton? Feeds the completeness dimension.

use super::snapshot::RepoSnapshot;
use super::{Detector, DetectorCategory, Hit, Severity};

const SKELETON_SOURCE_FILES: usize = 3;

pub fn detector() -> Detector {
    Detector {
        name: "structure-audit",
        category: DetectorCategory::StructureAudit,
        weight: 1.0,
        applies,
        run,
    }
}

fn applies(snapshot: &RepoSnapshot) -> bool {
    snapshot.is_recognized_project()
}

fn run(snapshot: &RepoSnapshot) -> anyhow::Result<Vec<Hit>> {
    let mut hits = Vec::new();

    let source_count = snapshot.source_files().count();
    let manifests = snapshot.manifests();

    if manifests.is_empty() {
        hits.push(Hit::new(
            Severity::Medium,
            0.9,
            "source files without any recognized build manifest",
        ));
    }

    if source_count < SKELETON_SOURCE_FILES {
        hits.push(Hit::new(
            Severity::Medium,
            0.8,
            format!("skeleton project: only {source_count} source files"),
        ));
    }

    let has_ci = snapshot
        .files
        .iter()
        .any(|f| f.rel_path.starts_with(".github/workflows/"));
    if !has_ci {
        hits.push(Hit::new(Severity::Low, 0.9, "no CI workflow committed"));
    }

    let has_lockfile = ["Cargo.lock", "package-lock.json", "yarn.lock", "pnpm-lock.yaml", "go.sum"]
        .iter()
        .any(|n| snapshot.has_file_named(n));
    if !manifests.is_empty() && !has_lockfile {
        hits.push(Hit::new(
            Severity::Low,
            0.6,
            "no lockfile committed for the declared dependencies",
        ));
    }

    Ok(hits)
}
