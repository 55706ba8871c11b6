//! doc-scan — README substance and documentation presence.

use super::snapshot::RepoSnapshot;
use super::{Detector, DetectorCategory, Hit, Severity};

const THIN_README_CHARS: usize = 300;
const MODEST_README_CHARS: usize = 1_500;

pub fn detector() -> Detector {
    Detector {
        name: "doc-scan",
        category: DetectorCategory::DocScan,
        weight: 1.0,
        applies,
        run,
    }
}

fn applies(snapshot: &RepoSnapshot) -> bool {
    snapshot.is_recognized_project()
}

fn readme_text(snapshot: &RepoSnapshot) -> Option<String> {
    snapshot
        .files
        .iter()
        .find(|f| f.file_name().eq_ignore_ascii_case("README.md") && !f.rel_path.contains('/'))
        .and_then(|f| snapshot.read_text(&f.rel_path))
}

fn run(snapshot: &RepoSnapshot) -> anyhow::Result<Vec<Hit>> {
    let mut hits = Vec::new();

    let Some(readme) = readme_text(snapshot) else {
        hits.push(Hit::new(Severity::High, 1.0, "no README at repository root"));
        return Ok(hits);
    };

    let chars = readme.chars().count();
    let headings = readme.lines().filter(|l| l.starts_with('#')).count();
    let has_docs_dir = snapshot.files.iter().any(|f| f.rel_path.starts_with("docs/"));

    if chars < THIN_README_CHARS {
        hits.push(Hit::new(
            Severity::Medium,
            0.9,
            format!("README is thin ({chars} chars)"),
        ));
    } else if chars < MODEST_README_CHARS && !has_docs_dir {
        hits.push(Hit::new(
            Severity::Low,
            0.8,
            "short README and no docs directory",
        ));
    }

    if headings < 2 && chars >= THIN_README_CHARS {
        hits.push(Hit::new(
            Severity::Low,
            0.7,
            "README has no section structure",
        ));
    }

    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::snapshot::RepoSnapshot;

    fn snap(files: &[(&str, &str)]) -> (tempfile::TempDir, RepoSnapshot) {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        let s = RepoSnapshot::collect(dir.path(), "rev0", 1_048_576);
        (dir, s)
    }

    #[test]
    fn missing_readme_is_high() {
        let (_d, s) = snap(&[("Cargo.toml", "[package]")]);
        let hits = run(&s).unwrap();
        assert_eq!(hits[0].severity, Severity::High);
    }

    #[test]
    fn thin_readme_is_medium() {
        let (_d, s) = snap(&[("Cargo.toml", "[package]"), ("README.md", "# hi\nwip\n")]);
        let hits = run(&s).unwrap();
        assert!(hits.iter().any(|h| h.severity == Severity::Medium));
    }

    #[test]
    fn substantial_readme_passes() {
        let body = format!(
            "# Project\n\n## Overview\n{}\n## Usage\n{}\n",
            "prose line\n".repeat(100),
            "more prose\n".repeat(100)
        );
        let (_d, s) = snap(&[("Cargo.toml", "[package]"), ("README.md", &body)]);
        assert!(run(&s).unwrap().is_empty());
    }
}
