//! test-coverage — test-to-source ratio as a `testing` signal.
//!
//! Counts lines in test-like files (plus inline `#[test]`/`it(...)` blocks
//! approximated by file classification) against total source lines. Ratio
//! bands map to severities; a repository with sources and zero test lines is
//! the worst band.

use super::snapshot::RepoSnapshot;
use super::{Detector, DetectorCategory, Hit, Severity};

pub fn detector() -> Detector {
    Detector {
        name: "test-coverage",
        category: DetectorCategory::TestCoverage,
        weight: 1.0,
        applies,
        run,
    }
}

fn applies(snapshot: &RepoSnapshot) -> bool {
    snapshot.source_files().next().is_some()
}

/// Whether a relative path looks like a test file in any supported ecosystem.
fn is_test_path(rel_path: &str) -> bool {
    let lower = rel_path.to_lowercase();
    let name = lower.rsplit('/').next().unwrap_or(&lower);
    lower.split('/').any(|seg| seg == "tests" || seg == "test" || seg == "__tests__")
        || name.starts_with("test_")
        || name.contains("_test.")
        || name.contains(".test.")
        || name.contains(".spec.")
}

fn run(snapshot: &RepoSnapshot) -> anyhow::Result<Vec<Hit>> {
    let mut source_lines = 0u64;
    let mut test_lines = 0u64;

    for file in snapshot.source_files() {
        let Some(text) = snapshot.read_text(&file.rel_path) else {
            continue;
        };
        let count = text.lines().count() as u64;
        if is_test_path(&file.rel_path) {
            test_lines += count;
        } else {
            source_lines += count;
            // Inline test modules count toward the test side.
            if text.contains("#[test]") || text.contains("#[tokio::test]") {
                let inline: u64 = text
                    .lines()
                    .filter(|l| l.contains("#[test]") || l.contains("#[tokio::test]"))
                    .count() as u64;
                // Rough credit: each inline test marker stands for a small body.
                test_lines += inline * 8;
            }
        }
    }

    if source_lines == 0 {
        // Tree is all tests or unreadable — nothing to rate.
        return Ok(Vec::new());
    }

    let ratio = test_lines as f64 / source_lines as f64;
    let hit = if test_lines == 0 {
        Some(Hit::new(
            Severity::Critical,
            1.0,
            format!("no tests found against {source_lines} source lines"),
        ))
    } else if ratio < 0.05 {
        Some(Hit::new(
            Severity::Critical,
            1.0,
            format!("test-to-source ratio {ratio:.2} is near zero"),
        ))
    } else if ratio < 0.15 {
        Some(Hit::new(
            Severity::High,
            0.9,
            format!("test-to-source ratio {ratio:.2} is low"),
        ))
    } else if ratio < 0.30 {
        Some(Hit::new(
            Severity::Medium,
            0.8,
            format!("test-to-source ratio {ratio:.2} is modest"),
        ))
    } else {
        None
    };

    Ok(hit.into_iter().collect())
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
    fn classifies_test_paths() {
        assert!(is_test_path("tests/integration.rs"));
        assert!(is_test_path("src/__tests__/app.test.ts"));
        assert!(is_test_path("pkg/test_utils.py"));
        assert!(!is_test_path("src/lib.rs"));
        assert!(!is_test_path("src/contest.rs"));
    }

    #[test]
    fn near_zero_ratio_is_critical() {
        let source = "line\n".repeat(500);
        let tests = "assert\n".repeat(8);
        let (_d, s) = snap(&[("src/lib.rs", &source), ("tests/t.rs", &tests)]);
        let hits = run(&s).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].severity, Severity::Critical);
        assert!(hits[0].message.contains("0.02"));
    }

    #[test]
    fn healthy_ratio_yields_no_findings() {
        let source = "line\n".repeat(100);
        let tests = "assert\n".repeat(40);
        let (_d, s) = snap(&[("src/lib.rs", &source), ("tests/t.rs", &tests)]);
        assert!(run(&s).unwrap().is_empty());
    }

    #[test]
    fn no_tests_at_all_is_critical() {
        let (_d, s) = snap(&[("src/lib.rs", "fn a() {}\nfn b() {}\n")]);
        let hits = run(&s).unwrap();
        assert_eq!(hits[0].severity, Severity::Critical);
        assert!(hits[0].message.contains("no tests"));
    }
}
