//! circuit-review — sanity checks over circuit definition files.
//!
//! Applicability is strict: this detector is skipped entirely, not
//! run-and-passed, for repositories with no recognizable circuit files, so
//! its absence never counts against a non-circuit project.

use super::snapshot::{FileMeta, RepoSnapshot};
use super::{Detector, DetectorCategory, Evidence, Hit, Severity};

const CIRCUIT_EXTENSIONS: &[&str] = &["circom", "nr", "zok", "cairo"];

/// Tokens that indicate actual constraints are being laid down.
const CONSTRAINT_TOKENS: &[&str] = &["===", "<==", "==>", "assert", "constrain", "std::verify"];

const MIN_MEANINGFUL_LINES: usize = 5;

pub fn detector() -> Detector {
    Detector {
        name: "circuit-review",
        category: DetectorCategory::CircuitReview,
        weight: 1.2,
        applies,
        run,
    }
}

fn circuit_files(snapshot: &RepoSnapshot) -> Vec<&FileMeta> {
    snapshot
        .files
        .iter()
        .filter(|f| {
            f.extension()
                .is_some_and(|e| CIRCUIT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        })
        .collect()
}

fn applies(snapshot: &RepoSnapshot) -> bool {
    !circuit_files(snapshot).is_empty()
}

fn run(snapshot: &RepoSnapshot) -> anyhow::Result<Vec<Hit>> {
    let mut hits = Vec::new();

    for file in circuit_files(snapshot) {
        let Some(text) = snapshot.read_text(&file.rel_path) else {
            hits.push(Hit::new(
                Severity::Medium,
                0.6,
                format!("circuit file {} is not readable text", file.rel_path),
            ));
            continue;
        };

        let meaningful: Vec<(usize, &str)> = text
            .lines()
            .enumerate()
            .filter(|(_, l)| {
                let t = l.trim();
                !t.is_empty() && !t.starts_with("//") && !t.starts_with('#')
            })
            .collect();

        if meaningful.len() < MIN_MEANINGFUL_LINES {
            hits.push(
                Hit::new(
                    Severity::High,
                    0.8,
                    format!(
                        "circuit {} is trivially small ({} meaningful lines)",
                        file.rel_path,
                        meaningful.len()
                    ),
                )
                .with_evidence(Evidence::line(
                    &file.rel_path,
                    1,
                    meaningful.first().map(|(_, l)| *l).unwrap_or(""),
                )),
            );
            continue;
        }

        let has_constraints = meaningful
            .iter()
            .any(|(_, l)| CONSTRAINT_TOKENS.iter().any(|t| l.contains(t)));
        if !has_constraints {
            // Plenty of code but nothing that constrains a witness — the
            // circuit may compile yet prove nothing.
            hits.push(Hit::new(
                Severity::High,
                0.7,
                format!("circuit {} contains no recognizable constraints", file.rel_path),
            ));
        }
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
    fn skipped_without_circuit_files() {
        let (_d, s) = snap(&[("src/main.rs", "fn main() {}")]);
        assert!(!applies(&s));
    }

    #[test]
    fn trivial_circuit_is_flagged() {
        let (_d, s) = snap(&[("circuits/age.circom", "pragma circom 2.0.0;\n")]);
        let hits = run(&s).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].severity, Severity::High);
        assert!(hits[0].message.contains("trivially small"));
    }

    #[test]
    fn constraintless_circuit_is_flagged() {
        let body = "template Age() {\n signal input a;\n signal output b;\n var x = 1;\n var y = 2;\n b <-- a;\n}\n";
        let (_d, s) = snap(&[("circuits/age.circom", body)]);
        let hits = run(&s).unwrap();
        assert!(hits.iter().any(|h| h.message.contains("no recognizable constraints")));
    }

    #[test]
    fn constrained_circuit_passes() {
        let body = "template Age() {\n signal input a;\n signal output b;\n var min = 18;\n component c = GreaterThan(8);\n b <== c.out;\n}\n";
        let (_d, s) = snap(&[("circuits/age.circom", body)]);
        assert!(run(&s).unwrap().is_empty());
    }
}
