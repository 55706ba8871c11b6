//! deployment-check — committed network addresses and program identifiers,
//! cross-referenced against a denylist of obvious placeholders.

use once_cell::sync::Lazy;
use regex::Regex;

use super::snapshot::RepoSnapshot;
use super::{Detector, DetectorCategory, Evidence, Hit, Severity};

/// Base58 strings in the program-id length band.
static PROGRAM_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[1-9A-HJ-NP-Za-km-z]{32,44}").expect("program id regex"));

static DECLARE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"declare_id!\s*\(\s*"([^"]*)"\s*\)"#).expect("declare_id regex"));

pub fn detector() -> Detector {
    Detector {
        name: "deployment-check",
        category: DetectorCategory::DeploymentCheck,
        weight: 1.0,
        applies,
        run,
    }
}

fn applies(snapshot: &RepoSnapshot) -> bool {
    if snapshot.has_file_named("Anchor.toml") || snapshot.files.iter().any(|f| {
        f.rel_path.starts_with("migrations/") || f.rel_path.starts_with("deploy/")
    }) {
        return true;
    }
    // Any source declaring a program id makes deployment reviewable.
    snapshot.source_files().any(|f| {
        snapshot
            .read_text(&f.rel_path)
            .is_some_and(|t| t.contains("declare_id!"))
    })
}

/// Obvious placeholder identifiers: repeated single character, literal
/// filler words, or the well-known all-ones id.
fn is_placeholder_id(id: &str) -> bool {
    if id.is_empty() {
        return true;
    }
    let lower = id.to_lowercase();
    if lower.contains("todo") || lower.contains("replace") || lower.contains("xxx") {
        return true;
    }
    let first = id.chars().next().unwrap_or('1');
    id.chars().all(|c| c == first)
}

fn run(snapshot: &RepoSnapshot) -> anyhow::Result<Vec<Hit>> {
    let mut hits = Vec::new();
    let mut declared_ids = 0usize;

    let candidate_paths: Vec<String> = snapshot
        .files
        .iter()
        .filter(|f| {
            f.language().is_some()
                || f.file_name() == "Anchor.toml"
                || f.extension().is_some_and(|e| e.eq_ignore_ascii_case("toml"))
        })
        .map(|f| f.rel_path.clone())
        .collect();

    for path in candidate_paths {
        let Some(text) = snapshot.read_text(&path) else {
            continue;
        };
        for (lineno, line) in text.lines().enumerate() {
            for capture in DECLARE_ID_RE.captures_iter(line) {
                declared_ids += 1;
                let id = capture.get(1).map(|m| m.as_str()).unwrap_or("");
                if is_placeholder_id(id) {
                    hits.push(
                        Hit::new(
                            Severity::High,
                            0.8,
                            "declared program id is an obvious placeholder",
                        )
                        .with_evidence(Evidence::line(&path, lineno as u32 + 1, line)),
                    );
                } else if !PROGRAM_ID_RE.is_match(id) {
                    hits.push(
                        Hit::new(
                            Severity::Medium,
                            0.6,
                            "declared program id is not a plausible identifier",
                        )
                        .with_evidence(Evidence::line(&path, lineno as u32 + 1, line)),
                    );
                }
            }
        }
    }

    if declared_ids == 0 && snapshot.has_file_named("Anchor.toml") {
        hits.push(Hit::new(
            Severity::Medium,
            0.7,
            "platform manifest present but no program id is declared anywhere",
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
    fn placeholder_denylist() {
        assert!(is_placeholder_id("11111111111111111111111111111111"));
        assert!(is_placeholder_id("TODO_REPLACE_ME"));
        assert!(is_placeholder_id(""));
        assert!(!is_placeholder_id("Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS"));
    }

    #[test]
    fn flags_all_ones_program_id() {
        let (_d, s) = snap(&[(
            "programs/vault/src/lib.rs",
            "declare_id!(\"11111111111111111111111111111111\");\n",
        )]);
        assert!(applies(&s));
        let hits = run(&s).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].severity, Severity::High);
    }

    #[test]
    fn real_program_id_passes() {
        let (_d, s) = snap(&[(
            "programs/vault/src/lib.rs",
            "declare_id!(\"Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS\");\n",
        )]);
        assert!(run(&s).unwrap().is_empty());
    }

    #[test]
    fn anchor_manifest_without_id_is_flagged() {
        let (_d, s) = snap(&[("Anchor.toml", "[programs.localnet]\n")]);
        assert!(applies(&s));
        let hits = run(&s).unwrap();
        assert!(hits.iter().any(|h| h.message.contains("no program id")));
    }
}
