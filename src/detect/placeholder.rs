//! placeholder-grep — marker tokens near proof/verification code paths.
//!
//! Severity scales with proximity to a verification entry point, not mere
//! presence: a TODO inside `verify()` is a mocked proof; a TODO in a README
//! is housekeeping.

use once_cell::sync::Lazy;
use regex::Regex;

use super::snapshot::RepoSnapshot;
use super::{Detector, DetectorCategory, Evidence, Hit, Severity};

static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bTODO\b|\bFIXME\b|\bmock(ed)?\b|\bplaceholder\b|\bstub\b|not\s+implemented|unimplemented!|todo!")
        .expect("marker regex")
});

/// Lines that open a proof/verification entry point in any supported
/// language (`fn verify…`, `function prove…`, `def verify…`, `pub fn proof…`).
static VERIFY_ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(fn|function|def|func)\s+\w*(verify|prove|proof)\w*").expect("anchor regex")
});

/// Lines mentioning verification at all, for the looser proximity band.
static VERIFY_MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)verif|prove|proof").expect("mention regex"));

/// Marker further than this from any verification line is background noise.
const NEAR_LINES: usize = 10;

pub fn detector() -> Detector {
    Detector {
        name: "placeholder-grep",
        category: DetectorCategory::PlaceholderGrep,
        weight: 1.5,
        applies,
        run,
    }
}

fn applies(snapshot: &RepoSnapshot) -> bool {
    snapshot.source_files().next().is_some()
}

fn run(snapshot: &RepoSnapshot) -> anyhow::Result<Vec<Hit>> {
    let mut hits = Vec::new();

    let source_paths: Vec<String> = snapshot
        .source_files()
        .map(|f| f.rel_path.clone())
        .collect();

    for path in source_paths {
        let Some(text) = snapshot.read_text(&path) else {
            continue;
        };
        let lines: Vec<&str> = text.lines().collect();

        // Entry-point spans: from an anchor line to the next zero-indent
        // closer, approximated as the following `NEAR_LINES` lines. Cheap
        // and language-agnostic; confidence stays below 1.0 accordingly.
        let anchors: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| VERIFY_ANCHOR_RE.is_match(l))
            .map(|(i, _)| i)
            .collect();
        let mentions: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| VERIFY_MENTION_RE.is_match(l))
            .map(|(i, _)| i)
            .collect();

        for (i, line) in lines.iter().enumerate() {
            if !MARKER_RE.is_match(line) {
                continue;
            }
            let in_entry_point = anchors
                .iter()
                .any(|&a| i >= a && i <= a + NEAR_LINES);
            let near_mention = mentions
                .iter()
                .any(|&m| i.abs_diff(m) <= NEAR_LINES);

            let (severity, confidence, context) = if in_entry_point {
                (Severity::Critical, 0.85, "inside a verification entry point")
            } else if near_mention {
                (Severity::High, 0.7, "near verification code")
            } else {
                (Severity::Low, 0.9, "in source")
            };

            hits.push(
                Hit::new(
                    severity,
                    confidence,
                    format!("placeholder marker {context}"),
                )
                .with_evidence(Evidence::line(&path, i as u32 + 1, line)),
            );
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
    fn marker_inside_verify_is_critical() {
        let source = "pub fn verify_proof(p: &Proof) -> bool {\n    // TODO implement real check\n    true\n}\n";
        let (_d, s) = snap(&[("src/verify.rs", source)]);
        let hits = run(&s).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].severity, Severity::Critical);
        assert!(hits[0].confidence < 1.0, "heuristic hits are never certain");
        assert_eq!(hits[0].evidence.as_ref().unwrap().line_start, 2);
    }

    #[test]
    fn marker_far_from_verification_is_low() {
        let mut source = String::from("fn helper() {}\n");
        source.push_str(&"// routine line\n".repeat(30));
        source.push_str("// TODO tidy up logging\n");
        let (_d, s) = snap(&[("src/util.rs", &source)]);
        let hits = run(&s).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].severity, Severity::Low);
    }

    #[test]
    fn markers_in_docs_are_ignored() {
        let (_d, s) = snap(&[
            ("README.md", "TODO: write docs\n"),
            ("src/lib.rs", "pub fn add(a: u32, b: u32) -> u32 { a + b }\n"),
        ]);
        let hits = run(&s).unwrap();
        assert!(hits.is_empty(), "markdown is not a source path");
    }
}
