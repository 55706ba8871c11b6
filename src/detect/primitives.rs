//! primitive-verification — textual search for known-weak cryptographic
//! patterns.
//!
//! Explicitly heuristic, not semantic: every finding carries confidence
//! below 1.0. A literal match can always be a test vector or dead code.

use once_cell::sync::Lazy;
use regex::Regex;

use super::snapshot::RepoSnapshot;
use super::{Detector, DetectorCategory, Evidence, Hit, Severity};

struct WeakPattern {
    regex: Regex,
    severity: Severity,
    confidence: f64,
    message: &'static str,
}

static WEAK_PATTERNS: Lazy<Vec<WeakPattern>> = Lazy::new(|| {
    vec![
        WeakPattern {
            regex: Regex::new(r"(?i)(fn|function|def)\s+\w*verify\w*[^\n]*\{?\s*(return\s+)?true")
                .expect("always-true regex"),
            severity: Severity::High,
            confidence: 0.6,
            message: "verification function appears to return a constant true",
        },
        WeakPattern {
            regex: Regex::new(r"\[0u8;\s*(32|64)\]|\b0x0{32,}\b").expect("zero-key regex"),
            severity: Severity::Medium,
            confidence: 0.5,
            message: "fixed all-zero key or seed literal",
        },
        WeakPattern {
            regex: Regex::new(r#"(?i)(sha256|keccak|hash)\s*\([^)]*\)\s*==\s*""#)
                .expect("hash-eq regex"),
            severity: Severity::Medium,
            confidence: 0.55,
            message: "hash compared against a string literal",
        },
        WeakPattern {
            regex: Regex::new(r"(?i)(dummy|fake|hardcoded)\s*_?\s*(proof|witness|signature)")
                .expect("dummy-proof regex"),
            severity: Severity::High,
            confidence: 0.7,
            message: "dummy or hardcoded proof material",
        },
    ]
});

pub fn detector() -> Detector {
    Detector {
        name: "primitive-verification",
        category: DetectorCategory::PrimitiveVerification,
        weight: 1.0,
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
        for (lineno, line) in text.lines().enumerate() {
            for pattern in WEAK_PATTERNS.iter() {
                if pattern.regex.is_match(line) {
                    hits.push(
                        Hit::new(pattern.severity, pattern.confidence, pattern.message)
                            .with_evidence(Evidence::line(&path, lineno as u32 + 1, line)),
                    );
                }
            }
        }
    }

    Ok(hits)
}
