//! Integration tests for the detector framework: isolation across repos,
//! applicability vs ran-and-found-nothing, and end-to-end determinism over
//! the built-in registry.

use std::path::Path;

use reposcout::detect::{self, snapshot::RepoSnapshot, DetectorCategory, Severity};
use reposcout::scoring::{self, methodology::Methodology};

fn snapshot(dir: &Path, files: &[(&str, &str)]) -> RepoSnapshot {
    for (path, content) in files {
        let full = dir.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }
    RepoSnapshot::collect(dir, "rev0", 1_048_576)
}

fn snapshot_with_binary(dir: &Path, files: &[(&str, &str)], binary: &str) -> RepoSnapshot {
    for (path, content) in files {
        let full = dir.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }
    // Invalid UTF-8 where a text file is expected.
    std::fs::write(dir.join(binary), [0u8, 0x9f, 0x92, 0x96, 0xff]).unwrap();
    RepoSnapshot::collect(dir, "rev0", 1_048_576)
}

#[test]
fn malformed_repo_degrades_one_detector_without_touching_others() {
    let registry = detect::builtin_registry();

    // Repository with a binary blob where Cargo.toml is expected.
    let dir_bad = tempfile::tempdir().unwrap();
    let bad = snapshot_with_binary(
        dir_bad.path(),
        &[("src/lib.rs", "pub fn add(a: u32, b: u32) -> u32 { a + b }\n")],
        "Cargo.toml",
    );
    // A healthy sibling repository.
    let dir_ok = tempfile::tempdir().unwrap();
    let ok = snapshot(
        dir_ok.path(),
        &[
            ("Cargo.toml", "[dependencies]\nark-groth16 = \"0.4\"\n"),
            ("src/lib.rs", "pub fn add(a: u32, b: u32) -> u32 { a + b }\n"),
        ],
    );

    let bad_reports = detect::run_all(&registry, &bad, "repo-bad");
    let ok_reports = detect::run_all(&registry, &ok, "repo-ok");

    // The dependency scanner on the malformed repo degrades gracefully.
    let dep_bad = bad_reports
        .iter()
        .find(|r| r.category == DetectorCategory::DependencyScan)
        .unwrap();
    assert!(!dep_bad.skipped);
    assert!(
        dep_bad
            .findings
            .iter()
            .any(|f| f.message.contains("not readable")),
        "unreadable manifest must surface as a finding, not a crash"
    );

    // Sibling detectors on the same repo still ran normally.
    let cov_bad = bad_reports
        .iter()
        .find(|r| r.category == DetectorCategory::TestCoverage)
        .unwrap();
    assert!(!cov_bad.skipped);
    assert!(cov_bad.findings.iter().all(|f| f.severity != Severity::Info));

    // And the healthy repository is completely unaffected.
    let dep_ok = ok_reports
        .iter()
        .find(|r| r.category == DetectorCategory::DependencyScan)
        .unwrap();
    assert!(dep_ok
        .findings
        .iter()
        .any(|f| f.message.contains("ark-groth16")));
}

#[test]
fn circuit_inapplicability_never_penalizes_zk_dimension() {
    let registry = detect::builtin_registry();
    let methodology = Methodology::default();

    // Same tree twice, once with a broken circuit file added.
    let base: Vec<(&str, &str)> = vec![
        ("Cargo.toml", "[dependencies]\nark-groth16 = \"0.4\"\nanchor-lang = \"0.30\"\n"),
        ("src/lib.rs", "pub fn prove(x: u64) -> u64 { x * 2 }\n"),
        ("tests/prove.rs", "#[test]\nfn doubles() { assert_eq!(reposcout_fixture(), 4); }\nfn reposcout_fixture() -> u64 { 4 }\n"),
    ];

    let dir_no_circuit = tempfile::tempdir().unwrap();
    let no_circuit = snapshot(dir_no_circuit.path(), &base);

    let dir_bad_circuit = tempfile::tempdir().unwrap();
    let mut with_bad = base.clone();
    with_bad.push(("circuits/empty.circom", "pragma circom 2.0.0;\n"));
    let bad_circuit = snapshot(dir_bad_circuit.path(), &with_bad);

    let reports_none = detect::run_all(&registry, &no_circuit, "repo-none");
    let reports_bad = detect::run_all(&registry, &bad_circuit, "repo-bad");

    let circuit_none = reports_none
        .iter()
        .find(|r| r.category == DetectorCategory::CircuitReview)
        .unwrap();
    assert!(circuit_none.skipped, "no circuit files → skipped, not run-and-pass");

    let score_none = scoring::score(&methodology, "repo-none", "rev0", &reports_none).unwrap();
    let score_bad = scoring::score(&methodology, "repo-bad", "rev0", &reports_bad).unwrap();

    assert!(
        score_none.dimension_scores["zk_implementation"]
            > score_bad.dimension_scores["zk_implementation"],
        "a present-but-failing circuit must score worse than an absent one"
    );
}

#[test]
fn builtin_registry_is_deterministic_over_a_rich_tree() {
    let registry = detect::builtin_registry();
    let dir = tempfile::tempdir().unwrap();
    let snap = snapshot(
        dir.path(),
        &[
            ("Cargo.toml", "[dependencies]\nserde = \"1\"\n"),
            ("Anchor.toml", "[programs.localnet]\n"),
            ("README.md", "# demo\nTODO describe\n"),
            (
                "programs/vault/src/lib.rs",
                "declare_id!(\"11111111111111111111111111111111\");\npub fn verify(sig: &[u8]) -> bool { true } // mock\n",
            ),
            ("circuits/age.nr", "fn main(x: Field) {\n    assert(x != 0);\n    let y = x;\n    let z = y;\n    let w = z;\n}\n"),
        ],
    );

    let runs: Vec<String> = (0..3)
        .map(|_| serde_json::to_string(&detect::run_all(&registry, &snap, "repo-x")).unwrap())
        .collect();
    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[1], runs[2]);
}
