//! dependency-scan — parse dependency manifests for known proof-system and
//! platform libraries.
//!
//! Purely textual: manifest lines are matched against a known-library table,
//! never resolved. A project that claims zero-knowledge functionality but
//! pulls in no recognizable proof-system dependency is the single strongest
//! "claims ZK, actually mocked" signal this corpus surfaces.

use super::snapshot::RepoSnapshot;
use super::{Detector, DetectorCategory, Evidence, Hit, Severity};

/// Library names that indicate a real proof system is linked in.
const PROOF_SYSTEM_LIBS: &[&str] = &[
    "ark-groth16",
    "ark-snark",
    "ark-circom",
    "bellman",
    "halo2",
    "plonky2",
    "snarkjs",
    "circomlib",
    "noir",
    "nargo",
    "arcium",
    "groth16-solana",
    "light-protocol",
    "risc0",
    "sp1",
    "zokrates",
];

/// Platform libraries (Solana and friends) noted as positive evidence.
const PLATFORM_LIBS: &[&str] = &[
    "anchor-lang",
    "anchor-client",
    "solana-program",
    "solana-sdk",
    "@solana/web3.js",
    "@coral-xyz/anchor",
];

pub fn detector() -> Detector {
    Detector {
        name: "dependency-scan",
        category: DetectorCategory::DependencyScan,
        weight: 1.0,
        applies,
        run,
    }
}

fn applies(snapshot: &RepoSnapshot) -> bool {
    !snapshot.manifests().is_empty()
}

fn run(snapshot: &RepoSnapshot) -> anyhow::Result<Vec<Hit>> {
    let mut hits = Vec::new();
    let mut proof_libs_found: Vec<(String, Evidence)> = Vec::new();
    let mut platform_libs_found = 0usize;

    for manifest in snapshot.manifests() {
        let Some(text) = snapshot.read_text(&manifest.rel_path) else {
            // A manifest that cannot be read as text is itself suspicious.
            hits.push(Hit::new(
                Severity::Low,
                0.6,
                format!("manifest {} is not readable text", manifest.rel_path),
            ));
            continue;
        };
        for (lineno, line) in text.lines().enumerate() {
            let lower = line.to_lowercase();
            for lib in PROOF_SYSTEM_LIBS {
                if lower.contains(lib) {
                    proof_libs_found.push((
                        lib.to_string(),
                        Evidence::line(&manifest.rel_path, lineno as u32 + 1, line),
                    ));
                }
            }
            for lib in PLATFORM_LIBS {
                if lower.contains(&lib.to_lowercase()) {
                    platform_libs_found += 1;
                }
            }
        }
    }

    if let Some((lib, evidence)) = proof_libs_found.into_iter().next() {
        hits.push(
            Hit::new(
                Severity::Info,
                1.0,
                format!("proof-system dependency present: {lib}"),
            )
            .with_evidence(evidence),
        );
    } else {
        // Heuristic, not proof: the project may vendor a prover we don't
        // recognize, hence confidence below 1.0.
        hits.push(Hit::new(
            Severity::Medium,
            0.9,
            "no recognizable proof-system dependency in any manifest",
        ));
    }

    if platform_libs_found == 0 {
        hits.push(Hit::new(
            Severity::Low,
            0.7,
            "no platform SDK dependency found in any manifest",
        ));
    }

    Ok(hits)
}
