//! demo-check — is there any runnable demo entry point for judges?

use once_cell::sync::Lazy;
use regex::Regex;

use super::snapshot::RepoSnapshot;
use super::{Detector, DetectorCategory, Hit, Severity};

static VIDEO_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://(www\.)?(youtube\.com|youtu\.be|loom\.com|vimeo\.com)/")
        .expect("video link regex")
});

pub fn detector() -> Detector {
    Detector {
        name: "demo-check",
        category: DetectorCategory::DemoCheck,
        weight: 1.0,
        applies,
        run,
    }
}

fn applies(snapshot: &RepoSnapshot) -> bool {
    snapshot.is_recognized_project()
}

fn run(snapshot: &RepoSnapshot) -> anyhow::Result<Vec<Hit>> {
    let has_compose = snapshot.has_file_named("docker-compose.yml")
        || snapshot.has_file_named("docker-compose.yaml")
        || snapshot.has_file_named("compose.yaml");
    let has_demo_dir = snapshot
        .files
        .iter()
        .any(|f| f.rel_path.starts_with("demo/") || f.rel_path.starts_with("demos/"));
    let has_demo_script = snapshot
        .files
        .iter()
        .any(|f| f.file_name().to_lowercase().starts_with("demo"));
    let has_video_link = snapshot
        .files_named("README.md")
        .filter_map(|f| snapshot.read_text(&f.rel_path))
        .any(|t| VIDEO_LINK_RE.is_match(&t));
    let has_dev_script = snapshot.files_named("package.json").any(|f| {
        snapshot
            .read_text(&f.rel_path)
            .is_some_and(|t| t.contains("\"dev\"") || t.contains("\"start\""))
    });

    if has_compose || has_demo_dir || has_demo_script || has_video_link || has_dev_script {
        return Ok(Vec::new());
    }

    Ok(vec![Hit::new(
        Severity::Medium,
        0.8,
        "no runnable demo entry point (compose file, demo script, dev server, or recorded demo)",
    )])
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
    fn compose_file_counts_as_demo() {
        let (_d, s) = snap(&[("Cargo.toml", "[package]"), ("docker-compose.yml", "services:")]);
        assert!(run(&s).unwrap().is_empty());
    }

    #[test]
    fn video_link_counts_as_demo() {
        let (_d, s) = snap(&[
            ("Cargo.toml", "[package]"),
            ("README.md", "Watch: https://youtu.be/abc123\n"),
        ]);
        assert!(run(&s).unwrap().is_empty());
    }

    #[test]
    fn no_demo_surface_is_flagged() {
        let (_d, s) = snap(&[("Cargo.toml", "[package]"), ("src/lib.rs", "fn a() {}")]);
        let hits = run(&s).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].severity, Severity::Medium);
    }
}
