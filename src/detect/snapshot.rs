//! Repository snapshot — one deterministic filesystem walk per analysis run,
//! shared by every detector.
//!
//! Detectors are pure over this snapshot: the same mirror tree always yields
//! the same file list (sorted), and file reads are bounded so a pathological
//! repository cannot balloon detector memory.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::index::SizeMetrics;

/// Directories never descended into. Hidden directories are skipped too,
/// except `.github` (CI workflow presence is a completeness signal).
const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "vendor",
    "venv",
    "__pycache__",
];

const MAX_DEPTH: usize = 12;

/// Extension → language tag for line metrics and source-file predicates.
const LANGUAGE_BY_EXTENSION: &[(&str, &str)] = &[
    ("rs", "rust"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("py", "python"),
    ("go", "go"),
    ("sol", "solidity"),
    ("circom", "circom"),
    ("nr", "noir"),
    ("cairo", "cairo"),
    ("move", "move"),
    ("java", "java"),
    ("c", "c"),
    ("cpp", "cpp"),
];

/// Manifest files that mark a tree as a recognized project.
pub const MANIFEST_FILES: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "go.mod",
    "pyproject.toml",
    "requirements.txt",
    "Nargo.toml",
    "Anchor.toml",
    "foundry.toml",
    "Move.toml",
    "hardhat.config.js",
    "hardhat.config.ts",
];

#[derive(Debug, Clone)]
pub struct FileMeta {
    /// Path relative to the mirror root, `/`-separated.
    pub rel_path: String,
    pub size_bytes: u64,
}

impl FileMeta {
    pub fn file_name(&self) -> &str {
        self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path)
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        name.rsplit_once('.').map(|(_, ext)| ext)
    }

    pub fn language(&self) -> Option<&'static str> {
        let ext = self.extension()?.to_lowercase();
        LANGUAGE_BY_EXTENSION
            .iter()
            .find(|(e, _)| *e == ext.as_str())
            .map(|(_, lang)| *lang)
    }
}

/// A deterministic view of one mirror tree at one revision.
pub struct RepoSnapshot {
    root: PathBuf,
    pub revision: String,
    /// All files under the root, sorted by relative path.
    pub files: Vec<FileMeta>,
    max_file_bytes: u64,
}

impl RepoSnapshot {
    /// Walk `root` and collect file metadata. Blocking; call under
    /// `spawn_blocking` from async contexts.
    pub fn collect(root: &Path, revision: &str, max_file_bytes: u64) -> Self {
        let mut files = Vec::new();
        walk(root, root, 0, &mut files);
        files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        Self {
            root: root.to_path_buf(),
            revision: revision.to_string(),
            files,
            max_file_bytes,
        }
    }

    /// Read a file as text, bounded by the configured byte cap. Returns
    /// `None` for oversized or non-UTF-8 (binary) content — detectors treat
    /// both as "not analyzable text", never as an error.
    pub fn read_text(&self, rel_path: &str) -> Option<String> {
        let meta = self.files.iter().find(|f| f.rel_path == rel_path)?;
        if meta.size_bytes > self.max_file_bytes {
            return None;
        }
        let bytes = std::fs::read(self.root.join(rel_path)).ok()?;
        String::from_utf8(bytes).ok()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files whose name matches exactly, at any depth.
    pub fn files_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FileMeta> + 'a {
        self.files.iter().filter(move |f| f.file_name() == name)
    }

    pub fn has_file_named(&self, name: &str) -> bool {
        self.files_named(name).next().is_some()
    }

    /// Files in a recognized programming language.
    pub fn source_files(&self) -> impl Iterator<Item = &FileMeta> {
        self.files.iter().filter(|f| f.language().is_some())
    }

    /// Manifest files present anywhere in the tree.
    pub fn manifests(&self) -> Vec<&FileMeta> {
        self.files
            .iter()
            .filter(|f| MANIFEST_FILES.contains(&f.file_name()))
            .collect()
    }

    /// Whether the tree looks like a software project at all: a known
    /// manifest or at least one recognized source file. Detectors gate their
    /// applicability on this so an unrecognizable tree is *unscorable*, not
    /// scored-by-default.
    pub fn is_recognized_project(&self) -> bool {
        !self.manifests().is_empty() || self.source_files().next().is_some()
    }

    /// Stable fingerprint of the tree shape (sorted paths and sizes).
    /// Recorded alongside findings so an audit can tell whether two runs
    /// actually saw the same snapshot.
    pub fn tree_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for file in &self.files {
            hasher.update(file.rel_path.as_bytes());
            hasher.update(file.size_bytes.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// File count, byte size, and per-language line counts for the index.
    pub fn size_metrics(&self) -> SizeMetrics {
        let mut lines_by_language: BTreeMap<String, u64> = BTreeMap::new();
        for file in &self.files {
            if let Some(lang) = file.language() {
                if let Some(text) = self.read_text(&file.rel_path) {
                    *lines_by_language.entry(lang.to_string()).or_default() +=
                        text.lines().count() as u64;
                }
            }
        }
        SizeMetrics {
            file_count: self.files.len() as u64,
            total_bytes: self.files.iter().map(|f| f.size_bytes).sum(),
            lines_by_language,
        }
    }
}

fn walk(dir: &Path, root: &Path, depth: usize, out: &mut Vec<FileMeta>) {
    if depth > MAX_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
            continue;
        };
        if path.is_dir() {
            if name.starts_with('.') && name != ".github" {
                continue;
            }
            if SKIPPED_DIRS.contains(&name.as_str()) {
                continue;
            }
            walk(&path, root, depth + 1, out);
        } else if path.is_file() {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            out.push(FileMeta {
                rel_path: rel,
                size_bytes: size,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(files: &[(&str, &str)]) -> (tempfile::TempDir, RepoSnapshot) {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        let snapshot = RepoSnapshot::collect(dir.path(), "rev0", 1_048_576);
        (dir, snapshot)
    }

    #[test]
    fn walk_is_sorted_and_skips_noise_dirs() {
        let (_dir, snapshot) = fixture(&[
            ("src/main.rs", "fn main() {}"),
            ("node_modules/x/index.js", "junk"),
            (".git/config", "junk"),
            (".github/workflows/ci.yml", "on: push"),
            ("README.md", "# hi"),
        ]);
        let paths: Vec<_> = snapshot.files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(
            paths,
            vec![".github/workflows/ci.yml", "README.md", "src/main.rs"]
        );
    }

    #[test]
    fn collect_is_deterministic() {
        let (_dir, a) = fixture(&[("b.rs", "x"), ("a.rs", "y"), ("c/d.rs", "z")]);
        let b = RepoSnapshot::collect(a.root(), "rev0", 1_048_576);
        let pa: Vec<_> = a.files.iter().map(|f| f.rel_path.clone()).collect();
        let pb: Vec<_> = b.files.iter().map(|f| f.rel_path.clone()).collect();
        assert_eq!(pa, pb);
    }

    #[test]
    fn read_text_rejects_binary_and_oversized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blob.rs"), [0u8, 159, 146, 150]).unwrap();
        std::fs::write(dir.path().join("big.rs"), "x".repeat(64)).unwrap();
        let snapshot = RepoSnapshot::collect(dir.path(), "rev0", 16);
        assert!(snapshot.read_text("blob.rs").is_none(), "binary must read as None");
        assert!(snapshot.read_text("big.rs").is_none(), "oversized must read as None");
    }

    #[test]
    fn recognizes_projects_by_manifest_or_source() {
        let (_d1, with_manifest) = fixture(&[("Cargo.toml", "[package]")]);
        assert!(with_manifest.is_recognized_project());

        let (_d2, with_source) = fixture(&[("tool.py", "print(1)")]);
        assert!(with_source.is_recognized_project());

        let (_d3, neither) = fixture(&[("notes.txt", "hello"), ("data.csv", "a,b")]);
        assert!(!neither.is_recognized_project());
    }

    #[test]
    fn size_metrics_count_lines_per_language() {
        let (_dir, snapshot) = fixture(&[
            ("src/lib.rs", "a\nb\nc\n"),
            ("web/app.ts", "x\ny\n"),
            ("README.md", "doc\n"),
        ]);
        let metrics = snapshot.size_metrics();
        assert_eq!(metrics.file_count, 3);
        assert_eq!(metrics.lines_by_language.get("rust"), Some(&3));
        assert_eq!(metrics.lines_by_language.get("typescript"), Some(&2));
        assert!(!metrics.lines_by_language.contains_key("markdown"));
    }
}
