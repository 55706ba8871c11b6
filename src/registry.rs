//! Source registry — the list of tracked repositories and their canonical
//! remote locations.
//!
//! The registry file is one remote location per line; blank lines and `#`
//! comments are ignored. Malformed entries are configuration errors and fail
//! the whole load — a partially-parsed registry would silently understate the
//! corpus size downstream.

use anyhow::{bail, Result};
use std::path::Path;

/// One registered repository: a stable id derived from the normalized remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Normalized remote, e.g. `github.com/acme/zk-vault`. This is the
    /// repository's identity everywhere in the pipeline.
    pub id: String,
    /// The remote location exactly as registered, used for fetches.
    pub remote: String,
}

impl RegistryEntry {
    /// Filesystem-safe directory name for this repository's mirror.
    pub fn dir_name(&self) -> String {
        repo_dir_name(&self.id)
    }
}

/// Filesystem-safe directory name for a repo id.
pub fn repo_dir_name(id: &str) -> String {
    id.replace(['/', ':'], "__")
}

/// Parse a registry file into entries with normalized ids.
pub fn load_registry(path: &Path) -> Result<Vec<RegistryEntry>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read registry {}: {e}", path.display()))?;
    parse_registry(&content)
}

/// Parse registry content. Duplicate ids collapse to the first occurrence.
pub fn parse_registry(content: &str) -> Result<Vec<RegistryEntry>> {
    let mut entries: Vec<RegistryEntry> = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let id = normalize_remote(trimmed)
            .map_err(|e| anyhow::anyhow!("registry line {}: {e}", lineno + 1))?;
        if entries.iter().any(|r| r.id == id) {
            continue;
        }
        entries.push(RegistryEntry {
            id,
            remote: trimmed.to_string(),
        });
    }
    Ok(entries)
}

/// Normalize a remote location into a stable repo id.
///
/// Strips the scheme, a `git@host:` prefix, a trailing `.git`, and trailing
/// slashes, lowercasing the host segment. Local filesystem paths (used for
/// mirrors of already-downloaded corpora and in tests) are kept verbatim
/// minus the leading slashes.
pub fn normalize_remote(remote: &str) -> Result<String> {
    if remote.chars().any(char::is_whitespace) {
        bail!("remote location contains whitespace: {remote:?}");
    }

    let mut rest = remote;
    for scheme in ["https://", "http://", "ssh://", "git://", "file://"] {
        if let Some(stripped) = rest.strip_prefix(scheme) {
            rest = stripped;
            break;
        }
    }
    // git@github.com:acme/repo → github.com/acme/repo
    if let Some(stripped) = rest.strip_prefix("git@") {
        rest = stripped;
    }
    let rest = rest.replacen(':', "/", 1);
    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".git").unwrap_or(rest);

    let trimmed = rest.trim_start_matches('/');
    if trimmed.is_empty() {
        bail!("remote location is empty after normalization: {remote:?}");
    }

    // Lowercase only the host segment — repo paths are case-sensitive.
    let id = match trimmed.split_once('/') {
        Some((host, path)) if host.contains('.') => {
            format!("{}/{}", host.to_lowercase(), path)
        }
        _ => trimmed.to_string(),
    };
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_common_remote_forms() {
        for remote in [
            "https://github.com/Acme/zk-vault",
            "https://github.com/Acme/zk-vault.git",
            "git@github.com:Acme/zk-vault.git",
            "https://GitHub.com/Acme/zk-vault/",
        ] {
            assert_eq!(
                normalize_remote(remote).unwrap(),
                "github.com/Acme/zk-vault",
                "failed for {remote}"
            );
        }
    }

    #[test]
    fn keeps_local_paths() {
        assert_eq!(
            normalize_remote("/tmp/fixtures/repo-a").unwrap(),
            "tmp/fixtures/repo-a"
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(normalize_remote("not a url").is_err());
        assert!(normalize_remote("https://").is_err());
    }

    #[test]
    fn parses_comments_blanks_and_duplicates() {
        let content = "\n# corpus batch 1\nhttps://github.com/a/one\n\nhttps://github.com/a/one.git\nhttps://github.com/b/two\n";
        let entries = parse_registry(content).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "github.com/a/one");
        assert_eq!(entries[1].id, "github.com/b/two");
    }

    #[test]
    fn malformed_entry_fails_the_whole_load() {
        let content = "https://github.com/a/one\nbad entry here\n";
        let err = parse_registry(content).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn dir_name_is_filesystem_safe() {
        let entry = RegistryEntry {
            id: "github.com/a/one".into(),
            remote: "https://github.com/a/one".into(),
        };
        assert_eq!(entry.dir_name(), "github.com__a__one");
    }
}
