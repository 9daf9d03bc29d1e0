//! Working-tree traversal and path normalization shared by `add` and by
//! tree flattening during restore.

use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::errors::AvcError;

/// Directories that are never staged or restored into, regardless of
/// user-configured exclusions.
const RESERVED_DIRS: [&str; 2] = [".avc", ".git"];

pub struct Scanner {
    work_dir: PathBuf,
    excludes: Vec<String>,
}

impl Scanner {
    pub fn new(work_dir: PathBuf, excludes: Vec<String>) -> Self {
        Scanner { work_dir, excludes }
    }

    /// Whether `path` (repo-relative) should be skipped: reserved metadata
    /// directories, or a substring match against the configured
    /// exclusion list (spec's "ignore-file semantics beyond substring
    /// matching" non-goal — no `.gitignore`-style glob engine).
    pub fn is_excluded(&self, path: &str) -> bool {
        RESERVED_DIRS
            .iter()
            .any(|reserved| path == *reserved || path.starts_with(&format!("{reserved}/")))
            || self.excludes.iter().any(|pattern| path.contains(pattern.as_str()))
    }

    /// Recursively walk `root` (repo-relative subpath, `""` for the whole
    /// tree) and return every non-excluded regular file's repo-relative
    /// path, normalized. When `track_empty_dirs` is set, a directory left
    /// with zero entries after exclusions is also returned, as its
    /// repo-relative path with a trailing `/` marker.
    pub fn walk(&self, root: &str, track_empty_dirs: bool) -> Result<Vec<String>, AvcError> {
        let mut out = Vec::new();
        self.walk_into(root, &mut out, track_empty_dirs)?;
        Ok(out)
    }

    fn walk_into(&self, rel: &str, out: &mut Vec<String>, track_empty_dirs: bool) -> Result<(), AvcError> {
        let abs = self.work_dir.join(rel);
        let read_dir = match std::fs::read_dir(&abs) {
            Ok(rd) => rd,
            Err(_) if rel.is_empty() => return Ok(()),
            Err(e) => return Err(AvcError::Io(e)),
        };
        let mut remaining = 0usize;
        for entry in read_dir {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let child_rel = if rel.is_empty() {
                name.to_string()
            } else {
                format!("{rel}/{name}")
            };
            if self.is_excluded(&child_rel) {
                warn!(path = %child_rel, "skipping excluded path");
                continue;
            }
            remaining += 1;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.walk_into(&child_rel, out, track_empty_dirs)?;
            } else if file_type.is_file() || file_type.is_symlink() {
                out.push(child_rel);
            }
        }
        if track_empty_dirs && remaining == 0 && !rel.is_empty() {
            out.push(format!("{rel}/"));
        }
        Ok(())
    }
}

/// Normalize a user- or tree-supplied path to a repo-relative, `/`-separated
/// form, rejecting anything that escapes the repository root or names a
/// reserved metadata directory.
pub fn normalize_path(input: &str) -> Result<String, AvcError> {
    let path = Path::new(input);
    if path.is_absolute() {
        return Err(AvcError::PathInvalid(input.to_string()));
    }

    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => return Err(AvcError::PathInvalid(input.to_string())),
            Component::RootDir | Component::Prefix(_) => {
                return Err(AvcError::PathInvalid(input.to_string()))
            }
        }
    }
    if parts.is_empty() {
        return Err(AvcError::PathInvalid(input.to_string()));
    }
    if RESERVED_DIRS.contains(&parts[0].as_str()) {
        return Err(AvcError::PathInvalid(input.to_string()));
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_absolute_paths() {
        assert!(normalize_path("/etc/passwd").is_err());
    }

    #[test]
    fn rejects_parent_escaping_paths() {
        assert!(normalize_path("../outside").is_err());
    }

    #[test]
    fn rejects_reserved_metadata_prefix() {
        assert!(normalize_path(".avc/config").is_err());
        assert!(normalize_path(".git/HEAD").is_err());
    }

    #[test]
    fn collapses_current_dir_components() {
        assert_eq!(normalize_path("./src/./lib.rs").unwrap(), "src/lib.rs");
    }

    #[test]
    fn walk_skips_reserved_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".avc")).unwrap();
        std::fs::write(dir.path().join(".avc/index"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "fn main() {}").unwrap();

        let scanner = Scanner::new(dir.path().to_path_buf(), vec![]);
        let files = scanner.walk("", false).unwrap();
        assert_eq!(files, vec!["src/lib.rs".to_string()]);
    }

    #[test]
    fn walk_emits_empty_dir_markers_only_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "fn main() {}").unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();

        let scanner = Scanner::new(dir.path().to_path_buf(), vec![]);
        assert_eq!(scanner.walk("", false).unwrap(), vec!["src/lib.rs".to_string()]);

        let mut with_markers = scanner.walk("", true).unwrap();
        with_markers.sort();
        assert_eq!(with_markers, vec!["empty/".to_string(), "src/lib.rs".to_string()]);
    }
}
