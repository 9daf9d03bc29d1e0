//! Ref storage: `HEAD`'s symbolic/direct state and the branch refs it can
//! point through, each read and written atomically.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::AvcError;
use crate::hash::ObjectDigest;

/// `HEAD` either points at a branch name symbolically (the common case)
/// or directly at a commit digest (detached HEAD).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Head {
    Symbolic(String),
    Direct(ObjectDigest),
}

pub struct RefStore {
    /// The `.avc` or `.git`-style metadata directory containing `HEAD`
    /// and `refs/`.
    root: PathBuf,
}

impl RefStore {
    pub fn new(root: PathBuf) -> Self {
        RefStore { root }
    }

    fn head_path(&self) -> PathBuf {
        self.root.join("HEAD")
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn init_head(&self, default_branch: &str) -> Result<(), AvcError> {
        self.write_head(&Head::Symbolic(format!("refs/heads/{default_branch}")))
    }

    pub fn read_head(&self) -> Result<Head, AvcError> {
        let text = fs::read_to_string(self.head_path())?;
        let text = text.trim();
        if let Some(target) = text.strip_prefix("ref: ") {
            Ok(Head::Symbolic(target.trim().to_string()))
        } else {
            Ok(Head::Direct(text.parse()?))
        }
    }

    pub fn write_head(&self, head: &Head) -> Result<(), AvcError> {
        let text = match head {
            Head::Symbolic(target) => format!("ref: {target}\n"),
            Head::Direct(digest) => format!("{digest}\n"),
        };
        atomic_write(&self.head_path(), &text)
    }

    /// Follow `HEAD`'s symbolic chain (at most one level, since branch
    /// refs are never themselves symbolic) to the commit digest it
    /// currently resolves to, or `None` for an unborn branch.
    pub fn resolve_head(&self) -> Result<Option<ObjectDigest>, AvcError> {
        match self.read_head()? {
            Head::Direct(digest) => Ok(Some(digest)),
            Head::Symbolic(target) => self.read_ref(&target),
        }
    }

    pub fn read_ref(&self, name: &str) -> Result<Option<ObjectDigest>, AvcError> {
        let path = self.ref_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(text.trim().parse()?))
    }

    pub fn write_ref(&self, name: &str, digest: ObjectDigest) -> Result<(), AvcError> {
        let path = self.ref_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write(&path, &format!("{digest}\n"))
    }

    /// Move whatever `HEAD` currently resolves through (its branch, or
    /// `HEAD` itself if detached) to point at `digest`.
    pub fn advance_head(&self, digest: ObjectDigest) -> Result<(), AvcError> {
        match self.read_head()? {
            Head::Symbolic(target) => self.write_ref(&target, digest),
            Head::Direct(_) => self.write_head(&Head::Direct(digest)),
        }
    }
}

fn atomic_write(path: &Path, contents: &str) -> Result<(), AvcError> {
    let tmp = path.with_extension("tmp");
    if let Some(parent) = tmp.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unborn_branch_resolves_to_none() {
        let dir = tempdir().unwrap();
        let refs = RefStore::new(dir.path().to_path_buf());
        refs.init_head("main").unwrap();
        assert_eq!(refs.resolve_head().unwrap(), None);
    }

    #[test]
    fn advance_head_updates_the_branch_it_points_through() {
        let dir = tempdir().unwrap();
        let refs = RefStore::new(dir.path().to_path_buf());
        refs.init_head("main").unwrap();
        let digest = ObjectDigest::blake3(b"commit 0\0");
        refs.advance_head(digest).unwrap();
        assert_eq!(refs.resolve_head().unwrap(), Some(digest));
        assert_eq!(refs.read_ref("refs/heads/main").unwrap(), Some(digest));
    }

    #[test]
    fn detached_head_writes_direct_digest() {
        let dir = tempdir().unwrap();
        let refs = RefStore::new(dir.path().to_path_buf());
        let digest = ObjectDigest::blake3(b"commit 0\0");
        refs.write_head(&Head::Direct(digest)).unwrap();
        assert_eq!(refs.read_head().unwrap(), Head::Direct(digest));
        assert_eq!(refs.resolve_head().unwrap(), Some(digest));
    }
}
