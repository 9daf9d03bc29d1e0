//! Staging index: a transactional map of repo-relative path to the digest
//! and mode that would be committed next, persisted as one
//! `<digest> <path> <octal-mode>` line per entry.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::errors::AvcError;
use crate::hash::ObjectDigest;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub digest: ObjectDigest,
    pub mode: u32,
}

#[derive(Clone, Debug, Default)]
pub struct StagingIndex {
    entries: HashMap<String, IndexEntry>,
}

impl StagingIndex {
    pub fn new() -> Self {
        StagingIndex {
            entries: HashMap::new(),
        }
    }

    /// Load the index file if present; a missing file is treated as an
    /// empty index (idempotent on a freshly-initialized repository).
    pub fn load(path: &Path) -> Result<Self, AvcError> {
        if !path.exists() {
            return Ok(StagingIndex::new());
        }
        let text = fs::read_to_string(path)?;
        let mut entries = HashMap::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(3, ' ');
            let digest_hex = parts
                .next()
                .ok_or_else(|| AvcError::IndexConflict(format!("malformed index line `{line}`")))?;
            let path_str = parts
                .next()
                .ok_or_else(|| AvcError::IndexConflict(format!("malformed index line `{line}`")))?;
            let mode_str = parts
                .next()
                .ok_or_else(|| AvcError::IndexConflict(format!("malformed index line `{line}`")))?;
            let digest: ObjectDigest = digest_hex
                .parse()
                .map_err(|_| AvcError::IndexConflict(format!("bad digest in index line `{line}`")))?;
            let mode = u32::from_str_radix(mode_str, 8)
                .map_err(|_| AvcError::IndexConflict(format!("bad mode in index line `{line}`")))?;
            entries.insert(path_str.to_string(), IndexEntry { digest, mode });
        }
        Ok(StagingIndex { entries })
    }

    /// Insert or update an entry. Returns `true` if the (digest, mode)
    /// tuple actually changed, letting callers report "unchanged" files
    /// without extra work.
    pub fn upsert(&mut self, path: String, digest: ObjectDigest, mode: u32) -> bool {
        let new_entry = IndexEntry { digest, mode };
        match self.entries.get(&path) {
            Some(existing) if *existing == new_entry => false,
            _ => {
                self.entries.insert(path, new_entry);
                true
            }
        }
    }

    pub fn remove(&mut self, path: &str) -> Option<IndexEntry> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &IndexEntry)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Persist via temp file + rename, then drop the in-memory copy of
    /// entries (the caller is expected to reload if it needs to keep
    /// using the index afterward).
    pub fn commit(mut self, path: &Path) -> Result<(), AvcError> {
        let mut lines: Vec<String> = self
            .entries
            .iter()
            .map(|(p, e)| format!("{} {} {:o}", e.digest, p, e.mode))
            .collect();
        lines.sort();
        let mut text = lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, path)?;
        debug!(entries = self.entries.len(), "committed staging index");
        self.entries.clear();
        Ok(())
    }

    /// Truncate the on-disk index to empty, used after a commit clears
    /// staged changes.
    pub fn clear_on_disk(path: &Path) -> Result<(), AvcError> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, "")?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_index_file_loads_empty() {
        let dir = tempdir().unwrap();
        let index = StagingIndex::load(&dir.path().join("index")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn upsert_reports_whether_entry_changed() {
        let mut index = StagingIndex::new();
        let digest = ObjectDigest::blake3(b"blob 1\0a");
        assert!(index.upsert("a.txt".to_string(), digest, 0o100644));
        assert!(!index.upsert("a.txt".to_string(), digest, 0o100644));
        assert!(index.upsert("a.txt".to_string(), digest, 0o100755));
    }

    #[test]
    fn commit_is_idempotent_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index");
        let mut index = StagingIndex::new();
        let digest = ObjectDigest::blake3(b"blob 1\0a");
        index.upsert("a.txt".to_string(), digest, 0o100644);
        index.clone().commit(&path).unwrap();

        let reloaded = StagingIndex::load(&path).unwrap();
        assert_eq!(reloaded.get("a.txt").unwrap().digest, digest);
        assert_eq!(reloaded.get("a.txt").unwrap().mode, 0o100644);
    }

    #[test]
    fn clear_on_disk_empties_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index");
        let mut index = StagingIndex::new();
        index.upsert("a.txt".to_string(), ObjectDigest::blake3(b"blob 1\0a"), 0o100644);
        index.commit(&path).unwrap();
        StagingIndex::clear_on_disk(&path).unwrap();
        let reloaded = StagingIndex::load(&path).unwrap();
        assert!(reloaded.is_empty());
    }
}
