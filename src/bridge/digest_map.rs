//! Persistent cross-store digest map: `<avc-digest> <git-digest>` lines
//! recording the bijection the Bridge has already computed, so repeated
//! translations short-circuit instead of re-walking the object graph.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::AvcError;
use crate::hash::ObjectDigest;

#[derive(Default)]
pub struct DigestMap {
    path: Option<PathBuf>,
    avc_to_git: HashMap<ObjectDigest, ObjectDigest>,
    git_to_avc: HashMap<ObjectDigest, ObjectDigest>,
}

impl DigestMap {
    pub fn new() -> Self {
        DigestMap::default()
    }

    pub fn load(path: PathBuf) -> Result<Self, AvcError> {
        let mut map = DigestMap {
            path: Some(path.clone()),
            avc_to_git: HashMap::new(),
            git_to_avc: HashMap::new(),
        };
        if !path.exists() {
            return Ok(map);
        }
        let text = fs::read_to_string(&path)?;
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let (avc_hex, git_hex) = line
                .split_once(' ')
                .ok_or_else(|| AvcError::IndexConflict(format!("malformed digest-map line `{line}`")))?;
            let avc: ObjectDigest = avc_hex
                .parse()
                .map_err(|_| AvcError::IndexConflict(format!("bad avc digest in `{line}`")))?;
            let git: ObjectDigest = git_hex
                .parse()
                .map_err(|_| AvcError::IndexConflict(format!("bad git digest in `{line}`")))?;
            map.avc_to_git.insert(avc, git);
            map.git_to_avc.insert(git, avc);
        }
        Ok(map)
    }

    pub fn get_git(&self, avc: &ObjectDigest) -> Option<ObjectDigest> {
        self.avc_to_git.get(avc).copied()
    }

    pub fn get_avc(&self, git: &ObjectDigest) -> Option<ObjectDigest> {
        self.git_to_avc.get(git).copied()
    }

    pub fn insert(&mut self, avc: ObjectDigest, git: ObjectDigest) {
        self.avc_to_git.insert(avc, git);
        self.git_to_avc.insert(git, avc);
    }

    pub fn save(&self) -> Result<(), AvcError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        self.save_to(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AvcError> {
        let mut lines: Vec<String> = self
            .avc_to_git
            .iter()
            .map(|(avc, git)| format!("{avc} {git}"))
            .collect();
        lines.sort();
        let mut text = lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("avc-map");
        let mut map = DigestMap::load(path.clone()).unwrap();
        let avc = ObjectDigest::blake3(b"blob 3\0abc");
        let git = ObjectDigest::sha1(b"blob 3\0abc");
        map.insert(avc, git);
        map.save().unwrap();

        let reloaded = DigestMap::load(path).unwrap();
        assert_eq!(reloaded.get_git(&avc), Some(git));
        assert_eq!(reloaded.get_avc(&git), Some(avc));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let map = DigestMap::load(dir.path().join("avc-map")).unwrap();
        assert_eq!(map.get_git(&ObjectDigest::blake3(b"x")), None);
    }
}
