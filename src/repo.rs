//! `Repository`: the single public entry point binding together the
//! object store, staging index, ref store, snapshot engine, and
//! dual-store bridge. Each command-surface verb from the spec's
//! non-goal'd-out CLI is a method here instead.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::bridge::digest_map::DigestMap;
use crate::bridge::Bridge;
use crate::config::{Config, CompressionFormat, RepoFormat};
use crate::errors::AvcError;
use crate::hash::{DigestKind, ObjectDigest};
use crate::index::StagingIndex;
use crate::internal::object::commit::Commit;
use crate::internal::object::signature::Signature;
use crate::internal::object::tree::{Tree, TreeItemMode};
use crate::internal::object::ObjectTrait;
use crate::refs::RefStore;
use crate::scanner::{normalize_path, Scanner};
use crate::snapshot::{self, RestoreMode};
use crate::store::ObjectStore;

pub struct Repository {
    work_dir: PathBuf,
    avc_dir: PathBuf,
    store: ObjectStore,
    refs: RefStore,
    #[allow(dead_code)]
    format: RepoFormat,
}

impl Repository {
    fn index_path(&self) -> PathBuf {
        self.avc_dir.join("index")
    }

    fn git_dir(&self) -> PathBuf {
        self.work_dir.join(".git")
    }

    fn git_store(&self) -> ObjectStore {
        ObjectStore::new(self.git_dir().join("objects"), DigestKind::Sha1, CompressionFormat::ZlibV1)
    }

    fn git_refs(&self) -> RefStore {
        RefStore::new(self.git_dir())
    }

    fn digest_map_path(&self) -> PathBuf {
        self.avc_dir.join("avc-map")
    }

    /// Materialize a fresh repository's directory skeleton:
    /// `objects/`, `refs/heads/`, `refs/tags/`, `HEAD`, an empty `index`,
    /// and a default `config`/`format` pair.
    pub fn init(work_dir: &Path) -> Result<Repository, AvcError> {
        let avc_dir = work_dir.join(".avc");
        fs::create_dir_all(avc_dir.join("objects"))?;
        fs::create_dir_all(avc_dir.join("refs/heads"))?;
        fs::create_dir_all(avc_dir.join("refs/tags"))?;
        fs::write(avc_dir.join("index"), "")?;

        let format = RepoFormat::new_repository_default();
        format.save(&avc_dir.join("format"))?;
        Config::default_core().save(&avc_dir.join("config"))?;

        let refs = RefStore::new(avc_dir.clone());
        refs.init_head("main")?;

        let store = ObjectStore::new(avc_dir.join("objects"), DigestKind::Blake3, format.compression);
        info!(path = %work_dir.display(), "initialized repository");
        Ok(Repository {
            work_dir: work_dir.to_path_buf(),
            avc_dir,
            store,
            refs,
            format,
        })
    }

    /// Open the repository that contains `start`, walking up through
    /// parent directories the same way Git locates `.git`.
    pub fn open(start: &Path) -> Result<Repository, AvcError> {
        let work_dir = find_repo_root(start).ok_or(AvcError::RepoMissing)?;
        let avc_dir = work_dir.join(".avc");
        let format = RepoFormat::load(&avc_dir.join("format"))?;
        let store = ObjectStore::new(avc_dir.join("objects"), DigestKind::Blake3, format.compression);
        let refs = RefStore::new(avc_dir.clone());
        Ok(Repository {
            work_dir,
            avc_dir,
            store,
            refs,
            format,
        })
    }

    /// Stage `paths` (files or directories, expanded recursively),
    /// hashing new/changed files in parallel. `fast` selects the object
    /// store's low-compression throughput mode. `track_empty_dirs` also
    /// stages directories that contain no stageable files of their own.
    /// Returns the paths that were actually staged (digest or mode
    /// changed) and any per-path warnings for invalid or unreadable
    /// entries.
    pub fn add(&self, paths: &[String], fast: bool, track_empty_dirs: bool) -> Result<(Vec<String>, Vec<String>), AvcError> {
        let scanner = Scanner::new(self.work_dir.clone(), vec![]);
        let mut resolved = Vec::new();
        let mut warnings = Vec::new();

        for raw in paths {
            match normalize_path(raw) {
                Ok(rel) => {
                    let abs = self.work_dir.join(&rel);
                    if abs.is_dir() {
                        match scanner.walk(&rel, track_empty_dirs) {
                            Ok(files) => resolved.extend(files),
                            Err(e) => warnings.push(format!("{rel}: {e}")),
                        }
                    } else {
                        resolved.push(rel);
                    }
                }
                Err(_) => warnings.push(format!("skipping invalid path `{raw}`")),
            }
        }

        let (dir_markers, files): (Vec<String>, Vec<String>) =
            resolved.into_iter().partition(|path| path.ends_with('/'));

        let hashed: Vec<(String, ObjectDigest, u32)> = files
            .par_iter()
            .filter_map(|rel| {
                let abs = self.work_dir.join(rel);
                let metadata = fs::metadata(&abs).ok()?;
                let mode = unix_mode(&metadata);
                self.store
                    .store_blob_from_file(&abs, fast)
                    .ok()
                    .map(|digest| (rel.clone(), digest, mode))
            })
            .collect();

        let mut index = StagingIndex::load(&self.index_path())?;
        let mut staged = Vec::new();
        for (path, digest, mode) in hashed {
            if index.upsert(path.clone(), digest, mode) {
                staged.push(path);
            }
        }
        for marker in dir_markers {
            let digest = ObjectDigest::of_kind(self.store.digest_kind(), b"");
            if index.upsert(marker.clone(), digest, 0o040000) {
                staged.push(marker);
            }
        }
        index.commit(&self.index_path())?;
        Ok((staged, warnings))
    }

    /// Remove `paths` from the index and, unless `cached`, from the
    /// working tree. `recursive` allows a directory path to remove every
    /// index entry under that prefix (and the directory itself, unless
    /// `cached`); without it a directory argument is an error.
    pub fn rm(&self, paths: &[String], cached: bool, recursive: bool) -> Result<(), AvcError> {
        let mut index = StagingIndex::load(&self.index_path())?;
        for raw in paths {
            let rel = normalize_path(raw)?;
            let abs = self.work_dir.join(&rel);
            if abs.is_dir() {
                if !recursive {
                    return Err(AvcError::InvalidArgument(format!(
                        "{rel}: is a directory, pass -r to remove recursively"
                    )));
                }
                let prefix = format!("{rel}/");
                let matching: Vec<String> = index
                    .entries()
                    .map(|(path, _)| path.clone())
                    .filter(|path| path == &rel || path.starts_with(&prefix))
                    .collect();
                for path in matching {
                    index.remove(&path);
                }
                if !cached && abs.exists() {
                    fs::remove_dir_all(&abs)?;
                }
            } else {
                index.remove(&rel);
                if !cached && abs.exists() {
                    fs::remove_file(&abs)?;
                }
            }
        }
        index.commit(&self.index_path())?;
        Ok(())
    }

    pub fn commit(&self, message: &str) -> Result<ObjectDigest, AvcError> {
        let index = StagingIndex::load(&self.index_path())?;
        let now = chrono::Utc::now().timestamp();
        let author = Signature::from_env(now);
        let committer = author.clone();
        snapshot::commit(&self.store, index, &self.index_path(), &self.refs, author, committer, message)
    }

    pub fn reset(&self, target: &str, mode: RestoreMode, confirm: bool) -> Result<ObjectDigest, AvcError> {
        snapshot::restore(&self.store, &self.refs, &self.work_dir, &self.index_path(), target, mode, confirm)
    }

    pub fn status(&self) -> Result<RepoStatus, AvcError> {
        let index = StagingIndex::load(&self.index_path())?;
        let head_tree = self.head_tree_entries()?;
        let mut status = RepoStatus::default();

        let index_paths: std::collections::HashSet<&String> = index.entries().map(|(path, _)| path).collect();

        for (path, entry) in index.entries() {
            match head_tree.get(path) {
                None => status.staged_added.push(path.clone()),
                Some(head_digest) if *head_digest != entry.digest => status.staged_modified.push(path.clone()),
                _ => {}
            }
        }
        for path in head_tree.keys() {
            if !index_paths.contains(path) {
                status.staged_deleted.push(path.clone());
            }
        }

        let scanner = Scanner::new(self.work_dir.clone(), vec![]);
        for path in scanner.walk("", false)? {
            match index.get(&path) {
                Some(entry) => {
                    if let Ok(current) = self.store.hash_file(&self.work_dir.join(&path)) {
                        if current != entry.digest {
                            status.unstaged_modified.push(path);
                        }
                    }
                }
                None => status.untracked.push(path),
            }
        }

        status.staged_added.sort();
        status.staged_modified.sort();
        status.staged_deleted.sort();
        status.unstaged_modified.sort();
        status.untracked.sort();
        Ok(status)
    }

    pub fn log(&self) -> Result<Vec<LogEntry>, AvcError> {
        let mut entries = Vec::new();
        let mut cursor = self.refs.resolve_head()?;
        while let Some(digest) = cursor {
            let (_, payload) = self.store.load_object(&digest)?;
            let commit = Commit::from_payload(&payload, digest)?;
            cursor = commit.parent_commit_ids.first().copied();
            entries.push(LogEntry {
                digest: digest.to_string(),
                author: commit.author.to_string(),
                committer: commit.committer.to_string(),
                message: commit.format_message(),
                parents: commit.parent_commit_ids.iter().map(|p| p.to_string()).collect(),
            });
        }
        Ok(entries)
    }

    /// Materialize a `.git` directory skeleton alongside `.avc`.
    pub fn git_init(&self) -> Result<(), AvcError> {
        let git_dir = self.git_dir();
        fs::create_dir_all(git_dir.join("objects"))?;
        fs::create_dir_all(git_dir.join("refs/heads"))?;
        fs::create_dir_all(git_dir.join("refs/tags"))?;
        self.git_refs().init_head("main")?;
        Config::default_core().save(&git_dir.join("config"))?;
        Ok(())
    }

    /// Translate the current AVC `HEAD` commit (and its full object
    /// graph) into the Git store and advance the Git branch to match.
    pub fn sync_to_git(&self) -> Result<ObjectDigest, AvcError> {
        let head = self.refs.resolve_head()?.ok_or_else(|| AvcError::RefMissing("HEAD".to_string()))?;
        let git_store = self.git_store();
        let git_refs = self.git_refs();
        let map = DigestMap::load(self.digest_map_path())?;
        let bridge = Bridge::new(&self.store, &git_store, map);
        let git_digest = bridge.avc_to_git(head)?;
        git_refs.advance_head(git_digest)?;
        bridge.save_map()?;
        Ok(git_digest)
    }

    pub fn verify_git(&self) -> Result<Vec<String>, AvcError> {
        let head = self.refs.resolve_head()?.ok_or_else(|| AvcError::RefMissing("HEAD".to_string()))?;
        let git_store = self.git_store();
        let map = DigestMap::load(self.digest_map_path())?;
        let bridge = Bridge::new(&self.store, &git_store, map);
        bridge.verify_git(head)
    }

    /// Translate the Git `HEAD` commit graph into the AVC store and point
    /// `refs/heads/main` at the translated tip.
    pub fn migrate_from_git(&self) -> Result<ObjectDigest, AvcError> {
        let git_refs = self.git_refs();
        let git_tip = git_refs
            .resolve_head()?
            .ok_or_else(|| AvcError::RefMissing("git HEAD".to_string()))?;
        let git_store = self.git_store();
        let map = DigestMap::load(self.digest_map_path())?;
        let bridge = Bridge::new(&self.store, &git_store, map);
        bridge.migrate_from_git(git_tip, "refs/heads/main", &self.refs)
    }

    pub fn push(&self, remote: &str, branch: &str) -> Result<(), AvcError> {
        self.run_git(&["push", remote, branch])
    }

    pub fn pull(&self, remote: &str, branch: &str) -> Result<(), AvcError> {
        self.run_git(&["pull", remote, branch])
    }

    fn run_git(&self, args: &[&str]) -> Result<(), AvcError> {
        let output = std::process::Command::new("git")
            .args(args)
            .current_dir(&self.work_dir)
            .output()?;
        if !output.status.success() {
            return Err(AvcError::GitSubprocess(String::from_utf8_lossy(&output.stderr).into_owned()));
        }
        Ok(())
    }

    fn head_tree_entries(&self) -> Result<BTreeMap<String, ObjectDigest>, AvcError> {
        let mut map = BTreeMap::new();
        if let Some(head) = self.refs.resolve_head()? {
            let (_, payload) = self.store.load_object(&head)?;
            let commit = Commit::from_payload(&payload, head)?;
            self.flatten_into(commit.tree_id, "", &mut map)?;
        }
        Ok(map)
    }

    fn flatten_into(&self, tree_digest: ObjectDigest, prefix: &str, out: &mut BTreeMap<String, ObjectDigest>) -> Result<(), AvcError> {
        let (_, payload) = self.store.load_object(&tree_digest)?;
        let tree = Tree::from_payload(&payload, tree_digest)?;
        for item in &tree.tree_items {
            let path = if prefix.is_empty() {
                item.name.clone()
            } else {
                format!("{prefix}/{}", item.name)
            };
            match item.mode {
                TreeItemMode::Tree => self.flatten_into(item.id, &path, out)?,
                _ => {
                    out.insert(path, item.id);
                }
            }
        }
        Ok(())
    }
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        if d.join(".avc").is_dir() {
            return Some(d.to_path_buf());
        }
        dir = d.parent();
    }
    None
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        0o100755
    } else {
        0o100644
    }
}

#[cfg(not(unix))]
fn unix_mode(_metadata: &fs::Metadata) -> u32 {
    0o100644
}

#[derive(Debug, Default, Serialize)]
pub struct RepoStatus {
    pub staged_added: Vec<String>,
    pub staged_modified: Vec<String>,
    pub staged_deleted: Vec<String>,
    pub unstaged_modified: Vec<String>,
    pub untracked: Vec<String>,
}

impl RepoStatus {
    /// Structured dump for embedding in another tool's output (e.g. a
    /// future CLI's `--json` flag), rather than a parsed-text contract.
    pub fn to_json(&self) -> Result<String, AvcError> {
        serde_json::to_string_pretty(self).map_err(|e| AvcError::InvalidArgument(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct LogEntry {
    pub digest: String,
    pub author: String,
    pub committer: String,
    pub message: String,
    pub parents: Vec<String>,
}
