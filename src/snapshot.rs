//! Snapshot engine: builds the hierarchical tree graph from the staging
//! index and writes a commit (the `commit` path), and flattens a commit's
//! tree back onto the working directory and/or index (the `restore`
//! path).

use std::collections::BTreeMap;
use std::path::Path;

use rayon::prelude::*;
use tracing::info;

use crate::errors::AvcError;
use crate::hash::ObjectDigest;
use crate::index::StagingIndex;
use crate::internal::object::commit::Commit;
use crate::internal::object::signature::Signature;
use crate::internal::object::tree::{Tree, TreeItem, TreeItemMode};
use crate::internal::object::types::ObjectType;
use crate::internal::object::ObjectTrait;
use crate::refs::RefStore;
use crate::store::ObjectStore;

/// An in-progress directory level, accumulated from staged paths before
/// being flattened into `Tree` objects children-before-parents.
#[derive(Default)]
struct DirNode {
    files: BTreeMap<String, (ObjectDigest, u32)>,
    dirs: BTreeMap<String, DirNode>,
}

impl DirNode {
    /// Insert one staged path. A trailing `/` marks an explicitly-tracked
    /// empty directory rather than a file and is routed to `declare_dir`.
    fn insert(&mut self, path: &str, digest: ObjectDigest, mode: u32) {
        if let Some(dir_path) = path.strip_suffix('/') {
            self.declare_dir(dir_path);
            return;
        }
        match path.split_once('/') {
            Some((first, rest)) => {
                self.dirs.entry(first.to_string()).or_default().insert(rest, digest, mode);
            }
            None => {
                self.files.insert(path.to_string(), (digest, mode));
            }
        }
    }

    /// Ensure a directory node exists at `path` even if it ends up with
    /// no files of its own, so `build` still emits an (empty) subtree for
    /// it.
    fn declare_dir(&mut self, path: &str) {
        match path.split_once('/') {
            Some((first, rest)) => self.dirs.entry(first.to_string()).or_default().declare_dir(rest),
            None => {
                self.dirs.entry(path.to_string()).or_default();
            }
        }
    }

    fn build(&self, store: &ObjectStore) -> Result<ObjectDigest, AvcError> {
        let mut items = Vec::with_capacity(self.files.len() + self.dirs.len());
        for (name, (digest, mode)) in &self.files {
            let item_mode = if mode & 0o111 != 0 {
                TreeItemMode::BlobExecutable
            } else {
                TreeItemMode::Blob
            };
            items.push(TreeItem::new(item_mode, *digest, name.clone()));
        }
        for (name, child) in &self.dirs {
            let child_digest = child.build(store)?;
            items.push(TreeItem::new(TreeItemMode::Tree, child_digest, name.clone()));
        }
        let placeholder = ObjectDigest::of_kind(store.digest_kind(), b"");
        let tree = Tree::from_tree_items(items, placeholder)?;
        store.store_object(ObjectType::Tree, &tree.to_payload()?, false)
    }
}

/// Build the full directory tree from every staged path and write every
/// level to `store`, returning the root tree's digest.
pub fn build_tree_from_index(index: &StagingIndex, store: &ObjectStore) -> Result<ObjectDigest, AvcError> {
    let mut root = DirNode::default();
    for (path, entry) in index.entries() {
        root.insert(path, entry.digest, entry.mode);
    }
    root.build(store)
}

/// Build a tree from the index, write a commit pointing at it with
/// `HEAD`'s current resolution as its (sole) parent, advance the ref
/// `HEAD` resolves through, and clear the staging index.
pub fn commit(
    store: &ObjectStore,
    index: StagingIndex,
    index_path: &Path,
    refs: &RefStore,
    author: Signature,
    committer: Signature,
    message: &str,
) -> Result<ObjectDigest, AvcError> {
    if index.is_empty() {
        return Err(AvcError::NothingToCommit);
    }
    let tree_id = build_tree_from_index(&index, store)?;
    let parents: Vec<ObjectDigest> = refs.resolve_head()?.into_iter().collect();
    let new_commit = Commit::new(author, committer, tree_id, parents, message)?;
    store.store_object(ObjectType::Commit, &new_commit.to_payload()?, false)?;
    refs.advance_head(new_commit.id)?;
    StagingIndex::clear_on_disk(index_path)?;
    info!(commit = %new_commit.id, "recorded commit");
    Ok(new_commit.id)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreMode {
    /// Move only the ref `HEAD` resolves through.
    Soft,
    /// Move the ref and rewrite the staging index; leave the working tree.
    Mixed,
    /// Move the ref, rewrite the index, and overwrite working-tree files.
    Hard,
    /// Like `Hard`, but first wipes everything in the working directory
    /// outside the metadata allow-list. Requires `confirm = true`.
    Clean,
}

struct FlattenedEntry {
    path: String,
    digest: ObjectDigest,
    mode: TreeItemMode,
}

fn flatten_tree(
    store: &ObjectStore,
    tree_digest: ObjectDigest,
    prefix: &str,
    out: &mut Vec<FlattenedEntry>,
) -> Result<(), AvcError> {
    let (_, payload) = store.load_object(&tree_digest)?;
    let tree = Tree::from_payload(&payload, tree_digest)?;
    for item in &tree.tree_items {
        let path = if prefix.is_empty() {
            item.name.clone()
        } else {
            format!("{prefix}/{}", item.name)
        };
        match item.mode {
            TreeItemMode::Tree => {
                let (_, child_payload) = store.load_object(&item.id)?;
                let child_tree = Tree::from_payload(&child_payload, item.id)?;
                if child_tree.tree_items.is_empty() {
                    // An explicitly-tracked empty directory: nothing to
                    // recurse into, but still worth materializing on disk.
                    out.push(FlattenedEntry {
                        path,
                        digest: item.id,
                        mode: TreeItemMode::Tree,
                    });
                } else {
                    flatten_tree(store, item.id, &path, out)?;
                }
            }
            other => out.push(FlattenedEntry {
                path,
                digest: item.id,
                mode: other,
            }),
        }
    }
    Ok(())
}

/// Resolve `HEAD`, `HEAD~1`, or a literal digest string to a commit digest.
pub fn resolve_target(refs: &RefStore, store: &ObjectStore, target: &str) -> Result<ObjectDigest, AvcError> {
    match target {
        "HEAD" => refs.resolve_head()?.ok_or_else(|| AvcError::RefMissing("HEAD".to_string())),
        "HEAD~1" => {
            let head = refs.resolve_head()?.ok_or_else(|| AvcError::RefMissing("HEAD".to_string()))?;
            let (_, payload) = store.load_object(&head)?;
            let commit = Commit::from_payload(&payload, head)?;
            commit
                .parent_commit_ids
                .first()
                .copied()
                .ok_or_else(|| AvcError::NoParent(head.to_string()))
        }
        other => other.parse(),
    }
}

/// Restore the working directory and/or index and/or `HEAD` to `target`,
/// per `mode`. Hard and Clean restoration of working-tree files runs in
/// parallel over the flattened entry list via `rayon`.
pub fn restore(
    store: &ObjectStore,
    refs: &RefStore,
    work_dir: &Path,
    index_path: &Path,
    target: &str,
    mode: RestoreMode,
    confirm: bool,
) -> Result<ObjectDigest, AvcError> {
    let commit_digest = resolve_target(refs, store, target)?;

    if mode == RestoreMode::Soft {
        refs.advance_head(commit_digest)?;
        return Ok(commit_digest);
    }

    let (_, payload) = store.load_object(&commit_digest)?;
    let commit = Commit::from_payload(&payload, commit_digest)?;

    let mut entries = Vec::new();
    flatten_tree(store, commit.tree_id, "", &mut entries)?;

    if mode == RestoreMode::Clean {
        if !confirm {
            return Err(AvcError::InvalidArgument(
                "clean restore requires explicit confirmation".to_string(),
            ));
        }
        wipe_working_directory(work_dir)?;
    }

    if mode == RestoreMode::Hard || mode == RestoreMode::Clean {
        entries.par_iter().try_for_each(|entry| restore_blob(store, work_dir, entry))?;
    }

    let mut index = StagingIndex::new();
    for entry in &entries {
        let path = match entry.mode {
            TreeItemMode::Tree => format!("{}/", entry.path),
            _ => entry.path.clone(),
        };
        index.upsert(path, entry.digest, mode_to_unix(entry.mode));
    }
    index.commit(index_path)?;

    refs.advance_head(commit_digest)?;
    Ok(commit_digest)
}

fn restore_blob(store: &ObjectStore, work_dir: &Path, entry: &FlattenedEntry) -> Result<(), AvcError> {
    let target_path = work_dir.join(&entry.path);
    if entry.mode == TreeItemMode::Tree {
        // An explicitly-tracked empty directory: recreate it, nothing to write.
        std::fs::create_dir_all(&target_path)?;
        return Ok(());
    }
    let (_, payload) = store.load_object(&entry.digest)?;
    if let Some(parent) = target_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target_path, &payload)?;
    Ok(())
}

fn wipe_working_directory(work_dir: &Path) -> Result<(), AvcError> {
    const ALLOW_LIST: [&str; 2] = [".avc", ".git"];
    for entry in std::fs::read_dir(work_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if ALLOW_LIST.contains(&name.as_ref()) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            std::fs::remove_dir_all(path)?;
        } else {
            std::fs::remove_file(path)?;
        }
    }
    Ok(())
}

fn mode_to_unix(mode: TreeItemMode) -> u32 {
    match mode {
        TreeItemMode::Blob => 0o100644,
        TreeItemMode::BlobExecutable => 0o100755,
        TreeItemMode::Link => 0o120000,
        TreeItemMode::Tree => 0o040000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionFormat;
    use crate::hash::DigestKind;
    use tempfile::tempdir;

    fn setup() -> (ObjectStore, RefStore, tempfile::TempDir, std::path::PathBuf) {
        let store_dir = tempdir().unwrap();
        let meta_dir = tempdir().unwrap();
        let store = ObjectStore::new(store_dir.path().to_path_buf(), DigestKind::Blake3, CompressionFormat::ZstdV2);
        let refs = RefStore::new(meta_dir.path().to_path_buf());
        refs.init_head("main").unwrap();
        let index_path = meta_dir.path().join("index");
        (store, refs, meta_dir, index_path)
    }

    fn sig() -> Signature {
        Signature::new("Ada".to_string(), "ada@example.com".to_string(), 1, "+0000".to_string())
    }

    #[test]
    fn commit_builds_nested_tree_and_clears_index() {
        let (store, refs, _meta_dir, index_path) = setup();
        let mut index = StagingIndex::new();
        let digest = store.store_object(ObjectType::Blob, b"fn main() {}", false).unwrap();
        index.upsert("src/lib.rs".to_string(), digest, 0o100644);

        let commit_digest = commit(&store, index, &index_path, &refs, sig(), sig(), "initial\n").unwrap();
        assert_eq!(refs.resolve_head().unwrap(), Some(commit_digest));
        assert!(StagingIndex::load(&index_path).unwrap().is_empty());
    }

    #[test]
    fn empty_index_refuses_to_commit() {
        let (store, refs, _meta_dir, index_path) = setup();
        let err = commit(&store, StagingIndex::new(), &index_path, &refs, sig(), sig(), "x");
        assert!(matches!(err, Err(AvcError::NothingToCommit)));
    }

    #[test]
    fn hard_restore_writes_files_to_disk() {
        let (store, refs, _meta_dir, index_path) = setup();
        let work_dir = tempdir().unwrap();

        let mut index = StagingIndex::new();
        let digest = store.store_object(ObjectType::Blob, b"hello", false).unwrap();
        index.upsert("a/b.txt".to_string(), digest, 0o100644);
        commit(&store, index, &index_path, &refs, sig(), sig(), "c1\n").unwrap();

        restore(
            &store,
            &refs,
            work_dir.path(),
            &index_path,
            "HEAD",
            RestoreMode::Hard,
            false,
        )
        .unwrap();

        let restored = std::fs::read(work_dir.path().join("a/b.txt")).unwrap();
        assert_eq!(restored, b"hello");
    }

    #[test]
    fn hard_restore_recreates_explicitly_tracked_empty_directories() {
        let (store, refs, _meta_dir, index_path) = setup();
        let work_dir = tempdir().unwrap();

        let mut index = StagingIndex::new();
        let digest = store.store_object(ObjectType::Blob, b"hello", false).unwrap();
        index.upsert("a/b.txt".to_string(), digest, 0o100644);
        index.upsert("logs/".to_string(), ObjectDigest::blake3(b""), 0o040000);
        commit(&store, index, &index_path, &refs, sig(), sig(), "c1\n").unwrap();

        restore(&store, &refs, work_dir.path(), &index_path, "HEAD", RestoreMode::Hard, false).unwrap();

        assert!(work_dir.path().join("logs").is_dir());
        assert_eq!(std::fs::read_dir(work_dir.path().join("logs")).unwrap().count(), 0);
        assert!(StagingIndex::load(&index_path).unwrap().get("logs/").is_some());
    }

    #[test]
    fn soft_restore_only_moves_head() {
        let (store, refs, _meta_dir, index_path) = setup();
        let mut index = StagingIndex::new();
        let digest = store.store_object(ObjectType::Blob, b"v1", false).unwrap();
        index.upsert("f.txt".to_string(), digest, 0o100644);
        let c1 = commit(&store, index, &index_path, &refs, sig(), sig(), "c1\n").unwrap();

        let mut index2 = StagingIndex::new();
        let digest2 = store.store_object(ObjectType::Blob, b"v2", false).unwrap();
        index2.upsert("f.txt".to_string(), digest2, 0o100644);
        commit(&store, index2, &index_path, &refs, sig(), sig(), "c2\n").unwrap();

        let work_dir = tempdir().unwrap();
        restore(&store, &refs, work_dir.path(), &index_path, "HEAD~1", RestoreMode::Soft, false).unwrap();
        assert_eq!(refs.resolve_head().unwrap(), Some(c1));
        assert!(!work_dir.path().join("f.txt").exists());
    }
}
