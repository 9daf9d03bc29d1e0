//! Dual-Store Bridge (AGCL): bijective translation of the object graph
//! between the AVC store (BLAKE3, text trees) and a Git store (SHA-1,
//! binary trees), backed by a persistent digest map.
//!
//! Translation re-frames and rehashes the *actual object bytes* under the
//! other algorithm rather than hashing a hex string of the source digest —
//! that shortcut would make the two stores diverge from real Git/AVC
//! output and defeats the point of a compatibility bridge.

pub mod digest_map;

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::debug;

use crate::bridge::digest_map::DigestMap;
use crate::errors::AvcError;
use crate::hash::{DigestKind, ObjectDigest};
use crate::internal::object::blob::Blob;
use crate::internal::object::commit::Commit;
use crate::internal::object::frame;
use crate::internal::object::signature::Signature;
use crate::internal::object::tree::{Tree, TreeItem};
use crate::internal::object::types::ObjectType;
use crate::internal::object::ObjectTrait;
use crate::refs::RefStore;
use crate::store::ObjectStore;

/// Fallback email injected when a translated commit's author or
/// committer carries none (e.g. Git's `Name <> ts tz` form).
const DEFAULT_EMAIL: &str = "user@example.com";

/// Commits crossing the bridge without an email (Git tolerates `Name <>`)
/// get one injected rather than carrying the gap into the other store.
fn normalize_signature(sig: &Signature) -> Signature {
    if sig.email.trim().is_empty() {
        let mut normalized = sig.clone();
        normalized.email = DEFAULT_EMAIL.to_string();
        normalized
    } else {
        sig.clone()
    }
}

pub struct Bridge<'a> {
    avc_store: &'a ObjectStore,
    git_store: &'a ObjectStore,
    map: Mutex<DigestMap>,
}

impl<'a> Bridge<'a> {
    pub fn new(avc_store: &'a ObjectStore, git_store: &'a ObjectStore, map: DigestMap) -> Self {
        Bridge {
            avc_store,
            git_store,
            map: Mutex::new(map),
        }
    }

    pub fn save_map(&self) -> Result<(), AvcError> {
        self.map.lock().expect("digest map mutex poisoned").save()
    }

    pub fn avc_to_git(&self, digest: ObjectDigest) -> Result<ObjectDigest, AvcError> {
        self.translate(digest, DigestKind::Sha1)
    }

    pub fn git_to_avc(&self, digest: ObjectDigest) -> Result<ObjectDigest, AvcError> {
        self.translate(digest, DigestKind::Blake3)
    }

    /// Point an AVC branch ref at the AVC commit this Git commit
    /// translates to, translating every object the commit transitively
    /// references along the way.
    pub fn migrate_from_git(
        &self,
        git_tip: ObjectDigest,
        avc_branch_ref: &str,
        refs: &RefStore,
    ) -> Result<ObjectDigest, AvcError> {
        let avc_tip = self.git_to_avc(git_tip)?;
        refs.write_ref(avc_branch_ref, avc_tip)?;
        self.save_map()?;
        Ok(avc_tip)
    }

    /// Walk the AVC commit graph reachable from `avc_commit`; for every
    /// object already mapped, confirm the mapped Git object exists and
    /// that re-translating reproduces the same digest. Returns one
    /// human-readable line per mismatch, never panics — consistent with
    /// "propagate, don't partially salvage" for bridge-conversion
    /// failures.
    pub fn verify_git(&self, avc_commit: ObjectDigest) -> Result<Vec<String>, AvcError> {
        let mut mismatches = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![avc_commit];

        while let Some(digest) = stack.pop() {
            if !seen.insert(digest) {
                continue;
            }

            if let Some(git_digest) = self.cached(&digest, DigestKind::Sha1) {
                if !self.git_store.exists(&git_digest) {
                    mismatches.push(format!(
                        "{digest}: mapped git object {git_digest} is missing from the git store"
                    ));
                } else {
                    let expected = self.expected_target_digest(digest, DigestKind::Sha1)?;
                    if expected != git_digest {
                        mismatches.push(format!(
                            "{digest}: re-translation produced {expected}, map records {git_digest}"
                        ));
                    }
                }
            }

            let (object_type, payload) = self.avc_store.load_object(&digest)?;
            match object_type {
                ObjectType::Commit => {
                    let commit = Commit::from_payload(&payload, digest)?;
                    stack.push(commit.tree_id);
                    stack.extend(commit.parent_commit_ids);
                }
                ObjectType::Tree => {
                    let tree = Tree::from_payload(&payload, digest)?;
                    stack.extend(tree.tree_items.iter().map(|item| item.id));
                }
                ObjectType::Blob => {}
            }
        }

        Ok(mismatches)
    }

    fn cached(&self, digest: &ObjectDigest, target_kind: DigestKind) -> Option<ObjectDigest> {
        let map = self.map.lock().expect("digest map mutex poisoned");
        match target_kind {
            DigestKind::Sha1 => map.get_git(digest),
            DigestKind::Blake3 => map.get_avc(digest),
        }
    }

    fn insert_cached(&self, avc: ObjectDigest, git: ObjectDigest) {
        let mut map = self.map.lock().expect("digest map mutex poisoned");
        map.insert(avc, git);
    }

    fn translate(&self, digest: ObjectDigest, target_kind: DigestKind) -> Result<ObjectDigest, AvcError> {
        if digest.kind() == target_kind {
            return Ok(digest);
        }
        let (source_store, target_store) = match target_kind {
            DigestKind::Sha1 => (self.avc_store, self.git_store),
            DigestKind::Blake3 => (self.git_store, self.avc_store),
        };

        if let Some(cached) = self.cached(&digest, target_kind) {
            if target_store.exists(&cached) {
                return Ok(cached);
            }
        }

        let (object_type, payload) = source_store.load_object(&digest)?;
        let translated = match object_type {
            ObjectType::Blob => {
                let blob = Blob::from_payload(&payload, digest)?;
                target_store.store_object(ObjectType::Blob, &blob.data, false)?
            }
            ObjectType::Tree => {
                let tree = Tree::from_payload(&payload, digest)?;
                let mut translated_items = Vec::with_capacity(tree.tree_items.len());
                for item in &tree.tree_items {
                    let child_digest = self.translate(item.id, target_kind)?;
                    translated_items.push(TreeItem::new(item.mode, child_digest, item.name.clone()));
                }
                let placeholder = ObjectDigest::of_kind(target_kind, b"");
                let translated_tree = Tree::from_tree_items(translated_items, placeholder)?;
                target_store.store_object(ObjectType::Tree, &translated_tree.to_payload()?, false)?
            }
            ObjectType::Commit => {
                let commit = Commit::from_payload(&payload, digest)?;
                let tree_id = self.translate(commit.tree_id, target_kind)?;
                let mut parents = Vec::with_capacity(commit.parent_commit_ids.len());
                for parent in &commit.parent_commit_ids {
                    parents.push(self.translate(*parent, target_kind)?);
                }
                let translated_commit = Commit::new(
                    normalize_signature(&commit.author),
                    normalize_signature(&commit.committer),
                    tree_id,
                    parents,
                    &commit.message,
                )?;
                target_store.store_object(ObjectType::Commit, &translated_commit.to_payload()?, false)?
            }
        };

        match target_kind {
            DigestKind::Sha1 => self.insert_cached(digest, translated),
            DigestKind::Blake3 => self.insert_cached(translated, digest),
        }
        debug!(source = %digest, target = %translated, "bridge translated object");
        Ok(translated)
    }

    /// Like `translate`, but never writes to `target_store` — used by
    /// `verify_git` to check whether the map's recorded digest still
    /// matches what translation would produce today.
    fn expected_target_digest(&self, digest: ObjectDigest, target_kind: DigestKind) -> Result<ObjectDigest, AvcError> {
        if digest.kind() == target_kind {
            return Ok(digest);
        }
        let source_store = match target_kind {
            DigestKind::Sha1 => self.avc_store,
            DigestKind::Blake3 => self.git_store,
        };

        let (object_type, payload) = source_store.load_object(&digest)?;
        match object_type {
            ObjectType::Blob => {
                let blob = Blob::from_payload(&payload, digest)?;
                Ok(ObjectDigest::of_kind(target_kind, &frame(ObjectType::Blob, &blob.data)))
            }
            ObjectType::Tree => {
                let tree = Tree::from_payload(&payload, digest)?;
                let mut items = Vec::with_capacity(tree.tree_items.len());
                for item in &tree.tree_items {
                    let child = match self.cached(&item.id, target_kind) {
                        Some(cached) => cached,
                        None => self.expected_target_digest(item.id, target_kind)?,
                    };
                    items.push(TreeItem::new(item.mode, child, item.name.clone()));
                }
                let placeholder = ObjectDigest::of_kind(target_kind, b"");
                let translated = Tree::from_tree_items(items, placeholder)?;
                Ok(ObjectDigest::of_kind(
                    target_kind,
                    &frame(ObjectType::Tree, &translated.to_payload()?),
                ))
            }
            ObjectType::Commit => {
                let commit = Commit::from_payload(&payload, digest)?;
                let tree_id = match self.cached(&commit.tree_id, target_kind) {
                    Some(cached) => cached,
                    None => self.expected_target_digest(commit.tree_id, target_kind)?,
                };
                let mut parents = Vec::with_capacity(commit.parent_commit_ids.len());
                for parent in &commit.parent_commit_ids {
                    parents.push(match self.cached(parent, target_kind) {
                        Some(cached) => cached,
                        None => self.expected_target_digest(*parent, target_kind)?,
                    });
                }
                let translated = Commit::new(
                    normalize_signature(&commit.author),
                    normalize_signature(&commit.committer),
                    tree_id,
                    parents,
                    &commit.message,
                )?;
                Ok(translated.id)
            }
        }
    }
}
