//! Tree objects: an ordered, flat list of `{mode, name, child digest}`
//! entries representing one directory level. Trees nest to form the
//! directory graph; the Bridge parses and re-emits both the AVC text
//! encoding and Git's binary encoding of this same structure.

use std::fmt::{self, Display};
use std::str::FromStr;

use bstr::ByteSlice;

use crate::errors::AvcError;
use crate::hash::{DigestKind, ObjectDigest};
use crate::internal::object::types::ObjectType;
use crate::internal::object::ObjectTrait;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeItemMode {
    Blob,
    BlobExecutable,
    Link,
    Tree,
}

impl TreeItemMode {
    /// The canonical mode token as Git itself writes it: no leading zero
    /// for directories, six digits for everything else.
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeItemMode::Blob => "100644",
            TreeItemMode::BlobExecutable => "100755",
            TreeItemMode::Link => "120000",
            TreeItemMode::Tree => "40000",
        }
    }

    /// The mode token as the AVC-native text encoding writes it: full
    /// six digits even for a subtree (`040000`, not Git's `40000`).
    pub fn as_avc_str(&self) -> &'static str {
        match self {
            TreeItemMode::Tree => "040000",
            other => other.as_str(),
        }
    }

    pub fn from_str_token(s: &str) -> Result<TreeItemMode, AvcError> {
        match s {
            "100644" => Ok(TreeItemMode::Blob),
            "100755" => Ok(TreeItemMode::BlobExecutable),
            "120000" => Ok(TreeItemMode::Link),
            "40000" | "040000" => Ok(TreeItemMode::Tree),
            _ => Err(AvcError::InvalidTreeItem(format!("unknown mode `{s}`"))),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            TreeItemMode::Tree => ObjectType::Tree,
            _ => ObjectType::Blob,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeItem {
    pub mode: TreeItemMode,
    pub name: String,
    pub id: ObjectDigest,
}

impl TreeItem {
    pub fn new(mode: TreeItemMode, id: ObjectDigest, name: String) -> Self {
        TreeItem { mode, id, name }
    }

    /// Git sorts tree entries as if directory names carried a trailing
    /// `/`; this key makes e.g. `foo` sort after `foo.c` but before
    /// `foo/bar`.
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.name.as_bytes().to_vec();
        if matches!(self.mode, TreeItemMode::Tree) {
            key.push(b'/');
        }
        key
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tree {
    pub id: ObjectDigest,
    pub tree_items: Vec<TreeItem>,
}

impl Tree {
    pub fn from_tree_items(mut tree_items: Vec<TreeItem>, digest: ObjectDigest) -> Result<Self, AvcError> {
        tree_items.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let mut names: Vec<&str> = tree_items.iter().map(|i| i.name.as_str()).collect();
        names.sort_unstable();
        for pair in names.windows(2) {
            if pair[0] == pair[1] {
                return Err(AvcError::DuplicateTreeEntry(pair[0].to_string()));
            }
        }
        Ok(Tree {
            id: digest,
            tree_items,
        })
    }

    /// AVC's own text encoding: one `octal-mode SP name SP hex-digest LF`
    /// line per entry, sorted byte-wise (see `sort_key`).
    pub fn to_avc_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for item in &self.tree_items {
            out.extend_from_slice(item.mode.as_avc_str().as_bytes());
            out.push(b' ');
            out.extend_from_slice(item.name.as_bytes());
            out.push(b' ');
            out.extend_from_slice(item.id.to_string().as_bytes());
            out.push(b'\n');
        }
        out
    }

    pub fn from_avc_bytes(data: &[u8], digest: ObjectDigest) -> Result<Self, AvcError> {
        let kind = digest.kind();
        let mut items = Vec::new();
        for line in data.split(|b| *b == b'\n') {
            if line.is_empty() {
                continue;
            }
            let line = line
                .to_str()
                .map_err(|_| AvcError::InvalidTreeItem("non-utf8 tree line".to_string()))?;
            let mut parts = line.splitn(3, ' ');
            let mode_tok = parts
                .next()
                .ok_or_else(|| AvcError::InvalidTreeItem(line.to_string()))?;
            let name = parts
                .next()
                .ok_or_else(|| AvcError::InvalidTreeItem(line.to_string()))?;
            let hex = parts
                .next()
                .ok_or_else(|| AvcError::InvalidTreeItem(line.to_string()))?;
            let mode = TreeItemMode::from_str_token(mode_tok)?;
            let child = ObjectDigest::from_str(hex)?;
            if child.kind() != kind {
                return Err(AvcError::InvalidTreeItem(format!(
                    "tree entry `{name}` digest kind mismatches tree's own store"
                )));
            }
            items.push(TreeItem::new(mode, child, name.to_string()));
        }
        Tree::from_tree_items(items, digest)
    }

    /// Git's binary encoding: `ascii-octal-mode SP name NUL raw-digest`
    /// repeated, sorted the same way Git sorts (trailing-slash for dirs).
    pub fn to_git_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for item in &self.tree_items {
            out.extend_from_slice(item.mode.as_str().as_bytes());
            out.push(b' ');
            out.extend_from_slice(item.name.as_bytes());
            out.push(0);
            out.extend_from_slice(item.id.as_ref());
        }
        out
    }

    pub fn from_git_bytes(data: &[u8], digest: ObjectDigest) -> Result<Self, AvcError> {
        let mut items = Vec::new();
        let mut cursor = data;
        while !cursor.is_empty() {
            let space = cursor
                .find_byte(b' ')
                .ok_or_else(|| AvcError::InvalidTreeObject("missing mode separator".to_string()))?;
            let mode_tok = cursor[..space]
                .to_str()
                .map_err(|_| AvcError::InvalidTreeItem("non-utf8 mode".to_string()))?;
            let mode = TreeItemMode::from_str_token(mode_tok)?;
            let rest = &cursor[space + 1..];
            let nul = rest
                .find_byte(0)
                .ok_or_else(|| AvcError::InvalidTreeObject("missing name terminator".to_string()))?;
            let name = rest[..nul]
                .to_str()
                .map_err(|_| AvcError::InvalidTreeItem("non-utf8 name".to_string()))?
                .to_string();
            let digest_len = DigestKind::Sha1.size();
            let digest_bytes = rest
                .get(nul + 1..nul + 1 + digest_len)
                .ok_or_else(|| AvcError::InvalidTreeObject("truncated entry digest".to_string()))?;
            let child = ObjectDigest::from_bytes(DigestKind::Sha1, digest_bytes)?;
            items.push(TreeItem::new(mode, child, name));
            cursor = &rest[nul + 1 + digest_len..];
        }
        Tree::from_tree_items(items, digest)
    }
}

impl ObjectTrait for Tree {
    fn from_payload(data: &[u8], digest: ObjectDigest) -> Result<Self, AvcError> {
        match digest.kind() {
            DigestKind::Blake3 => Tree::from_avc_bytes(data, digest),
            DigestKind::Sha1 => Tree::from_git_bytes(data, digest),
        }
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn to_payload(&self) -> Result<Vec<u8>, AvcError> {
        Ok(match self.id.kind() {
            DigestKind::Blake3 => self.to_avc_bytes(),
            DigestKind::Sha1 => self.to_git_bytes(),
        })
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tree {} ({} entries)", self.id, self.tree_items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, mode: TreeItemMode) -> TreeItem {
        TreeItem::new(mode, ObjectDigest::blake3(name.as_bytes()), name.to_string())
    }

    #[test]
    fn rejects_duplicate_entry_names() {
        let items = vec![item("a.txt", TreeItemMode::Blob), item("a.txt", TreeItemMode::Blob)];
        let err = Tree::from_tree_items(items, ObjectDigest::blake3(b"tree 0\0"));
        assert!(matches!(err, Err(AvcError::DuplicateTreeEntry(_))));
    }

    #[test]
    fn directories_sort_as_if_slash_terminated() {
        let items = vec![
            item("foo.c", TreeItemMode::Blob),
            item("foo", TreeItemMode::Tree),
        ];
        let tree = Tree::from_tree_items(items, ObjectDigest::blake3(b"tree 0\0")).unwrap();
        assert_eq!(tree.tree_items[0].name, "foo.c");
        assert_eq!(tree.tree_items[1].name, "foo");
    }

    #[test]
    fn avc_text_round_trips() {
        let items = vec![item("a", TreeItemMode::Blob), item("b", TreeItemMode::Tree)];
        let tree = Tree::from_tree_items(items, ObjectDigest::blake3(b"seed")).unwrap();
        let digest = ObjectDigest::blake3(&tree.to_avc_bytes());
        let reparsed = Tree::from_avc_bytes(&tree.to_avc_bytes(), digest).unwrap();
        assert_eq!(reparsed.tree_items, tree.tree_items);
    }

    #[test]
    fn avc_text_form_writes_six_digit_subtree_mode() {
        let items = vec![item("sub", TreeItemMode::Tree)];
        let tree = Tree::from_tree_items(items, ObjectDigest::blake3(b"seed")).unwrap();
        let text = String::from_utf8(tree.to_avc_bytes()).unwrap();
        assert!(text.starts_with("040000 sub "));
    }

    #[test]
    fn git_binary_round_trips() {
        let items = vec![
            TreeItem::new(TreeItemMode::Blob, ObjectDigest::sha1(b"blob 1\0a"), "a".to_string()),
            TreeItem::new(TreeItemMode::Tree, ObjectDigest::sha1(b"tree 0\0"), "b".to_string()),
        ];
        let tree = Tree::from_tree_items(items, ObjectDigest::sha1(b"seed")).unwrap();
        let bytes = tree.to_git_bytes();
        let digest = ObjectDigest::sha1(&bytes);
        let reparsed = Tree::from_git_bytes(&bytes, digest).unwrap();
        assert_eq!(reparsed.tree_items, tree.tree_items);
    }
}
