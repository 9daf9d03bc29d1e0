//! Commit objects: a root tree digest, zero or more parent commit
//! digests, author/committer signatures, and a free-form message.

use std::fmt::{self, Display};
use std::str::FromStr;

use bstr::ByteSlice;

use crate::errors::AvcError;
use crate::hash::ObjectDigest;
use crate::internal::object::signature::Signature;
use crate::internal::object::types::ObjectType;
use crate::internal::object::ObjectTrait;

#[derive(Clone, Debug)]
pub struct Commit {
    pub id: ObjectDigest,
    pub tree_id: ObjectDigest,
    pub parent_commit_ids: Vec<ObjectDigest>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Commit {}

impl Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "tree {}", self.tree_id)?;
        for parent in &self.parent_commit_ids {
            writeln!(f, "parent {parent}")?;
        }
        writeln!(f, "author {}", self.author)?;
        writeln!(f, "committer {}", self.committer)?;
        writeln!(f)?;
        write!(f, "{}", self.message)
    }
}

impl Commit {
    pub fn new(
        author: Signature,
        committer: Signature,
        tree_id: ObjectDigest,
        parent_commit_ids: Vec<ObjectDigest>,
        message: &str,
    ) -> Result<Commit, AvcError> {
        let kind = tree_id.kind();
        let mut commit = Commit {
            id: ObjectDigest::of_kind(kind, b""),
            tree_id,
            parent_commit_ids,
            author,
            committer,
            message: message.to_string(),
        };
        commit.id = commit.digest(kind)?;
        Ok(commit)
    }

    /// Returns the first non-empty line of the message, which is Git's
    /// convention for a one-line commit summary.
    pub fn format_message(&self) -> String {
        self.message
            .lines()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.to_owned())
            .unwrap_or_else(|| self.message.clone())
    }
}

impl ObjectTrait for Commit {
    fn from_payload(data: &[u8], digest: ObjectDigest) -> Result<Self, AvcError> {
        let tree_end = data
            .find_byte(b'\n')
            .ok_or_else(|| AvcError::InvalidCommitObject("missing tree line".to_string()))?;
        let tree_line = data[..tree_end]
            .to_str()
            .map_err(|_| AvcError::InvalidCommitObject("non-utf8 tree line".to_string()))?;
        let tree_hex = tree_line
            .strip_prefix("tree ")
            .ok_or_else(|| AvcError::InvalidCommitObject("missing `tree` header".to_string()))?;
        let tree_id = ObjectDigest::from_str(tree_hex)?;

        let mut cursor = &data[tree_end + 1..];
        let mut parent_commit_ids = Vec::new();
        loop {
            let line_end = cursor
                .find_byte(b'\n')
                .ok_or_else(|| AvcError::InvalidCommitObject("missing author line".to_string()))?;
            let line = cursor[..line_end]
                .to_str()
                .map_err(|_| AvcError::InvalidCommitObject("non-utf8 header line".to_string()))?;
            if let Some(hex) = line.strip_prefix("parent ") {
                parent_commit_ids.push(ObjectDigest::from_str(hex)?);
                cursor = &cursor[line_end + 1..];
            } else {
                break;
            }
        }

        let author_end = cursor
            .find_byte(b'\n')
            .ok_or_else(|| AvcError::InvalidCommitObject("missing author line".to_string()))?;
        let author_line = cursor[..author_end]
            .to_str()
            .map_err(|_| AvcError::InvalidCommitObject("non-utf8 author line".to_string()))?;
        let author_fields = author_line
            .strip_prefix("author ")
            .ok_or_else(|| AvcError::InvalidCommitObject("missing `author` header".to_string()))?;
        let author = Signature::from_data(author_fields)?;
        cursor = &cursor[author_end + 1..];

        let committer_end = cursor
            .find_byte(b'\n')
            .ok_or_else(|| AvcError::InvalidCommitObject("missing committer line".to_string()))?;
        let committer_line = cursor[..committer_end]
            .to_str()
            .map_err(|_| AvcError::InvalidCommitObject("non-utf8 committer line".to_string()))?;
        let committer_fields = committer_line.strip_prefix("committer ").ok_or_else(|| {
            AvcError::InvalidCommitObject("missing `committer` header".to_string())
        })?;
        let committer = Signature::from_data(committer_fields)?;
        cursor = &cursor[committer_end + 1..];

        let message = if cursor.first() == Some(&b'\n') {
            String::from_utf8_lossy(&cursor[1..]).into_owned()
        } else {
            String::from_utf8_lossy(cursor).into_owned()
        };

        Ok(Commit {
            id: digest,
            tree_id,
            parent_commit_ids,
            author,
            committer,
            message,
        })
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn to_payload(&self) -> Result<Vec<u8>, AvcError> {
        let mut data = Vec::new();

        data.extend(b"tree ");
        data.extend(self.tree_id.to_string().as_bytes());
        data.push(b'\n');

        for parent in &self.parent_commit_ids {
            data.extend(b"parent ");
            data.extend(parent.to_string().as_bytes());
            data.push(b'\n');
        }

        data.extend(b"author ");
        data.extend(self.author.to_data());
        data.push(b'\n');
        data.extend(b"committer ");
        data.extend(self.committer.to_data());
        data.push(b'\n');
        data.push(b'\n');
        data.extend(self.message.as_bytes());

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: &str, email: &str, ts: i64) -> Signature {
        Signature::new(name.to_string(), email.to_string(), ts, "+0000".to_string())
    }

    #[test]
    fn round_trips_through_payload() {
        let tree_id = ObjectDigest::blake3(b"tree 0\0");
        let commit = Commit::new(
            sig("Ada", "ada@example.com", 1_700_000_000),
            sig("Ada", "ada@example.com", 1_700_000_000),
            tree_id,
            vec![],
            "initial commit\n",
        )
        .unwrap();

        let payload = commit.to_payload().unwrap();
        let reparsed = Commit::from_payload(&payload, commit.id).unwrap();
        assert_eq!(reparsed.tree_id, commit.tree_id);
        assert_eq!(reparsed.author, commit.author);
        assert_eq!(reparsed.committer, commit.committer);
        assert_eq!(reparsed.message, commit.message);
    }

    #[test]
    fn carries_multiple_parents() {
        let tree_id = ObjectDigest::blake3(b"tree 0\0");
        let p1 = ObjectDigest::blake3(b"commit 1\0a");
        let p2 = ObjectDigest::blake3(b"commit 1\0b");
        let commit = Commit::new(
            sig("Ada", "ada@example.com", 1),
            sig("Ada", "ada@example.com", 1),
            tree_id,
            vec![p1, p2],
            "merge\n",
        )
        .unwrap();
        let payload = commit.to_payload().unwrap();
        let reparsed = Commit::from_payload(&payload, commit.id).unwrap();
        assert_eq!(reparsed.parent_commit_ids, vec![p1, p2]);
    }

    #[test]
    fn format_message_returns_first_nonblank_line() {
        let tree_id = ObjectDigest::blake3(b"tree 0\0");
        let commit = Commit::new(
            sig("Ada", "ada@example.com", 1),
            sig("Ada", "ada@example.com", 1),
            tree_id,
            vec![],
            "\nsummary line\n\nbody\n",
        )
        .unwrap();
        assert_eq!(commit.format_message(), "summary line");
    }
}
