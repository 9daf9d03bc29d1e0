//! Object type enumeration shared by the object and store layers to tag
//! framed object bytes.

use std::fmt::{self, Display};

use crate::errors::AvcError;

/// Each object is framed as `type SP ascii_decimal_size NUL payload`
/// before hashing; `ObjectType` identifies the `type` token.
///
/// * `Blob`: stores the content of a file.
/// * `Tree`: represents a directory — an ordered set of `{mode, name,
///   child-digest}` entries.
/// * `Commit`: a point-in-time snapshot referencing a root `Tree` and zero
///   or more parent commits.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
}

const BLOB_OBJECT_TYPE: &[u8] = b"blob";
const TREE_OBJECT_TYPE: &[u8] = b"tree";
const COMMIT_OBJECT_TYPE: &[u8] = b"commit";

impl Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObjectType::Blob => write!(f, "blob"),
            ObjectType::Tree => write!(f, "tree"),
            ObjectType::Commit => write!(f, "commit"),
        }
    }
}

impl ObjectType {
    /// The ASCII bytes used as the `type` token in the frame header.
    pub fn to_bytes(self) -> &'static [u8] {
        match self {
            ObjectType::Blob => BLOB_OBJECT_TYPE,
            ObjectType::Tree => TREE_OBJECT_TYPE,
            ObjectType::Commit => COMMIT_OBJECT_TYPE,
        }
    }

    /// Parse a frame header's `type` token.
    pub fn from_str_token(s: &str) -> Result<ObjectType, AvcError> {
        match s {
            "blob" => Ok(ObjectType::Blob),
            "tree" => Ok(ObjectType::Tree),
            "commit" => Ok(ObjectType::Commit),
            _ => Err(AvcError::InvalidObjectType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes_and_str() {
        for ty in [ObjectType::Blob, ObjectType::Tree, ObjectType::Commit] {
            let token = std::str::from_utf8(ty.to_bytes()).unwrap();
            assert_eq!(ObjectType::from_str_token(token).unwrap(), ty);
        }
    }

    #[test]
    fn unknown_token_is_rejected() {
        assert!(ObjectType::from_str_token("snapshot").is_err());
    }
}
