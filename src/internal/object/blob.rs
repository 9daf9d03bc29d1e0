//! Blob objects: the raw content of a single file, with no name or mode
//! attached (those live in the tree entry that points at it).

use std::fmt::{self, Display};

use crate::errors::AvcError;
use crate::hash::ObjectDigest;
use crate::internal::object::types::ObjectType;
use crate::internal::object::ObjectTrait;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub id: ObjectDigest,
    pub data: Vec<u8>,
}

impl Blob {
    pub fn from_content(content: Vec<u8>, digest: ObjectDigest) -> Self {
        Blob {
            id: digest,
            data: content,
        }
    }
}

impl ObjectTrait for Blob {
    fn from_payload(data: &[u8], digest: ObjectDigest) -> Result<Self, AvcError> {
        Ok(Blob {
            id: digest,
            data: data.to_vec(),
        })
    }

    fn object_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn to_payload(&self) -> Result<Vec<u8>, AvcError> {
        Ok(self.data.clone())
    }
}

impl Display for Blob {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "blob {} ({} bytes)", self.id, self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_payload() {
        let digest = ObjectDigest::blake3(b"blob 3\0abc");
        let blob = Blob::from_payload(b"abc", digest).unwrap();
        assert_eq!(blob.to_payload().unwrap(), b"abc");
        assert_eq!(blob.object_type(), ObjectType::Blob);
    }

    #[test]
    fn frame_hashes_to_expected_sha1() {
        let blob = Blob::from_content(b"abc".to_vec(), ObjectDigest::sha1(b"blob 3\0abc"));
        let frame = blob.to_frame().unwrap();
        assert_eq!(frame, b"blob 3\0abc");
    }
}
