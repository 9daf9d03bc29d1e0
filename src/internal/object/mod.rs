//! Object model definitions for AVC blobs, trees, and commits, plus the
//! `ObjectTrait` that lets the store layer create strongly typed values
//! from raw framed bytes regardless of which digest algorithm produced
//! them.

pub mod blob;
pub mod commit;
pub mod signature;
pub mod tree;
pub mod types;

use std::fmt::Display;

use crate::errors::AvcError;
use crate::hash::{DigestKind, ObjectDigest};
use crate::internal::object::types::ObjectType;

/// Common interface for blobs, trees, and commits: (de)serialize the
/// object's payload (the bytes that follow the frame header) and report
/// the object's type.
pub trait ObjectTrait: Send + Sync + Display {
    /// Parse an object's payload bytes (the unframed content) into a typed
    /// value, given the digest that was computed over its full frame.
    fn from_payload(data: &[u8], digest: ObjectDigest) -> Result<Self, AvcError>
    where
        Self: Sized;

    fn object_type(&self) -> ObjectType;

    /// Serialize the object's payload (without the frame header).
    fn to_payload(&self) -> Result<Vec<u8>, AvcError>;

    /// Frame the payload as `type SP ascii_decimal_size NUL payload` — the
    /// exact bytes that get hashed and compressed by the object store.
    fn to_frame(&self) -> Result<Vec<u8>, AvcError> {
        let payload = self.to_payload()?;
        Ok(frame(self.object_type(), &payload))
    }

    /// Compute this object's digest under the given algorithm by framing
    /// and hashing its payload.
    fn digest(&self, kind: DigestKind) -> Result<ObjectDigest, AvcError> {
        Ok(ObjectDigest::of_kind(kind, &self.to_frame()?))
    }
}

/// Build the `type SP size NUL payload` frame shared by every object kind
/// and both stores (spec: "identical to Git's, enabling the Bridge to
/// translate by rehashing the same framed bytes under a different
/// algorithm").
pub fn frame(object_type: ObjectType, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(payload.len() + 16);
    data.extend_from_slice(object_type.to_bytes());
    data.push(b' ');
    data.extend_from_slice(payload.len().to_string().as_bytes());
    data.push(0);
    data.extend_from_slice(payload);
    data
}
