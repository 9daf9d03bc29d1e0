//! Digest utilities for AVC objects.
//!
//! Unlike the Git-internal ancestor of this module, the hash algorithm is
//! not a thread-local global: the AVC store always hashes with BLAKE3 and
//! the Git store always hashes with SHA-1, so every `ObjectDigest` simply
//! carries which of the two produced it. Callers pick the algorithm by
//! calling `ObjectDigest::blake3` or `ObjectDigest::sha1` explicitly, or by
//! asking an `ObjectStore` (which is itself bound to one `DigestKind`) to
//! hash on their behalf.

use std::fmt::Display;
use std::str::FromStr;

use crate::errors::AvcError;

/// Which digest algorithm produced an `ObjectDigest`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DigestKind {
    /// 64 lowercase hex characters, BLAKE3 — the AVC store's native digest.
    Blake3,
    /// 40 lowercase hex characters, SHA-1 — the Git store's digest.
    Sha1,
}

impl DigestKind {
    /// Byte length of the raw digest.
    pub const fn size(&self) -> usize {
        match self {
            DigestKind::Blake3 => 32,
            DigestKind::Sha1 => 20,
        }
    }

    /// Hex string length of the digest.
    pub const fn hex_len(&self) -> usize {
        match self {
            DigestKind::Blake3 => 64,
            DigestKind::Sha1 => 40,
        }
    }
}

/// A content digest over a framed object, tagged with the algorithm that
/// produced it. `Blake3` values key the AVC object store; `Sha1` values key
/// the Git object store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectDigest {
    Blake3([u8; 32]),
    Sha1([u8; 20]),
}

impl Display for ObjectDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.as_ref()))
    }
}

impl AsRef<[u8]> for ObjectDigest {
    fn as_ref(&self) -> &[u8] {
        match self {
            ObjectDigest::Blake3(bytes) => bytes.as_slice(),
            ObjectDigest::Sha1(bytes) => bytes.as_slice(),
        }
    }
}

/// Parse a hex digest, inferring the algorithm from its length (64 ⇒
/// BLAKE3, 40 ⇒ SHA-1) — both digests are lowercase hex text and
/// disambiguated purely by length.
impl FromStr for ObjectDigest {
    type Err = AvcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.len() {
            64 => {
                let bytes = hex::decode(s).map_err(|_| AvcError::InvalidDigest(s.to_string()))?;
                let mut h = [0u8; 32];
                h.copy_from_slice(&bytes);
                Ok(ObjectDigest::Blake3(h))
            }
            40 => {
                let bytes = hex::decode(s).map_err(|_| AvcError::InvalidDigest(s.to_string()))?;
                let mut h = [0u8; 20];
                h.copy_from_slice(&bytes);
                Ok(ObjectDigest::Sha1(h))
            }
            _ => Err(AvcError::InvalidDigest(s.to_string())),
        }
    }
}

impl ObjectDigest {
    pub fn kind(&self) -> DigestKind {
        match self {
            ObjectDigest::Blake3(_) => DigestKind::Blake3,
            ObjectDigest::Sha1(_) => DigestKind::Sha1,
        }
    }

    /// Hash raw bytes (already framed, e.g. `blob <size>\0<content>`) with
    /// BLAKE3.
    pub fn blake3(framed: &[u8]) -> ObjectDigest {
        let hash = blake3::hash(framed);
        ObjectDigest::Blake3(*hash.as_bytes())
    }

    /// Hash raw bytes (already framed) with SHA-1.
    pub fn sha1(framed: &[u8]) -> ObjectDigest {
        use sha1::Digest;
        let mut hasher = sha1::Sha1::new();
        hasher.update(framed);
        let digest: [u8; 20] = hasher.finalize().into();
        ObjectDigest::Sha1(digest)
    }

    /// Hash framed bytes with the given algorithm.
    pub fn of_kind(kind: DigestKind, framed: &[u8]) -> ObjectDigest {
        match kind {
            DigestKind::Blake3 => ObjectDigest::blake3(framed),
            DigestKind::Sha1 => ObjectDigest::sha1(framed),
        }
    }

    /// Construct a digest from raw bytes of the expected length for `kind`.
    pub fn from_bytes(kind: DigestKind, bytes: &[u8]) -> Result<ObjectDigest, AvcError> {
        if bytes.len() != kind.size() {
            return Err(AvcError::InvalidDigest(hex::encode(bytes)));
        }
        Ok(match kind {
            DigestKind::Blake3 => {
                let mut h = [0u8; 32];
                h.copy_from_slice(bytes);
                ObjectDigest::Blake3(h)
            }
            DigestKind::Sha1 => {
                let mut h = [0u8; 20];
                h.copy_from_slice(bytes);
                ObjectDigest::Sha1(h)
            }
        })
    }

    /// The two-character shard prefix and remaining hex suffix for
    /// `objects/<xx>/<rest>` sharding.
    pub fn shard_path(&self) -> (String, String) {
        let hex = self.to_string();
        (hex[..2].to_string(), hex[2..].to_string())
    }

    pub fn to_data(self) -> Vec<u8> {
        self.as_ref().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake3_matches_known_vector() {
        let digest = ObjectDigest::blake3(b"hello world");
        assert_eq!(
            digest.to_string(),
            blake3::hash(b"hello world").to_hex().to_string()
        );
        assert_eq!(digest.kind(), DigestKind::Blake3);
    }

    #[test]
    fn sha1_matches_known_vector() {
        // sha1("blob 3\0abc") == a9993e364706816aba3e25717850c26c9cd0d89d
        let digest = ObjectDigest::sha1(b"blob 3\0abc");
        assert_eq!(digest.to_string(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn from_str_infers_kind_by_length() {
        let sha1_hex = "a9993e364706816aba3e25717850c26c9cd0d89d";
        let blake3_hex = blake3::hash(b"x").to_hex().to_string();

        assert_eq!(
            ObjectDigest::from_str(sha1_hex).unwrap().kind(),
            DigestKind::Sha1
        );
        assert_eq!(
            ObjectDigest::from_str(&blake3_hex).unwrap().kind(),
            DigestKind::Blake3
        );
    }

    #[test]
    fn roundtrip_through_string() {
        let digest = ObjectDigest::blake3(b"payload");
        let parsed = ObjectDigest::from_str(&digest.to_string()).unwrap();
        assert_eq!(digest, parsed);
    }

    #[test]
    fn shard_path_splits_first_two_chars() {
        let digest = ObjectDigest::sha1(b"blob 3\0abc");
        let (prefix, rest) = digest.shard_path();
        assert_eq!(prefix, "a9");
        assert_eq!(rest, "993e364706816aba3e25717850c26c9cd0d89d");
    }
}
