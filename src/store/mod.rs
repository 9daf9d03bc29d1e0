//! Sharded, content-addressed object storage: hashing, framing,
//! compression, atomic placement, and retrieval of typed immutable
//! objects.

pub mod compression;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::CompressionFormat;
use crate::errors::AvcError;
use crate::hash::{DigestKind, ObjectDigest};
use crate::internal::object::frame;
use crate::internal::object::types::ObjectType;
use crate::store::compression::{compress, decompress};

/// A single digest-kind, single-compression-format object store rooted at
/// a repository's `objects/` directory. Readers auto-detect compression
/// regardless of this instance's configured write format.
pub struct ObjectStore {
    root: PathBuf,
    digest_kind: DigestKind,
    compression: CompressionFormat,
}

impl ObjectStore {
    pub fn new(root: PathBuf, digest_kind: DigestKind, compression: CompressionFormat) -> Self {
        ObjectStore {
            root,
            digest_kind,
            compression,
        }
    }

    pub fn digest_kind(&self) -> DigestKind {
        self.digest_kind
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, digest: &ObjectDigest) -> PathBuf {
        let (prefix, rest) = digest.shard_path();
        self.root.join(prefix).join(rest)
    }

    /// Hash, frame, compress, and atomically write `payload` as an object
    /// of `object_type`. Idempotent: a pre-existing target is left alone.
    /// `fast` selects compression level 0 (store, no compression work) for
    /// maximum throughput instead of the mid-level default.
    pub fn store_object(&self, object_type: ObjectType, payload: &[u8], fast: bool) -> Result<ObjectDigest, AvcError> {
        let framed = frame(object_type, payload);
        let digest = ObjectDigest::of_kind(self.digest_kind, &framed);
        let path = self.object_path(&digest);
        if path.exists() {
            debug!(object = %digest, "object already present, skipping write");
            return Ok(digest);
        }
        let shard_dir = path
            .parent()
            .expect("sharded object path always has a parent directory");
        fs::create_dir_all(shard_dir)?;

        let compressed = compress(self.compression, &framed, fast)?;
        let mut tmp = tempfile::NamedTempFile::new_in(shard_dir)?;
        tmp.write_all(&compressed)?;
        tmp.persist(&path)
            .map_err(|e| AvcError::IndexConflict(e.to_string()))?;

        debug!(object = %digest, bytes = framed.len(), "wrote object");
        Ok(digest)
    }

    pub fn store_blob_from_file(&self, file_path: &Path, fast: bool) -> Result<ObjectDigest, AvcError> {
        let data = fs::read(file_path)?;
        self.store_object(ObjectType::Blob, &data, fast)
    }

    /// Read back an object's type and raw payload by digest.
    pub fn load_object(&self, digest: &ObjectDigest) -> Result<(ObjectType, Vec<u8>), AvcError> {
        let path = self.object_path(digest);
        let compressed = fs::read(&path).map_err(|_| AvcError::ObjectNotFound(digest.to_string()))?;
        let framed = decompress(&compressed, compressed.len() * 3)
            .map_err(|e| AvcError::ObjectCorrupt(digest.to_string(), e.to_string()))?;
        parse_frame(&framed).map_err(|e| AvcError::ObjectCorrupt(digest.to_string(), e.to_string()))
    }

    /// Compute the digest a file's content would hash to as a blob,
    /// without writing anything — used by the Scanner/staging path to
    /// detect unchanged files cheaply.
    pub fn hash_file(&self, file_path: &Path) -> Result<ObjectDigest, AvcError> {
        let data = fs::read(file_path)?;
        let framed = frame(ObjectType::Blob, &data);
        Ok(ObjectDigest::of_kind(self.digest_kind, &framed))
    }

    pub fn exists(&self, digest: &ObjectDigest) -> bool {
        self.object_path(digest).exists()
    }
}

fn parse_frame(framed: &[u8]) -> Result<(ObjectType, Vec<u8>), AvcError> {
    let space = framed
        .iter()
        .position(|b| *b == b' ')
        .ok_or_else(|| AvcError::InvalidObjectType("missing type token".to_string()))?;
    let type_token = std::str::from_utf8(&framed[..space])
        .map_err(|_| AvcError::InvalidObjectType("non-utf8 type token".to_string()))?;
    let object_type = ObjectType::from_str_token(type_token)?;

    let rest = &framed[space + 1..];
    let nul = rest
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| AvcError::InvalidObjectType("missing size terminator".to_string()))?;
    let size_str = std::str::from_utf8(&rest[..nul])
        .map_err(|_| AvcError::InvalidObjectType("non-utf8 size".to_string()))?;
    let size: usize = size_str
        .parse()
        .map_err(|_| AvcError::InvalidObjectType(format!("bad size `{size_str}`")))?;

    let payload = rest
        .get(nul + 1..nul + 1 + size)
        .ok_or_else(|| AvcError::InvalidObjectType("truncated payload".to_string()))?
        .to_vec();
    Ok((object_type, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(kind: DigestKind, format: CompressionFormat) -> ObjectStore {
        let dir = tempdir().unwrap();
        ObjectStore::new(dir.into_path(), kind, format)
    }

    #[test]
    fn store_and_load_round_trips() {
        let store = store(DigestKind::Blake3, CompressionFormat::ZstdV2);
        let digest = store.store_object(ObjectType::Blob, b"hello world", false).unwrap();
        let (object_type, payload) = store.load_object(&digest).unwrap();
        assert_eq!(object_type, ObjectType::Blob);
        assert_eq!(payload, b"hello world");
    }

    #[test]
    fn store_is_idempotent() {
        let store = store(DigestKind::Sha1, CompressionFormat::ZlibV1);
        let d1 = store.store_object(ObjectType::Blob, b"abc", false).unwrap();
        let d2 = store.store_object(ObjectType::Blob, b"abc", false).unwrap();
        assert_eq!(d1, d2);
    }

    #[test]
    fn reads_succeed_across_mixed_compression_formats() {
        let dir = tempdir().unwrap();
        let zlib_store = ObjectStore::new(dir.path().to_path_buf(), DigestKind::Sha1, CompressionFormat::ZlibV1);
        let zstd_store = ObjectStore::new(dir.path().to_path_buf(), DigestKind::Sha1, CompressionFormat::ZstdV2);

        let d1 = zlib_store.store_object(ObjectType::Blob, b"legacy", false).unwrap();
        let d2 = zstd_store.store_object(ObjectType::Blob, b"current", false).unwrap();

        assert_eq!(zlib_store.load_object(&d1).unwrap().1, b"legacy");
        assert_eq!(zstd_store.load_object(&d2).unwrap().1, b"current");
    }

    #[test]
    fn fast_mode_still_round_trips_and_is_independently_readable() {
        let store = store(DigestKind::Blake3, CompressionFormat::ZlibV1);
        let digest = store.store_object(ObjectType::Blob, b"quick", true).unwrap();
        assert_eq!(store.load_object(&digest).unwrap().1, b"quick");
    }

    #[test]
    fn missing_object_is_reported() {
        let store = store(DigestKind::Blake3, CompressionFormat::ZstdV2);
        let digest = ObjectDigest::blake3(b"blob 3\0xyz");
        assert!(matches!(store.load_object(&digest), Err(AvcError::ObjectNotFound(_))));
    }
}
