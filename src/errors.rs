//! Error types for the AVC engine.
//!
//! This module defines a unified error enumeration used across object
//! storage, the staging index, the snapshot engine, ref handling, and the
//! dual-store bridge. It integrates with `thiserror` to provide rich
//! `Display` implementations and error source chaining where applicable.
//!
//! Notes:
//! - Each variant carries contextual details via its message payload.
//! - Variants cover parse/validation, I/O, and cross-store conversion.

use thiserror::Error;

#[derive(Error, Debug)]
/// Unified error enumeration for the AVC engine.
///
/// - Used across object parsing, the staging index, the snapshot engine,
///   ref storage, and the AVC/Git bridge.
/// - Implements `std::error::Error` via `thiserror`.
pub enum AvcError {
    /// Operation requires a repository that is not present.
    #[error("not an AVC repository (or any parent up to the filesystem root)")]
    RepoMissing,

    /// Absolute, parent-escaping, or `.avc`/`.git`-prefixed path.
    #[error("invalid path `{0}`")]
    PathInvalid(String),

    /// Invalid or unsupported object type name.
    #[error("The `{0}` is not a valid object type.")]
    InvalidObjectType(String),

    /// Malformed tree object.
    #[error("Not a valid tree object: {0}")]
    InvalidTreeObject(String),

    /// Invalid tree entry (mode/name/digest).
    #[error("The `{0}` is not a valid tree item.")]
    InvalidTreeItem(String),

    /// Duplicate entry name within a single tree directory.
    #[error("duplicate tree entry name `{0}`")]
    DuplicateTreeEntry(String),

    /// Malformed commit object.
    #[error("Not a valid commit object: {0}")]
    InvalidCommitObject(String),

    /// Malformed commit signature (author/committer line).
    #[error("The `{0}` is not a valid signature line.")]
    InvalidSignature(String),

    /// Referenced digest has no object file.
    #[error("Can't find specific object: {0}")]
    ObjectNotFound(String),

    /// Decompression or frame-parse failure.
    #[error("corrupt object {0}: {1}")]
    ObjectCorrupt(String, String),

    /// Concurrent-process write observed (stale temp file, failed rename).
    #[error("index conflict: {0}")]
    IndexConflict(String),

    /// Branch file absent but HEAD refers to it.
    #[error("ref not found: {0}")]
    RefMissing(String),

    /// Unknown on-disk repository format version.
    #[error("unsupported repository format: {0}")]
    FormatUnsupported(String),

    /// Sub-object conversion returned an error during bridge translation.
    #[error("bridge conversion failed for {0}: {1}")]
    BridgeConversionFailure(String, String),

    /// Nothing staged for a commit.
    #[error("nothing to commit")]
    NothingToCommit,

    /// Restore target has no parent to resolve `HEAD~1` against.
    #[error("{0} has no parent")]
    NoParent(String),

    /// Invalid hash formatting or length.
    #[error("`{0}` is not a valid digest")]
    InvalidDigest(String),

    /// Invalid CLI-surface or function argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// External `git` subprocess failed.
    #[error("git subprocess failed: {0}")]
    GitSubprocess(String),

    /// I/O error from the underlying filesystem.
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AvcError>;
