//! Fixture tests exercising a full repository lifecycle against real
//! temp-directory filesystem state, the way the teacher crate's own
//! `tests/decode-index-pack.rs` exercised real fixture packs rather than
//! synthetic in-memory structures.

use std::fs;

use avc_core::repo::Repository;
use avc_core::snapshot::RestoreMode;
use tempfile::tempdir;

#[test]
fn init_add_commit_restore_round_trip() {
    let dir = tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/lib.rs"), b"pub fn answer() -> i32 { 42 }").unwrap();
    fs::write(dir.path().join("README.md"), b"# demo repository\n").unwrap();

    let (staged, warnings) = repo.add(&["src".to_string(), "README.md".to_string()], false, false).unwrap();
    assert!(warnings.is_empty());
    assert_eq!(staged.len(), 2);

    let first_commit = repo.commit("initial import\n").unwrap();
    assert_eq!(repo.log().unwrap().len(), 1);

    fs::write(dir.path().join("src/lib.rs"), b"pub fn answer() -> i32 { 43 }").unwrap();
    repo.add(&["src".to_string()], false, false).unwrap();
    let second_commit = repo.commit("bump the answer\n").unwrap();
    assert_ne!(first_commit, second_commit);
    assert_eq!(repo.log().unwrap().len(), 2);

    repo.reset("HEAD~1", RestoreMode::Hard, false).unwrap();
    let restored = fs::read_to_string(dir.path().join("src/lib.rs")).unwrap();
    assert!(restored.contains("42"));
    assert!(!restored.contains("43"));
}

#[test]
fn git_bridge_round_trips_a_commit() {
    let dir = tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    repo.git_init().unwrap();

    fs::write(dir.path().join("notes.txt"), b"bridged content").unwrap();
    repo.add(&["notes.txt".to_string()], false, false).unwrap();
    repo.commit("bridge me\n").unwrap();

    repo.sync_to_git().unwrap();
    let mismatches = repo.verify_git().unwrap();
    assert!(mismatches.is_empty(), "unexpected mismatches: {mismatches:?}");
}

/// A reduced but still meaningfully-parallel restore: hundreds of staged
/// files, not the ten-thousand-file scale a full stress test would use,
/// to keep this suite fast.
#[test]
fn hard_restore_parallelizes_over_hundreds_of_files() {
    let dir = tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    fs::create_dir_all(dir.path().join("data")).unwrap();
    let mut paths = Vec::new();
    for i in 0..300 {
        let name = format!("data/file-{i:04}.txt");
        fs::write(dir.path().join(&name), format!("payload {i}")).unwrap();
        paths.push(name);
    }

    repo.add(&["data".to_string()], false, false).unwrap();
    repo.commit("bulk import\n").unwrap();

    for path in &paths {
        fs::remove_file(dir.path().join(path)).unwrap();
    }

    repo.reset("HEAD", RestoreMode::Hard, false).unwrap();

    for (i, path) in paths.iter().enumerate() {
        let content = fs::read_to_string(dir.path().join(path)).unwrap();
        assert_eq!(content, format!("payload {i}"));
    }
}
