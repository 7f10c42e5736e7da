//! File system over the directory-backed store.

mod common;

use std::fs;
use std::io::Write;

use common::{TEST_PASSWORD, read_file, sized_content, test_options, write_file};
use oxvfs_core::vfs::{KEY_CONFIG, KEY_TREE};
use oxvfs_core::{FileSystem, LocalStore, VfsError};
use tempfile::TempDir;

fn open(dir: &TempDir) -> FileSystem {
    let store = LocalStore::open(dir.path()).expect("Failed to open store dir");
    FileSystem::open_with(store, TEST_PASSWORD, test_options(64)).expect("Failed to open")
}

#[test]
fn test_persists_across_instances() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let content = sized_content(1000);
    {
        let fs = open(&dir);
        fs.create_dir(&fs.root_id(), "docs").unwrap();
        write_file(&fs, "/docs/big.bin", &content);
    }

    assert!(dir.path().join(KEY_CONFIG).is_file());
    assert!(dir.path().join(KEY_TREE).is_file());

    let fs = open(&dir);
    assert_eq!(fs.page_size(), 64);
    assert_eq!(read_file(&fs, "/docs/big.bin"), content);
    assert_eq!(fs.stat("/docs/big.bin").unwrap().page_count, 1000usize.div_ceil(64));
}

#[test]
fn test_blobs_are_not_plaintext() {
    let dir = TempDir::new().unwrap();
    let fs = open(&dir);
    let mut handle = fs.create_file(&fs.root_id(), "secret.txt").unwrap();
    handle.write_all(b"the quick brown fox").unwrap();
    handle.close().unwrap();

    for entry in fs::read_dir(dir.path()).unwrap() {
        let path = entry.unwrap().path();
        if path.file_name().and_then(|n| n.to_str()) == Some(KEY_CONFIG) {
            continue;
        }
        let bytes = fs::read(&path).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(!text.contains("quick brown"), "{} leaks content", path.display());
        assert!(!text.contains("secret.txt"), "{} leaks names", path.display());
    }
}

#[test]
fn test_wrong_password_leaves_files_unchanged() {
    let dir = TempDir::new().unwrap();
    {
        let fs = open(&dir);
        write_file(&fs, "/a", b"abc");
    }
    let before = fs::read(dir.path().join(KEY_TREE)).unwrap();

    let store = LocalStore::open(dir.path()).unwrap();
    let err = FileSystem::open(store, "not the password").unwrap_err();
    assert!(matches!(err, VfsError::Auth));
    assert_eq!(fs::read(dir.path().join(KEY_TREE)).unwrap(), before);
}
