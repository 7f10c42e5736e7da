#![allow(deprecated)] // cargo_bin! macro doesn't exist yet in assert_cmd 2.1

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

const TEST_PASSWORD: &str = "test-password-123";

/// Holds the temp directory alive for the duration of a test.
struct TestStore {
    temp: TempDir,
}

impl TestStore {
    fn new() -> Self {
        let store = Self {
            temp: TempDir::new().expect("Failed to create temp dir"),
        };
        store.cmd().arg("init").arg(store.path()).assert().success();
        store
    }

    fn path(&self) -> PathBuf {
        self.temp.path().join("store")
    }

    fn config_path(&self) -> PathBuf {
        self.temp.path().join("config.toml")
    }

    fn cmd(&self) -> Command {
        let mut cmd = oxvfs_no_password(&self.config_path());
        cmd.env("OXVFS_PASSWORD", TEST_PASSWORD);
        cmd
    }

    fn run(&self, args: &[&str]) -> Command {
        let mut cmd = self.cmd();
        cmd.arg(args[0]).arg(self.path()).args(&args[1..]);
        cmd
    }

    fn write(&self, path: &str, content: &[u8]) {
        self.run(&["write", path])
            .write_stdin(content.to_vec())
            .assert()
            .success();
    }
}

fn oxvfs_no_password(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("oxvfs").unwrap();
    cmd.env("OXVFS_FAST_KDF", "1");
    cmd.env("OXVFS_CONFIG", config);
    cmd.env_remove("OXVFS_PASSWORD");
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_init_creates_store_files() {
    let store = TestStore::new();
    assert!(store.path().join("filesystem.config").is_file());
    assert!(store.path().join("filesystem.root").is_file());
    assert!(store.path().join("filesystem.credential").is_file());
}

#[test]
fn test_init_twice_fails() {
    let store = TestStore::new();
    store
        .cmd()
        .arg("init")
        .arg(store.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn test_init_rejects_tiny_page_size() {
    let temp = TempDir::new().unwrap();
    let mut cmd = oxvfs_no_password(&temp.path().join("config.toml"));
    cmd.env("OXVFS_PASSWORD", TEST_PASSWORD)
        .arg("init")
        .arg(temp.path().join("store"))
        .args(["--page-size", "16"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("page size"));
}

#[test]
fn test_write_then_cat() {
    let store = TestStore::new();
    store.write("/hello.txt", b"hello world");

    store
        .run(&["cat", "/hello.txt"])
        .assert()
        .success()
        .stdout("hello world");
}

#[test]
fn test_write_replaces_content() {
    let store = TestStore::new();
    store.write("/note.txt", b"first version, quite long");
    store.write("/note.txt", b"second");

    store
        .run(&["cat", "note.txt"])
        .assert()
        .success()
        .stdout("second");
}

#[test]
fn test_write_spanning_many_pages() {
    let temp = TempDir::new().unwrap();
    let store_path = temp.path().join("store");
    let config = temp.path().join("config.toml");

    oxvfs_no_password(&config)
        .env("OXVFS_PASSWORD", TEST_PASSWORD)
        .arg("init")
        .arg(&store_path)
        .args(["--page-size", "32768"])
        .assert()
        .success();

    let content: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    oxvfs_no_password(&config)
        .env("OXVFS_PASSWORD", TEST_PASSWORD)
        .arg("write")
        .arg(&store_path)
        .arg("/blob.bin")
        .write_stdin(content.clone())
        .assert()
        .success();

    oxvfs_no_password(&config)
        .env("OXVFS_PASSWORD", TEST_PASSWORD)
        .arg("cat")
        .arg(&store_path)
        .arg("/blob.bin")
        .assert()
        .success()
        .stdout(content);
}

#[test]
fn test_mkdir_and_ls() {
    let store = TestStore::new();
    store.run(&["mkdir", "/docs"]).assert().success();
    store.write("/docs/a.txt", b"a");
    store.write("/top.txt", b"top");

    store
        .run(&["ls", "/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("docs/"))
        .stdout(predicate::str::contains("top.txt"));

    store
        .run(&["ls", "/docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a.txt"));
}

#[test]
fn test_mkdir_parents() {
    let store = TestStore::new();
    store.run(&["mkdir", "/a/b/c"]).assert().failure();
    store.run(&["mkdir", "-p", "/a/b/c"]).assert().success();

    store
        .run(&["tree", "/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a/"))
        .stdout(predicate::str::contains("c/"));
}

#[test]
fn test_ls_json() {
    let store = TestStore::new();
    store.write("/image.png", b"\x89PNG\r\n\x1a\n0000");

    let output = store.run(&["ls", "--json", "/"]).output().unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = parsed["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "image.png");
    assert_eq!(entries[0]["content_type"], "image/png");
}

#[test]
fn test_ls_long() {
    let store = TestStore::new();
    store.write("/data.txt", b"some text");

    store
        .run(&["ls", "-l", "/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("data.txt"))
        .stdout(predicate::str::contains("9B"));
}

#[test]
fn test_mv_into_directory() {
    let store = TestStore::new();
    store.run(&["mkdir", "/d"]).assert().success();
    store.write("/f", b"payload");

    store.run(&["mv", "/f", "/d"]).assert().success();

    store.run(&["cat", "/d/f"]).assert().success().stdout("payload");
    store
        .run(&["cat", "/f"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_mv_rename_and_move() {
    let store = TestStore::new();
    store.run(&["mkdir", "/archive"]).assert().success();
    store.write("/draft.txt", b"v1");

    store
        .run(&["mv", "/draft.txt", "/archive/final.txt"])
        .assert()
        .success();

    store
        .run(&["cat", "/archive/final.txt"])
        .assert()
        .success()
        .stdout("v1");
}

#[test]
fn test_mv_onto_existing_file_fails() {
    let store = TestStore::new();
    store.write("/a", b"a");
    store.write("/b", b"b");

    store
        .run(&["mv", "/a", "/b"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_rm_file_and_force() {
    let store = TestStore::new();
    store.write("/gone.txt", b"bye");

    store.run(&["rm", "/gone.txt"]).assert().success();
    store.run(&["cat", "/gone.txt"]).assert().code(7);
    store.run(&["rm", "/gone.txt"]).assert().code(7);
    store.run(&["rm", "-f", "/gone.txt"]).assert().success();
}

#[test]
fn test_rm_directory_requires_recursive() {
    let store = TestStore::new();
    store.run(&["mkdir", "-p", "/dir/sub"]).assert().success();
    store.write("/dir/sub/file", b"x");

    store
        .run(&["rm", "/dir"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not empty"));

    store.run(&["rm", "-r", "/dir"]).assert().success();
    store.run(&["ls", "/dir"]).assert().code(7);
}

#[test]
fn test_info_reports_config_and_stats() {
    let store = TestStore::new();
    store.run(&["mkdir", "/d"]).assert().success();
    store.write("/d/file.txt", b"hello");

    let output = store.run(&["info", "--json"]).output().unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["format"], 1);
    assert_eq!(parsed["page_size"], 1024 * 1024);
    assert_eq!(parsed["kdf"]["log2_n"], 10);
    assert_eq!(parsed["stats"]["files"], 1);
    assert_eq!(parsed["stats"]["directories"], 2);
    assert_eq!(parsed["stats"]["total_size"], 5);

    store
        .run(&["info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Page size"));
}

#[test]
fn test_info_for_path() {
    let store = TestStore::new();
    store.write("/doc.pdf", b"%PDF-1.7 rest");

    let output = store.run(&["info", "--json", "/doc.pdf"]).output().unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["name"], "doc.pdf");
    assert_eq!(parsed["size"], 13);
    assert_eq!(parsed["content_type"], "application/pdf");
}

#[test]
fn test_write_with_thumbnail() {
    let store = TestStore::new();
    let thumb = store.temp.path().join("thumb.bin");
    std::fs::write(&thumb, b"tiny preview").unwrap();

    store
        .run(&["write", "/photo.jpg", "--thumbnail"])
        .arg(&thumb)
        .write_stdin(b"\xff\xd8\xff\xe0 jpeg".to_vec())
        .assert()
        .success();

    let output = store.run(&["info", "--json", "/photo.jpg"]).output().unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["has_thumbnail"], true);
}

#[test]
fn test_wrong_password_exit_code() {
    let store = TestStore::new();
    store.write("/secret.txt", b"classified");
    let before = std::fs::read(store.path().join("filesystem.root")).unwrap();

    oxvfs_no_password(&store.config_path())
        .env("OXVFS_PASSWORD", "wrong-password")
        .arg("cat")
        .arg(store.path())
        .arg("/secret.txt")
        .assert()
        .code(3)
        .stdout(predicate::str::is_empty());

    let after = std::fs::read(store.path().join("filesystem.root")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_password_stdin() {
    let store = TestStore::new();
    store.write("/s.txt", b"via stdin");

    oxvfs_no_password(&store.config_path())
        .arg("--password-stdin")
        .arg("cat")
        .arg(store.path())
        .arg("/s.txt")
        .write_stdin(format!("{TEST_PASSWORD}\n"))
        .assert()
        .success()
        .stdout("via stdin");
}

#[test]
fn test_uninitialized_directory_rejected() {
    let temp = TempDir::new().unwrap();

    oxvfs_no_password(&temp.path().join("config.toml"))
        .env("OXVFS_PASSWORD", TEST_PASSWORD)
        .arg("ls")
        .arg(temp.path())
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Not an oxvfs store"));

    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn test_missing_store_path() {
    let temp = TempDir::new().unwrap();

    oxvfs_no_password(&temp.path().join("config.toml"))
        .env("OXVFS_PASSWORD", TEST_PASSWORD)
        .arg("ls")
        .arg(temp.path().join("nowhere"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_quiet_suppresses_error_output() {
    let store = TestStore::new();

    store
        .cmd()
        .arg("-q")
        .arg("cat")
        .arg(store.path())
        .arg("/missing")
        .assert()
        .code(7)
        .stderr(predicate::str::is_empty());
}

#[test]
#[serial]
fn test_store_alias_and_default_page_size() {
    let store = TestStore::new();
    let aliased = store.temp.path().join("aliased");
    std::fs::write(
        store.config_path(),
        format!(
            "[defaults]\npage_size = 65536\n\n[stores.work]\npath = \"{}\"\n",
            aliased.display()
        ),
    )
    .unwrap();

    store.cmd().args(["init", "@work"]).assert().success();
    store
        .cmd()
        .args(["write", "@work", "/x"])
        .write_stdin(b"aliased".to_vec())
        .assert()
        .success();

    let output = store.cmd().args(["info", "--json", "@work"]).output().unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["page_size"], 65536);

    store
        .cmd()
        .args(["ls", "@nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown store alias"));
}
