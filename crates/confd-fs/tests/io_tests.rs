use confd_fs::{RobustnessConfig, io};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_write_atomic_creates_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("test.txt");

    io::write_atomic(&path, b"hello world", RobustnessConfig::default()).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content, "hello world");
}

#[test]
fn test_write_atomic_overwrites_existing() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("test.txt");
    fs::write(&file_path, "original").unwrap();

    io::write_atomic(&file_path, b"updated", RobustnessConfig::default()).unwrap();

    let content = fs::read_to_string(&file_path).unwrap();
    assert_eq!(content, "updated");
}

#[test]
fn test_write_atomic_binary_content() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("blob.bin");
    let payload: Vec<u8> = (0..=255u8).collect();

    io::write_atomic(&file_path, &payload, RobustnessConfig::default()).unwrap();

    assert_eq!(fs::read(&file_path).unwrap(), payload);
}

#[test]
fn test_write_atomic_empty_content() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("empty.json");

    io::write_atomic(&file_path, b"", RobustnessConfig::default()).unwrap();

    assert!(file_path.is_file());
    assert_eq!(fs::metadata(&file_path).unwrap().len(), 0);
}

#[test]
fn test_write_atomic_without_fsync() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("fast.txt");
    let config = RobustnessConfig { enable_fsync: false };

    io::write_atomic(&file_path, b"no sync", config).unwrap();

    assert_eq!(fs::read_to_string(&file_path).unwrap(), "no sync");
}

#[test]
fn test_read_bytes_existing_file() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("test.txt");
    fs::write(&file_path, "hello").unwrap();

    assert_eq!(io::read_bytes(&file_path).unwrap(), b"hello");
}

#[test]
fn test_read_bytes_nonexistent_file() {
    let temp = TempDir::new().unwrap();
    let result = io::read_bytes(&temp.path().join("missing.txt"));
    assert!(matches!(result, Err(confd_fs::Error::Io { .. })));
}

#[test]
fn test_is_temp_file() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("app.json");
    assert!(io::is_temp_file(&io::temp_path_for(&target)));
    assert!(!io::is_temp_file(&target));
    assert!(!io::is_temp_file(&temp.path().join("cache.tmp")));
    assert!(!io::is_temp_file(&temp.path().join(".cache.tmp")));
}

#[test]
fn test_create_empty_makes_parents() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested/dir/app.json");

    assert!(io::create_empty(&path).unwrap());
    assert_eq!(fs::read(&path).unwrap(), Vec::<u8>::new());
}

#[test]
fn test_create_empty_never_truncates() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("app.json");
    fs::write(&path, r#"{"a":1}"#).unwrap();

    assert!(!io::create_empty(&path).unwrap());
    assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"a":1}"#);
}
