//! Integration tests for the fsindex scanner.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

use fsindex_indexer::{ExclusionMatcher, ScanOptions, Scanner};

/// Helper to write a file whose mtime lies outside the stability window
fn write_old(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
    let then = SystemTime::now() - Duration::from_secs(100);
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(then)
        .unwrap();
}

fn scanner(patterns: &[&str]) -> Scanner {
    Scanner::with_options(
        ScanOptions {
            root_name: "test".to_string(),
            stability_window: Duration::from_secs(30),
        },
        Arc::new(ExclusionMatcher::new(patterns.iter().copied()).unwrap()),
    )
}

/// Test that every stable file in a small tree is emitted exactly once
#[test]
fn test_scan_directory() {
    let temp_dir = tempdir().unwrap();

    for i in 0..5 {
        write_old(
            &temp_dir.path().join(format!("test{}.txt", i)),
            &format!("content {}", i),
        );
    }
    let subdir = temp_dir.path().join("subdir");
    fs::create_dir(&subdir).unwrap();
    write_old(&subdir.join("subfile.py"), "python code");

    let scan_id = 1_700_000_000_000;
    let (records, counters) = scanner(&[]).scan_all(temp_dir.path(), scan_id);

    assert_eq!(records.len(), 6);
    assert_eq!(counters.files_scanned, 6);
    assert_eq!(counters.errors, 0);

    let basenames: Vec<_> = records.iter().map(|r| r.basename.as_str()).collect();
    for i in 0..5 {
        assert!(basenames.contains(&format!("test{}.txt", i).as_str()));
    }
    assert!(basenames.contains(&"subfile.py"));

    let extensions: Vec<_> = records.iter().map(|r| r.ext.as_str()).collect();
    assert!(extensions.contains(&"txt"));
    assert!(extensions.contains(&"py"));

    assert!(records.iter().all(|r| r.seen_at == scan_id));

    let nested = records.iter().find(|r| r.basename == "subfile.py").unwrap();
    assert_eq!(nested.dirpath, subdir.to_string_lossy());
}

/// Test scanning filenames with characters that need escaping downstream
#[test]
fn test_scan_directory_with_special_filenames() {
    let temp_dir = tempdir().unwrap();
    let special_files = [
        "file with spaces.txt",
        "file's with apostrophe.txt",
        "file-with-dashes.txt",
        "file_with_underscores.txt",
    ];
    for name in &special_files {
        write_old(&temp_dir.path().join(name), "test content");
    }

    let (records, _) = scanner(&[]).scan_all(temp_dir.path(), 1);

    assert_eq!(records.len(), special_files.len());
    let basenames: Vec<_> = records.iter().map(|r| r.basename.as_str()).collect();
    for name in &special_files {
        assert!(basenames.contains(name), "missing {name}");
    }
}

/// Test that exclusions, stability and nesting combine as expected
#[test]
fn test_scan_with_excludes_and_fresh_files() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();

    fs::create_dir_all(root.join("project/node_modules/lib")).unwrap();
    fs::create_dir_all(root.join("project/src")).unwrap();
    fs::create_dir_all(root.join(".git")).unwrap();

    write_old(&root.join("project/src/main.py"), "print()");
    write_old(&root.join("project/node_modules/lib/index.js"), "x");
    write_old(&root.join(".git/HEAD"), "ref");
    write_old(&root.join("debug.log"), "log");
    fs::write(root.join("project/src/fresh.py"), "still writing").unwrap();

    let (records, counters) =
        scanner(&["*.log", "**/node_modules/**", ".git"]).scan_all(root, 5);

    let basenames: Vec<_> = records.iter().map(|r| r.basename.as_str()).collect();
    assert_eq!(basenames, vec!["main.py"]);
    // debug.log (pattern) + fresh.py (stability); pruned dirs are not counted
    assert_eq!(counters.files_skipped, 2);
}

/// Test that two scans of an unchanged tree produce the same ids
#[test]
fn test_ids_are_stable_across_scans() {
    let temp_dir = tempdir().unwrap();
    write_old(&temp_dir.path().join("a.txt"), "a");
    write_old(&temp_dir.path().join("b.txt"), "b");

    let s = scanner(&[]);
    let (first, _) = s.scan_all(temp_dir.path(), 1);
    let (second, _) = s.scan_all(temp_dir.path(), 2);

    let mut first_ids: Vec<_> = first.iter().map(|r| r.id).collect();
    let mut second_ids: Vec<_> = second.iter().map(|r| r.id).collect();
    first_ids.sort();
    second_ids.sort();

    assert_eq!(first_ids, second_ids);
    assert!(second.iter().all(|r| r.seen_at == 2));
}

/// Test that an unreadable directory is counted and its siblings still scanned
#[test]
fn test_unreadable_directory_is_abandoned() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = tempdir().unwrap();
    let locked = temp_dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    write_old(&locked.join("secret.txt"), "s");
    write_old(&temp_dir.path().join("open.txt"), "o");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root ignores permission bits; nothing to observe then.
    let readable = fs::read_dir(&locked).is_ok();

    let (records, counters) = scanner(&[]).scan_all(temp_dir.path(), 1);

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    if !readable {
        let basenames: Vec<_> = records.iter().map(|r| r.basename.as_str()).collect();
        assert_eq!(basenames, vec!["open.txt"]);
        assert_eq!(counters.errors, 1);
    }
}
