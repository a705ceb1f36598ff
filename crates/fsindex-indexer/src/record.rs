//! The indexed document shape.

use crate::scanner::compute_id;
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// Identifier of one scan pass. Every record upserted by a pass carries it
/// as `seen_at`, and the pass's deletion sweep uses it as the cutoff.
pub type ScanId = u64;

/// One file as stored in the search engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Stable id derived from (device, inode)
    pub id: u64,
    /// Logical name of the scan root
    pub root: String,
    /// Absolute path at scan time
    pub path: String,
    /// Final path component
    pub basename: String,
    /// Lower-cased extension without the dot, empty if none
    pub ext: String,
    /// Parent directory of `path`
    pub dirpath: String,
    /// Size in bytes
    pub size: u64,
    /// Modification time, whole seconds since the epoch
    pub mtime: i64,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    /// Scan pass that last observed this file
    pub seen_at: ScanId,
}

impl FileRecord {
    /// Build a record from a path and its (non-followed) metadata.
    pub fn from_metadata(root: &str, path: &Path, metadata: &Metadata, seen_at: ScanId) -> Self {
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = extension_of(&basename);
        let dirpath = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            id: compute_id(metadata.dev(), metadata.ino()),
            root: root.to_string(),
            path: path.to_string_lossy().into_owned(),
            basename,
            ext,
            dirpath,
            size: metadata.size(),
            mtime: metadata.mtime(),
            uid: metadata.uid(),
            gid: metadata.gid(),
            mode: metadata.mode(),
            seen_at,
        }
    }
}

/// Lower-cased extension of a file name. Leading dots never start an
/// extension, so `.bashrc` and `..bashrc` have none.
pub(crate) fn extension_of(basename: &str) -> String {
    Path::new(basename.trim_start_matches('.'))
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("main.RS"), "rs");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of(".bashrc"), "");
        assert_eq!(extension_of("..bashrc"), "");
        assert_eq!(extension_of("..hidden.Conf"), "conf");
        assert_eq!(extension_of("Makefile"), "");
        assert_eq!(extension_of("file."), "");
    }

    #[test]
    fn test_record_from_metadata() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("Report.PDF");
        fs::write(&path, "hello").unwrap();
        let metadata = fs::symlink_metadata(&path).unwrap();

        let record = FileRecord::from_metadata("docs", &path, &metadata, 42);

        assert_eq!(record.root, "docs");
        assert_eq!(record.basename, "Report.PDF");
        assert_eq!(record.ext, "pdf");
        assert_eq!(record.dirpath, temp_dir.path().to_string_lossy());
        assert_eq!(record.path, path.to_string_lossy());
        assert_eq!(record.size, 5);
        assert_eq!(record.seen_at, 42);
        assert_eq!(record.id, compute_id(metadata.dev(), metadata.ino()));
        assert!(record.mtime > 0);
    }

    #[test]
    fn test_record_id_survives_rename() {
        let temp_dir = tempdir().unwrap();
        let before = temp_dir.path().join("before.txt");
        let after = temp_dir.path().join("after.txt");
        fs::write(&before, "content").unwrap();
        let id_before =
            FileRecord::from_metadata("r", &before, &fs::symlink_metadata(&before).unwrap(), 1).id;

        fs::rename(&before, &after).unwrap();
        let id_after =
            FileRecord::from_metadata("r", &after, &fs::symlink_metadata(&after).unwrap(), 2).id;

        assert_eq!(id_before, id_after);
    }

    #[test]
    fn test_record_serialization_field_names() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, "x").unwrap();
        let record =
            FileRecord::from_metadata("data", &path, &fs::symlink_metadata(&path).unwrap(), 7);

        let json = serde_json::to_value(&record).unwrap();
        for field in [
            "id", "root", "path", "basename", "ext", "dirpath", "size", "mtime", "uid", "gid",
            "mode", "seen_at",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(json["seen_at"], 7);
    }
}
