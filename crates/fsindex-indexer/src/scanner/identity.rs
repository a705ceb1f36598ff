//! Path-independent document identity.

use xxhash_rust::xxh64::xxh64;

/// Compute the document id of a physical file from its device and inode.
///
/// XXH64 with seed 0 over the text `"{device}:{inode}"`. Seedless, so the
/// same file maps to the same id across restarts and machines, and a rename
/// within the mount updates the existing document instead of adding one.
pub fn compute_id(device: u64, inode: u64) -> u64 {
    let key = format!("{device}:{inode}");
    xxh64(key.as_bytes(), 0)
}
