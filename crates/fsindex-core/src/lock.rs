//! Single-run guard.
//!
//! Passes against the same root set must not overlap: two concurrent runs
//! would each sweep away documents the other just wrote. A PID file marks
//! the running process; a file left by a dead process is reclaimed.

use crate::CoreError;
use std::path::{Path, PathBuf};

/// Held PID file. Removed when dropped.
#[derive(Debug)]
pub struct PidLock {
    path: PathBuf,
}

impl PidLock {
    /// Take the lock at `path`, reclaiming a stale PID file.
    ///
    /// # Errors
    /// Returns [`CoreError::AlreadyRunning`] if another live process holds
    /// it, or an I/O error if the file cannot be replaced.
    pub fn acquire(path: &Path) -> Result<Self, CoreError> {
        if path.exists() {
            if let Some(pid) = read_pid(path) {
                if pid != std::process::id() && is_process_running(pid) {
                    return Err(CoreError::AlreadyRunning {
                        pid,
                        pid_file: path.to_path_buf(),
                    });
                }
            }
            // Stale PID file, remove it
            std::fs::remove_file(path)?;
        }

        std::fs::write(path, std::process::id().to_string())?;
        tracing::debug!(pid = std::process::id(), path = %path.display(), "pid_lock_acquired");

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        // Leave the file alone if another process has since claimed it.
        if read_pid(&self.path) == Some(std::process::id()) {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Check if a process is running by PID
fn is_process_running(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    // kill(pid, 0) only checks existence
    unsafe { libc::kill(pid, 0) == 0 }
}
