//! Stability window for files that may still be written to.

use std::time::{Duration, SystemTime};

/// Decides whether a file has been quiet long enough to index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityFilter {
    window: Duration,
}

impl StabilityFilter {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// True when `now - mtime` is below the window. A modification time in
    /// the future is always unstable.
    pub fn is_unstable(&self, now: SystemTime, mtime: SystemTime) -> bool {
        match now.duration_since(mtime) {
            Ok(age) => age < self.window,
            Err(_) => true,
        }
    }

    pub fn is_stable(&self, now: SystemTime, mtime: SystemTime) -> bool {
        !self.is_unstable(now, mtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_file_is_unstable() {
        let filter = StabilityFilter::from_secs(30);
        let now = SystemTime::now();

        assert!(filter.is_unstable(now, now - Duration::from_secs(5)));
        assert!(filter.is_stable(now, now - Duration::from_secs(100)));
    }

    #[test]
    fn test_window_boundary_is_stable() {
        let filter = StabilityFilter::from_secs(30);
        let now = SystemTime::now();

        assert!(filter.is_stable(now, now - Duration::from_secs(30)));
        assert!(filter.is_unstable(now, now - Duration::from_millis(29_999)));
    }

    #[test]
    fn test_future_mtime_is_unstable() {
        let filter = StabilityFilter::from_secs(0);
        let now = SystemTime::now();

        assert!(filter.is_unstable(now, now + Duration::from_secs(60)));
    }

    #[test]
    fn test_zero_window_accepts_everything_in_the_past() {
        let filter = StabilityFilter::from_secs(0);
        let now = SystemTime::now();

        assert!(filter.is_stable(now, now));
        assert!(filter.is_stable(now, SystemTime::UNIX_EPOCH));
    }
}
