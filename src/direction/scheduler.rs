use std::time::Duration;

/// How often the editor session checks for a pending direction pass
pub const FRAME: Duration = Duration::from_millis(16);

/// Coalesces direction pass requests until the next frame.
///
/// Any number of edits between two frames result in a single pass.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    pending: bool,
    requests: u64,
    runs: u64,
}

impl FrameScheduler {
    /// Ask for a pass on the next frame, returns `false` if one was already pending
    pub fn request(&mut self) -> bool {
        self.requests += 1;
        !std::mem::replace(&mut self.pending, true)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Called on each frame, returns whether a pass should run now
    pub fn take(&mut self) -> bool {
        if std::mem::replace(&mut self.pending, false) {
            self.runs += 1;
            true
        } else {
            false
        }
    }

    /// (requests, runs) so far
    pub fn stats(&self) -> (u64, u64) {
        (self.requests, self.runs)
    }
}

#[cfg(test)]
mod tests {
    use super::FrameScheduler;

    #[test]
    fn test_requests_coalesce() {
        let mut scheduler = FrameScheduler::default();
        assert!(!scheduler.take());

        assert!(scheduler.request());
        assert!(!scheduler.request());
        assert!(!scheduler.request());
        assert!(scheduler.is_pending());

        assert!(scheduler.take());
        assert!(!scheduler.take());
        assert_eq!(scheduler.stats(), (3, 1));

        assert!(scheduler.request());
        assert!(scheduler.take());
        assert_eq!(scheduler.stats(), (4, 2));
    }
}
