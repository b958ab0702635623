/// Default number of migrated leaves between destination flushes.
pub const DEFAULT_COMMIT_THRESHOLD: usize = 1000;

/// Bounds the destination's pending write set by signalling a flush after
/// every `threshold` migrated leaves, independent of trie topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitBatcher {
    threshold: usize,
    since_flush: usize,
}

impl Default for CommitBatcher {
    fn default() -> Self {
        Self::new(DEFAULT_COMMIT_THRESHOLD)
    }
}

impl CommitBatcher {
    /// # Panics
    /// If `threshold` is zero.
    pub fn new(threshold: usize) -> Self {
        assert!(threshold > 0, "commit threshold must be positive");
        Self {
            threshold,
            since_flush: 0,
        }
    }

    /// Records one migrated leaf. Returns `true` exactly when the count
    /// reaches the threshold, resetting it for the next batch.
    pub fn record_migrated(&mut self) -> bool {
        self.since_flush += 1;
        if self.since_flush >= self.threshold {
            self.since_flush = 0;
            true
        } else {
            false
        }
    }

    /// Whether any leaf has been migrated since the last signalled flush.
    pub fn dirty(&self) -> bool {
        self.since_flush > 0
    }
}
