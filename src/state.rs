use std::sync::atomic::{AtomicU64, Ordering};

/// Byte counters shared by every range task of one resource.
///
/// Reads for display are allowed to lag behind the writers by a sample.
#[derive(Debug, Default)]
pub struct TransferStatus {
    transferred: AtomicU64,
    last_sample: AtomicU64,
}

impl TransferStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bytes: u64) {
        self.transferred.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Bytes written to the destination so far.
    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    /// Bytes written since the previous call, recording a new snapshot.
    pub fn sample(&self) -> u64 {
        let now = self.transferred();
        let previous = self.last_sample.swap(now, Ordering::Relaxed);
        now.saturating_sub(previous)
    }
}

/// Lifecycle of one file download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a download slot.
    Queued,
    Probing,
    Partitioned,
    Fetching,
    Completed,
    Aborted,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Aborted)
    }

    pub fn tag(self) -> &'static str {
        match self {
            Phase::Queued => "[Queued]",
            Phase::Probing | Phase::Partitioned | Phase::Fetching => "[InProgress]",
            Phase::Completed => "[Completed]",
            Phase::Aborted => "[Failed]",
        }
    }
}
