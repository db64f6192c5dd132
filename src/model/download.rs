use std::path::PathBuf;

/// Result of one segment download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub completed_ms: u64,
    pub expected_ms: u64,
}

impl DownloadOutcome {
    pub fn status(&self, tolerance_ms: u64) -> SegmentStatus {
        if self.completed_ms + tolerance_ms >= self.expected_ms {
            SegmentStatus::Complete
        } else {
            SegmentStatus::Truncated
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    Complete,
    /// Shorter than expected: stopped by the user or by the source.
    Truncated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatStatus {
    Complete,
    Aborted { reached_ms: u64, target_ms: u64 },
}

impl ConcatStatus {
    pub fn is_complete(self) -> bool {
        matches!(self, ConcatStatus::Complete)
    }
}

/// Progress notifications sent from the drivers to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    SegmentStarted {
        index: usize,
        total: usize,
        expected_ms: u64,
    },
    SegmentProgress {
        index: usize,
        completed_ms: u64,
    },
    SegmentFinished {
        index: usize,
        status: SegmentStatus,
    },
    SegmentFailed {
        index: usize,
    },
    ConcatStarted {
        target_ms: u64,
    },
    ConcatProgress {
        completed_ms: u64,
    },
    ConcatFinished {
        status: ConcatStatus,
    },
    CleanupFinished {
        removed: usize,
        remaining: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(completed_ms: u64, expected_ms: u64) -> DownloadOutcome {
        DownloadOutcome {
            path: PathBuf::from("part.mp4"),
            completed_ms,
            expected_ms,
        }
    }

    #[test]
    fn shortfall_within_tolerance_is_complete() {
        assert_eq!(outcome(120_000, 120_000).status(160), SegmentStatus::Complete);
        assert_eq!(outcome(119_840, 120_000).status(160), SegmentStatus::Complete);
        assert_eq!(outcome(121_000, 120_000).status(0), SegmentStatus::Complete);
    }

    #[test]
    fn shortfall_beyond_tolerance_is_truncated() {
        assert_eq!(outcome(119_839, 120_000).status(160), SegmentStatus::Truncated);
        assert_eq!(outcome(0, 120_000).status(1), SegmentStatus::Truncated);
    }
}
