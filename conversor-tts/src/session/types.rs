//! Progress marker for resumable conversions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress of one conversion, stored next to its chunk files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressMarker {
    /// SHA256 of the source file (first 1MB), 16 hex characters
    pub source_hash: String,
    /// Number of chunks the source was split into
    pub total_chunks: usize,
    /// Chunk limit used for splitting
    pub chunk_limit: usize,
    /// Highest index such that every chunk up to it is on disk
    pub last_completed: Option<usize>,
    /// Chunks that failed permanently in the last run
    #[serde(default)]
    pub failed: Vec<usize>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressMarker {
    /// Create a marker for a fresh run.
    pub fn new(source_hash: String, total_chunks: usize, chunk_limit: usize) -> Self {
        Self {
            source_hash,
            total_chunks,
            chunk_limit,
            last_completed: None,
            failed: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Whether chunk files written under `self` can be reused for `other`.
    pub fn same_chunking(&self, other: &ProgressMarker) -> bool {
        self.source_hash == other.source_hash
            && self.total_chunks == other.total_chunks
            && self.chunk_limit == other.chunk_limit
    }

    /// Record the latest scheduler progress.
    pub fn update(&mut self, last_completed: Option<usize>, failed: Vec<usize>) {
        self.last_completed = last_completed;
        self.failed = failed;
        self.updated_at = Utc::now();
    }

    /// Number of chunks known to be done.
    pub fn completed_prefix(&self) -> usize {
        self.last_completed.map_or(0, |i| i + 1)
    }

    /// Get progress as a percentage of the contiguous prefix.
    pub fn percent(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        self.completed_prefix() as f64 / self.total_chunks as f64 * 100.0
    }
}
