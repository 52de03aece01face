//! Conversion coordination: per-chunk tasks and the scheduler that drives them.

pub mod scheduler;
pub mod task;

pub use scheduler::ConversionScheduler;
pub use task::ConversionTask;

use crate::text::TextChunk;
use std::path::{Path, PathBuf};

/// Path of the audio file for chunk `index`.
pub fn chunk_path(chunk_dir: &Path, stem: &str, index: usize) -> PathBuf {
    chunk_dir.join(format!("{}_{:04}.mp3", stem, index))
}

/// Create one pending task per chunk.
pub fn create_tasks(
    chunks: &[TextChunk],
    voice: &str,
    chunk_dir: &Path,
    stem: &str,
) -> Vec<ConversionTask> {
    chunks
        .iter()
        .map(|chunk| {
            ConversionTask::new(
                chunk.index,
                chunk.text.clone(),
                voice.to_string(),
                chunk_path(chunk_dir, stem, chunk.index),
            )
        })
        .collect()
}
