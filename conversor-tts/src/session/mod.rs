//! Resume support: a progress marker stored beside the chunk files.

mod persistence;
mod types;

pub use persistence::{close_session, compute_source_hash, prepare_chunk_dir, save_marker};
pub use types::ProgressMarker;
