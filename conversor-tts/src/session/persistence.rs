//! Marker persistence: hashing sources, loading and saving `progress.json`,
//! and clearing chunk files that belong to a different chunking.

use super::types::ProgressMarker;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

/// File name of the marker inside a chunk directory.
pub const MARKER_FILE: &str = "progress.json";

fn marker_path(chunk_dir: &Path) -> PathBuf {
    chunk_dir.join(MARKER_FILE)
}

/// Compute a hash of the source file for marker validation.
///
/// Uses SHA256 of the first 1MB for speed with large files.
pub fn compute_source_hash(source: &Path) -> Result<String> {
    let file = File::open(source)
        .with_context(|| format!("Failed to open {} for hashing", source.display()))?;
    let mut buffer = Vec::with_capacity(1024 * 1024);
    file.take(1024 * 1024).read_to_end(&mut buffer)?;

    let mut hasher = Sha256::new();
    hasher.update(&buffer);
    let result = hasher.finalize();

    Ok(format!("{:x}", result)[..16].to_string())
}

/// Load the marker of a chunk directory.
///
/// A missing marker is `None`; an unreadable one is logged and treated as missing.
pub fn load_marker(chunk_dir: &Path) -> Result<Option<ProgressMarker>> {
    let path = marker_path(chunk_dir);
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(&path).context("Failed to open progress marker")?;
    match serde_json::from_reader(BufReader::new(file)) {
        Ok(marker) => Ok(Some(marker)),
        Err(e) => {
            log::warn!("Ignoring unreadable progress marker {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

/// Save the marker, replacing the previous one atomically.
pub fn save_marker(chunk_dir: &Path, marker: &ProgressMarker) -> Result<()> {
    fs::create_dir_all(chunk_dir)?;
    let path = marker_path(chunk_dir);
    let tmp = path.with_extension("json.tmp");

    let file = File::create(&tmp).context("Failed to create progress marker")?;
    serde_json::to_writer_pretty(BufWriter::new(file), marker)
        .context("Failed to write progress marker")?;
    fs::rename(&tmp, &path).context("Failed to replace progress marker")?;

    Ok(())
}

/// Remove the marker after a successful assembly.
pub fn remove_marker(chunk_dir: &Path) -> Result<()> {
    let path = marker_path(chunk_dir);
    if path.exists() {
        fs::remove_file(&path).context("Failed to remove progress marker")?;
    }
    Ok(())
}

/// Remove the marker, then the chunk directory if nothing else is left in it.
pub fn close_session(chunk_dir: &Path) -> Result<()> {
    remove_marker(chunk_dir)?;
    if let Err(e) = fs::remove_dir(chunk_dir) {
        log::debug!("Keeping {}: {}", chunk_dir.display(), e);
    }
    Ok(())
}

/// Delete chunk files named `<stem>_<digits>.mp3` in `chunk_dir`.
pub fn clear_chunks(chunk_dir: &Path, stem: &str) -> Result<usize> {
    if !chunk_dir.exists() {
        return Ok(0);
    }

    let prefix = format!("{}_", stem);
    let mut removed = 0;
    for entry in fs::read_dir(chunk_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_chunk = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".mp3"))
            .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()));
        if is_chunk {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Make a chunk directory ready for `marker`.
///
/// Chunk files are kept only when the stored marker describes the same
/// chunking. With `resume` off, or on a mismatch, existing chunk files are
/// deleted. Returns the stored marker when its chunks are reused.
pub fn prepare_chunk_dir(
    chunk_dir: &Path,
    stem: &str,
    marker: &ProgressMarker,
    resume: bool,
) -> Result<Option<ProgressMarker>> {
    fs::create_dir_all(chunk_dir)
        .with_context(|| format!("Failed to create {}", chunk_dir.display()))?;

    let previous = load_marker(chunk_dir)?;
    let reusable = resume && previous.as_ref().is_some_and(|p| p.same_chunking(marker));

    if !reusable {
        let removed = clear_chunks(chunk_dir, stem)?;
        if removed > 0 {
            log::info!("Removed {} chunk file(s) from a previous chunking", removed);
        }
        save_marker(chunk_dir, marker)?;
        return Ok(None);
    }

    Ok(previous)
}
