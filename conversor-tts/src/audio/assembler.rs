//! Audio file assembly using FFmpeg.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tts_client::process::run_cancellable;

/// Get the FFmpeg command, preferring the one on `PATH`.
pub fn ffmpeg_command() -> Command {
    Command::new(which::which("ffmpeg").unwrap_or_else(|_| PathBuf::from("ffmpeg")))
}

/// Get the FFprobe command, preferring the one on `PATH`.
pub fn ffprobe_command() -> Command {
    Command::new(which::which("ffprobe").unwrap_or_else(|_| PathBuf::from("ffprobe")))
}

/// Check if FFmpeg is available.
pub async fn is_ffmpeg_available() -> bool {
    ffmpeg_command()
        .arg("-version")
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run an ffmpeg/ffprobe command, failing with its stderr on a non-zero exit.
///
/// The child is terminated when `cancel` fires.
pub(crate) async fn run_tool(cmd: Command, what: &str, cancel: &CancellationToken) -> Result<Output> {
    log::debug!("Running {:?}", cmd);
    let output = run_cancellable(cmd, None, cancel)
        .await
        .with_context(|| format!("Failed to run {}", what))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{} failed: {}", what, stderr.trim());
    }
    Ok(output)
}

/// Build the concat demuxer list for `paths`, in order.
fn concat_list(paths: &[PathBuf]) -> String {
    let mut list_content = String::new();
    for path in paths {
        // Escape single quotes in path
        let path_str = path.to_string_lossy().replace('\'', "'\\''");
        list_content.push_str(&format!("file '{}'\n", path_str));
    }
    list_content
}

/// Concatenate audio files, in the given order, into `output_path`.
///
/// Uses FFmpeg's concat demuxer for lossless concatenation of same-format
/// files. The list file is removed whatever the outcome.
pub async fn concatenate(
    paths: &[PathBuf],
    output_path: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    if paths.is_empty() {
        anyhow::bail!("No audio files provided");
    }

    let list_dir = output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let list_file = tempfile::Builder::new()
        .prefix("concat_")
        .suffix(".txt")
        .tempfile_in(list_dir)
        .context("Failed to create concat list")?;
    std::fs::write(list_file.path(), concat_list(paths))?;

    let mut cmd = ffmpeg_command();
    cmd.args(["-y", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
        .arg(list_file.path())
        .args(["-c", "copy"])
        .arg(output_path);
    run_tool(cmd, "ffmpeg concat", cancel).await?;

    Ok(())
}

/// Concatenate chunk files into `output_path`, then delete the chunks.
///
/// On failure or cancellation the chunk files are left in place.
pub async fn assemble(
    paths: &[PathBuf],
    output_path: &Path,
    cancel: &CancellationToken,
) -> Result<()> {
    concatenate(paths, output_path, cancel).await?;

    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            log::warn!("Could not remove chunk {}: {}", path.display(), e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ffmpeg_available() {
        // This test just checks the function doesn't panic
        let _ = is_ffmpeg_available().await;
    }

    #[test]
    fn test_concat_list_order_and_escaping() {
        let list = concat_list(&[
            PathBuf::from("/tmp/a_0000.mp3"),
            PathBuf::from("/tmp/d'água_0001.mp3"),
        ]);
        assert_eq!(
            list,
            "file '/tmp/a_0000.mp3'\nfile '/tmp/d'\\''água_0001.mp3'\n"
        );
    }

    fn write_fake_chunks(dir: &Path) -> Vec<PathBuf> {
        let chunks = dir.join("chunks");
        std::fs::create_dir_all(&chunks).unwrap();
        (0..2)
            .map(|i| {
                let p = chunks.join(format!("livro_{i:04}.mp3"));
                std::fs::write(&p, b"not audio").unwrap();
                p
            })
            .collect()
    }

    #[tokio::test]
    async fn test_assemble_empty_fails() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out.mp3");
        assert!(assemble(&[], &out, &CancellationToken::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_assembly_keeps_chunks() {
        let temp_dir = TempDir::new().unwrap();
        let paths = write_fake_chunks(temp_dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let output = temp_dir.path().join("livro.mp3");
        assert!(assemble(&paths, &output, &cancel).await.is_err());
        for p in &paths {
            assert!(p.exists());
        }
    }

    #[tokio::test]
    async fn test_failed_assembly_keeps_chunks_and_removes_list() {
        let temp_dir = TempDir::new().unwrap();
        let paths = write_fake_chunks(temp_dir.path());

        let output = temp_dir.path().join("livro.mp3");
        assert!(assemble(&paths, &output, &CancellationToken::new()).await.is_err());

        for p in &paths {
            assert!(p.exists());
        }
        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("concat_"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
