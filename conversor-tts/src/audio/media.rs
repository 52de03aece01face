//! Post-processing of finished audio: speed change, video rendering and
//! splitting into parts.

use super::assembler::{ffmpeg_command, ffprobe_command, run_tool};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Longest part produced when splitting (12 hours).
pub const MAX_PART_SECS: f64 = 43_200.0;

const ATEMPO_MIN: f64 = 0.5;
const ATEMPO_MAX: f64 = 2.0;

/// Get duration of a media file in seconds using ffprobe.
pub async fn probe_duration(path: &Path, cancel: &CancellationToken) -> Result<f64> {
    let mut cmd = ffprobe_command();
    cmd.args([
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ])
    .arg(path);
    let output = run_tool(cmd, "ffprobe", cancel).await?;

    let duration_str = String::from_utf8_lossy(&output.stdout);
    duration_str
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse duration {:?}", duration_str.trim()))
}

/// Decompose `speed` into `atempo` stages, each within 0.5–2.0.
pub fn atempo_chain(speed: f64) -> Result<Vec<f64>> {
    if !speed.is_finite() || speed <= 0.0 {
        anyhow::bail!("Invalid speed factor: {}", speed);
    }

    let mut stages = Vec::new();
    let mut rest = speed;
    while rest > ATEMPO_MAX {
        stages.push(ATEMPO_MAX);
        rest /= ATEMPO_MAX;
    }
    while rest < ATEMPO_MIN {
        stages.push(ATEMPO_MIN);
        rest /= ATEMPO_MIN;
    }
    stages.push(rest);
    Ok(stages)
}

fn atempo_filter(speed: f64) -> Result<String> {
    Ok(atempo_chain(speed)?
        .iter()
        .map(|stage| format!("atempo={}", stage))
        .collect::<Vec<_>>()
        .join(","))
}

/// Re-encode `input` at `speed` times its original tempo.
pub async fn change_speed(
    input: &Path,
    output: &Path,
    speed: f64,
    cancel: &CancellationToken,
) -> Result<()> {
    let filter = atempo_filter(speed)?;
    let mut cmd = ffmpeg_command();
    cmd.args(["-y", "-loglevel", "error", "-i"])
        .arg(input)
        .arg("-filter:a")
        .arg(&filter)
        .arg("-vn")
        .arg(output);
    run_tool(cmd, "ffmpeg atempo", cancel).await?;
    Ok(())
}

/// Render a black 1280x720 video carrying `audio`.
pub async fn render_video(
    audio: &Path,
    video: &Path,
    duration: f64,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut cmd = ffmpeg_command();
    cmd.args(["-y", "-loglevel", "error", "-f", "lavfi", "-i"])
        .arg(format!("color=c=black:s=1280x720:d={}", duration.ceil() as u64))
        .arg("-i")
        .arg(audio)
        .args([
            "-shortest",
            "-c:v",
            "libx264",
            "-c:a",
            "aac",
            "-b:a",
            "192k",
            "-pix_fmt",
            "yuv420p",
        ])
        .arg(video);
    run_tool(cmd, "ffmpeg video render", cancel).await?;
    Ok(())
}

/// Start and length, in whole seconds, of each part.
pub fn plan_parts(total: f64, max: f64) -> Vec<(u64, u64)> {
    if total <= 0.0 || max <= 0.0 {
        return Vec::new();
    }
    let count = (total / max).ceil() as u64;
    (0..count)
        .map(|i| {
            let start = i as f64 * max;
            let length = max.min(total - start);
            (start as u64, length.ceil() as u64)
        })
        .collect()
}

/// Path of part `n` (1-based): `<base>_parteN<ext>`.
pub fn part_path(base: &Path, n: usize, ext: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!("_parte{}{}", n, ext));
    PathBuf::from(name)
}

/// Split `input` losslessly into parts of at most `max` seconds.
pub async fn split_parts(
    input: &Path,
    total: f64,
    max: f64,
    base: &Path,
    ext: &str,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>> {
    let mut parts = Vec::new();
    for (i, (start, length)) in plan_parts(total, max).into_iter().enumerate() {
        let output = part_path(base, i + 1, ext);
        let mut cmd = ffmpeg_command();
        cmd.args(["-y", "-loglevel", "error", "-i"])
            .arg(input)
            .arg("-ss")
            .arg(start.to_string())
            .arg("-t")
            .arg(length.to_string())
            .args(["-c", "copy"])
            .arg(&output);
        run_tool(cmd, "ffmpeg split", cancel).await?;
        log::info!("Part {} written: {}", i + 1, output.display());
        parts.push(output);
    }
    Ok(parts)
}

/// File stem for a speed-adjusted copy: `<stem>_x<speed>` with dots as `_`.
pub fn enhanced_name(stem: &str, speed: f64) -> String {
    format!("{}_x{}", stem, speed).replace('.', "_")
}
