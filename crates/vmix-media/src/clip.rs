//! Clip-level FFmpeg operations.
//!
//! - [`trim_to_best_window`]: cut the most active `target`-second stretch
//! - [`extract_segment`]: re-encode an arbitrary `[start, start + duration]` range
//! - [`merge_video_audio`]: put the adapted audio under a chosen video

use std::path::{Path, PathBuf};
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner, MIN_VIDEO_OUTPUT_BYTES};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::ensure_parent_dir;
use crate::metrics;
use crate::window::VideoWindowSelector;

const AUDIO_BITRATE: &str = "192k";

/// Re-encode `duration` seconds of `input` starting at `start_secs`.
///
/// Video goes to H.264, audio to AAC, with the moov atom up front.
pub async fn extract_segment(
    input: &Path,
    output: &Path,
    start_secs: f64,
    duration: f64,
) -> MediaResult<PathBuf> {
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    ensure_parent_dir(output).await?;

    info!(
        "Extracting segment: {} -> {} (start: {:.2}s, duration: {:.2}s)",
        input.display(),
        output.display(),
        start_secs,
        duration
    );

    let cmd = FfmpegCommand::new(input, output)
        .seek(start_secs)
        .duration(duration)
        .video_codec("libx264")
        .audio_codec("aac")
        .audio_bitrate(AUDIO_BITRATE)
        .faststart();

    FfmpegRunner::new().run(&cmd).await.inspect_err(|e| {
        if e.is_external_process() {
            metrics::record_ffmpeg_failure("trim");
        }
    })?;

    info!("Segment extracted: {}", output.display());
    Ok(output.to_path_buf())
}

/// Trim `input` to its best `target_secs` window.
pub async fn trim_to_best_window(
    selector: &VideoWindowSelector,
    input: &Path,
    target_secs: f64,
    output: &Path,
) -> MediaResult<PathBuf> {
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    let start = selector.select(input, target_secs).await;
    extract_segment(input, output, start, target_secs).await
}

/// Output path of a mux: `<dir>/<stem>_final.mp4` next to the video.
pub fn final_output_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());
    video.with_file_name(format!("{}_final.mp4", stem))
}

/// Replace the audio of `video` with `audio`.
///
/// The video stream is copied; audio is encoded to AAC and the output ends
/// with the shorter input. Missing inputs fail before FFmpeg runs.
pub async fn merge_video_audio(video: &Path, audio: &Path) -> MediaResult<PathBuf> {
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }
    if !audio.exists() {
        return Err(MediaError::FileNotFound(audio.to_path_buf()));
    }

    let output = final_output_path(video);
    ensure_parent_dir(&output).await?;

    let cmd = FfmpegCommand::with_inputs([video, audio], &output)
        .map("0:v:0")
        .map("1:a:0")
        .video_codec("copy")
        .audio_codec("aac")
        .audio_bitrate(AUDIO_BITRATE)
        .shortest()
        .faststart();

    let merged = FfmpegRunner::new()
        .run_expecting_output(&cmd, MIN_VIDEO_OUTPUT_BYTES)
        .await
        .inspect_err(|e| {
            if e.is_external_process() {
                metrics::record_ffmpeg_failure("merge");
            }
        })?;

    info!(
        video = %video.display(),
        audio = %audio.display(),
        output = %merged.display(),
        "Merged video and audio"
    );
    Ok(merged)
}
