//! FFprobe queries for the few stream facts clip assembly needs.
//!
//! Window selection and feature extraction need the duration, frame size and
//! frame rate of the first video stream; concatenation and trimming only
//! need container durations (audio files included).

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Frame rate assumed when the stream reports none.
pub const FALLBACK_FPS: f64 = 30.0;

/// First video stream of a file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    /// Container duration in seconds, 0 when unknown
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

impl ProbeReport {
    fn duration(&self) -> Option<f64> {
        self.format
            .duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
    }
}

/// Run ffprobe restricted to `entries`, optionally on the first video stream only.
async fn query(path: &Path, entries: &str, video_stream: bool) -> MediaResult<ProbeReport> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    let ffprobe = check_ffprobe()?;

    let mut cmd = Command::new(ffprobe);
    cmd.args(["-v", "error", "-of", "json", "-show_entries", entries]);
    if video_stream {
        cmd.args(["-select_streams", "v:0"]);
    }
    let output = cmd
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }
    Ok(serde_json::from_slice(&output.stdout)?)
}

fn video_info(report: &ProbeReport) -> MediaResult<VideoInfo> {
    let stream = report
        .streams
        .first()
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|r| parse_frame_rate(r).filter(|f| *f > 0.0))
        .unwrap_or(FALLBACK_FPS);

    Ok(VideoInfo {
        duration: report.duration().unwrap_or(0.0),
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        fps,
    })
}

/// Duration, frame size and frame rate of the first video stream.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let report = query(
        path.as_ref(),
        "format=duration:stream=width,height,avg_frame_rate,r_frame_rate",
        true,
    )
    .await?;
    video_info(&report)
}

/// Container duration in seconds, for any media file.
///
/// A missing or unparsable duration is an error.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();
    let report = query(path, "format=duration", false).await?;
    report.duration().ok_or_else(|| MediaError::FfprobeFailed {
        message: format!("no duration reported for {}", path.display()),
        stderr: None,
    })
}

/// Duration in seconds, or `None` when the file cannot be probed.
pub async fn probe_duration_soft(path: impl AsRef<Path>) -> Option<f64> {
    probe_duration(path).await.ok()
}

/// `"30000/1001"` or `"29.97"`; a zero denominator is no rate.
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.trim().parse().ok()?;
            (den > 0.0).then_some(num.trim().parse::<f64>().ok()? / den)
        }
        None => s.trim().parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(json: &str) -> ProbeReport {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
        assert!(parse_frame_rate("n/a").is_none());
    }

    #[test]
    fn test_video_info_from_report() {
        let info = video_info(&report(
            r#"{"streams":[{"width":1080,"height":1920,"avg_frame_rate":"0/0","r_frame_rate":"25/1"}],
                "format":{"duration":"12.480000"}}"#,
        ))
        .unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));
        // avg rate unknown, falls through to r_frame_rate
        assert_eq!(info.fps, 25.0);
        assert!((info.duration - 12.48).abs() < 1e-9);
    }

    #[test]
    fn test_video_info_defaults() {
        let info = video_info(&report(r#"{"streams":[{}],"format":{}}"#)).unwrap();
        assert_eq!(info.fps, FALLBACK_FPS);
        assert_eq!(info.duration, 0.0);

        // audio-only file: no video stream selected
        let err = video_info(&report(r#"{"streams":[],"format":{"duration":"3.0"}}"#)).unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
    }

    #[test]
    fn test_duration_rejects_garbage() {
        assert_eq!(report(r#"{"format":{"duration":"N/A"}}"#).duration(), None);
        assert_eq!(report(r#"{"format":{"duration":" 4.5 "}}"#).duration(), Some(4.5));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let err = probe_video("/nonexistent/clip.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(probe_duration_soft("/nonexistent/clip.mp4").await.is_none());
    }
}
