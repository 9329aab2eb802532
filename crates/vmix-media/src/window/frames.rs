//! Grayscale frame sampling via FFmpeg rawvideo output.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncReadExt, BufReader};
use tracing::{debug, warn};

#[cfg(feature = "opencv")]
use opencv::{
    core::{self, Mat, Rect, Scalar, CV_8UC1},
    imgproc,
    prelude::*,
};

use crate::command::{check_ffmpeg, create_ffmpeg_command};
use crate::error::{MediaError, MediaResult};
use crate::probe::VideoInfo;

/// Frames wider than this are downscaled before analysis.
pub const DEFAULT_ANALYSIS_MAX_WIDTH: u32 = 640;

/// One 8-bit grayscale frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayFrame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    /// Presentation time in seconds
    timestamp_secs: f64,
}

impl GrayFrame {
    /// Wrap raw pixels; `pixels.len()` must equal `width * height`.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>, timestamp_secs: f64) -> MediaResult<Self> {
        if pixels.len() != width as usize * height as usize {
            return Err(MediaError::InvalidVideo(format!(
                "frame of {}x{} needs {} bytes, got {}",
                width,
                height,
                width as usize * height as usize,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            timestamp_secs,
        })
    }

    /// A frame filled with one value.
    pub fn filled(width: u32, height: u32, value: u8, timestamp_secs: f64) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width as usize * height as usize],
            timestamp_secs,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_secs
    }

    /// Whole second the frame falls in.
    pub fn second(&self) -> usize {
        self.timestamp_secs.max(0.0) as usize
    }

    /// Mean intensity.
    pub fn mean(&self) -> f64 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        self.pixels.iter().map(|p| u64::from(*p)).sum::<u64>() as f64 / self.pixels.len() as f64
    }

    fn same_size(&self, other: &GrayFrame) -> bool {
        self.width == other.width && self.height == other.height && !self.pixels.is_empty()
    }

    /// Bottom `fraction` of the frame as `(first_row, rows)`.
    fn bottom_band(&self, fraction: f64) -> (usize, usize) {
        let h = self.height as usize;
        let top = ((h as f64 * (1.0 - fraction.clamp(0.0, 1.0))) as usize).min(h);
        (top, h - top)
    }

    /// Copy into a single-channel OpenCV matrix.
    #[cfg(feature = "opencv")]
    pub fn to_mat(&self) -> MediaResult<Mat> {
        let mut mat = Mat::new_rows_cols_with_default(
            self.height as i32,
            self.width as i32,
            CV_8UC1,
            Scalar::all(0.0),
        )
        .map_err(cv_err)?;
        mat.data_bytes_mut()
            .map_err(cv_err)?
            .copy_from_slice(&self.pixels);
        Ok(mat)
    }

    /// Mean absolute per-pixel difference, or `None` when sizes differ.
    #[cfg(feature = "opencv")]
    pub fn mean_abs_diff(&self, other: &GrayFrame) -> Option<f64> {
        if !self.same_size(other) {
            return None;
        }
        let diff = || -> MediaResult<f64> {
            let mut diff = Mat::default();
            core::absdiff(&self.to_mat()?, &other.to_mat()?, &mut diff).map_err(cv_err)?;
            let mean = core::mean(&diff, &Mat::default()).map_err(cv_err)?;
            Ok(mean.0[0])
        };
        match diff() {
            Ok(d) => Some(d),
            Err(e) => {
                debug!("Frame difference failed: {}", e);
                None
            }
        }
    }

    /// Mean absolute per-pixel difference, or `None` when sizes differ.
    #[cfg(not(feature = "opencv"))]
    pub fn mean_abs_diff(&self, other: &GrayFrame) -> Option<f64> {
        if !self.same_size(other) {
            return None;
        }
        let total: u64 = self
            .pixels
            .iter()
            .zip(other.pixels.iter())
            .map(|(a, b)| u64::from(a.abs_diff(*b)))
            .sum();
        Some(total as f64 / self.pixels.len() as f64)
    }

    /// Fraction of Canny edge pixels in the bottom `fraction` of the frame.
    #[cfg(feature = "opencv")]
    pub fn bottom_edge_density(&self, fraction: f64, low: f64, high: f64) -> f64 {
        let (top, rows) = self.bottom_band(fraction);
        if self.width < 3 || rows == 0 {
            return 0.0;
        }
        let density = || -> MediaResult<f64> {
            let mat = self.to_mat()?;
            let band = Rect::new(0, top as i32, self.width as i32, rows as i32);
            let mut roi = Mat::default();
            Mat::roi(&mat, band)
                .map_err(cv_err)?
                .copy_to(&mut roi)
                .map_err(cv_err)?;
            let mut edges = Mat::default();
            imgproc::canny(&roi, &mut edges, low, high, 3, false).map_err(cv_err)?;
            let hits = core::count_non_zero(&edges).map_err(cv_err)?;
            Ok(f64::from(hits) / (self.width as usize * rows) as f64)
        };
        density().unwrap_or_else(|e| {
            debug!("Edge detection failed: {}", e);
            0.0
        })
    }

    /// Fraction of edge pixels in the bottom `fraction` of the frame.
    ///
    /// Plain Canny: L1 Sobel magnitude, non-maximum suppression along the
    /// dominant axis, then one-step hysteresis between `low` and `high`.
    #[cfg(not(feature = "opencv"))]
    pub fn bottom_edge_density(&self, fraction: f64, low: f64, high: f64) -> f64 {
        let w = self.width as usize;
        let h = self.height as usize;
        if w < 3 || h < 3 {
            return 0.0;
        }
        let (top, rows) = self.bottom_band(fraction);
        if rows == 0 {
            return 0.0;
        }
        let at = |x: usize, y: usize| -> i32 { i32::from(self.pixels[y * w + x]) };
        let (low, high) = (low.ceil() as i32, high.ceil() as i32);

        let mut magnitude = vec![0i32; w * rows];
        let mut horizontal = vec![false; w * rows];
        for y in top.max(1)..h - 1 {
            for x in 1..w - 1 {
                let gx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
                    - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
                let gy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
                    - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));
                let i = (y - top) * w + x;
                magnitude[i] = gx.abs() + gy.abs();
                horizontal[i] = gx.abs() >= gy.abs();
            }
        }

        let mag = |x: usize, r: usize| -> i32 { magnitude[r * w + x] };
        let mut thin = vec![0i32; w * rows];
        for r in 0..rows {
            for x in 1..w - 1 {
                let m = mag(x, r);
                if m < low {
                    continue;
                }
                let is_peak = if horizontal[r * w + x] {
                    m >= mag(x - 1, r) && m >= mag(x + 1, r)
                } else {
                    let up = if r > 0 { mag(x, r - 1) } else { 0 };
                    let down = if r + 1 < rows { mag(x, r + 1) } else { 0 };
                    m >= up && m >= down
                };
                if is_peak {
                    thin[r * w + x] = m;
                }
            }
        }

        let mut edges = 0usize;
        for r in 0..rows {
            for x in 0..w {
                let m = thin[r * w + x];
                if m >= high {
                    edges += 1;
                } else if m >= low {
                    let strong_neighbour = (r.saturating_sub(1)..=(r + 1).min(rows - 1)).any(|nr| {
                        (x.saturating_sub(1)..=(x + 1).min(w - 1))
                            .any(|nx| thin[nr * w + nx] >= high)
                    });
                    if strong_neighbour {
                        edges += 1;
                    }
                }
            }
        }

        edges as f64 / (w * rows) as f64
    }
}

#[cfg(feature = "opencv")]
fn cv_err(e: opencv::Error) -> MediaError {
    MediaError::detection_failed(e.to_string())
}

/// How frames are sampled from a video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSampling {
    /// Keep every `stride`-th decoded frame
    pub stride: u32,
    /// Downscale wider frames to this width
    pub max_width: u32,
}

impl Default for FrameSampling {
    fn default() -> Self {
        Self {
            stride: 5,
            max_width: DEFAULT_ANALYSIS_MAX_WIDTH,
        }
    }
}

impl FrameSampling {
    /// Even analysis size preserving the source aspect ratio.
    pub fn analysis_size(&self, width: u32, height: u32) -> (u32, u32) {
        if width == 0 || height == 0 {
            return (0, 0);
        }
        if width <= self.max_width {
            return (width - width % 2, height - height % 2);
        }
        let scaled_h = (f64::from(height) * f64::from(self.max_width) / f64::from(width)).round() as u32;
        let w = self.max_width - self.max_width % 2;
        let h = (scaled_h - scaled_h % 2).max(2);
        (w, h)
    }

    /// Timestamp of the `k`-th sampled frame (frames `stride-1`, `2*stride-1`, ...).
    pub fn timestamp(&self, k: usize, fps: f64) -> f64 {
        let stride = self.stride.max(1) as usize;
        let n = k * stride + stride - 1;
        if fps > 0.0 {
            n as f64 / fps
        } else {
            0.0
        }
    }
}

/// Decode every `stride`-th frame of a video as grayscale and hand each to
/// `on_frame`, in order.
///
/// Frames are streamed; only one is held at a time. Returns the number of
/// frames delivered.
pub async fn scan_gray_frames<F>(
    path: &Path,
    info: &VideoInfo,
    sampling: &FrameSampling,
    mut on_frame: F,
) -> MediaResult<usize>
where
    F: FnMut(GrayFrame),
{
    check_ffmpeg()?;

    let (width, height) = sampling.analysis_size(info.width, info.height);
    if width == 0 || height == 0 {
        return Err(MediaError::InvalidVideo(format!(
            "{} has no usable frame size",
            path.display()
        )));
    }
    let frame_bytes = width as usize * height as usize;
    let stride = sampling.stride.max(1);

    let filter = format!(
        "select=not(mod(n+1\\,{})),scale={}:{}",
        stride, width, height
    );

    let mut cmd = create_ffmpeg_command();
    cmd.args(["-loglevel", "error", "-i"])
        .arg(path)
        .args([
            "-vf", &filter, "-vsync", "vfr", "-pix_fmt", "gray", "-f", "rawvideo", "-",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(
        path = %path.display(),
        width,
        height,
        stride,
        "Scanning grayscale frames"
    );

    let mut child = cmd.spawn()?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None))?;
    let mut reader = BufReader::new(stdout);
    // Drained concurrently so a chatty decoder cannot block on a full pipe
    let stderr_task = child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        })
    });

    let mut delivered = 0usize;
    loop {
        let mut pixels = vec![0u8; frame_bytes];
        match reader.read_exact(&mut pixels).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let timestamp = sampling.timestamp(delivered, info.fps);
        on_frame(GrayFrame::new(width, height, pixels, timestamp)?);
        delivered += 1;
    }

    let status = child.wait().await?;
    if !status.success() {
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        debug!(
            path = %path.display(),
            exit_code = ?status.code(),
            stderr = %stderr.trim(),
            "FFmpeg frame decode exited with error"
        );
        if delivered == 0 {
            return Err(MediaError::ffmpeg_failed(
                format!("frame decode failed for {}", path.display()),
                Some(stderr),
                status.code(),
            ));
        }
        warn!(
            path = %path.display(),
            frames = delivered,
            "FFmpeg exited with {:?} after partial decode",
            status.code()
        );
    }

    Ok(delivered)
}
