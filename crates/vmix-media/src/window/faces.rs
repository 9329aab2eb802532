//! Per-frame face presence.
//!
//! With the `opencv` feature a Haar cascade classifier is used. Without it,
//! or when no cascade file can be found, face presence is reported as
//! unavailable and callers score motion alone.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use vmix_models::Capability;

use super::frames::GrayFrame;
#[cfg(feature = "opencv")]
use crate::error::{MediaError, MediaResult};

/// Locations searched for the frontal-face cascade.
pub const DEFAULT_CASCADE_PATHS: &[&str] = &[
    "/usr/share/opencv4/haarcascades/haarcascade_frontalface_default.xml",
    "/usr/share/opencv/haarcascades/haarcascade_frontalface_default.xml",
    "/usr/local/share/opencv4/haarcascades/haarcascade_frontalface_default.xml",
    "/opt/homebrew/share/opencv4/haarcascades/haarcascade_frontalface_default.xml",
    "/app/models/haarcascade_frontalface_default.xml",
    "./models/haarcascade_frontalface_default.xml",
];

/// Answers "is there at least one face in this frame".
pub trait FacePresence: Send {
    fn has_face(&mut self, frame: &GrayFrame) -> bool;
}

/// Never reports a face.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaceDetector;

impl FacePresence for NoFaceDetector {
    fn has_face(&mut self, _frame: &GrayFrame) -> bool {
        false
    }
}

/// Find a cascade file, preferring an explicitly configured one.
pub fn find_cascade_path(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        debug!(path = %path.display(), "Configured face cascade not found");
    }
    DEFAULT_CASCADE_PATHS
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
}

/// Build the face classifier, or report why it is unavailable.
pub fn face_detector(configured: Option<&Path>) -> Capability<Box<dyn FacePresence>> {
    #[cfg(feature = "opencv")]
    {
        let Some(path) = find_cascade_path(configured) else {
            return Capability::unavailable("no Haar cascade file found");
        };
        match HaarFaceDetector::load(&path) {
            Ok(detector) => {
                info!(path = %path.display(), "Haar face classifier loaded");
                Capability::Available(Box::new(detector))
            }
            Err(e) => Capability::unavailable(e.to_string()),
        }
    }

    #[cfg(not(feature = "opencv"))]
    {
        if let Some(path) = find_cascade_path(configured) {
            info!(
                path = %path.display(),
                "Face cascade present but face detection needs the opencv feature"
            );
        }
        Capability::unavailable("built without the opencv feature")
    }
}

/// Haar cascade frontal-face classifier.
#[cfg(feature = "opencv")]
pub struct HaarFaceDetector {
    classifier: opencv::objdetect::CascadeClassifier,
}

#[cfg(feature = "opencv")]
impl HaarFaceDetector {
    const SCALE_FACTOR: f64 = 1.1;
    const MIN_NEIGHBORS: i32 = 4;

    pub fn load(path: &Path) -> MediaResult<Self> {
        use opencv::prelude::*;

        let path_str = path.to_string_lossy();
        let classifier = opencv::objdetect::CascadeClassifier::new(&path_str).map_err(|e| {
            MediaError::detection_failed(format!("Failed to load cascade {}: {}", path_str, e))
        })?;
        if classifier.empty().unwrap_or(true) {
            return Err(MediaError::detection_failed(format!(
                "Cascade {} is empty",
                path_str
            )));
        }
        Ok(Self { classifier })
    }

    fn detect(&mut self, frame: &GrayFrame) -> MediaResult<bool> {
        use opencv::core::{Rect, Size, Vector};
        use opencv::prelude::*;

        let to_err = |e: opencv::Error| MediaError::detection_failed(e.to_string());
        let mat = frame.to_mat()?;

        let mut faces = Vector::<Rect>::new();
        self.classifier
            .detect_multi_scale(
                &mat,
                &mut faces,
                Self::SCALE_FACTOR,
                Self::MIN_NEIGHBORS,
                0,
                Size::new(0, 0),
                Size::new(0, 0),
            )
            .map_err(to_err)?;
        Ok(!faces.is_empty())
    }
}

#[cfg(feature = "opencv")]
impl FacePresence for HaarFaceDetector {
    fn has_face(&mut self, frame: &GrayFrame) -> bool {
        match self.detect(frame) {
            Ok(found) => found,
            Err(e) => {
                debug!("Face detection failed on frame: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_face_detector() {
        let mut detector = NoFaceDetector;
        assert!(!detector.has_face(&GrayFrame::filled(8, 8, 200, 0.0)));
    }

    #[test]
    fn test_configured_cascade_wins() {
        let dir = tempfile::TempDir::new().unwrap();
        let cascade = dir.path().join("faces.xml");
        std::fs::write(&cascade, b"<opencv_storage/>").unwrap();
        assert_eq!(find_cascade_path(Some(&cascade)), Some(cascade));
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_unavailable_without_opencv() {
        let detector = face_detector(None);
        assert!(!detector.is_available());
        assert!(detector.reason().unwrap().contains("opencv"));
    }
}
