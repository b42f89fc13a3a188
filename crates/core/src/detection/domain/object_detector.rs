use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

pub type DetectorError = Box<dyn std::error::Error + Send + Sync>;

/// Opaque "image → detections" capability.
///
/// Shared read-only between concurrent frame tasks, hence `&self`;
/// implementations guard any backend state that needs exclusive access.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectorError>;

    /// Class names indexed by class id.
    fn labels(&self) -> &[String];
}
