use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Draws detection overlays onto a frame.
///
/// Implementations modify the frame in-place and must be idempotent: drawing
/// the same detections twice leaves the same pixels as drawing them once.
pub trait FrameAnnotator: Send + Sync {
    fn annotate(
        &self,
        frame: &mut Frame,
        detections: &[Detection],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
