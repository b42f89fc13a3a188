use std::fmt;
use std::sync::Arc;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::object_detector::ObjectDetector;
use crate::shared::frame::Frame;
use crate::shared::frame_error::FrameError;

/// Outcome of model bootstrap, fixed for the lifetime of the process.
#[derive(Clone)]
pub enum ModelHandle {
    Ready(Arc<dyn ObjectDetector>),
    Unavailable,
}

impl ModelHandle {
    pub fn ready(detector: impl ObjectDetector + 'static) -> Self {
        ModelHandle::Ready(Arc::new(detector))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ModelHandle::Ready(_))
    }

    /// Runs one forward pass. An unavailable model yields no detections.
    ///
    /// Boxes are clamped to the frame; boxes that fall entirely outside it
    /// are dropped.
    pub fn infer(&self, frame: &Frame) -> Result<Vec<Detection>, FrameError> {
        let ModelHandle::Ready(detector) = self else {
            return Ok(Vec::new());
        };
        let detections = detector
            .detect(frame)
            .map_err(|e| FrameError::InferenceError(e.to_string()))?;
        Ok(detections
            .into_iter()
            .filter_map(|d| d.clamped(frame.width(), frame.height()))
            .collect())
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelHandle::Ready(detector) => f
                .debug_struct("Ready")
                .field("classes", &detector.labels().len())
                .finish(),
            ModelHandle::Unavailable => write!(f, "Unavailable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::object_detector::DetectorError;

    struct FixedDetector(Vec<Detection>);

    impl ObjectDetector for FixedDetector {
        fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
            Ok(self.0.clone())
        }
        fn labels(&self) -> &[String] {
            &[]
        }
    }

    struct FailingDetector;

    impl ObjectDetector for FailingDetector {
        fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
            Err("output tensor has rank 2".into())
        }
        fn labels(&self) -> &[String] {
            &[]
        }
    }

    fn frame(w: u32, h: u32) -> Frame {
        Frame::new(vec![0; (w * h * 3) as usize], w, h, 3)
    }

    fn det(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection {
            x1,
            y1,
            x2,
            y2,
            class_id: 0,
            label: "cat".into(),
            confidence: 0.8,
        }
    }

    #[test]
    fn test_unavailable_returns_no_detections() {
        let handle = ModelHandle::Unavailable;
        assert!(!handle.is_ready());
        assert!(handle.infer(&frame(10, 10)).unwrap().is_empty());
    }

    #[test]
    fn test_ready_clamps_and_drops_out_of_frame_boxes() {
        let handle = ModelHandle::ready(FixedDetector(vec![
            det(-5.0, -5.0, 20.0, 20.0),
            det(100.0, 100.0, 120.0, 120.0),
        ]));
        let detections = handle.infer(&frame(50, 50)).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].x1, 0.0);
        assert_eq!(detections[0].y1, 0.0);
    }

    #[test]
    fn test_backend_fault_maps_to_inference_error() {
        let handle = ModelHandle::ready(FailingDetector);
        let err = handle.infer(&frame(10, 10)).unwrap_err();
        assert_eq!(
            err,
            FrameError::InferenceError("output tensor has rank 2".into())
        );
    }

    #[test]
    fn test_debug_does_not_require_detector_debug() {
        assert_eq!(format!("{:?}", ModelHandle::Unavailable), "Unavailable");
        let ready = ModelHandle::ready(FixedDetector(vec![]));
        assert!(format!("{ready:?}").starts_with("Ready"));
    }
}
