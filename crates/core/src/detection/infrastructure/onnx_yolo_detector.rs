//! Multi-class YOLO detector running on ONNX Runtime via `ort`.
//!
//! Handles letterbox preprocessing, inference, output decoding for either
//! tensor orientation, and class-aware NMS.
use std::sync::{Mutex, MutexGuard};

use crate::detection::domain::detection::Detection;
use crate::detection::domain::object_detector::{DetectorError, ObjectDetector};
use crate::detection::infrastructure::label_table::fallback_label;
use crate::shared::frame::Frame;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f32 = 0.45;

/// Box geometry occupies the first four features of every prediction row.
const BOX_FEATURES: usize = 4;

pub struct OnnxYoloDetector {
    // `Session::run` needs exclusive access; frames from different
    // connections take turns on the one session.
    session: Mutex<ort::session::Session>,
    labels: Vec<String>,
    confidence: f32,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Wraps a committed session.
    ///
    /// The input resolution is read from the model's input shape (expecting
    /// NCHW). Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(session: ort::session::Session, labels: Vec<String>, confidence: f32) -> Self {
        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Self {
            session: Mutex::new(session),
            labels,
            confidence,
            input_size,
        }
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }
}

impl ObjectDetector for OnnxYoloDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
        if frame.channels() < 3 {
            return Err(format!("expected an RGB frame, got {} channel(s)", frame.channels()).into());
        }

        let (input_tensor, transform) = letterbox(frame, self.input_size)?;
        let input_value = ort::value::Tensor::from_array(input_tensor)?;

        let mut session = lock_recovering(&self.session);
        let outputs = session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let candidates = decode_predictions(data, &shape, self.confidence, &transform)?;
        let kept = nms(candidates, NMS_IOU_THRESH);

        Ok(kept
            .into_iter()
            .map(|raw| raw.into_detection(&self.labels))
            .collect())
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Maps letterboxed model coordinates back onto the source frame.
#[derive(Clone, Copy, Debug, PartialEq)]
struct LetterboxTransform {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl LetterboxTransform {
    fn to_frame(&self, cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
        let (cx, cy, w, h) = (cx as f64, cy as f64, w as f64, h as f64);
        let px = self.pad_x as f64;
        let py = self.pad_y as f64;
        (
            (((cx - w / 2.0) - px) / self.scale) as f32,
            (((cy - h / 2.0) - py) / self.scale) as f32,
            (((cx + w / 2.0) - px) / self.scale) as f32,
            (((cy + h / 2.0) - py) / self.scale) as f32,
        )
    }
}

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns the NCHW float32 tensor and the inverse transform.
fn letterbox(
    frame: &Frame,
    target_size: u32,
) -> Result<(ndarray::Array4<f32>, LetterboxTransform), DetectorError> {
    if frame.is_empty() {
        return Err("cannot letterbox an empty frame".into());
    }
    let src = frame
        .as_ndarray()
        .ok_or("frame data length does not match its dimensions")?; // [H, W, C] u8

    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding is 114/255 gray, the YOLO training convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize + copy into padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    Ok((
        tensor,
        LetterboxTransform {
            scale,
            pad_x,
            pad_y,
        },
    ))
}

// ---------------------------------------------------------------------------
// Output decoding
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    class_id: usize,
    confidence: f32,
}

impl RawDetection {
    fn into_detection(self, labels: &[String]) -> Detection {
        let label = labels
            .get(self.class_id)
            .cloned()
            .unwrap_or_else(|| fallback_label(self.class_id));
        Detection {
            x1: self.x1,
            y1: self.y1,
            x2: self.x2,
            y2: self.y2,
            class_id: self.class_id,
            label,
            confidence: self.confidence,
        }
    }

    fn bbox(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// Decodes a `[1, 4 + classes, N]` or `[1, N, 4 + classes]` prediction tensor.
///
/// Each row is `[cx, cy, w, h, score_0, .., score_k]`; the best class score is
/// the detection confidence.
fn decode_predictions(
    data: &[f32],
    shape: &[usize],
    confidence: f32,
    transform: &LetterboxTransform,
) -> Result<Vec<RawDetection>, DetectorError> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    // Exporters emit [1, features, detections]; features is the smaller axis.
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats <= BOX_FEATURES {
        return Err(format!("YOLO output has no class scores: {shape:?}").into());
    }
    if data.len() < num_dets * num_feats {
        return Err(format!(
            "YOLO output holds {} values, shape {shape:?} needs {}",
            data.len(),
            num_dets * num_feats
        )
        .into());
    }

    let feature = |det: usize, feat: usize| -> f32 {
        if transposed {
            data[feat * num_dets + det]
        } else {
            data[det * num_feats + feat]
        }
    };

    let mut raw = Vec::new();
    for i in 0..num_dets {
        let (class_id, score) = (BOX_FEATURES..num_feats)
            .map(|f| (f - BOX_FEATURES, feature(i, f)))
            .fold((0, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        if score < confidence {
            continue;
        }

        let (x1, y1, x2, y2) =
            transform.to_frame(feature(i, 0), feature(i, 1), feature(i, 2), feature(i, 3));
        raw.push(RawDetection {
            x1,
            y1,
            x2,
            y2,
            class_id,
            confidence: score,
        });
    }
    Ok(raw)
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

/// Greedy class-aware NMS: sort by confidence descending, suppress
/// overlapping boxes of the same class.
///
/// The sort is stable, so equal scores keep their decode order.
fn nms(mut dets: Vec<RawDetection>, iou_thresh: f32) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in dets {
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == det.class_id && bbox_iou(&k.bbox(), &det.bbox()) > iou_thresh);
        if !suppressed {
            keep.push(det);
        }
    }
    keep
}

fn bbox_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// A panic mid-inference leaves the session usable; the next frame runs.
fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
