//! The three ways a YOLO artifact is turned into an [`OnnxYoloDetector`].
//!
//! Bootstrap tries them in the order returned by [`default_strategies`].
use std::fs;
use std::path::Path;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

use crate::detection::domain::load_strategy::{LoadError, LoadStrategy};
use crate::detection::domain::object_detector::ObjectDetector;
use crate::detection::infrastructure::label_table::{
    fallback_label, parse_names, read_sidecar, NAMES_METADATA_KEY,
};
use crate::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;

type BuildResult = Result<Session, Box<dyn std::error::Error>>;

/// Standard loader: full graph optimisation on the platform's preferred
/// execution providers. Labels must be embedded in the model metadata.
pub struct DirectLoad {
    confidence: f32,
}

impl DirectLoad {
    pub fn new(confidence: f32) -> Self {
        Self { confidence }
    }
}

impl LoadStrategy for DirectLoad {
    fn name(&self) -> &str {
        "direct"
    }

    fn load(&self, path: &Path) -> Result<Box<dyn ObjectDetector>, LoadError> {
        let session = build_direct(path).map_err(runtime)?;
        let labels = embedded_labels(&session).ok_or(LoadError::MissingLabels)?;
        Ok(Box::new(OnnxYoloDetector::new(session, labels, self.confidence)))
    }
}

/// Reads the raw artifact bytes into a fresh CPU session. Labels come from
/// metadata or the `<model>.names` sidecar.
pub struct CheckpointLoad {
    confidence: f32,
}

impl CheckpointLoad {
    pub fn new(confidence: f32) -> Self {
        Self { confidence }
    }
}

impl LoadStrategy for CheckpointLoad {
    fn name(&self) -> &str {
        "raw-checkpoint"
    }

    fn load(&self, path: &Path) -> Result<Box<dyn ObjectDetector>, LoadError> {
        let bytes = read_artifact(path)?;
        let session =
            build_from_bytes(&bytes, GraphOptimizationLevel::Level1).map_err(runtime)?;
        let labels = embedded_labels(&session)
            .or_else(|| read_sidecar(path))
            .ok_or(LoadError::MissingLabels)?;
        Ok(Box::new(OnnxYoloDetector::new(session, labels, self.confidence)))
    }
}

/// Last resort: no graph optimisation, and a missing label table is
/// tolerated by synthesising `class_<id>` names.
pub struct PermissiveCheckpointLoad {
    confidence: f32,
}

impl PermissiveCheckpointLoad {
    pub fn new(confidence: f32) -> Self {
        Self { confidence }
    }
}

impl LoadStrategy for PermissiveCheckpointLoad {
    fn name(&self) -> &str {
        "permissive-checkpoint"
    }

    fn load(&self, path: &Path) -> Result<Box<dyn ObjectDetector>, LoadError> {
        let bytes = read_artifact(path)?;
        let session =
            build_from_bytes(&bytes, GraphOptimizationLevel::Disable).map_err(runtime)?;
        let labels = embedded_labels(&session)
            .or_else(|| read_sidecar(path))
            .unwrap_or_else(|| synthesized_labels(&session));
        Ok(Box::new(OnnxYoloDetector::new(session, labels, self.confidence)))
    }
}

/// Direct, raw-checkpoint, permissive; all sharing one confidence threshold.
pub fn default_strategies(confidence: f32) -> Vec<Box<dyn LoadStrategy>> {
    vec![
        Box::new(DirectLoad::new(confidence)),
        Box::new(CheckpointLoad::new(confidence)),
        Box::new(PermissiveCheckpointLoad::new(confidence)),
    ]
}

fn build_direct(path: &Path) -> BuildResult {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(path)?;
    Ok(session)
}

fn build_from_bytes(bytes: &[u8], level: GraphOptimizationLevel) -> BuildResult {
    let session = Session::builder()?
        .with_optimization_level(level)?
        .commit_from_memory(bytes)?;
    Ok(session)
}

/// CoreML on macOS, DirectML on Windows, plain CPU elsewhere. ONNX Runtime
/// falls back to CPU when the provider can't be registered.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

fn read_artifact(path: &Path) -> Result<Vec<u8>, LoadError> {
    if !path.exists() {
        return Err(LoadError::Missing(path.to_path_buf()));
    }
    fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn embedded_labels(session: &Session) -> Option<Vec<String>> {
    let metadata = session.metadata().ok()?;
    let raw = metadata.custom(NAMES_METADATA_KEY)?;
    parse_names(&raw)
}

/// Class count from a static `[1, 4+nc, N]` / `[1, N, 4+nc]` output shape.
/// The smaller of the two trailing dimensions is the feature axis.
fn synthesized_labels(session: &Session) -> Vec<String> {
    let class_count = session.outputs().first().and_then(|output| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = output.dtype() {
            class_count_from_shape(shape)
        } else {
            None
        }
    });
    match class_count {
        Some(n) => (0..n).map(fallback_label).collect(),
        None => {
            log::warn!("Model output shape is dynamic; labels default to class ids");
            Vec::new()
        }
    }
}

fn class_count_from_shape(shape: &[i64]) -> Option<usize> {
    if shape.len() != 3 || shape[1] <= 0 || shape[2] <= 0 {
        return None;
    }
    let features = shape[1].min(shape[2]) as usize;
    features.checked_sub(4).filter(|&n| n > 0)
}

fn runtime(e: impl std::fmt::Display) -> LoadError {
    LoadError::Runtime(e.to_string())
}
