use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::detection::domain::object_detector::ObjectDetector;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("model artifact not found at {0}")]
    Missing(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("inference runtime rejected the model: {0}")]
    Runtime(String),
    #[error("model carries no class label table")]
    MissingLabels,
}

/// One way of turning a model artifact into a ready detector.
///
/// Strategies are tried in order during bootstrap; each one is independent
/// and must not leave state behind when it fails.
pub trait LoadStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn load(&self, path: &Path) -> Result<Box<dyn ObjectDetector>, LoadError>;
}
