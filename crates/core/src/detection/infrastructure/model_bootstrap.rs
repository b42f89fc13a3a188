use std::path::Path;
use std::sync::Arc;

use crate::detection::domain::load_strategy::LoadStrategy;
use crate::detection::domain::model_handle::ModelHandle;
use crate::detection::infrastructure::onnx_load_strategies::default_strategies;

/// Tries each strategy in order; the first detector produced wins.
pub struct ModelBootstrap {
    strategies: Vec<Box<dyn LoadStrategy>>,
}

impl ModelBootstrap {
    pub fn new(strategies: Vec<Box<dyn LoadStrategy>>) -> Self {
        Self { strategies }
    }

    /// The standard ONNX cascade.
    pub fn onnx(confidence: f32) -> Self {
        Self::new(default_strategies(confidence))
    }

    /// Resolves the model once. A missing artifact short-circuits to
    /// `Unavailable` without attempting any strategy.
    pub fn run(&self, path: &Path) -> ModelHandle {
        if !path.exists() {
            log::warn!(
                "Model artifact not found at {}; serving frames without detection",
                path.display()
            );
            return ModelHandle::Unavailable;
        }

        for strategy in &self.strategies {
            match strategy.load(path) {
                Ok(detector) => {
                    log::info!(
                        "Model loaded via {} strategy ({} classes)",
                        strategy.name(),
                        detector.labels().len()
                    );
                    return ModelHandle::Ready(Arc::from(detector));
                }
                Err(e) => log::warn!("{} load failed: {e}", strategy.name()),
            }
        }

        log::error!(
            "All model load strategies failed for {}; serving frames without detection",
            path.display()
        );
        ModelHandle::Unavailable
    }
}
