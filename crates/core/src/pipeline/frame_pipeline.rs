use std::sync::Arc;
use std::time::Instant;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::codec::domain::frame_codec::FrameCodec;
use crate::detection::domain::model_handle::ModelHandle;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::session::domain::session::ConnectionId;
use crate::shared::frame_error::FrameError;

/// Exactly one of these is produced per submitted frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Encoded annotated frame, ready to send back.
    Processed(String),
    /// Human-readable reason the frame was dropped.
    Error(String),
}

impl FrameOutcome {
    /// Name of the outbound event carrying this outcome.
    pub fn event(&self) -> &'static str {
        match self {
            FrameOutcome::Processed(_) => "processed_frame",
            FrameOutcome::Error(_) => "error",
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            FrameOutcome::Processed(data) | FrameOutcome::Error(data) => data,
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, FrameOutcome::Processed(_))
    }
}

/// Runs one inbound frame through decode → detect → annotate → encode.
/// Session accounting happens on the connection's task before submission.
///
/// Every stage failure is scoped to the frame: it becomes an
/// [`FrameOutcome::Error`] and the session carries on.
pub struct FramePipeline {
    codec: Arc<dyn FrameCodec>,
    model: ModelHandle,
    annotator: Arc<dyn FrameAnnotator>,
    logger: Arc<dyn PipelineLogger>,
    soft_payload_limit: usize,
}

impl FramePipeline {
    pub fn new(
        codec: Arc<dyn FrameCodec>,
        model: ModelHandle,
        annotator: Arc<dyn FrameAnnotator>,
        logger: Arc<dyn PipelineLogger>,
        soft_payload_limit: usize,
    ) -> Self {
        Self {
            codec,
            model,
            annotator,
            logger,
            soft_payload_limit,
        }
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn process(&self, id: ConnectionId, payload: &str) -> FrameOutcome {
        if payload.len() > self.soft_payload_limit {
            self.logger
                .oversized_payload(id, payload.len(), self.soft_payload_limit);
        }

        match self.run_stages(payload) {
            Ok(encoded) => FrameOutcome::Processed(encoded),
            Err(e) => {
                self.logger.stage_failure(id, &e);
                FrameOutcome::Error(e.to_string())
            }
        }
    }

    fn run_stages(&self, payload: &str) -> Result<String, FrameError> {
        let mut frame = self.timed("decode", || self.codec.decode(payload))?;

        if self.model.is_ready() {
            let detections = self.timed("detect", || self.model.infer(&frame))?;
            self.timed("annotate", || {
                self.annotator
                    .annotate(&mut frame, &detections)
                    .map_err(|e| FrameError::InferenceError(format!("annotation: {e}")))
            })?;
        }

        self.timed("encode", || self.codec.encode(&frame))
    }

    fn timed<T>(&self, stage: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.logger
            .timing(stage, start.elapsed().as_secs_f64() * 1000.0);
        out
    }
}
