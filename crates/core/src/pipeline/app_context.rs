use std::sync::Arc;
use std::time::Instant;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::annotation::infrastructure::box_label_annotator::BoxLabelAnnotator;
use crate::codec::domain::frame_codec::FrameCodec;
use crate::codec::infrastructure::jpeg_data_uri_codec::JpegDataUriCodec;
use crate::detection::domain::model_handle::ModelHandle;
use crate::pipeline::frame_pipeline::{FrameOutcome, FramePipeline};
use crate::pipeline::infrastructure::frame_worker_pool::FrameWorkerPool;
use crate::pipeline::pipeline_config::PipelineConfig;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::session::domain::session::ConnectionId;
use crate::session::session_registry::SessionRegistry;

/// Everything a connection handler needs, built once at startup and shared
/// by `Arc`.
pub struct AppContext {
    sessions: Arc<SessionRegistry>,
    pipeline: Arc<FramePipeline>,
    workers: FrameWorkerPool,
    logger: Arc<dyn PipelineLogger>,
}

impl AppContext {
    /// Wires the JPEG data-URI codec and box/label annotator.
    pub fn new(
        config: &PipelineConfig,
        model: ModelHandle,
        logger: Arc<dyn PipelineLogger>,
    ) -> std::io::Result<Self> {
        Self::with_components(
            config,
            model,
            Arc::new(JpegDataUriCodec::new(config.jpeg_quality)),
            Arc::new(BoxLabelAnnotator::new()),
            logger,
        )
    }

    pub fn with_components(
        config: &PipelineConfig,
        model: ModelHandle,
        codec: Arc<dyn FrameCodec>,
        annotator: Arc<dyn FrameAnnotator>,
        logger: Arc<dyn PipelineLogger>,
    ) -> std::io::Result<Self> {
        let sessions = Arc::new(SessionRegistry::new(config.log_sample_interval));
        let pipeline = Arc::new(FramePipeline::new(
            codec,
            model,
            annotator,
            Arc::clone(&logger),
            config.soft_payload_limit,
        ));
        let workers = FrameWorkerPool::new(
            Arc::clone(&pipeline),
            config.workers,
            config.queue_capacity,
            config.frame_timeout,
        )?;
        Ok(Self {
            sessions,
            pipeline,
            workers,
            logger,
        })
    }

    /// Registers a new connection and returns its id.
    pub fn connect(&self) -> ConnectionId {
        let id = self.sessions.allocate_id();
        self.sessions.on_connect(id);
        id
    }

    pub fn disconnect(&self, id: ConnectionId) {
        self.sessions.on_disconnect(id);
    }

    /// Counts the frame against its session at arrival, then runs it on the
    /// worker pool. Always yields exactly one outcome, including for frames
    /// the pool rejects.
    pub async fn submit_frame(&self, id: ConnectionId, payload: String) -> FrameOutcome {
        match self.sessions.on_frame(id, Instant::now()) {
            Some(stats) if stats.sampled => self.logger.frame_rate(id, &stats),
            Some(_) => {}
            None => log::debug!("{id}: frame arrived without a session; skipping accounting"),
        }
        self.workers.submit(id, payload).await
    }

    pub fn model_ready(&self) -> bool {
        self.pipeline.model().is_ready()
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn workers(&self) -> &FrameWorkerPool {
        &self.workers
    }

    /// Logs the end-of-run pipeline summary.
    pub fn report(&self) {
        self.logger.summary();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use crossbeam_channel::{Receiver, Sender};
    use image::{ImageFormat, Rgb, RgbImage};

    use crate::detection::domain::detection::Detection;
    use crate::detection::domain::object_detector::{DetectorError, ObjectDetector};
    use crate::pipeline::infrastructure::frame_worker_pool::SERVER_BUSY;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::frame::Frame;

    /// Holds every detection until the test releases it.
    struct GatedDetector {
        entered: Sender<()>,
        gate: Receiver<()>,
    }

    impl ObjectDetector for GatedDetector {
        fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, DetectorError> {
            let _ = self.entered.send(());
            self.gate.recv().map_err(|e| -> DetectorError { e.to_string().into() })?;
            Ok(Vec::new())
        }

        fn labels(&self) -> &[String] {
            &[]
        }
    }

    fn jpeg_data_uri() -> String {
        let image = RgbImage::from_pixel(8, 8, Rgb([20, 40, 60]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .unwrap();
        format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes))
    }

    fn context() -> AppContext {
        let config = PipelineConfig {
            workers: 1,
            ..PipelineConfig::default()
        };
        AppContext::new(&config, ModelHandle::Unavailable, Arc::new(NullPipelineLogger)).unwrap()
    }

    #[test]
    fn test_connect_and_disconnect_track_sessions() {
        let ctx = context();
        let a = ctx.connect();
        let b = ctx.connect();
        assert_ne!(a, b);
        assert_eq!(ctx.sessions().len(), 2);

        ctx.disconnect(a);
        assert!(!ctx.sessions().contains(a));
        assert!(ctx.sessions().contains(b));
    }

    #[tokio::test]
    async fn test_submit_frame_counts_against_session() {
        let ctx = context();
        let id = ctx.connect();

        let outcome = ctx.submit_frame(id, "not-a-data-uri".into()).await;

        assert_eq!(outcome.event(), "error");
        assert_eq!(ctx.sessions().frames_processed(id), Some(1));
    }

    #[tokio::test]
    async fn test_rejected_frame_still_counts_against_session() {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let detector = GatedDetector {
            entered: entered_tx,
            gate: release_rx,
        };
        let config = PipelineConfig {
            workers: 1,
            queue_capacity: 1,
            ..PipelineConfig::default()
        };
        let ctx =
            AppContext::new(&config, ModelHandle::ready(detector), Arc::new(NullPipelineLogger))
                .unwrap();
        let id = ctx.connect();

        // Occupy the single worker and the single queue slot.
        let running = ctx.workers().try_submit(id, jpeg_data_uri()).unwrap();
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let queued = ctx.workers().try_submit(id, jpeg_data_uri()).unwrap();

        let outcome = ctx.submit_frame(id, jpeg_data_uri()).await;

        assert_eq!(outcome, FrameOutcome::Error(SERVER_BUSY.into()));
        assert_eq!(ctx.sessions().frames_processed(id), Some(1));

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        assert!(running.await.unwrap().is_processed());
        assert!(queued.await.unwrap().is_processed());
    }

    #[tokio::test]
    async fn test_frame_after_disconnect_is_processed_without_accounting() {
        let ctx = context();
        let id = ctx.connect();
        ctx.disconnect(id);

        let outcome = ctx.submit_frame(id, jpeg_data_uri()).await;

        assert!(outcome.is_processed());
        assert!(!ctx.sessions().contains(id));
        assert_eq!(ctx.sessions().frames_processed(id), None);
    }

    #[test]
    fn test_model_state_reported() {
        assert!(!context().model_ready());
    }
}
