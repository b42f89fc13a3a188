use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::TrySendError;
use tokio::sync::oneshot;

use crate::pipeline::frame_pipeline::{FrameOutcome, FramePipeline};
use crate::session::domain::session::ConnectionId;

pub const SERVER_BUSY: &str = "server busy";
pub const FRAME_TIMED_OUT: &str = "frame processing timed out";

struct FrameJob {
    id: ConnectionId,
    payload: String,
    reply: oneshot::Sender<FrameOutcome>,
}

/// Reply handle for a frame accepted by the pool.
pub type PendingFrame = oneshot::Receiver<FrameOutcome>;

/// Fixed set of OS threads running [`FramePipeline::process`], fed by a
/// bounded queue.
///
/// Submission never blocks: a full queue rejects the frame immediately so
/// the async runtime is never stalled by CPU-bound work.
pub struct FrameWorkerPool {
    job_tx: Option<crossbeam_channel::Sender<FrameJob>>,
    handles: Vec<JoinHandle<()>>,
    timeout: Option<Duration>,
}

impl FrameWorkerPool {
    pub fn new(
        pipeline: Arc<FramePipeline>,
        workers: usize,
        queue_capacity: usize,
        timeout: Option<Duration>,
    ) -> std::io::Result<Self> {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<FrameJob>(queue_capacity.max(1));
        let handles = (0..workers.max(1))
            .map(|n| spawn_worker(n, Arc::clone(&pipeline), job_rx.clone()))
            .collect::<std::io::Result<Vec<_>>>()?;
        log::info!(
            "Frame worker pool started: {} workers, queue capacity {}",
            handles.len(),
            queue_capacity.max(1)
        );
        Ok(Self {
            job_tx: Some(job_tx),
            handles,
            timeout,
        })
    }

    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Frames waiting for a free worker.
    pub fn queue_depth(&self) -> usize {
        self.job_tx.as_ref().map_or(0, |tx| tx.len())
    }

    /// Enqueues a frame without waiting. A rejected frame comes back as the
    /// error outcome to send to the client.
    pub fn try_submit(&self, id: ConnectionId, payload: String) -> Result<PendingFrame, FrameOutcome> {
        let Some(job_tx) = &self.job_tx else {
            return Err(FrameOutcome::Error("server shutting down".into()));
        };
        let (reply, pending) = oneshot::channel();
        match job_tx.try_send(FrameJob { id, payload, reply }) {
            Ok(()) => Ok(pending),
            Err(TrySendError::Full(_)) => {
                log::warn!("{id}: frame queue full, rejecting frame");
                Err(FrameOutcome::Error(SERVER_BUSY.into()))
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(FrameOutcome::Error("server shutting down".into()))
            }
        }
    }

    /// Submits a frame and waits for its outcome, honouring the pool's
    /// per-frame deadline. A late result is discarded by the worker.
    pub async fn submit(&self, id: ConnectionId, payload: String) -> FrameOutcome {
        match self.try_submit(id, payload) {
            Ok(pending) => self.wait(id, pending).await,
            Err(rejected) => rejected,
        }
    }

    async fn wait(&self, id: ConnectionId, pending: PendingFrame) -> FrameOutcome {
        let received = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(received) => received,
                Err(_) => {
                    log::warn!("{id}: frame exceeded {}ms deadline", limit.as_millis());
                    return FrameOutcome::Error(FRAME_TIMED_OUT.into());
                }
            },
            None => pending.await,
        };
        received.unwrap_or_else(|_| FrameOutcome::Error("frame worker stopped".into()))
    }

    /// Stops accepting frames and waits for the workers to drain the queue.
    pub fn shutdown(&mut self) {
        drop(self.job_tx.take());
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::error!("Frame worker thread panicked");
            }
        }
    }
}

impl Drop for FrameWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_worker(
    n: usize,
    pipeline: Arc<FramePipeline>,
    job_rx: crossbeam_channel::Receiver<FrameJob>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("frame-worker-{n}"))
        .spawn(move || {
            for job in job_rx {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    pipeline.process(job.id, &job.payload)
                }))
                .unwrap_or_else(|_| {
                    log::error!("{}: frame pipeline panicked", job.id);
                    FrameOutcome::Error("internal error while processing frame".into())
                });
                // The receiver is gone when the connection closed or timed out.
                let _ = job.reply.send(outcome);
            }
        })
}
