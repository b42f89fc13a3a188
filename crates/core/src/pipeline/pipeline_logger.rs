use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use crate::session::domain::session::{ConnectionId, FrameStats};
use crate::shared::frame_error::FrameError;

/// Cross-cutting logger for frame pipeline events.
///
/// Shared by every worker thread, so all methods take `&self`.
pub trait PipelineLogger: Send + Sync {
    /// Periodic per-connection throughput record (sampled frames only).
    fn frame_rate(&self, id: ConnectionId, stats: &FrameStats);

    /// An inbound payload exceeded the soft size threshold.
    fn oversized_payload(&self, id: ConnectionId, bytes: usize, limit: usize);

    /// Record how long a named pipeline stage took for one frame.
    fn timing(&self, stage: &str, duration_ms: f64);

    /// A stage failed and the frame was answered with an error.
    fn stage_failure(&self, id: ConnectionId, error: &FrameError);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events. Used by tests.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn frame_rate(&self, _id: ConnectionId, _stats: &FrameStats) {}
    fn oversized_payload(&self, _id: ConnectionId, _bytes: usize, _limit: usize) {}
    fn timing(&self, _stage: &str, _duration_ms: f64) {}
    fn stage_failure(&self, _id: ConnectionId, _error: &FrameError) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StageStats {
    pub count: u64,
    pub total_ms: f64,
    pub max_ms: f64,
}

impl StageStats {
    pub fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms / self.count as f64
        }
    }
}

#[derive(Default)]
struct Tally {
    stages: HashMap<String, StageStats>,
    failures: HashMap<&'static str, u64>,
    oversized: u64,
}

/// `log`-backed logger that aggregates per-stage timings and failure counts
/// and reports them in a summary at shutdown.
///
/// Aggregates are running totals, so memory stays flat however long the
/// server runs.
pub struct LogPipelineLogger {
    tally: Mutex<Tally>,
    start_time: Instant,
}

impl LogPipelineLogger {
    pub fn new() -> Self {
        Self {
            tally: Mutex::new(Tally::default()),
            start_time: Instant::now(),
        }
    }

    /// Returns the formatted summary string, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        let tally = self.tally.lock().ok()?;
        if tally.stages.is_empty() && tally.failures.is_empty() && tally.oversized == 0 {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!("Pipeline summary ({elapsed_s:.1}s uptime):")];

        let mut stages: Vec<_> = tally.stages.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, stats) in stages {
            lines.push(format!(
                "  {stage:10}: avg {:6.1}ms  max {:7.1}ms  ({} frames)",
                stats.avg_ms(),
                stats.max_ms,
                stats.count
            ));
        }

        let mut failures: Vec<_> = tally.failures.iter().collect();
        failures.sort();
        for (kind, count) in failures {
            lines.push(format!("  {kind} errors: {count}"));
        }
        if tally.oversized > 0 {
            lines.push(format!("  oversized payloads: {}", tally.oversized));
        }

        Some(lines.join("\n"))
    }

    /// Returns the aggregated timing for a given stage.
    pub fn stage_stats(&self, stage: &str) -> Option<StageStats> {
        self.tally.lock().ok()?.stages.get(stage).copied()
    }

    pub fn failure_count(&self, kind: &str) -> u64 {
        self.tally
            .lock()
            .ok()
            .and_then(|t| t.failures.get(kind).copied())
            .unwrap_or(0)
    }

    pub fn oversized_count(&self) -> u64 {
        self.tally.lock().map_or(0, |t| t.oversized)
    }

    fn with_tally(&self, f: impl FnOnce(&mut Tally)) {
        if let Ok(mut tally) = self.tally.lock() {
            f(&mut tally);
        }
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn frame_rate(&self, id: ConnectionId, stats: &FrameStats) {
        match stats.fps {
            Some(fps) => log::info!(
                "{id}: {fps:.1} fps, {} frames processed",
                stats.frames_processed
            ),
            None => log::info!("{id}: {} frames processed", stats.frames_processed),
        }
    }

    fn oversized_payload(&self, id: ConnectionId, bytes: usize, limit: usize) {
        self.with_tally(|t| t.oversized += 1);
        log::warn!("{id}: large frame payload ({bytes} bytes, soft limit {limit})");
    }

    fn timing(&self, stage: &str, duration_ms: f64) {
        self.with_tally(|t| {
            let stats = t.stages.entry(stage.to_string()).or_default();
            stats.count += 1;
            stats.total_ms += duration_ms;
            stats.max_ms = stats.max_ms.max(duration_ms);
        });
    }

    fn stage_failure(&self, id: ConnectionId, error: &FrameError) {
        self.with_tally(|t| *t.failures.entry(error.kind()).or_default() += 1);
        if error.is_client_fault() {
            log::debug!("{id}: rejected frame: {error}");
        } else {
            log::error!("{id}: frame processing failed: {error}");
        }
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let logger = NullPipelineLogger;
        let id = ConnectionId::new(1);
        logger.frame_rate(
            id,
            &FrameStats {
                fps: Some(30.0),
                frames_processed: 30,
                sampled: true,
            },
        );
        logger.oversized_payload(id, 2_000_000, 1_048_576);
        logger.timing("detect", 5.0);
        logger.stage_failure(id, &FrameError::MalformedPayload("x".into()));
        logger.summary();
    }

    #[test]
    fn test_timing_aggregates() {
        let logger = LogPipelineLogger::new();
        logger.timing("detect", 10.0);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("encode", 5.0);

        let detect = logger.stage_stats("detect").unwrap();
        assert_eq!(detect.count, 3);
        assert_relative_eq!(detect.avg_ms(), 20.0);
        assert_relative_eq!(detect.max_ms, 30.0);
        assert_eq!(logger.stage_stats("encode").unwrap().count, 1);
        assert!(logger.stage_stats("annotate").is_none());
    }

    #[test]
    fn test_failures_counted_by_kind() {
        let logger = LogPipelineLogger::new();
        let id = ConnectionId::new(3);
        logger.stage_failure(id, &FrameError::MalformedPayload("a".into()));
        logger.stage_failure(id, &FrameError::MalformedPayload("b".into()));
        logger.stage_failure(id, &FrameError::InferenceError("c".into()));

        assert_eq!(logger.failure_count("malformed_payload"), 2);
        assert_eq!(logger.failure_count("inference"), 1);
        assert_eq!(logger.failure_count("encoding"), 0);
    }

    #[test]
    fn test_summary_includes_stages_and_failures() {
        let logger = LogPipelineLogger::new();
        logger.timing("decode", 2.0);
        logger.timing("detect", 15.0);
        logger.stage_failure(ConnectionId::new(1), &FrameError::InvalidImageData("x".into()));
        logger.oversized_payload(ConnectionId::new(1), 10, 5);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Pipeline summary"));
        assert!(summary.contains("decode"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("invalid_image errors: 1"));
        assert!(summary.contains("oversized payloads: 1"));
        assert_eq!(logger.oversized_count(), 1);
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(LogPipelineLogger::new().summary_string().is_none());
    }
}
