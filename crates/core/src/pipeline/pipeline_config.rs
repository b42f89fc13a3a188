use std::time::Duration;

use crate::shared::constants::{
    DEFAULT_JPEG_QUALITY, DEFAULT_LOG_SAMPLE_INTERVAL, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_SOFT_PAYLOAD_LIMIT,
};

/// Knobs the frame pipeline and its worker pool need.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub jpeg_quality: u8,
    pub soft_payload_limit: usize,
    pub log_sample_interval: u64,
    pub workers: usize,
    pub queue_capacity: usize,
    /// Total per-frame deadline measured from submission. `None` waits forever.
    pub frame_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            soft_payload_limit: DEFAULT_SOFT_PAYLOAD_LIMIT,
            log_sample_interval: DEFAULT_LOG_SAMPLE_INTERVAL,
            workers: default_workers(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            frame_timeout: None,
        }
    }
}

/// One worker per available core.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
