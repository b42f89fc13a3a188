/// Media-type marker prepended to every outbound frame.
pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// JPEG quality for re-encoded frames; keeps replies under the transport budget.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Payloads above this size are logged but still processed.
pub const DEFAULT_SOFT_PAYLOAD_LIMIT: usize = 1024 * 1024;

/// Hard cap on a single inbound WebSocket message.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 8 * 1024 * 1024;

/// Emit a frame-rate record every Nth accepted frame per session.
pub const DEFAULT_LOG_SAMPLE_INTERVAL: u64 = 30;

pub const DEFAULT_MODEL_PATH: &str = "weights/best.onnx";

/// Sidecar label file extension, looked up next to the model artifact.
pub const LABELS_FILE_EXTENSION: &str = "names";

pub const DEFAULT_CONFIDENCE: f32 = 0.25;

pub const DEFAULT_PING_INTERVAL_SECS: u64 = 25;
pub const DEFAULT_PING_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
