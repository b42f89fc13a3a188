use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use framewatch_core::pipeline::pipeline_config::{default_workers, PipelineConfig};
use framewatch_core::shared::constants::{
    DEFAULT_CONFIDENCE, DEFAULT_JPEG_QUALITY, DEFAULT_LOG_SAMPLE_INTERVAL,
    DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_MODEL_PATH, DEFAULT_PING_INTERVAL_SECS,
    DEFAULT_PING_TIMEOUT_SECS, DEFAULT_QUEUE_CAPACITY, DEFAULT_SOFT_PAYLOAD_LIMIT,
};

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Every option the server recognises. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub ping_interval_secs: u64,
    pub ping_timeout_secs: u64,
    pub max_payload_size: usize,
    pub model_path: PathBuf,
    pub model_url: Option<String>,
    pub jpeg_quality: u8,
    pub soft_payload_limit: usize,
    pub log_sample_interval: u64,
    pub confidence: f32,
    pub workers: usize,
    pub queue_capacity: usize,
    pub frame_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            ping_interval_secs: DEFAULT_PING_INTERVAL_SECS,
            ping_timeout_secs: DEFAULT_PING_TIMEOUT_SECS,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            model_url: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            soft_payload_limit: DEFAULT_SOFT_PAYLOAD_LIMIT,
            log_sample_interval: DEFAULT_LOG_SAMPLE_INTERVAL,
            confidence: DEFAULT_CONFIDENCE,
            workers: default_workers(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            frame_timeout_ms: None,
        }
    }
}

/// `<config dir>/framewatch/config.json`, e.g. `~/.config/framewatch/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("framewatch").join("config.json"))
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// An explicit path must exist. Otherwise the per-user default file is
    /// used when present, and built-in defaults when not.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path().filter(|p| p.is_file()) {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        self.bind_addr()?;
        if !(0.0..=1.0).contains(&self.confidence) {
            return invalid(format!(
                "confidence must be between 0.0 and 1.0, got {}",
                self.confidence
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return invalid(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            ));
        }
        if self.ping_interval_secs == 0 {
            return invalid("ping_interval_secs must be positive".into());
        }
        if self.ping_timeout_secs < self.ping_interval_secs {
            return invalid(format!(
                "ping_timeout_secs ({}) must not be shorter than ping_interval_secs ({})",
                self.ping_timeout_secs, self.ping_interval_secs
            ));
        }
        if self.max_payload_size == 0 {
            return invalid("max_payload_size must be positive".into());
        }
        if self.workers == 0 {
            return invalid("workers must be at least 1".into());
        }
        if self.queue_capacity == 0 {
            return invalid("queue_capacity must be at least 1".into());
        }
        if self.log_sample_interval == 0 {
            return invalid("log_sample_interval must be at least 1".into());
        }
        if self.frame_timeout_ms == Some(0) {
            return invalid("frame_timeout_ms must be positive when set".into());
        }
        if self.soft_payload_limit > self.max_payload_size {
            log::warn!(
                "soft_payload_limit ({}) exceeds max_payload_size ({}); the warning can never fire",
                self.soft_payload_limit,
                self.max_payload_size
            );
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("bind address '{}': {e}", self.bind)))
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            jpeg_quality: self.jpeg_quality,
            soft_payload_limit: self.soft_payload_limit,
            log_sample_interval: self.log_sample_interval,
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            frame_timeout: self.frame_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.log_sample_interval, 30);
        assert_eq!(config.model_path, PathBuf::from("weights/best.onnx"));
        assert_eq!(config.frame_timeout_ms, None);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"jpeg_quality": 60, "frame_timeout_ms": 500}"#).unwrap();

        let config = ServerConfig::load(&path).unwrap();

        assert_eq!(config.jpeg_quality, 60);
        assert_eq!(config.frame_timeout_ms, Some(500));
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(
            config.pipeline_config().frame_timeout,
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"jpeg_qualty": 60}"#).unwrap();
        assert!(matches!(ServerConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_explicit_missing_file_is_read_error() {
        let tmp = TempDir::new().unwrap();
        let result = ServerConfig::load_or_default(Some(&tmp.path().join("absent.json")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_roundtrip_through_json() {
        let config = ServerConfig {
            model_url: Some("https://example.com/best.onnx".into()),
            ..ServerConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[rstest]
    #[case::confidence(ServerConfig { confidence: 1.5, ..ServerConfig::default() })]
    #[case::quality_zero(ServerConfig { jpeg_quality: 0, ..ServerConfig::default() })]
    #[case::quality_high(ServerConfig { jpeg_quality: 101, ..ServerConfig::default() })]
    #[case::ping_interval(ServerConfig { ping_interval_secs: 0, ..ServerConfig::default() })]
    #[case::ping_order(ServerConfig { ping_interval_secs: 30, ping_timeout_secs: 10, ..ServerConfig::default() })]
    #[case::workers(ServerConfig { workers: 0, ..ServerConfig::default() })]
    #[case::queue(ServerConfig { queue_capacity: 0, ..ServerConfig::default() })]
    #[case::sampling(ServerConfig { log_sample_interval: 0, ..ServerConfig::default() })]
    #[case::timeout(ServerConfig { frame_timeout_ms: Some(0), ..ServerConfig::default() })]
    #[case::bind(ServerConfig { bind: "not an address".into(), ..ServerConfig::default() })]
    #[case::payload(ServerConfig { max_payload_size: 0, ..ServerConfig::default() })]
    fn test_invalid_values_rejected(#[case] config: ServerConfig) {
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
