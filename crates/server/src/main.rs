mod config;
mod transport;

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use framewatch_core::detection::domain::model_handle::ModelHandle;
use framewatch_core::detection::infrastructure::model_bootstrap::ModelBootstrap;
use framewatch_core::detection::infrastructure::model_resolver::{self, ArtifactSource};
use framewatch_core::pipeline::app_context::AppContext;
use framewatch_core::pipeline::pipeline_logger::{LogPipelineLogger, PipelineLogger};

use crate::config::ServerConfig;
use crate::transport::ServerState;

/// Streams live video frames back with object-detection overlays.
#[derive(Parser)]
#[command(name = "framewatch")]
struct Cli {
    /// JSON config file (default: <config dir>/framewatch/config.json if present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8000.
    #[arg(long)]
    bind: Option<String>,

    /// Model artifact path.
    #[arg(long)]
    model: Option<PathBuf>,

    /// URL to fetch the model from when the artifact is missing.
    #[arg(long)]
    model_url: Option<String>,

    /// Detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f32>,

    /// JPEG quality of returned frames (1-100).
    #[arg(long)]
    jpeg_quality: Option<u8>,

    /// Frame worker threads (default: available cores).
    #[arg(long)]
    workers: Option<usize>,

    /// Frames allowed to wait for a worker before new ones are rejected.
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Per-frame deadline in milliseconds (default: none).
    #[arg(long)]
    frame_timeout_ms: Option<u64>,

    /// Largest accepted inbound message in bytes.
    #[arg(long)]
    max_payload_size: Option<usize>,

    /// Payload size above which a warning is logged.
    #[arg(long)]
    soft_payload_limit: Option<usize>,

    /// Log a frame-rate record every N frames per connection.
    #[arg(long)]
    log_sample_interval: Option<u64>,

    /// Seconds between keepalive pings.
    #[arg(long)]
    ping_interval: Option<u64>,

    /// Seconds without traffic before a connection is dropped.
    #[arg(long)]
    ping_timeout: Option<u64>,
}

impl Cli {
    fn apply(self, config: &mut ServerConfig) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *slot = v;
            }
        }
        set(&mut config.bind, self.bind);
        set(&mut config.model_path, self.model);
        set(&mut config.confidence, self.confidence);
        set(&mut config.jpeg_quality, self.jpeg_quality);
        set(&mut config.workers, self.workers);
        set(&mut config.queue_capacity, self.queue_capacity);
        set(&mut config.max_payload_size, self.max_payload_size);
        set(&mut config.soft_payload_limit, self.soft_payload_limit);
        set(&mut config.log_sample_interval, self.log_sample_interval);
        set(&mut config.ping_interval_secs, self.ping_interval);
        set(&mut config.ping_timeout_secs, self.ping_timeout);
        if self.model_url.is_some() {
            config.model_url = self.model_url;
        }
        if self.frame_timeout_ms.is_some() {
            config.frame_timeout_ms = self.frame_timeout_ms;
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

type BoxError = Box<dyn Error + Send + Sync>;

fn run() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let mut config = ServerConfig::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    let addr = config.bind_addr()?;

    // Model resolution uses blocking I/O, so it runs before the runtime starts.
    let model = load_model(&config);

    let logger: Arc<dyn PipelineLogger> = Arc::new(LogPipelineLogger::new());
    let ctx = AppContext::new(&config.pipeline_config(), model, logger)?;
    let state = Arc::new(ServerState {
        ctx,
        max_payload_size: config.max_payload_size,
        ping_interval: config.ping_interval(),
        ping_timeout: config.ping_timeout(),
    });

    serve_blocking(state, addr)
}

fn serve_blocking(state: Arc<ServerState>, addr: SocketAddr) -> Result<(), BoxError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(transport::serve(state, addr))
}

fn load_model(config: &ServerConfig) -> ModelHandle {
    log::info!("Resolving model: {}", config.model_path.display());
    match model_resolver::ensure_artifact(
        &config.model_path,
        config.model_url.as_deref(),
        Some(Box::new(download_progress)),
    ) {
        Ok(ArtifactSource::Downloaded) => eprintln!(),
        Ok(_) => {}
        Err(e) => log::error!("Model download failed: {e}"),
    }
    ModelBootstrap::onnx(config.confidence).run(&config.model_path)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading detection model... {pct}%");
    } else {
        eprint!("\rDownloading detection model... {downloaded} bytes");
    }
}
