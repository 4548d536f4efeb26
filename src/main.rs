//! `depthmap` server - serve depth map estimation over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use depthmap::model::{DevicePreference, ModelType};
use depthmap::server::{self, ServerConfig};
use depthmap::{Config, Pipeline};

/// Serve monocular depth estimation for uploaded images.
#[derive(Parser, Debug)]
#[command(name = "depthmap")]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1", value_name = "IP")]
    host: std::net::IpAddr,

    /// Port to listen on.
    #[arg(short, long, default_value = "5000", value_name = "PORT")]
    port: u16,

    /// Depth model family.
    #[arg(short, long, value_enum, default_value_t = ModelArg::DptLarge)]
    model: ModelArg,

    /// Load the model from this ONNX file instead of the cache.
    #[arg(long, value_name = "PATH")]
    model_path: Option<PathBuf>,

    /// Directory for downloaded models.
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Compute device.
    #[arg(short, long, value_enum, default_value_t = DeviceArg::Auto)]
    device: DeviceArg,

    /// CUDA device ordinal when running on CUDA.
    #[arg(long, default_value = "0", value_name = "INT")]
    cuda_device: i32,

    /// ONNX Runtime intra-op threads (0 = runtime default).
    #[arg(long, default_value = "0", value_name = "INT")]
    threads: usize,

    /// Keep the source aspect ratio when resizing for the model.
    /// Defaults to the model family's recipe.
    #[arg(long, value_name = "BOOL")]
    keep_aspect_ratio: Option<bool>,

    /// Directory raw uploads are staged in.
    #[arg(long, default_value = "uploads", value_name = "DIR")]
    upload_dir: PathBuf,

    /// Directory served under /static.
    #[arg(long, default_value = "static", value_name = "DIR")]
    static_dir: PathBuf,

    /// Largest accepted upload in MiB.
    #[arg(long, default_value = "32", value_name = "MIB")]
    max_upload_mb: usize,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModelArg {
    DptLarge,
    DptHybrid,
    MidasSmall,
}

impl From<ModelArg> for ModelType {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::DptLarge => Self::DptLarge,
            ModelArg::DptHybrid => Self::DptHybrid,
            ModelArg::MidasSmall => Self::MidasSmall,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DeviceArg {
    Auto,
    Cpu,
    Cuda,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("depthmap={log_level},tower_http={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    let device = match args.device {
        DeviceArg::Auto => DevicePreference::Auto,
        DeviceArg::Cpu => DevicePreference::Cpu,
        DeviceArg::Cuda => DevicePreference::Cuda(args.cuda_device),
    };

    let config = Config {
        model: args.model.into(),
        model_path: args.model_path.clone(),
        cache_dir: args.cache_dir.clone(),
        device,
        num_threads: args.threads,
        keep_aspect_ratio: args.keep_aspect_ratio,
        upload_dir: args.upload_dir.clone(),
        static_dir: args.static_dir.clone(),
    };

    if args.max_upload_mb == 0 {
        anyhow::bail!("--max-upload-mb must be greater than 0");
    }
    let server_config = ServerConfig {
        address: SocketAddr::new(args.host, args.port),
        max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
    };

    // Model loading blocks, so it happens before the async runtime starts
    let pipeline = Pipeline::new(config).context("Failed to initialize depth pipeline")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime
        .block_on(server::serve(Arc::new(pipeline), &server_config))
        .context("HTTP server failed")
}
