//! Score images from the command line, one JSON line per image.

use std::path::PathBuf;
use std::process::ExitCode;

use aesthetic_score::{AestheticConfig, AestheticPredictor, Device, EmbedderBackend, RawImage};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Predict an aesthetic score for each image.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file.
    #[arg(short, long, default_value = "aesthetic.yaml")]
    config: PathBuf,

    /// Override the configured device ("cpu", "cuda", "cuda:N").
    #[arg(short, long)]
    device: Option<Device>,

    /// Use the deterministic stub embedder instead of the ONNX model.
    #[arg(long)]
    stub: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,

    /// Images to score.
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.log_json)?;

    let mut cfg = AestheticConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(device) = args.device {
        cfg.device = device;
    }
    if args.stub {
        cfg.embedder.backend = EmbedderBackend::Stub;
    }

    let predictor = AestheticPredictor::load(&cfg).context("loading model")?;
    info!(device = %predictor.device(), images = args.images.len(), "scoring");

    let mut failures = 0usize;
    for path in &args.images {
        let result = RawImage::open(path)
            .map_err(Into::into)
            .and_then(|image| predictor.predict(&image));
        match result {
            Ok(score) => {
                let line = serde_json::json!({
                    "path": path.display().to_string(),
                    "score": score,
                });
                println!("{line}");
            }
            Err(err) => {
                failures += 1;
                eprintln!("{}: {err}", path.display());
            }
        }
    }

    if failures > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("aesthetic_score=info"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
