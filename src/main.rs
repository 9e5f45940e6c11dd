use annotation_worker::config::Configuration;
use annotation_worker::error::AppError;
use annotation_worker::pipeline::{ColorStatsInference, ImageModule, ModuleOrchestrator};
use annotation_worker::Request;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

/// Annotates the media of a batch of requests and prints the responses as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file holding the list of requests
    requests: PathBuf,

    /// Configuration file layered under `ANNOTATOR_*` environment variables
    config: Option<PathBuf>,
}

fn init_logging(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn read_requests(path: &Path) -> Result<Vec<Request>, AppError> {
    let raw = std::fs::read_to_string(path).map_err(|e| AppError::Io(e, path.to_path_buf()))?;
    Ok(serde_json::from_str(&raw)?)
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();

    let configuration = Configuration::load(args.config.as_deref())?;
    init_logging(&configuration.log_level);

    let requests = read_requests(&args.requests)?;
    info!("Loaded {} requests from {}", requests.len(), args.requests.display());

    let module = ImageModule::from_configuration(&configuration, ColorStatsInference::new())?;
    let poll_interval = configuration.poll_interval();
    let mut orchestrator =
        ModuleOrchestrator::<ImageModule<ColorStatsInference>>::builder(configuration)
            .build(module)?;

    let outcome = orchestrator.drain(requests, poll_interval).await;
    info!(
        "Finished {} requests, module code {}",
        outcome.responses.len(),
        outcome.code
    );
    println!("{}", serde_json::to_string_pretty(&outcome.responses)?);
    Ok(())
}
