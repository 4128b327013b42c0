//! mediadex binary - composition root.
//!
//! `index-server` owns the index and is its only writer. `serve` runs the
//! job workers and the HTTP surface, reaching the index over RPC.

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use mediadex_api::auth::resolve_secret;
use mediadex_api::{create_app_router, create_index_router, serve, AppState, IndexRpcState};
use mediadex_core::MediadexConfig;
use mediadex_gateway::{GatewaySettings, VideoIndexerClient};
use mediadex_index::{HashingEmbedding, IndexService, IndexSettings, RemoteIndex};
use mediadex_jobs::{
    HttpReporter, JobRunner, JobStore, Pipeline, PipelineSettings, ProgressReporter,
    StoreReporter,
};
use mediadex_progress::ProgressStore;

use cli::{CliArgs, Command};

const SECRET_FILE: &str = "index.secret";
const INDEX_RPC_TIMEOUT: Duration = Duration::from_secs(120);

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

fn shared_secret(args: &CliArgs, config: &MediadexConfig, data_dir: &Path) -> String {
    let configured = args.resolve_secret(&config.index.secret);
    resolve_secret(configured.as_deref(), &data_dir.join(SECRET_FILE))
}

async fn run_index_server(
    args: &CliArgs,
    config: &MediadexConfig,
    data_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let embedder = HashingEmbedding::new(config.index.embedding_dim);
    let service = IndexService::open(IndexSettings::from_config(config), embedder)?;
    tracing::info!(
        persist_dir = %config.resolve(&config.index.persist_dir).display(),
        "Index service ready"
    );

    let secret = shared_secret(args, config, data_dir);
    let router = create_index_router(IndexRpcState::new(Arc::new(service), &secret));

    let addr = format!("{}:{}", config.index.host, args.resolve_port(config.index.port));
    serve(&addr, router, shutdown_signal()).await?;
    Ok(())
}

async fn run_app_server(
    args: &CliArgs,
    config: &MediadexConfig,
    data_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let secret = shared_secret(args, config, data_dir);
    let index = Arc::new(RemoteIndex::new(
        &config.server.index_url,
        &secret,
        INDEX_RPC_TIMEOUT,
    )?);
    tracing::info!(url = %config.server.index_url, "Using remote index");

    let gateway = Arc::new(VideoIndexerClient::new(GatewaySettings::from_config(config))?);
    let progress = Arc::new(ProgressStore::from_config(config)?);

    let reporter: Arc<dyn ProgressReporter> = match &config.progress.status_endpoint {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, "Progress reported over HTTP");
            Arc::new(HttpReporter::new(endpoint)?)
        }
        None => Arc::new(StoreReporter::new(Arc::clone(&progress))),
    };

    let pipeline = Arc::new(Pipeline::new(
        Arc::new(JobStore::from_config(config)),
        gateway.clone(),
        index.clone(),
        reporter,
        PipelineSettings::from_config(config),
    ));
    let runner = Arc::new(JobRunner::new(pipeline, config.jobs.max_concurrent_jobs));
    tracing::info!(workers = config.jobs.max_concurrent_jobs, "Job runner ready");

    let upload_dir = config.resolve(&config.server.upload_dir);
    let artifact_dir = config.resolve(&config.jobs.artifact_dir);
    for dir in [&upload_dir, &artifact_dir] {
        std::fs::create_dir_all(dir)?;
    }
    tracing::info!(path = %upload_dir.display(), "Local submissions accepted from here");

    let state = AppState::new(
        index,
        Arc::clone(&runner),
        progress,
        gateway,
        &config.server.cors_origin,
    )
    .with_upload_roots([upload_dir, artifact_dir]);
    let router = create_app_router(state);

    let addr = format!("{}:{}", config.server.host, args.resolve_port(config.server.port));
    let result = serve(&addr, router, shutdown_signal()).await;
    runner.shutdown();
    result?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = MediadexConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting mediadex v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    let data_dir = config.data_dir();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    match args.command {
        Command::IndexServer => run_index_server(&args, &config, &data_dir).await,
        Command::Serve => run_app_server(&args, &config, &data_dir).await,
    }
}
