// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::Context;
use auxstream_agent::app::{create_router, AppState, VERSION};
use auxstream_agent::models::agent::AgentMode;
use auxstream_agent::services::admin_auth::AdminToken;
use auxstream_agent::services::aggregator::Aggregator;
use auxstream_agent::services::cache::{Cache, MemoryCache};
use auxstream_agent::services::catalog::{InMemoryCatalog, LocalCatalogSource};
use auxstream_agent::services::indexer_worker::IndexerWorker;
use auxstream_agent::services::indexing::IndexingService;
use auxstream_agent::services::logging::init_tracing;
use auxstream_agent::services::metrics::Metrics;
use auxstream_agent::services::provider::{provider_timeout_from_env, TrackProvider};
use auxstream_agent::services::rate_limiter::{RateLimitConfig, RateLimiter};
use auxstream_agent::services::scraper::HtmlFetcher;
use auxstream_agent::services::scraper_registry::ScraperRegistry;
use auxstream_agent::services::search::SearchService;
use auxstream_agent::services::soundcloud::SoundCloudClient;
use auxstream_agent::services::youtube::YouTubeClient;
use clap::Parser;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Music search and indexing agent
#[derive(Parser, Debug)]
#[command(name = "auxstream-agent", version = VERSION)]
struct Cli {
    /// TOML file mapping each source to the URLs to index
    #[arg(long, default_value = "config/ext_sources.toml")]
    sources: PathBuf,

    /// Hours between scheduled indexing passes
    #[arg(long, default_value_t = 24)]
    interval_hours: u64,

    /// Run a single indexing pass and exit
    #[arg(long)]
    once: bool,
}

struct Services {
    state: AppState,
    worker: Arc<IndexerWorker>,
}

fn build_providers() -> anyhow::Result<Vec<Arc<dyn TrackProvider>>> {
    let catalog = InMemoryCatalog::from_env().context("failed to load local catalog")?;
    info!(tracks = catalog.len(), "Local catalog loaded");

    let providers: Vec<Arc<dyn TrackProvider>> = vec![
        Arc::new(LocalCatalogSource::new(Arc::new(catalog))),
        Arc::new(YouTubeClient::from_env()),
        Arc::new(SoundCloudClient::from_env()),
    ];
    for provider in providers.iter().filter(|p| !p.is_configured()) {
        warn!(source = %provider.source(), "Provider has no credentials, it will be skipped");
    }
    Ok(providers)
}

fn build_services(mode: AgentMode, interval: Duration) -> anyhow::Result<Services> {
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::from_env());
    let metrics = Arc::new(Metrics::new());

    let aggregator = Aggregator::new(build_providers()?).with_timeout(provider_timeout_from_env());
    let search = Arc::new(SearchService::new(
        Arc::new(aggregator),
        cache.clone(),
        metrics.clone(),
    ));

    let registry = ScraperRegistry::with_default_scrapers(Arc::new(HtmlFetcher::from_env()));
    let indexing = Arc::new(IndexingService::new(
        Arc::new(registry),
        cache.clone(),
        metrics.clone(),
    ));

    let rate_limiter = Arc::new(RateLimiter::new(
        cache,
        RateLimitConfig::from_env(),
        metrics.clone(),
    ));
    let worker = Arc::new(IndexerWorker::new(indexing.clone(), metrics.clone(), interval));

    let admin_token = AdminToken::from_env();
    if !admin_token.is_enabled() {
        warn!("ADMIN_TOKEN is not set, admin routes are disabled");
    }

    Ok(Services {
        state: AppState {
            search,
            indexing,
            rate_limiter,
            metrics,
            admin_token: Arc::new(admin_token),
            mode,
        },
        worker,
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = env::var("LISTEN_ADDR")
        .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
        .parse()
        .context("LISTEN_ADDR must be a socket address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(%addr, version = VERSION, "auxstream-agent listening");

    axum::serve(
        listener,
        create_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

/// Mode of a long-running agent. `--once` needs none, so `AGENT_MODE` is not read.
fn run_mode(cli: &Cli) -> Option<AgentMode> {
    (!cli.once).then(AgentMode::from_env)
}

async fn run_once(cli: &Cli, interval: Duration) -> anyhow::Result<()> {
    let services = build_services(AgentMode::Indexer, interval)?;
    let sources = services.worker.load_sources(&cli.sources)?;
    info!(sources, path = %cli.sources.display(), "Running a single indexing pass");
    let report = services.worker.run_indexing_once().await;
    info!(
        total_succeeded = report.total_succeeded,
        total_failed = report.total_failed,
        "Indexing pass finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let interval = Duration::from_secs(cli.interval_hours.max(1) * 60 * 60);

    let Some(mode) = run_mode(&cli) else {
        return run_once(&cli, interval).await;
    };
    let services = build_services(mode, interval)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker_handle = if mode.should_run_indexer() {
        // Without sources the worker has nothing to do, so this is fatal
        let sources = services.worker.load_sources(&cli.sources)?;
        info!(sources, path = %cli.sources.display(), "Indexer sources loaded");

        let worker = services.worker.clone();
        Some(tokio::spawn(async move { worker.start(shutdown_rx).await }))
    } else {
        None
    };

    info!(mode = %mode, "auxstream-agent v{} started", VERSION);

    if mode.should_serve_api() {
        serve(services.state).await?;
    } else {
        shutdown_signal().await;
    }

    // Receiver is gone when the indexer never started
    let _ = shutdown_tx.send(true);
    if let Some(handle) = worker_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "Indexer worker task failed");
        }
    }

    info!("auxstream-agent stopped");
    Ok(())
}
