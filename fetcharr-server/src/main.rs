//! Fetcharr server: loads configuration, wires the item store and
//! capability registry, starts the two schedulers, and serves a small
//! axum app for health/stats/manual-submission. Mirrors the teacher's
//! `ferrex-server::main` shape (parse args, init tracing, connect the
//! database, assemble `AppState`, spawn background tasks, serve) scaled
//! down to this engine's surface.

mod capabilities;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fetcharr_config::{Args, ContentSourceSettings, Settings, SettingsLoader};
use fetcharr_core::downloader::{DownloadProvider, RealDebridClient, RealDebridDownloader};
use fetcharr_core::{CapabilityRegistry, ContentPoller, ItemWorkflow, PostgresItemStore, RetrySweeper};

use capabilities::{NotConfigured, OverseerrSource};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = load_settings(&args)?;

    init_tracing(&settings.log_level);

    tracing::info!(
        host = %settings.server.host,
        port = settings.server.port,
        "configuration loaded"
    );

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&settings.database.url)
        .await?;

    let pg_store = PostgresItemStore::new(pool);
    pg_store.ensure_schema(settings.hard_reset).await?;
    tracing::info!("database schema ready");
    let store: Arc<dyn fetcharr_core::ItemStore> = Arc::new(pg_store);

    let registry = Arc::new(build_registry(&settings)?);
    registry.validate()?;

    let workflow = Arc::new(ItemWorkflow::new(
        store.clone(),
        registry.clone(),
        Duration::from_secs(settings.activity_timeout_seconds),
        Duration::from_secs(settings.workflow_timeout_seconds),
        settings.max_concurrent_activities,
    ));

    let poller = ContentPoller::new(workflow.clone());
    poller.spawn_all(request_sources_with_intervals(&settings, &registry));

    Arc::new(RetrySweeper::new(
        store.clone(),
        workflow.clone(),
        Duration::from_secs(settings.retry_sweep_interval_seconds),
        settings.retry_sweep_page_size,
    ))
    .spawn();

    let settings = Arc::new(settings);
    let app = routes::router(AppState {
        store,
        registry,
        workflow,
        settings: settings.clone(),
    })
    .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = std::net::SocketAddr::new(
        settings.server.host.parse().unwrap_or([0, 0, 0, 0].into()),
        settings.server.port,
    );
    tracing::info!(%addr, "starting fetcharr-server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = SettingsLoader::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(url) = &args.database_url {
        settings.database.url = url.clone();
    }
    if let Some(level) = &args.log_level {
        settings.log_level = level.clone();
    }
    Ok(settings)
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("fetcharr_server={level},fetcharr_core={level}", level = log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Assembles the capability registry. Only the downloader (when an API key
/// is configured) and `Overseerr` request sources have real adapters in
/// this build; everything else is `NotConfigured` so the registry always
/// has something to hold and a future adapter is a drop-in replacement.
fn build_registry(settings: &Settings) -> anyhow::Result<CapabilityRegistry> {
    let downloader: Arc<dyn fetcharr_core::Downloader> = if settings.downloader.enabled
        && !settings.downloader.api_key.is_empty()
    {
        let provider: Arc<dyn DownloadProvider> = Arc::new(RealDebridClient::new(
            settings.downloader.api_key.clone(),
            settings.downloader.proxy_url.as_deref(),
        )?);
        Arc::new(RealDebridDownloader::new(provider, settings.downloader.clone()))
    } else {
        Arc::new(NotConfigured::new("Downloader"))
    };

    let mut request_sources: Vec<Arc<dyn fetcharr_core::RequestSource>> = Vec::new();
    for source in &settings.content_sources {
        if !source.enabled {
            continue;
        }
        if source.name.eq_ignore_ascii_case("overseerr") {
            if let (Some(base_url), Some(api_key)) = (&source.base_url, &source.api_key) {
                request_sources.push(Arc::new(OverseerrSource::new(
                    base_url.clone(),
                    api_key.clone(),
                )));
                continue;
            }
            tracing::warn!("Overseerr source enabled but missing base_url/api_key, skipping");
        } else {
            tracing::warn!(source = %source.name, "no adapter for this request source in this build, skipping");
        }
    }

    Ok(CapabilityRegistry {
        trakt_indexer: Arc::new(NotConfigured::new("TraktIndexer")),
        scraping: Arc::new(NotConfigured::new("Scraping")),
        downloader,
        symlinker: Arc::new(NotConfigured::new("Symlinker")),
        updater: Arc::new(NotConfigured::new("Updater")),
        post_processing: Arc::new(NotConfigured::new("PostProcessing")),
        request_sources,
        library_scan: None,
    })
}

/// Pairs each enabled, adapter-backed request source with its configured
/// poll interval for the content poller to spawn.
fn request_sources_with_intervals(
    settings: &Settings,
    registry: &CapabilityRegistry,
) -> Vec<(Arc<dyn fetcharr_core::RequestSource>, Duration)> {
    registry
        .request_sources
        .iter()
        .map(|source| {
            let configured = settings
                .content_sources
                .iter()
                .find(|s: &&ContentSourceSettings| {
                    s.name.eq_ignore_ascii_case(source.name().as_str())
                })
                .map(|s| s.interval_seconds)
                .unwrap_or(300);
            (source.clone(), Duration::from_secs(configured.max(1)))
        })
        .collect()
}
