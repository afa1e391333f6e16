//! Notification Engine — Binary Entrypoint
//! Wires providers, transport, store and the coordinator, spawns the check
//! loops, and serves the local status/metrics API.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use telenews_notifier::api::{self, AppState};
use telenews_notifier::config::AppConfig;
use telenews_notifier::coordinator::Coordinator;
use telenews_notifier::metrics::Metrics;
use telenews_notifier::notify::telegram::TelegramNotifier;
use telenews_notifier::providers::{naver::NaverNewsProvider, yahoo::YahooPriceProvider};
use telenews_notifier::scheduler;
use telenews_notifier::store::JsonFileStore;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,hyper=warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = Metrics::init();
    let cfg = AppConfig::load_default().context("loading configuration")?;
    tracing::info!(
        keywords = cfg.keywords.len(),
        instrument = %cfg.instrument,
        quiet = ?cfg.quiet,
        "configuration loaded"
    );

    let notifier = TelegramNotifier::from_env()
        .context("TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not configured")?;
    let naver_id = std::env::var("NAVER_CLIENT_ID").context("NAVER_CLIENT_ID not set")?;
    let naver_secret =
        std::env::var("NAVER_CLIENT_SECRET").context("NAVER_CLIENT_SECRET not set")?;

    let store = Arc::new(JsonFileStore::new(cfg.state_dir.clone()));
    let port = cfg.port;

    let coordinator = Arc::new(Coordinator::new(
        cfg,
        Arc::new(NaverNewsProvider::new(naver_id, naver_secret)),
        Arc::new(YahooPriceProvider::new()),
        Arc::new(notifier),
        store,
    ));
    coordinator.restore().await;

    scheduler::spawn_news_loop(coordinator.clone());
    scheduler::spawn_stock_loop(coordinator.clone());

    let router = api::create_router(AppState {
        coordinator: coordinator.clone(),
    })
    .merge(metrics.router());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "serving status API");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, router).await.context("serving api")?;
    Ok(())
}
