#![allow(missing_docs)]

//! Greenroom service binary.
//!
//! Loads configuration, builds one authenticated adapter per external
//! service, wires the moderation pipeline, and serves the webhook endpoint.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use greenroom::adapters::graph::{GraphFeed, GraphMessenger};
use greenroom::adapters::sheets::SheetsRowStore;
use greenroom::adapters::{FeedPublisher, Messenger, RowStore};
use greenroom::config::Config;
use greenroom::review::{ModerationPipeline, WatermarkTracker};
use greenroom::scheduler::{CadenceConfig, SlotScheduler};
use greenroom::webhook::{self, WebhookState};

/// Bounded timeout applied to every adapter HTTP call. A timeout surfaces
/// as a transport error; retry policy belongs to outer layers.
const ADAPTER_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Parser)]
#[command(
    name = "greenroom",
    about = "Submission moderation bot with scheduled feed publishing"
)]
struct Cli {
    /// Config file path (overrides $GREENROOM_CONFIG_PATH).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(cli.config).context("failed to load configuration")?;
    let _logging = greenroom::logging::init_service(
        Path::new(&config.service.logs_dir),
        &config.service.log_level,
    )?;

    info!("greenroom starting");
    config.warn_missing_secrets();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(ADAPTER_TIMEOUT_SECS))
        .build()
        .context("failed to build HTTP client")?;

    // One long-lived authenticated adapter per external service.
    let store: Arc<dyn RowStore> = Arc::new(SheetsRowStore::new(
        client.clone(),
        config.sheet.clone(),
    ));
    let messenger: Arc<dyn Messenger> = Arc::new(GraphMessenger::new(
        client.clone(),
        config.messenger.access_token.clone(),
    ));
    let feed: Arc<dyn FeedPublisher> = Arc::new(GraphFeed::new(
        client,
        config.feed.page_id.clone(),
        config.feed.access_token.clone(),
    ));

    let scheduler = SlotScheduler::new(Arc::clone(&feed), CadenceConfig::from(&config.feed));
    let watermark = WatermarkTracker::new(config.review.baseline_row);
    info!(
        baseline_row = config.review.baseline_row,
        review_window = config.review.review_window,
        "watermark seeded"
    );

    let pipeline = Arc::new(ModerationPipeline::new(
        store,
        messenger,
        feed,
        scheduler,
        watermark,
        config.review.review_window,
    ));

    let state = Arc::new(WebhookState {
        pipeline,
        app_secret: config.webhook.app_secret.clone(),
        validation_token: config.webhook.validation_token.clone(),
    });
    let app = webhook::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "webhook listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
