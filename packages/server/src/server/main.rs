// Main entry point for the matchmaking API server

use std::sync::Arc;

use anyhow::{Context, Result};
use server_core::kernel::auth_client::AuthClient;
use server_core::kernel::chat_client::ChatClient;
use server_core::kernel::notifier::NatsNotifier;
use server_core::kernel::scheduled_tasks::start_scheduler;
use server_core::kernel::similarity_client::SimilarityClient;
use server_core::kernel::state_store::InMemoryStateStore;
use server_core::kernel::MatchDeps;
use server_core::domains::matching::service::MatchService;
use server_core::server::build_app;
use server_core::{Config, MatchTuning};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting matchmaking API");

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    tracing::info!("Connecting to NATS at {}...", config.nats_url);
    let nats = async_nats::connect(&config.nats_url)
        .await
        .context("Failed to connect to NATS")?;
    tracing::info!("NATS connected");

    let http = reqwest::Client::new();
    let deps = MatchDeps {
        store: Arc::new(InMemoryStateStore::new()),
        notifier: Arc::new(NatsNotifier::new(nats)),
        similarity: Arc::new(SimilarityClient::new(
            http.clone(),
            config.ai_service_url.clone(),
        )),
        chat: Arc::new(ChatClient::new(http.clone(), config.chat_service_url.clone())),
        directory: Arc::new(AuthClient::new(http, config.auth_service_url.clone())),
    };

    let service = MatchService::new(deps, MatchTuning::default());

    let _scheduler = start_scheduler(Arc::clone(&service))
        .await
        .context("Failed to start scheduled tasks")?;

    let app = build_app(service);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
