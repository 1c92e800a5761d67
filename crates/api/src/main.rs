use api::{create_router, AppState};
use services::scheduler::{ChatBotNotifier, ExpirationNotifier, LogNotifier};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(logging: &config::LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter_directive()));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_notifier(config: &config::NotifierConfig) -> Arc<dyn ExpirationNotifier> {
    match (&config.bot_token, config.chat_id) {
        (Some(bot_token), Some(chat_id)) => {
            tracing::info!("Expiration notices go to chat {}", chat_id);
            Arc::new(ChatBotNotifier::new(
                config.api_base_url.as_str(),
                bot_token.clone(),
                chat_id,
            ))
        }
        _ => {
            tracing::warn!("NOTIFY_BOT_TOKEN/NOTIFY_CHAT_ID not set, expiration notices are only logged");
            Arc::new(LogNotifier)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
        eprintln!("Continuing with environment variables...");
    }

    let config = config::Config::from_env();
    init_tracing(&config.logging);

    tracing::info!("Starting API server...");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);

    let storage = database::Storage::connect(&config).await?;

    if config.admin.api_token.is_none() {
        tracing::warn!("ADMIN_API_TOKEN is not set, admin routes are unauthenticated");
    }

    let (app_state, scheduler) = AppState::bootstrap(
        &storage,
        build_notifier(&config.notifier),
        config.admin.api_token.as_deref().map(Arc::from),
    )
    .await?;

    let app = create_router(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    tracing::info!("Server stopped");

    Ok(())
}
