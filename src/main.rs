use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use servicebook::background;
use servicebook::config::AppConfig;
use servicebook::db;
use servicebook::handlers;
use servicebook::services::gateway::http::HttpPaymentGateway;
use servicebook::services::notify::webhook::WebhookNotifier;
use servicebook::services::notify::{LogNotifier, Notifier};
use servicebook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;

    let conn = db::init_db(&config.database_url)?;

    if config.gateway_secret_key.is_empty() {
        tracing::warn!("GATEWAY_SECRET_KEY not set, webhook signatures will not be checked");
    }
    let gateway = HttpPaymentGateway::new(
        config.gateway_base_url.clone(),
        config.gateway_secret_key.clone(),
    )?;

    let notifier: Box<dyn Notifier> = if config.notify_webhook_url.is_empty() {
        tracing::info!("no NOTIFY_WEBHOOK_URL, notifications are logged only");
        Box::new(LogNotifier)
    } else {
        tracing::info!(url = %config.notify_webhook_url, "using webhook notifier");
        Box::new(WebhookNotifier::new(config.notify_webhook_url.clone())?)
    };

    tracing::info!(
        slot_minutes = config.slot_minutes,
        unconfigured = ?config.unconfigured_availability,
        "slot allocator configured"
    );

    let state = Arc::new(AppState::new(
        conn,
        config.clone(),
        Box::new(gateway),
        notifier,
    ));

    tokio::spawn(background::start_overdue_sweeper(state.clone()));

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
