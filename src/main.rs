use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use servicehub::config::AppConfig;
use servicehub::db;
use servicehub::handlers::auth::{USER_ID_HEADER, USER_ROLE_HEADER};
use servicehub::routes;
use servicehub::services::notifications::log::LogNotifier;
use servicehub::services::notifications::webhook::WebhookNotifier;
use servicehub::services::notifications::Notifier;
use servicehub::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let notifier: Arc<dyn Notifier> = if config.notify_webhook_url.is_empty() {
        tracing::info!("no notification webhook configured, logging notifications only");
        Arc::new(LogNotifier)
    } else {
        tracing::info!("delivering notifications to {}", config.notify_webhook_url);
        Arc::new(WebhookNotifier::new(
            config.notify_webhook_url.clone(),
            config.notify_webhook_secret.clone(),
            Duration::from_secs(config.notify_webhook_timeout_secs),
        )?)
    };

    let origin: HeaderValue = config.client_origin.parse()?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(USER_ROLE_HEADER),
        ])
        .allow_credentials(true);

    let state = Arc::new(AppState::new(conn, config.clone(), notifier));
    let app = routes::app(state).layer(cors);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
