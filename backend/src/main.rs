//! LearnHub backend entry point

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use learnhub::config::Config;
use learnhub::db::{Database, seed};
use learnhub::{AppState, build_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "learnhub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting LearnHub backend");

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let db = Database::connect(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database connected");

    if config.seed_demo_data {
        seed::seed_demo_data(db.pool()).await?;
    }

    let port = config.port;
    let app = build_app(AppState::new(config, db));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
