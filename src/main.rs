use sea_orm::Database;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use marketplace::api::{create_api_router, AppContext};
use marketplace::config::AppConfig;
use marketplace::entities::{seed_categories, seed_demo_accounts, setup_schema};
use marketplace::middleware::auth::JwtKeys;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;

    let db = Database::connect(&config.database_url).await?;
    setup_schema(&db).await?;
    seed_categories(&db).await?;
    if config.seed_demo_accounts {
        seed_demo_accounts(&db).await?;
        info!("Seeded demo accounts");
    }

    let app = create_api_router(AppContext {
        db: Arc::new(db),
        images: config.build_image_host(),
        keys: Arc::new(JwtKeys::new(&config.jwt_secret)),
        file_size_limit: config.file_size_limit,
    });

    let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
