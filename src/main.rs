use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use trip_planner::auth::{jwt::JwtService, oauth};
use trip_planner::config::AppConfig;
use trip_planner::db;
use trip_planner::routes;
use trip_planner::s3::build_storage;
use trip_planner::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        s3_bucket = %config.s3_bucket,
        oauth_enabled = config.oauth.is_some(),
        remote_exchange_rates = config.exchange_rates_url.is_some(),
        demo_enabled = config.demo_template_trip_id.is_some(),
        "loaded trip planner configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let storage = Arc::new(build_storage(&config).await?);
    let jwt = JwtService::from_config(&config)?;
    let oauth_client = config.oauth.as_ref().map(oauth::build_client).transpose()?;

    let listen_addr: SocketAddr =
        format!("{}:{}", config.server_host, config.server_port).parse()?;
    let state = AppState::new(pool, config, storage, jwt).with_oauth(oauth_client);
    let router = routes::create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
