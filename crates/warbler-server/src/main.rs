use std::net::SocketAddr;

use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use warbler_api::config::{Config, DEFAULT_SECRET_KEY};
use warbler_api::state::AppStateInner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warbler=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.secret_key == DEFAULT_SECRET_KEY {
        warn!("SECRET_KEY is not set; sessions are signed with the development key");
    }
    if !config.csrf_enabled {
        warn!("CSRF protection is disabled");
    }

    // Init database
    let db = warbler_db::Database::connect(&config.database_url)?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppStateInner::new(db, config);

    let app = warbler_api::app(state).layer(TraceLayer::new_for_http());

    info!("Warbler listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
