use std::sync::Arc;

use axum::http::StatusCode;
use tracing::error;

use warbler_db::Database;

use crate::config::Config;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub config: Config,
}

impl AppStateInner {
    pub fn new(db: Database, config: Config) -> AppState {
        Arc::new(Self { db, config })
    }
}

/// Run blocking database work off the async runtime.
///
/// Any database error is logged and becomes a 500.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Database) -> warbler_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("database error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
