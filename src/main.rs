//! School Wiki Tracker
//!
//! Nightly aggregation of per-school Wikipedia metadata (languages, weekly pageviews,
//! revisions) into SQLite, with a read-only JSON API over the aggregated documents.

mod api;
mod config;
mod db;
mod errors;
mod models;
mod pageviews;
mod scheduler;
mod sync;
mod wiki;

use std::path::Path;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::{Repository, SchoolStore};
use errors::AppError;
use sync::SchoolUpdater;
use wiki::MediaWikiClient;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SchoolStore>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting School Wiki Tracker");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Wiki API: {}", config.wiki.api_url);
    tracing::info!("Sync schedule: {:?}", config.schedule);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    if let Some(seed_file) = &config.seed_file {
        let created = seed_from_file(&repo, seed_file).await?;
        tracing::info!("Seeded {} schools from {:?}", created, seed_file);
    }

    // Start the nightly sync
    let wiki = Arc::new(MediaWikiClient::new(config.wiki.clone())?);
    let updater = SchoolUpdater::new(wiki, repo.clone());
    tokio::spawn(scheduler::run(updater, config.schedule));

    let state = AppState { store: repo };
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // Read endpoints are public to any origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/get-school", get(api::get_school))
        .route("/get-school-list", get(api::get_school_list))
        .route("/dump-all", get(api::dump_all));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

/// Create a school for every line of `path` not already tracked.
async fn seed_from_file(repo: &Repository, path: &Path) -> Result<usize, AppError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Store(format!("Failed to read seed file {:?}: {}", path, e)))?;
    let names: Vec<String> = contents.lines().map(str::to_string).collect();
    repo.seed_schools(&names).await
}

#[cfg(test)]
mod tests;
