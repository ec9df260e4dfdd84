use std::sync::Arc;

use axum::{
    routing::{get, put},
    Router,
};
use chrono::Utc;
use tokio_rusqlite::Connection;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod aggregators;
mod config;
mod dev_tools;
mod error;
mod handlers;
mod middleware;
mod migrations;
mod models;
#[cfg(test)]
mod test_support;

use config::AppConfig;
use dev_tools::demo_data::DemoDataGenerator;
use handlers::*;
use middleware::{basic_auth, Credentials};

const DEMO_SEED: u64 = 42;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Connection>,
    pub credentials: Arc<Credentials>,
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/dashboard", get(get_dashboard))
        .route(
            "/api/influencers",
            get(list_influencers).post(create_influencer),
        )
        .route("/api/influencers/ranking", get(get_ranking))
        .route(
            "/api/influencers/:id",
            get(get_influencer).delete(delete_influencer),
        )
        .route("/api/campaigns", get(list_campaigns).post(create_campaign))
        .route(
            "/api/campaigns/:id",
            get(get_campaign)
                .put(update_campaign)
                .delete(delete_campaign),
        )
        .route(
            "/api/campaigns/:id/influencers/:influencer_id",
            put(upsert_contract),
        )
        .route("/api/campaigns/:id/timeseries", get(campaign_timeseries))
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/:id/snapshots", get(list_post_snapshots))
        .route("/api/posts/:id/snapshots/:date", put(upsert_snapshot))
        .route_layer(axum::middleware::from_fn_with_state(state, basic_auth))
}

fn app(state: AppState, config: &AppConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .merge(api_routes(state.clone()));

    if let Some(dir) = &config.static_dir {
        info!("Serving static files from {}", dir.display());
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting influencer metrics server...");

    let config = AppConfig::from_env()?;

    let db = Connection::open(&config.database_path).await?;
    migrations::initialize_database(&db).await?;
    let db = Arc::new(db);

    if config.demo_mode {
        let today = Utc::now().date_naive();
        if DemoDataGenerator::new(db.clone(), DEMO_SEED)
            .seed_if_empty(today)
            .await?
            .is_none()
        {
            info!("Database already has data, skipping demo seed");
        }
    }

    let state = AppState {
        db,
        credentials: Arc::new(Credentials {
            username: config.dashboard_username.clone(),
            password: config.dashboard_password.clone(),
        }),
    };

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);

    axum::serve(listener, app(state, &config))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
