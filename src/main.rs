//! Organization Site Backend
//!
//! Serves the public content site and its admin console from a SQLite-backed document store,
//! keeping cached snapshots and derived views (feeds, year groups, calendar, carousel) current
//! through live subscriptions.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod store;
mod sync;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::EditSessions;
use config::Config;
use db::SqliteDocumentStore;
use errors::AppError;
use store::{AssetUploader, DocumentStore, LocalAssetStore, Timed};
use sync::{ContentHub, ExcerptLimits};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ContentHub>,
    pub store: Arc<dyn DocumentStore>,
    pub uploader: Arc<dyn AssetUploader>,
    pub sessions: Arc<EditSessions>,
    pub config: Arc<Config>,
}

/// Wire the store, uploader and content hub together and start live subscriptions.
pub async fn build_state(config: Config, pool: SqlitePool) -> Result<AppState, AppError> {
    let store: Arc<dyn DocumentStore> = Arc::new(Timed::new(
        SqliteDocumentStore::new(pool),
        config.store_timeout,
    ));
    let uploader: Arc<dyn AssetUploader> = Arc::new(Timed::new(
        LocalAssetStore::new(&config.asset_dir, config.asset_base_url.clone()),
        config.store_timeout,
    ));

    let hub = Arc::new(ContentHub::new(
        Arc::clone(&store),
        ExcerptLimits {
            words: config.excerpt_words,
            chars: config.excerpt_chars,
        },
    ));
    hub.start(config.carousel_interval).await?;

    Ok(AppState {
        hub,
        store,
        uploader,
        sessions: Arc::new(EditSessions::new(config.edit_idle_timeout)),
        config: Arc::new(config),
    })
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

    tracing::info!("Starting Organization Site Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Asset directory: {:?}", config.asset_dir);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.admin_psk.is_none() {
        tracing::warn!("No admin PSK configured (ORGSITE_ADMIN_PSK). The admin console is open!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    tokio::fs::create_dir_all(&config.asset_dir).await?;

    let bind_addr = config.bind_addr;
    let state = build_state(config, pool).await?;
    let hub = Arc::clone(&state.hub);

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    hub.shutdown();
    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.admin_psk.clone();

    // Admin console routes
    let admin_routes = Router::new()
        .route("/year-options", get(api::admin_year_options))
        .route(
            "/site/{kind}",
            put(api::set_site_setting).delete(api::delete_site_setting),
        )
        .route(
            "/{collection}",
            get(api::admin_list).post(api::admin_create),
        )
        .route("/{collection}/{id}", axum::routing::delete(api::admin_delete))
        .route(
            "/{collection}/{id}/edit",
            post(api::begin_edit).patch(api::update_edit),
        )
        .route("/{collection}/{id}/save", post(api::save_edit))
        .route("/{collection}/{id}/cancel", post(api::cancel_edit))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::admin_auth_layer(psk.clone(), req, next)
        }));

    // Public read routes
    let public_routes = Router::new()
        .route("/posts", get(api::list_posts))
        .route("/posts/{id}", get(api::get_post))
        .route("/activities", get(api::list_activities))
        .route("/activities/{id}", get(api::get_activity))
        .route("/calendar", get(api::get_calendar))
        .route("/calendar/navigate", post(api::navigate_calendar))
        .route("/calendar/days/{date}", get(api::get_calendar_day))
        .route("/carousel", get(api::get_carousel))
        .route("/carousel/advance", post(api::advance_carousel))
        .route("/resources/{category}", get(api::list_resources))
        .route("/members", get(api::list_members))
        .route("/site", get(api::get_site))
        .route("/hotlines", get(api::list_hotlines));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    let mut router = Router::new()
        .nest("/api/admin", admin_routes)
        .nest("/api", public_routes)
        .merge(health_routes);

    // Uploaded assets, when they are served from this host
    if state.config.asset_base_url.starts_with('/') {
        router = router.nest_service(
            &state.config.asset_base_url,
            ServeDir::new(&state.config.asset_dir),
        );
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
