use crate::web::{handlers, AppState};
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::path::Path;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub async fn start_web_server(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    let mut router = Router::new()
        // === SERVICE INVENTORY ===
        .route("/api/health", get(handlers::health))
        .route("/api/services", get(handlers::list_services))
        .route("/api/overview", get(handlers::overview))
        // === LIBRARY RECONCILIATION ===
        .route("/api/tv/overview", get(handlers::tv_overview))
        .route("/api/movies/overview", get(handlers::movies_overview))
        .route(
            "/api/tv/series/{series_id}/seasons/{season_number}/episodes",
            get(handlers::season_episodes),
        )
        // === INTERACTIVE SEARCH ===
        .route("/api/releases", get(handlers::list_releases))
        .route("/api/releases/has-rejected", get(handlers::has_rejected))
        .route(
            "/api/releases/has-rejected/batch",
            get(handlers::has_rejected_batch),
        )
        .route("/api/releases/grab", post(handlers::grab_release))
        // === LOG AGGREGATION ===
        .route("/api/errors", get(handlers::service_logs))
        // === LEGACY CATEGORY DASHBOARD ===
        .route("/api/dashboard/{category}", get(handlers::dashboard_category));

    // Serve the built UI bundle when present (production deployments).
    if Path::new(&static_dir).is_dir() {
        let index = ServeFile::new(Path::new(&static_dir).join("index.html"));
        router = router.fallback_service(ServeDir::new(&static_dir).fallback(index));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
