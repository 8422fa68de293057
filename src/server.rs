//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let manga_routes = Router::new()
        .route("/", get(handlers::list_manga))
        .route("/{num}", get(handlers::get_manga))
        .route("/{num}/pages/{page}", get(handlers::manga_page))
        .route("/{num}/archive", get(handlers::manga_archive))
        .route("/{num}/pdf", get(handlers::manga_pdf));

    let api_routes = Router::new()
        .route("/rescan", post(handlers::api_rescan))
        .route("/stats", get(handlers::api_stats))
        .route("/rejected", get(handlers::api_rejected))
        .nest("/manga", manga_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
