//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/books/list", post(handlers::books_list))
        .route("/books/{id}", get(handlers::book_get))
        .route("/series/list", post(handlers::series_list))
        .route("/series/{id}", get(handlers::series_get))
        .route("/users/me", get(handlers::users_me))
        .route("/users/{id}/access", patch(handlers::users_update_access))
        .route("/catalog/reload", post(handlers::catalog_reload));

    let opds_routes = Router::new()
        .route("/search", get(handlers::opds_search))
        .route("/series", get(handlers::opds_series))
        .route("/opensearch.xml", get(handlers::opensearch));

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/opds/v1.2", opds_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
