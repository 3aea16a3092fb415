//! Axum router configuration with middleware.
//!
//! All routes live under `/api/v1/`. Middleware: CORS and request
//! tracing.

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/messages", post(handlers::post_message))
        .route(
            "/conversations/{key}/history",
            get(handlers::get_history).delete(handlers::delete_history),
        )
        .route(
            "/settings/style",
            put(handlers::put_default_style).delete(handlers::delete_default_style),
        )
        .route(
            "/conversations/{key}/style-overrides/{user_id}",
            put(handlers::put_style_override).delete(handlers::delete_style_override),
        )
        .route(
            "/conversations/{key}/mutes/{user_id}",
            delete(handlers::delete_mute),
        )
        .route("/conversations/{key}/proactive", put(handlers::put_proactive))
        .route(
            "/users/{id}/relationship/reset",
            post(handlers::reset_relationship),
        )
        .route(
            "/users/{id}/preferred-name",
            put(handlers::put_preferred_name),
        )
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
