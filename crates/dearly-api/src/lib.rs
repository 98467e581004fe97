pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod files;
pub mod messages;
pub mod middleware;
pub mod partner;
pub mod service;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower_http::services::ServeDir;

pub use auth::{AppState, AppStateInner};

/// All HTTP routes. Transport layers (CORS, tracing) are added by the binary.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/me", get(partner::me))
        .route("/partner", get(partner::get_partner))
        .route("/partner/search", get(partner::search))
        .route("/partner/connect", post(partner::connect))
        .route("/messages", get(messages::get_messages).post(messages::send_message))
        .route("/messages/pending", get(messages::get_pending))
        .route("/messages/unlock", post(messages::unlock_message))
        .route(
            "/upload",
            post(files::upload_image).layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/uploads", ServeDir::new(state.blobs.dir()))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
