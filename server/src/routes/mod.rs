//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The relay exposes one streaming endpoint plus a liveness probe. Any origin
//! may call it. When a static site directory is configured it is served as
//! the fallback at `/`.

pub mod chat;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// API routes and the optional static site, all behind permissive CORS and
/// request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/api/chat", post(chat::relay_chat))
        .route("/healthz", get(healthz));

    if let Some(dir) = &state.config.website_dir {
        router = router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
