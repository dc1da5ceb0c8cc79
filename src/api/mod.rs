mod auth;
pub mod error;
mod resolve;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        // Login and installation callbacks
        .route("/auth/github", get(auth::login))
        .route("/auth/github/callback", get(auth::callback))
        .route("/setup", get(auth::setup))
        // Installation repositories (forced token refresh)
        .route(
            "/installations/:owner/repositories",
            get(resolve::installation_repositories),
        )
        // Resolution endpoints, most specific first
        .route(
            "/:owner/:repo/workflows/:workflow/:branch/:artifact",
            get(resolve::by_branch),
        )
        .route(
            "/:owner/:repo/actions/runs/:run_id/:artifact",
            get(resolve::by_run),
        )
        .route(
            "/:owner/:repo/actions/artifacts/:artifact_id",
            get(resolve::by_artifact),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
