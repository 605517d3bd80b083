use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without a session. `/login` and `/register` are
/// auth-only: the gate bounces signed-in users to the dashboard before the
/// handler runs.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // GET /login?redirectedFrom=...
        .route("/login", get(handlers::login_page))
        // GET /register
        .route("/register", get(handlers::register_page))
}
