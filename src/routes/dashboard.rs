use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Dashboard Router Module
///
/// Every route here sits under the gate's protected `/dashboard` prefix, so each
/// handler receives an `AuthUser` the gate has already resolved. An `org` query
/// parameter selects the organization; without it the session's default
/// organization applies.
pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard
        // The default landing page after sign-in and after any denied request.
        .route("/dashboard", get(handlers::get_dashboard))
        // GET /dashboard/members
        // Lists members of the selected organization.
        .route("/dashboard/members", get(handlers::list_members))
        // GET /dashboard/members/{user_id}/edit
        // Restricted sub-resource: owners and director admins only.
        .route(
            "/dashboard/members/{user_id}/edit",
            get(handlers::get_member_for_edit),
        )
}
