use crate::{
    AppState,
    auth::AuthUser,
    models::{AuthPageView, DashboardView, Membership},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Query Structs ---

/// AuthPageQuery
///
/// Query parameters accepted by the login and register pages.
#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AuthPageQuery {
    /// The protected path the gate redirected away from.
    pub redirected_from: Option<String>,
}

fn auth_page(page: &str, query: AuthPageQuery) -> Json<AuthPageView> {
    Json(AuthPageView {
        page: page.to_string(),
        redirected_from: query.redirected_from,
    })
}

// --- Handlers ---

/// login_page
///
/// [Auth-only Route] Signed-in users never reach this; the gate sends them to the dashboard.
#[utoipa::path(
    get,
    path = "/login",
    params(AuthPageQuery),
    responses(
        (status = 200, description = "Login page", body = AuthPageView),
        (status = 307, description = "Already signed in")
    )
)]
pub async fn login_page(Query(query): Query<AuthPageQuery>) -> Json<AuthPageView> {
    auth_page("login", query)
}

/// register_page
///
/// [Auth-only Route]
#[utoipa::path(
    get,
    path = "/register",
    params(AuthPageQuery),
    responses(
        (status = 200, description = "Registration page", body = AuthPageView),
        (status = 307, description = "Already signed in")
    )
)]
pub async fn register_page(Query(query): Query<AuthPageQuery>) -> Json<AuthPageView> {
    auth_page("register", query)
}

/// get_dashboard
///
/// [Protected Route] The landing page. Reports the caller and, when the request
/// selected an organization (or the session carries a default one), the
/// membership the gate verified.
#[utoipa::path(
    get,
    path = "/dashboard",
    params(("org" = Option<Uuid>, Query, description = "Organization to act in")),
    responses(
        (status = 200, description = "Session overview", body = DashboardView),
        (status = 307, description = "Redirected by the access gate")
    )
)]
pub async fn get_dashboard(user: AuthUser) -> Json<DashboardView> {
    Json(DashboardView {
        user_id: user.id,
        organization_id: user.organization_id,
        role: user.role,
        session_expires_at: user.session_expires_at,
    })
}

/// list_members
///
/// [Protected Route] Members of the organization the gate resolved. The gate has
/// already confirmed the caller belongs to it.
#[utoipa::path(
    get,
    path = "/dashboard/members",
    params(("org" = Option<Uuid>, Query, description = "Organization to list")),
    responses(
        (status = 200, description = "Organization members", body = [Membership]),
        (status = 400, description = "No organization selected"),
        (status = 307, description = "Redirected by the access gate")
    )
)]
pub async fn list_members(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Membership>>, StatusCode> {
    let organization_id = user.organization_id.ok_or(StatusCode::BAD_REQUEST)?;

    state
        .repo
        .list_members(organization_id)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!("list_members error: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// get_member_for_edit
///
/// [Restricted Route] Loads one member of the current organization for editing.
/// Only owners and director admins get past the gate.
#[utoipa::path(
    get,
    path = "/dashboard/members/{user_id}/edit",
    params(
        ("user_id" = Uuid, Path, description = "Member's user ID"),
        ("org" = Option<Uuid>, Query, description = "Organization the member belongs to")
    ),
    responses(
        (status = 200, description = "Member", body = Membership),
        (status = 404, description = "Not a member of this organization"),
        (status = 307, description = "Redirected by the access gate")
    )
)]
pub async fn get_member_for_edit(
    user: AuthUser,
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
) -> Result<Json<Membership>, StatusCode> {
    let organization_id = user.organization_id.ok_or(StatusCode::NOT_FOUND)?;

    match state.repo.get_membership(organization_id, member_id).await {
        Ok(Some(membership)) => Ok(Json(membership)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("get_member_for_edit error: {:?}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
