mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use common::*;
use org_portal::{
    AccessGate, create_router,
    auth::{JwtSessionResolver, SessionState},
    models::{AuthPageView, DashboardView, Membership},
    roles::Role,
    route_table::RouteTable,
};
use std::sync::Arc;
use tower::ServiceExt;

// The router tests go through the real JWT resolver, so the cookie holds a signed token.
fn app(memberships: MockMemberships) -> Router {
    let memberships = Arc::new(memberships);
    let sessions: SessionState = Arc::new(JwtSessionResolver::new(TEST_JWT_SECRET, TEST_AUDIENCE));
    let gate = AccessGate::new(
        RouteTable::dashboard(),
        sessions,
        memberships.clone(),
        COOKIE_NAME,
    );
    create_router(app_state(gate, memberships))
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("{COOKIE_NAME}={token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

async fn json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let response = app(MockMemberships::default())
        .oneshot(get("/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_dashboard_without_cookie_redirects_to_login() {
    let response = app(MockMemberships::default())
        .oneshot(get("/dashboard/members?org=x", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "/login?redirectedFrom=%2Fdashboard%2Fmembers"
    );
}

#[tokio::test]
async fn test_login_page_echoes_redirected_from() {
    let response = app(MockMemberships::default())
        .oneshot(get("/login?redirectedFrom=%2Fdashboard%2Fmembers", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let view: AuthPageView = json(response).await;
    assert_eq!(view.page, "login");
    assert_eq!(view.redirected_from.as_deref(), Some("/dashboard/members"));
}

#[tokio::test]
async fn test_login_page_with_session_redirects_to_dashboard() {
    let token = create_token(USER_ID, None, 3600);

    let response = app(MockMemberships::default())
        .oneshot(get("/login?redirectedFrom=%2Fdashboard", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn test_dashboard_reports_session_and_membership() {
    let token = create_token(USER_ID, Some(ORG_ID), 3600);

    let response = app(MockMemberships::default().with(ORG_ID, USER_ID, Role::Director))
        .oneshot(get("/dashboard", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let view: DashboardView = json(response).await;
    assert_eq!(view.user_id, USER_ID);
    assert_eq!(view.organization_id, Some(ORG_ID));
    assert_eq!(view.role, Some(Role::Director));
}

#[tokio::test]
async fn test_dashboard_without_organization_passes_through() {
    let token = create_token(USER_ID, None, 3600);

    let response = app(MockMemberships::default())
        .oneshot(get("/dashboard", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let view: DashboardView = json(response).await;
    assert_eq!(view.organization_id, None);
    assert_eq!(view.role, None);
}

#[tokio::test]
async fn test_members_list_for_selected_organization() {
    let token = create_token(USER_ID, None, 3600);
    let memberships = MockMemberships::default()
        .with(ORG_ID, USER_ID, Role::Agent)
        .with(ORG_ID, OTHER_USER_ID, Role::Owner)
        .with(OTHER_ORG_ID, OTHER_USER_ID, Role::Owner);

    let response = app(memberships)
        .oneshot(get(&format!("/dashboard/members?org={ORG_ID}"), Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let members: Vec<Membership> = json(response).await;
    assert_eq!(members.len(), 2);
    assert!(members.iter().all(|m| m.organization_id == ORG_ID));
}

#[tokio::test]
async fn test_members_list_without_organization_is_bad_request() {
    let token = create_token(USER_ID, None, 3600);

    let response = app(MockMemberships::default())
        .oneshot(get("/dashboard/members", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_member_edit_page_for_agent_redirects_to_landing() {
    let token = create_token(USER_ID, Some(ORG_ID), 3600);
    let memberships = MockMemberships::default()
        .with(ORG_ID, USER_ID, Role::Agent)
        .with(ORG_ID, OTHER_USER_ID, Role::SupportStaff);

    let response = app(memberships)
        .oneshot(get(&format!("/dashboard/members/{OTHER_USER_ID}/edit"), Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn test_member_edit_page_for_owner_returns_member() {
    let token = create_token(USER_ID, Some(ORG_ID), 3600);
    let memberships = MockMemberships::default()
        .with(ORG_ID, USER_ID, Role::Owner)
        .with(ORG_ID, OTHER_USER_ID, Role::SupportStaff);

    let response = app(memberships)
        .oneshot(get(&format!("/dashboard/members/{OTHER_USER_ID}/edit"), Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let member: Membership = json(response).await;
    assert_eq!(member.user_id, OTHER_USER_ID);
    assert_eq!(member.role, Role::SupportStaff);
}

#[tokio::test]
async fn test_member_edit_page_for_unknown_member_is_not_found() {
    let token = create_token(USER_ID, Some(ORG_ID), 3600);

    let response = app(MockMemberships::default().with(ORG_ID, USER_ID, Role::DirectorAdmin))
        .oneshot(get(&format!("/dashboard/members/{OTHER_USER_ID}/edit"), Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lookup_failure_redirects_like_non_member() {
    let token = create_token(USER_ID, Some(ORG_ID), 3600);

    let failed = app(MockMemberships::failing())
        .oneshot(get("/dashboard/members", Some(&token)))
        .await
        .unwrap();
    let missing = app(MockMemberships::default())
        .oneshot(get("/dashboard/members", Some(&token)))
        .await
        .unwrap();

    assert_eq!(failed.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(failed.status(), missing.status());
    assert_eq!(location(&failed), location(&missing));
    assert_eq!(location(&failed), "/dashboard");
}

#[tokio::test]
async fn test_landing_page_for_non_member_default_org_does_not_loop() {
    let token = create_token(USER_ID, Some(ORG_ID), 3600);

    let response = app(MockMemberships::default())
        .oneshot(get("/dashboard", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let view: DashboardView = json(response).await;
    assert_eq!(view.organization_id, None);
    assert_eq!(view.role, None);
}

#[tokio::test]
async fn test_landing_page_with_foreign_org_selector_redirects() {
    let token = create_token(USER_ID, Some(ORG_ID), 3600);
    let memberships = MockMemberships::default()
        .with(ORG_ID, USER_ID, Role::Owner)
        .with(OTHER_ORG_ID, OTHER_USER_ID, Role::Owner);

    let response = app(memberships)
        .oneshot(get(&format!("/dashboard?org={OTHER_ORG_ID}"), Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/dashboard");
}
