use axum::http::{HeaderMap, Uri, header};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    auth::{Session, SessionState},
    models::Membership,
    repository::RepositoryState,
    roles::AllowSet,
    route_table::{LANDING_PATH, LOGIN_PATH, RouteClass, RouteTable},
};

/// Query parameter the login page reads to send the user back afterwards.
pub const REDIRECTED_FROM_PARAM: &str = "redirectedFrom";
/// Local-only identity header, mirrors the dev bypass of the JSON API.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// RequestContext
///
/// Everything the gate reads from an inbound request. Built per request; the
/// gate never looks at process-wide state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub path: String,
    pub session_token: Option<String>,
    pub organization_selector: Option<String>,
    pub dev_user_id: Option<Uuid>,
}

/// `?org=<uuid>` selects the organization a dashboard request is about.
#[derive(Deserialize)]
struct OrgSelectorQuery {
    #[serde(rename = "org")]
    organization: Option<String>,
}

impl RequestContext {
    /// Reads the session token from `cookie_name`, falling back to an
    /// `Authorization: Bearer` header for API clients.
    pub fn from_http(uri: &Uri, headers: &HeaderMap, cookie_name: &str) -> Self {
        let jar = CookieJar::from_headers(headers);

        let session_token = jar
            .get(cookie_name)
            .map(|cookie| cookie.value().to_string())
            .or_else(|| {
                headers
                    .get(header::AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.strip_prefix("Bearer "))
                    .map(str::to_string)
            })
            .filter(|token| !token.is_empty());

        let organization_selector = uri
            .query()
            .and_then(|query| serde_urlencoded::from_str::<OrgSelectorQuery>(query).ok())
            .and_then(|query| query.organization)
            .filter(|org| !org.is_empty());

        let dev_user_id = headers
            .get(DEV_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok());

        Self {
            path: uri.path().to_string(),
            session_token,
            organization_selector,
            dev_user_id,
        }
    }
}

/// AccessContext
///
/// What the gate resolved for a request it let through. Attached to the request
/// extensions so handlers do not repeat the lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessContext {
    pub session: Option<Session>,
    pub organization_id: Option<Uuid>,
    pub membership: Option<Membership>,
}

/// GateDecision
///
/// The gate's only two outcomes. Denials carry no reason: every cause of a
/// redirect looks the same to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow(AccessContext),
    Redirect { location: String },
}

/// DenyReason
///
/// Internal cause of a redirect. Logged, never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoSession,
    LookupFailure,
    RoleDenied,
    NotAMember,
}

enum OrgSelection {
    Unresolved,
    Selected(Uuid),
    Malformed,
}

/// AccessGate
///
/// Session authentication and role authorization in front of every route.
pub struct AccessGate {
    routes: RouteTable,
    sessions: SessionState,
    memberships: RepositoryState,
    dev_bypass: bool,
    cookie_name: String,
}

pub type GateState = Arc<AccessGate>;

impl AccessGate {
    pub fn new(
        routes: RouteTable,
        sessions: SessionState,
        memberships: RepositoryState,
        cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            routes,
            sessions,
            memberships,
            dev_bypass: false,
            cookie_name: cookie_name.into(),
        }
    }

    /// Accept the `x-user-id` header as a session. Local environments only.
    pub fn with_dev_bypass(mut self, enabled: bool) -> Self {
        self.dev_bypass = enabled;
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// evaluate
    ///
    /// Decides pass-through or redirect for one request:
    /// 1. resolve the session (any failure means no session);
    /// 2. protected path without a session goes to login, remembering the path;
    /// 3. auth-only path with a session goes to the landing page;
    /// 4. protected path with a session checks the selected organization's
    ///    membership, and for restricted paths the role's allow-set; any
    ///    denial goes to the landing page;
    /// 5. anything else passes through.
    pub async fn evaluate(&self, request: &RequestContext) -> GateDecision {
        let session = self.resolve_session(request).await;
        let class = self.routes.classify(&request.path);

        match (class, session) {
            (class, None) if class.requires_session() => {
                tracing::info!(path = %request.path, reason = ?DenyReason::NoSession, "redirecting to login");
                GateDecision::Redirect {
                    location: login_location(&request.path),
                }
            }
            (RouteClass::AuthOnly, Some(session)) => {
                tracing::debug!(path = %request.path, user_id = %session.user_id, "signed-in user on auth page");
                GateDecision::Redirect {
                    location: LANDING_PATH.to_string(),
                }
            }
            (RouteClass::Protected, Some(session)) => self.authorize(request, session, None).await,
            (RouteClass::Restricted(allow), Some(session)) => {
                self.authorize(request, session, Some(&allow)).await
            }
            (_, session) => GateDecision::Allow(AccessContext {
                session,
                ..AccessContext::default()
            }),
        }
    }

    async fn resolve_session(&self, request: &RequestContext) -> Option<Session> {
        if self.dev_bypass {
            if let Some(user_id) = request.dev_user_id {
                tracing::debug!(%user_id, "local bypass session");
                return Some(Session {
                    user_id,
                    expires_at: Utc::now() + Duration::hours(1),
                    default_organization_id: None,
                });
            }
        }

        let token = request.session_token.as_deref()?;

        match self.sessions.resolve(token).await {
            Ok(Some(session)) if !session.is_expired_at(Utc::now()) => Some(session),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "session token not accepted");
                None
            }
        }
    }

    fn select_organization(&self, request: &RequestContext, session: &Session) -> OrgSelection {
        match &request.organization_selector {
            Some(selector) => match Uuid::parse_str(selector) {
                Ok(id) => OrgSelection::Selected(id),
                Err(_) => OrgSelection::Malformed,
            },
            None => match session.default_organization_id {
                Some(id) => OrgSelection::Selected(id),
                None => OrgSelection::Unresolved,
            },
        }
    }

    async fn authorize(
        &self,
        request: &RequestContext,
        session: Session,
        allow: Option<&AllowSet>,
    ) -> GateDecision {
        // Query selector wins over the session default. Membership of the
        // selected organization is what guards a caller-chosen id.
        let organization_id = match self.select_organization(request, &session) {
            OrgSelection::Selected(id) => Some(id),
            OrgSelection::Unresolved => None,
            OrgSelection::Malformed => return deny(request, session, DenyReason::NotAMember),
        };

        let membership = match organization_id {
            None => None,
            Some(organization_id) => {
                match self
                    .memberships
                    .get_membership(organization_id, session.user_id)
                    .await
                {
                    Ok(Some(membership)) => Some(membership),
                    Ok(None) => return deny(request, session, DenyReason::NotAMember),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            %organization_id,
                            user_id = %session.user_id,
                            "membership lookup failed"
                        );
                        return deny(request, session, DenyReason::LookupFailure);
                    }
                }
            }
        };

        if let Some(allow) = allow {
            match &membership {
                Some(m) if allow.permits(m.role) => {}
                Some(_) => return deny(request, session, DenyReason::RoleDenied),
                None => return deny(request, session, DenyReason::NotAMember),
            }
        }

        GateDecision::Allow(AccessContext {
            session: Some(session),
            organization_id,
            membership,
        })
    }
}

/// Sends a denied request to the landing page. The bare landing page, denied
/// because of the session's default organization, passes through with the
/// session only: redirecting it to itself would loop. With an explicit `org`
/// selector the redirect drops the selector, so it is redirected as usual.
fn deny(request: &RequestContext, session: Session, reason: DenyReason) -> GateDecision {
    if is_landing(&request.path) && request.organization_selector.is_none() {
        tracing::info!(
            path = %request.path,
            user_id = %session.user_id,
            ?reason,
            "access denied, serving landing page without organization"
        );
        return GateDecision::Allow(AccessContext {
            session: Some(session),
            ..AccessContext::default()
        });
    }

    tracing::info!(
        path = %request.path,
        user_id = %session.user_id,
        ?reason,
        "access denied, redirecting to landing page"
    );
    GateDecision::Redirect {
        location: LANDING_PATH.to_string(),
    }
}

fn is_landing(path: &str) -> bool {
    path.trim_end_matches('/') == LANDING_PATH
}

/// `/login?redirectedFrom=<path>`, form-urlencoded.
pub fn login_location(requested_path: &str) -> String {
    let query = serde_urlencoded::to_string([(REDIRECTED_FROM_PARAM, requested_path)])
        .unwrap_or_default();
    format!("{LOGIN_PATH}?{query}")
}
