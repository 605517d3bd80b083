use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::roles::{Role, UnknownRole};

// --- Core Application Schemas (Mapped to Database) ---

/// Membership
///
/// A user's membership in one organization, as read from `public.organization_members`.
/// The gate only reads these rows; membership management happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Membership {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

/// MembershipRow
///
/// Raw row shape shared by the Postgres and REST backends. `role` is free text
/// in storage and is validated when converted into a `Membership`.
#[derive(Debug, Clone, Deserialize, FromRow)]
pub struct MembershipRow {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = UnknownRole;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        Ok(Membership {
            organization_id: row.organization_id,
            user_id: row.user_id,
            role: row.role.parse()?,
        })
    }
}

// --- Response Schemas (Output) ---

/// DashboardView
///
/// Output schema for GET /dashboard: who the caller is and which organization,
/// if any, the gate resolved for this request.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DashboardView {
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub role: Option<Role>,
    #[ts(type = "string")]
    pub session_expires_at: DateTime<Utc>,
}

/// AuthPageView
///
/// Output schema for the auth-only pages (GET /login, GET /register).
/// `redirected_from` echoes the path the gate bounced the user from, so the
/// client can send them back after signing in.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthPageView {
    pub page: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirected_from: Option<String>,
}
