#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use org_portal::{
    AccessGate, AppConfig, AppState,
    auth::{Claims, Session, SessionError, SessionResolver, UserMetadata},
    models::Membership,
    repository::{MembershipRepository, RepositoryError},
    roles::Role,
    route_table::RouteTable,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
pub const TEST_AUDIENCE: &str = "authenticated";
pub const COOKIE_NAME: &str = "sb-access-token";

pub const USER_ID: Uuid = Uuid::from_u128(1);
pub const OTHER_USER_ID: Uuid = Uuid::from_u128(2);
pub const ORG_ID: Uuid = Uuid::from_u128(100);
pub const OTHER_ORG_ID: Uuid = Uuid::from_u128(200);

/// Token known to `MockSessions` whose lookup errors out.
pub const BROKEN_TOKEN: &str = "broken-token";

// --- Mock Session Resolver ---

#[derive(Default)]
pub struct MockSessions {
    sessions: HashMap<String, Session>,
}

impl MockSessions {
    pub fn with(mut self, token: &str, session: Session) -> Self {
        self.sessions.insert(token.to_string(), session);
        self
    }
}

#[async_trait]
impl SessionResolver for MockSessions {
    async fn resolve(&self, token: &str) -> Result<Option<Session>, SessionError> {
        if token == BROKEN_TOKEN {
            return Err(SessionError::Expired);
        }
        Ok(self.sessions.get(token).cloned())
    }
}

pub fn session(user_id: Uuid, default_organization_id: Option<Uuid>) -> Session {
    Session {
        user_id,
        expires_at: Utc::now() + Duration::hours(1),
        default_organization_id,
    }
}

// --- Mock Membership Repository ---

#[derive(Default)]
pub struct MockMemberships {
    members: HashMap<(Uuid, Uuid), Role>,
    pub fail: bool,
    pub lookups: AtomicUsize,
}

impl MockMemberships {
    pub fn with(mut self, organization_id: Uuid, user_id: Uuid, role: Role) -> Self {
        self.members.insert((organization_id, user_id), role);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipRepository for MockMemberships {
    async fn get_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, RepositoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RepositoryError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        }
        Ok(self
            .members
            .get(&(organization_id, user_id))
            .map(|role| Membership {
                organization_id,
                user_id,
                role: *role,
            }))
    }

    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<Membership>, RepositoryError> {
        if self.fail {
            return Err(RepositoryError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        }
        let mut members: Vec<Membership> = self
            .members
            .iter()
            .filter(|((org, _), _)| *org == organization_id)
            .map(|((org, user), role)| Membership {
                organization_id: *org,
                user_id: *user,
                role: *role,
            })
            .collect();
        members.sort_by_key(|m| m.user_id);
        Ok(members)
    }
}

// --- Builders ---

pub fn gate(sessions: MockSessions, memberships: Arc<MockMemberships>) -> AccessGate {
    AccessGate::new(
        RouteTable::dashboard(),
        Arc::new(sessions),
        memberships,
        COOKIE_NAME,
    )
}

pub fn app_state(gate: AccessGate, memberships: Arc<MockMemberships>) -> AppState {
    AppState {
        repo: memberships,
        gate: Arc::new(gate),
        config: AppConfig::default(),
    }
}

/// Signs a Supabase-shaped access token with the test secret.
pub fn create_token(user_id: Uuid, organization_id: Option<Uuid>, exp_offset_secs: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset_secs) as usize,
        aud: Some(TEST_AUDIENCE.to_string()),
        user_metadata: UserMetadata { organization_id },
    };

    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}
