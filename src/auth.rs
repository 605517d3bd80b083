use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{gate::AccessContext, roles::Role};

/// Session
///
/// A verified, unexpired identity resolved from the session cookie.
/// Owned by the external auth service; this crate only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    /// Organization attached to the identity, used when the request does not select one.
    pub default_organization_id: Option<Uuid>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session token expired")]
    Expired,
    #[error("session token rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("session token carries an out-of-range expiry")]
    BadExpiry,
}

/// SessionResolver
///
/// The session collaborator: turns an opaque cookie token into a `Session`.
/// `Ok(None)` is an unknown token; `Err` is anything that went wrong while checking it.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Option<Session>, SessionError>;
}

pub type SessionState = Arc<dyn SessionResolver>;

/// UserMetadata
///
/// The subset of Supabase's `user_metadata` claim the gate cares about.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
}

/// Claims
///
/// Payload of a Supabase-issued access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID in `auth.users`.
    pub sub: Uuid,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// JwtSessionResolver
///
/// Verifies the access token locally with the project's JWT secret instead of
/// calling back into the auth service on every request.
pub struct JwtSessionResolver {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtSessionResolver {
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::default();
        // Ensure expiration time validation is always active.
        validation.validate_exp = true;
        validation.set_audience(&[audience]);

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl SessionResolver for JwtSessionResolver {
    async fn resolve(&self, token: &str) -> Result<Option<Session>, SessionError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid(e),
            },
        )?;

        let claims = token_data.claims;
        let expires_at = Utc
            .timestamp_opt(claims.exp as i64, 0)
            .single()
            .ok_or(SessionError::BadExpiry)?;

        Ok(Some(Session {
            user_id: claims.sub,
            expires_at,
            default_organization_id: claims.user_metadata.organization_id,
        }))
    }
}

/// AuthUser
///
/// The caller as resolved by the access gate for this request. Handlers behind
/// protected routes take it as an argument; the gate has already decided the
/// request may proceed, so this only reads what it attached.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub session_expires_at: DateTime<Utc>,
    pub organization_id: Option<Uuid>,
    pub role: Option<Role>,
}

/// Rejects with 401 when the gate attached no session, which only happens if a
/// handler is mounted on a path the route table leaves public.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let access = parts
            .extensions
            .get::<AccessContext>()
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let session = access.session.as_ref().ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser {
            id: session.user_id,
            session_expires_at: session.expires_at,
            organization_id: access.organization_id,
            role: access.membership.as_ref().map(|m| m.role),
        })
    }
}
