use crate::models::{Membership, MembershipRow};
use crate::roles::UnknownRole;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Table holding (organization_id, user_id, role) rows.
const MEMBERSHIP_TABLE: &str = "organization_members";

/// RepositoryError
///
/// Every way a membership lookup can fail. The gate treats all of them as
/// "no access"; handlers map them to a 500.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("membership service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("membership service returned status {0}")]
    Status(reqwest::StatusCode),
    #[error(transparent)]
    UnknownRole(#[from] UnknownRole),
}

/// MembershipRepository
///
/// Read-only contract for the membership table. Implemented by the Postgres
/// pool, by the Supabase REST gateway, and by mocks in tests.
///
/// **Send + Sync + async_trait** keep `Arc<dyn MembershipRepository>` usable
/// across Axum's task boundaries.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// The caller's membership in one organization. `Ok(None)` means "not a member".
    async fn get_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, RepositoryError>;

    /// Every membership of an organization.
    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<Membership>, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the membership lookup across the application state.
pub type RepositoryState = Arc<dyn MembershipRepository>;

fn into_memberships(rows: Vec<MembershipRow>) -> Result<Vec<Membership>, RepositoryError> {
    rows.into_iter()
        .map(|row| Membership::try_from(row).map_err(RepositoryError::from))
        .collect()
}

/// PostgresRepository
///
/// Direct connection to the hosted Postgres database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for PostgresRepository {
    async fn get_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, RepositoryError> {
        let query = format!(
            "SELECT organization_id, user_id, role FROM {MEMBERSHIP_TABLE} \
             WHERE organization_id = $1 AND user_id = $2"
        );

        let row = sqlx::query_as::<_, MembershipRow>(&query)
            .bind(organization_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Membership::try_from).transpose()?)
    }

    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<Membership>, RepositoryError> {
        let query = format!(
            "SELECT organization_id, user_id, role FROM {MEMBERSHIP_TABLE} \
             WHERE organization_id = $1 ORDER BY role, user_id"
        );

        let rows = sqlx::query_as::<_, MembershipRow>(&query)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;

        into_memberships(rows)
    }
}

/// SupabaseRestRepository
///
/// Reads memberships through the Supabase PostgREST gateway
/// (`{SUPABASE_URL}/rest/v1/organization_members`) using the service key.
pub struct SupabaseRestRepository {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl SupabaseRestRepository {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    async fn fetch_rows(&self, filters: &[(&str, String)]) -> Result<Vec<MembershipRow>, RepositoryError> {
        let url = format!("{}/rest/v1/{}", self.base_url, MEMBERSHIP_TABLE);

        let response = self
            .client
            .get(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .query(&[("select", "organization_id,user_id,role")])
            .query(filters)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RepositoryError::Status(response.status()));
        }

        Ok(response.json::<Vec<MembershipRow>>().await?)
    }
}

#[async_trait]
impl MembershipRepository for SupabaseRestRepository {
    async fn get_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, RepositoryError> {
        let rows = self
            .fetch_rows(&[
                ("organization_id", format!("eq.{organization_id}")),
                ("user_id", format!("eq.{user_id}")),
                ("limit", "1".to_string()),
            ])
            .await?;

        Ok(into_memberships(rows)?.into_iter().next())
    }

    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<Membership>, RepositoryError> {
        let rows = self
            .fetch_rows(&[
                ("organization_id", format!("eq.{organization_id}")),
                ("order", "role.asc,user_id.asc".to_string()),
            ])
            .await?;

        into_memberships(rows)
    }
}
