use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;

/// Role
///
/// The closed set of permission levels a user can hold inside one organization.
/// Stored as snake_case text in the `organization_members.role` column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    Owner,
    DirectorAdmin,
    Director,
    Agent,
    SupportStaff,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Owner,
        Role::DirectorAdmin,
        Role::Director,
        Role::Agent,
        Role::SupportStaff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::DirectorAdmin => "director_admin",
            Role::Director => "director",
            Role::Agent => "agent",
            Role::SupportStaff => "support_staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored role string is not one of the known roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown membership role: {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// AllowSet
///
/// The roles permitted to reach a restricted sub-resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AllowSet(BTreeSet<Role>);

impl AllowSet {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().collect())
    }

    pub fn permits(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Role> for AllowSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self::new(iter)
    }
}
