/// Router Module Index
///
/// Routes are grouped by how the access gate classifies them. The gate itself is
/// one middleware over the whole router; these modules only decide which
/// handlers live where.

/// Routes the gate lets anyone reach, plus the auth-only pages.
pub mod public;

/// Routes under `/dashboard`. Require a session; member editing also requires
/// an owner or director admin role.
pub mod dashboard;
