use crate::roles::{AllowSet, Role};

/// Login page. Accepts a `redirectedFrom` query parameter.
pub const LOGIN_PATH: &str = "/login";
/// Registration page.
pub const REGISTER_PATH: &str = "/register";
/// Default protected landing page.
pub const LANDING_PATH: &str = "/dashboard";

/// RouteClass
///
/// How the gate treats a path. `Restricted` is a protected route that
/// additionally requires a membership role from its allow-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    AuthOnly,
    Protected,
    Restricted(AllowSet),
}

impl RouteClass {
    /// True for every class that requires a session.
    pub fn requires_session(&self) -> bool {
        matches!(self, RouteClass::Protected | RouteClass::Restricted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Any,
}

/// PathPattern
///
/// A segment-wise prefix pattern. `*` matches exactly one segment, and a pattern
/// matches every path whose leading segments match it, so `/dashboard` covers
/// `/dashboard/members` but not `/dashboardx`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Self {
        let segments = split_segments(pattern)
            .map(|segment| match segment {
                "*" => Segment::Any,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();
        Self { segments }
    }

    pub fn matches(&self, path: &str) -> bool {
        let mut path_segments = split_segments(path);
        self.segments.iter().all(|expected| match path_segments.next() {
            Some(actual) => match expected {
                Segment::Any => true,
                Segment::Literal(literal) => literal == actual,
            },
            None => false,
        })
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub pattern: PathPattern,
    pub class: RouteClass,
}

/// RouteTable
///
/// Ordered rule list; the first matching rule decides the class and unmatched
/// paths are public. Restricted rules must come before the protected prefix
/// that contains them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restricted(mut self, pattern: &str, roles: impl IntoIterator<Item = Role>) -> Self {
        self.push(pattern, RouteClass::Restricted(AllowSet::new(roles)));
        self
    }

    pub fn protected(mut self, pattern: &str) -> Self {
        self.push(pattern, RouteClass::Protected);
        self
    }

    pub fn auth_only(mut self, pattern: &str) -> Self {
        self.push(pattern, RouteClass::AuthOnly);
        self
    }

    fn push(&mut self, pattern: &str, class: RouteClass) {
        self.rules.push(RouteRule {
            pattern: PathPattern::new(pattern),
            class,
        });
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .map(|rule| rule.class.clone())
            .unwrap_or(RouteClass::Public)
    }

    /// The dashboard's route table: member editing is limited to owners and
    /// director admins, everything else under the dashboard needs a session.
    pub fn dashboard() -> Self {
        Self::new()
            .restricted(
                "/dashboard/members/*/edit",
                [Role::Owner, Role::DirectorAdmin],
            )
            .protected(LANDING_PATH)
            .auth_only(LOGIN_PATH)
            .auth_only(REGISTER_PATH)
    }
}
