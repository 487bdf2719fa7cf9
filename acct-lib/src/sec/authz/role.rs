use std::str::FromStr;

use serde::{Serialize, Deserialize};

/// the closed set of roles a user can hold. lower levels carry more
/// privilege, root shares the admin level but is pinned to a single email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Root,
    Admin,
    Operator,
    User,
    ReadOnly,
}

impl Role {
    /// case insensitive match on the role name
    pub fn from_key(v: &str) -> Option<Self> {
        match v.trim().to_ascii_lowercase().as_str() {
            "root" => Some(Role::Root),
            "admin" => Some(Role::Admin),
            "operator" => Some(Role::Operator),
            "user" => Some(Role::User),
            "readonly" => Some(Role::ReadOnly),
            _ => None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Root => "root",
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::User => "user",
            Role::ReadOnly => "readonly",
        }
    }

    pub fn level(&self) -> i32 {
        match self {
            Role::Root |
            Role::Admin => 0,
            Role::Operator => 10,
            Role::User => 20,
            Role::ReadOnly => 30,
        }
    }

    /// root is never derived from a level, the admin level maps to admin
    pub fn from_level(level: i32) -> Option<Self> {
        match level {
            0 => Some(Role::Admin),
            10 => Some(Role::Operator),
            20 => Some(Role::User),
            30 => Some(Role::ReadOnly),
            _ => None
        }
    }

    /// resolves a raw role/level pair. a known role wins and forces its
    /// level, otherwise a known level picks the role, otherwise the
    /// default user role
    pub fn normalize(role: Option<&str>, level: Option<i32>) -> Self {
        if let Some(found) = role.and_then(Role::from_key) {
            return found;
        }

        level.and_then(Role::from_level)
            .unwrap_or_default()
    }

    pub fn is_admin_equivalent(&self) -> bool {
        matches!(self, Role::Root | Role::Admin)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

#[derive(Debug)]
pub struct FromStrError;

impl FromStr for Role {
    type Err = FromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or(FromStrError)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
