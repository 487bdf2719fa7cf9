use crate::validation::check_control_whitespace;

use super::role::Role;

/// grants every permission when held by an admin equivalent user
pub const WILDCARD: &str = "*";

/// group a super admin must belong to
pub const SUPER_ADMIN_GROUP: &str = "Admin";

pub const MAX_KEY_CHARS: usize = 128;

pub const SETTINGS_READ: &str = "admin.settings.read";
pub const SETTINGS_WRITE: &str = "admin.settings.write";
pub const USERS_METRICS_READ: &str = "admin.users.metrics.read";
pub const USERS_LIST_READ: &str = "admin.users.list.read";
pub const AGENTS_STATUS_READ: &str = "admin.agents.status.read";
pub const USERS_PAUSE_WRITE: &str = "admin.users.pause.write";
pub const USERS_RESUME_WRITE: &str = "admin.users.resume.write";
pub const USERS_DELETE_WRITE: &str = "admin.users.delete.write";
pub const USERS_RENEW_UUID_WRITE: &str = "admin.users.renew_uuid.write";
pub const USERS_ROLE_WRITE: &str = "admin.users.role.write";
pub const BLACKLIST_READ: &str = "admin.blacklist.read";
pub const BLACKLIST_WRITE: &str = "admin.blacklist.write";

/// what an operator may do when the settings matrix says nothing about a
/// permission
pub const OPERATOR_DEFAULTS: [(&str, bool); 12] = [
    (SETTINGS_READ, true),
    (SETTINGS_WRITE, false),
    (USERS_METRICS_READ, true),
    (USERS_LIST_READ, true),
    (AGENTS_STATUS_READ, true),
    (USERS_PAUSE_WRITE, true),
    (USERS_RESUME_WRITE, true),
    (USERS_DELETE_WRITE, false),
    (USERS_RENEW_UUID_WRITE, true),
    (USERS_ROLE_WRITE, false),
    (BLACKLIST_READ, true),
    (BLACKLIST_WRITE, true),
];

pub fn operator_default(permission: &str) -> bool {
    OPERATOR_DEFAULTS.iter()
        .find(|(key, _)| *key == permission)
        .map(|(_, allowed)| *allowed)
        .unwrap_or(false)
}

pub fn key_valid(given: &str) -> bool {
    !given.is_empty() && check_control_whitespace(given, Some(MAX_KEY_CHARS))
}

/// the key a role is stored under in the settings matrix
pub fn role_key(role: &Role) -> &'static str {
    role.as_str()
}
