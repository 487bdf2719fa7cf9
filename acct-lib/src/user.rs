use crate::validation::check_control_leading_trailing;

pub const MAX_NAME_CHARS: usize = 128;

pub fn name_valid(given: &str) -> bool {
    !given.is_empty() && check_control_leading_trailing(given, Some(MAX_NAME_CHARS))
}

/// the only shape check done on an email. delivery is the real test
pub fn email_valid(given: &str) -> bool {
    given.contains('@')
}

/// trims and lower-cases an email the way it is stored
pub fn normalize_email(given: &str) -> String {
    given.trim().to_lowercase()
}
