pub mod totp;

pub const MIN_PASSWORD_CHARS: usize = 8;

pub fn password_long_enough(given: &str) -> bool {
    given.chars().count() >= MIN_PASSWORD_CHARS
}
