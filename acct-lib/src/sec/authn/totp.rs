/// number of digits in a generated code
pub const DIGITS: u32 = 6;

/// seconds a single code is valid for
pub const STEP: u64 = 30;

/// steps accepted on either side of the current one
pub const SKEW: u64 = 1;

/// bytes of random data in a new secret
pub const SECRET_LEN: usize = 20;

pub const ALGO: &str = "SHA1";

pub fn code_valid(given: &str) -> bool {
    given.len() == DIGITS as usize && given.chars().all(|ch| ch.is_ascii_digit())
}
