pub mod register;
pub mod session;
pub mod password;
pub mod totp;
