pub mod role;
pub mod permission;
