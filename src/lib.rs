pub mod error;
pub mod time;
pub mod config;
pub mod user;
pub mod email;
pub mod template;
pub mod sec;
pub mod state;
pub mod sandbox;
pub mod admin;
pub mod bootstrap;
pub mod jobs;

#[cfg(test)]
mod testing;
