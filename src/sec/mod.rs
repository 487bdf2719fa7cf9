pub mod state;
pub mod authn;
pub mod authz;
